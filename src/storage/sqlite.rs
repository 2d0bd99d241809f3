//! SQLite implementation of the RecordStore interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_query::{Expr, Order, Query, SimpleExpr, SqliteQueryBuilder};
use sea_query_binder::SqlxBinder;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::interfaces::{RecordStore, Result, StorageError};
use crate::records::{
    CourseFormKey, CourseRegForm, PairedOutcome, Registration, RegistrationKey, UpdateOutcome,
};
use crate::status::PaymentStatus;

use super::schema::{
    CourseRegForms, Registrations, CREATE_COURSE_REG_FORMS_TABLE, CREATE_INDEXES,
    CREATE_REGISTRATIONS_TABLE,
};

/// SQLite implementation of RecordStore.
///
/// Every status write runs in a transaction so the matched/modified counts
/// describe the same snapshot, and `apply_paired` commits both collections
/// together.
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Create a new SQLite record store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_REGISTRATIONS_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::query(CREATE_COURSE_REG_FORMS_TABLE)
            .execute(&self.pool)
            .await?;
        for statement in CREATE_INDEXES {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn select_registrations(&self, condition: SimpleExpr) -> Result<Vec<Registration>> {
        self.select_registration_rows(condition)
            .await?
            .into_iter()
            .collect()
    }

    async fn select_course_forms(&self, condition: SimpleExpr) -> Result<Vec<CourseRegForm>> {
        self.select_course_form_rows(condition)
            .await?
            .into_iter()
            .collect()
    }

    async fn select_registration_rows(
        &self,
        condition: SimpleExpr,
    ) -> Result<Vec<Result<Registration>>> {
        let (sql, values) = Query::select()
            .columns(registration_columns())
            .from(Registrations::Table)
            .and_where(condition)
            .order_by(Registrations::CreatedAt, Order::Asc)
            .order_by(Registrations::Id, Order::Asc)
            .build_sqlx(SqliteQueryBuilder);

        let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(registration_from_row).collect())
    }

    async fn select_course_form_rows(
        &self,
        condition: SimpleExpr,
    ) -> Result<Vec<Result<CourseRegForm>>> {
        let (sql, values) = Query::select()
            .columns(course_form_columns())
            .from(CourseRegForms::Table)
            .and_where(condition)
            .order_by(CourseRegForms::CreatedAt, Order::Asc)
            .order_by(CourseRegForms::Id, Order::Asc)
            .build_sqlx(SqliteQueryBuilder);

        let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(course_form_from_row).collect())
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert_registration(&self, registration: Registration) -> Result<()> {
        let registration_number = registration.registration_number.clone();
        let id = registration.id.clone();

        let (sql, values) = Query::insert()
            .into_table(Registrations::Table)
            .columns(registration_columns())
            .values_panic([
                registration.id.into(),
                registration.registration_number.into(),
                registration.email.into(),
                registration.full_name.into(),
                registration.order_id.into(),
                registration.payment_status.as_str().into(),
                registration.status.as_str().into(),
                registration.created_at.to_rfc3339().into(),
                registration.updated_at.to_rfc3339().into(),
            ])
            .build_sqlx(SqliteQueryBuilder);

        match sqlx::query_with(&sql, values).execute(&self.pool).await {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                if e.message().contains("registration_number") {
                    Err(StorageError::DuplicateRegistration(registration_number))
                } else {
                    Err(StorageError::DuplicateId(id))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_course_form(&self, form: CourseRegForm) -> Result<()> {
        let id = form.id.clone();
        let subjects = serde_json::to_string(&form.subjects)?;

        let (sql, values) = Query::insert()
            .into_table(CourseRegForms::Table)
            .columns(course_form_columns())
            .values_panic([
                form.id.into(),
                form.registration_number.into(),
                form.order_id.into(),
                form.status.as_str().into(),
                form.price_cents.into(),
                subjects.into(),
                form.created_at.to_rfc3339().into(),
                form.updated_at.to_rfc3339().into(),
            ])
            .build_sqlx(SqliteQueryBuilder);

        match sqlx::query_with(&sql, values).execute(&self.pool).await {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StorageError::DuplicateId(id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_registrations(&self, key: &RegistrationKey) -> Result<Vec<Registration>> {
        if key.is_empty() {
            return Ok(Vec::new());
        }
        self.select_registrations(registration_condition(key)).await
    }

    async fn find_course_forms(&self, key: &CourseFormKey) -> Result<Vec<CourseRegForm>> {
        if key.is_empty() {
            return Ok(Vec::new());
        }
        self.select_course_forms(course_form_condition(key)).await
    }

    async fn registrations_with_payment_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<Result<Registration>>> {
        self.select_registration_rows(Expr::col(Registrations::PaymentStatus).eq(status.as_str()))
            .await
    }

    async fn course_forms_with_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<Result<CourseRegForm>>> {
        self.select_course_form_rows(Expr::col(CourseRegForms::Status).eq(status.as_str()))
            .await
    }

    async fn set_registration_payment_status(
        &self,
        key: &RegistrationKey,
        status: PaymentStatus,
    ) -> Result<UpdateOutcome> {
        let mut tx = self.pool.begin().await?;
        let outcome = update_registrations(&mut tx, key, status).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn set_course_form_status(
        &self,
        key: &CourseFormKey,
        status: PaymentStatus,
    ) -> Result<UpdateOutcome> {
        let mut tx = self.pool.begin().await?;
        let outcome = update_course_forms(&mut tx, key, status).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn apply_paired(
        &self,
        registrations: &RegistrationKey,
        course_forms: &CourseFormKey,
        status: PaymentStatus,
    ) -> Result<PairedOutcome> {
        // Use a transaction so a crash cannot leave half a pair behind
        let mut tx = self.pool.begin().await?;
        let registrations = update_registrations(&mut tx, registrations, status).await?;
        let course_reg_forms = update_course_forms(&mut tx, course_forms, status).await?;
        tx.commit().await?;

        Ok(PairedOutcome {
            registrations,
            course_reg_forms,
        })
    }
}

async fn update_registrations(
    conn: &mut SqliteConnection,
    key: &RegistrationKey,
    status: PaymentStatus,
) -> Result<UpdateOutcome> {
    if key.is_empty() {
        return Ok(UpdateOutcome::default());
    }

    let (sql, values) = Query::select()
        .expr(Expr::col(Registrations::Id).count())
        .from(Registrations::Table)
        .and_where(registration_condition(key))
        .build_sqlx(SqliteQueryBuilder);
    let matched: i64 = sqlx::query_with(&sql, values)
        .fetch_one(&mut *conn)
        .await?
        .try_get(0)?;

    let (sql, values) = Query::update()
        .table(Registrations::Table)
        .values([
            (Registrations::PaymentStatus, status.as_str().into()),
            (Registrations::UpdatedAt, Utc::now().to_rfc3339().into()),
        ])
        .and_where(registration_condition(key))
        .and_where(Expr::col(Registrations::PaymentStatus).ne(status.as_str()))
        .build_sqlx(SqliteQueryBuilder);
    let result = sqlx::query_with(&sql, values).execute(&mut *conn).await?;

    Ok(UpdateOutcome::new(matched as u64, result.rows_affected()))
}

async fn update_course_forms(
    conn: &mut SqliteConnection,
    key: &CourseFormKey,
    status: PaymentStatus,
) -> Result<UpdateOutcome> {
    if key.is_empty() {
        return Ok(UpdateOutcome::default());
    }

    let (sql, values) = Query::select()
        .expr(Expr::col(CourseRegForms::Id).count())
        .from(CourseRegForms::Table)
        .and_where(course_form_condition(key))
        .build_sqlx(SqliteQueryBuilder);
    let matched: i64 = sqlx::query_with(&sql, values)
        .fetch_one(&mut *conn)
        .await?
        .try_get(0)?;

    let (sql, values) = Query::update()
        .table(CourseRegForms::Table)
        .values([
            (CourseRegForms::Status, status.as_str().into()),
            (CourseRegForms::UpdatedAt, Utc::now().to_rfc3339().into()),
        ])
        .and_where(course_form_condition(key))
        .and_where(Expr::col(CourseRegForms::Status).ne(status.as_str()))
        .build_sqlx(SqliteQueryBuilder);
    let result = sqlx::query_with(&sql, values).execute(&mut *conn).await?;

    Ok(UpdateOutcome::new(matched as u64, result.rows_affected()))
}

fn registration_columns() -> [Registrations; 9] {
    [
        Registrations::Id,
        Registrations::RegistrationNumber,
        Registrations::Email,
        Registrations::FullName,
        Registrations::OrderId,
        Registrations::PaymentStatus,
        Registrations::Status,
        Registrations::CreatedAt,
        Registrations::UpdatedAt,
    ]
}

fn course_form_columns() -> [CourseRegForms; 8] {
    [
        CourseRegForms::Id,
        CourseRegForms::RegistrationNumber,
        CourseRegForms::OrderId,
        CourseRegForms::Status,
        CourseRegForms::PriceCents,
        CourseRegForms::Subjects,
        CourseRegForms::CreatedAt,
        CourseRegForms::UpdatedAt,
    ]
}

fn registration_condition(key: &RegistrationKey) -> SimpleExpr {
    match key {
        RegistrationKey::Id(id) => Expr::col(Registrations::Id).eq(id.clone()),
        RegistrationKey::OrderId(order_id) => Expr::col(Registrations::OrderId).eq(order_id.clone()),
        RegistrationKey::RegistrationNumber(number) => {
            Expr::col(Registrations::RegistrationNumber).eq(number.clone())
        }
        RegistrationKey::RegistrationNumbers(numbers) => {
            Expr::col(Registrations::RegistrationNumber).is_in(numbers.iter().cloned())
        }
        RegistrationKey::Email(email) => Expr::col(Registrations::Email).eq(email.clone()),
    }
}

fn course_form_condition(key: &CourseFormKey) -> SimpleExpr {
    match key {
        CourseFormKey::Id(id) => Expr::col(CourseRegForms::Id).eq(id.clone()),
        CourseFormKey::OrderId(order_id) => {
            Expr::col(CourseRegForms::OrderId).eq(order_id.clone())
        }
        CourseFormKey::RegistrationNumber(number) => {
            Expr::col(CourseRegForms::RegistrationNumber).eq(number.clone())
        }
        CourseFormKey::RegistrationNumbers(numbers) => {
            Expr::col(CourseRegForms::RegistrationNumber).is_in(numbers.iter().cloned())
        }
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

fn corrupt(id: &str, reason: impl ToString) -> StorageError {
    StorageError::Corrupt {
        id: id.to_string(),
        reason: reason.to_string(),
    }
}

fn registration_from_row(row: &SqliteRow) -> Result<Registration> {
    let id: String = row.try_get("id")?;
    let payment_status: String = row.try_get("payment_status")?;
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Registration {
        registration_number: row.try_get("registration_number")?,
        email: row.try_get("email")?,
        full_name: row.try_get("full_name")?,
        order_id: row.try_get("order_id")?,
        payment_status: payment_status.parse().map_err(|e| corrupt(&id, e))?,
        status: status.parse().map_err(|e| corrupt(&id, e))?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
        id,
    })
}

fn course_form_from_row(row: &SqliteRow) -> Result<CourseRegForm> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let subjects: String = row.try_get("subjects")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(CourseRegForm {
        registration_number: row.try_get("registration_number")?,
        order_id: row.try_get("order_id")?,
        status: status.parse().map_err(|e| corrupt(&id, e))?,
        price_cents: row.try_get("price_cents")?,
        subjects: serde_json::from_str(&subjects)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
        id,
    })
}
