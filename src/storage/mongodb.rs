//! MongoDB implementation of the RecordStore interface.
//!
//! Reads and writes the portal's own collections, so field names follow the
//! portal documents (`registrationNumber`, `paymentStatus`, ...). Paired
//! writes are two sequential `update_many` calls: the portal database is not
//! guaranteed to run as a replica set, so no multi-document transaction is
//! attempted and the reconciliation sweep restores agreement after a crash.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};

use crate::interfaces::{RecordStore, Result, StorageError};
use crate::records::{CourseFormKey, CourseRegForm, Registration, RegistrationKey, UpdateOutcome};
use crate::status::{ApplicationStatus, PaymentStatus};

/// Collection names, as created by the portal.
pub(crate) const REGISTRATIONS_COLLECTION: &str = "registrations";
pub(crate) const COURSE_REG_FORMS_COLLECTION: &str = "courseregforms";

/// MongoDB implementation of RecordStore.
pub struct MongoRecordStore {
    registrations: Collection<Document>,
    course_forms: Collection<Document>,
}

impl MongoRecordStore {
    /// Create a new MongoDB record store.
    pub async fn new(client: &Client, database_name: &str) -> Result<Self> {
        let database = client.database(database_name);
        let store = Self {
            registrations: database.collection(REGISTRATIONS_COLLECTION),
            course_forms: database.collection(COURSE_REG_FORMS_COLLECTION),
        };
        store.init().await?;

        Ok(store)
    }

    /// Initialize indexes for the lookup keys.
    async fn init(&self) -> Result<()> {
        let unique_number = IndexModel::builder()
            .keys(doc! { "registrationNumber": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.registrations.create_index(unique_number).await?;

        let order_index = IndexModel::builder().keys(doc! { "orderId": 1 }).build();
        self.registrations.create_index(order_index).await?;

        let number_index = IndexModel::builder()
            .keys(doc! { "registrationNumber": 1 })
            .build();
        self.course_forms.create_index(number_index).await?;

        let order_index = IndexModel::builder().keys(doc! { "orderId": 1 }).build();
        self.course_forms.create_index(order_index).await?;

        Ok(())
    }

    async fn find_registration_docs(&self, filter: Document) -> Result<Vec<Registration>> {
        self.registration_docs(filter).await?.into_iter().collect()
    }

    async fn find_course_form_docs(&self, filter: Document) -> Result<Vec<CourseRegForm>> {
        self.course_form_docs(filter).await?.into_iter().collect()
    }

    async fn registration_docs(&self, filter: Document) -> Result<Vec<Result<Registration>>> {
        let mut cursor = self
            .registrations
            .find(filter)
            .sort(doc! { "createdAt": 1, "_id": 1 })
            .await?;

        let mut registrations = Vec::new();
        while cursor.advance().await? {
            let decoded = cursor
                .deserialize_current()
                .map_err(StorageError::from)
                .and_then(|document| registration_from_document(&document));
            registrations.push(decoded);
        }
        Ok(registrations)
    }

    async fn course_form_docs(&self, filter: Document) -> Result<Vec<Result<CourseRegForm>>> {
        let mut cursor = self
            .course_forms
            .find(filter)
            .sort(doc! { "createdAt": 1, "_id": 1 })
            .await?;

        let mut forms = Vec::new();
        while cursor.advance().await? {
            let decoded = cursor
                .deserialize_current()
                .map_err(StorageError::from)
                .and_then(|document| course_form_from_document(&document));
            forms.push(decoded);
        }
        Ok(forms)
    }

    async fn set_status(
        collection: &Collection<Document>,
        field: &str,
        mut filter: Document,
        status: PaymentStatus,
    ) -> Result<UpdateOutcome> {
        let matched = collection.count_documents(filter.clone()).await?;

        filter.insert(field, pending_aware_ne(status));
        let mut set = Document::new();
        set.insert(field, status.as_str());
        set.insert("updatedAt", bson_datetime(Utc::now()));
        let update = doc! { "$set": set };
        let result = collection.update_many(filter, update).await?;

        Ok(UpdateOutcome::new(matched, result.modified_count))
    }
}

#[async_trait]
impl RecordStore for MongoRecordStore {
    async fn insert_registration(&self, registration: Registration) -> Result<()> {
        let number = registration.registration_number.clone();
        let id = registration.id.clone();
        let document = doc! {
            "_id": id_bson(&registration.id),
            "registrationNumber": registration.registration_number.as_str(),
            "email": registration.email.as_str(),
            "fullName": registration.full_name.as_str(),
            "orderId": registration.order_id.as_deref().map(Bson::from).unwrap_or(Bson::Null),
            "paymentStatus": registration.payment_status.as_str(),
            "status": registration.status.as_str(),
            "createdAt": bson_datetime(registration.created_at),
            "updatedAt": bson_datetime(registration.updated_at),
        };

        self.registrations
            .insert_one(document)
            .await
            .map_err(|e| match duplicate_key_message(&e) {
                Some(message) if message.contains("registrationNumber") => {
                    StorageError::DuplicateRegistration(number)
                }
                Some(_) => StorageError::DuplicateId(id),
                None => StorageError::from(e),
            })?;
        Ok(())
    }

    async fn insert_course_form(&self, form: CourseRegForm) -> Result<()> {
        let id = form.id.clone();
        let document = doc! {
            "_id": id_bson(&form.id),
            "registrationNumber": form.registration_number.as_str(),
            "orderId": form.order_id.as_deref().map(Bson::from).unwrap_or(Bson::Null),
            "status": form.status.as_str(),
            "price": form.price_cents as f64 / 100.0,
            "subjects": form.subjects.clone(),
            "createdAt": bson_datetime(form.created_at),
            "updatedAt": bson_datetime(form.updated_at),
        };

        self.course_forms
            .insert_one(document)
            .await
            .map_err(|e| match duplicate_key_message(&e) {
                Some(_) => StorageError::DuplicateId(id),
                None => StorageError::from(e),
            })?;
        Ok(())
    }

    async fn find_registrations(&self, key: &RegistrationKey) -> Result<Vec<Registration>> {
        if key.is_empty() {
            return Ok(Vec::new());
        }
        self.find_registration_docs(registration_filter(key)).await
    }

    async fn find_course_forms(&self, key: &CourseFormKey) -> Result<Vec<CourseRegForm>> {
        if key.is_empty() {
            return Ok(Vec::new());
        }
        self.find_course_form_docs(course_form_filter(key)).await
    }

    async fn registrations_with_payment_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<Result<Registration>>> {
        let filter = if status == PaymentStatus::default() {
            // Portal documents created before payment may lack the field
            doc! { "$or": [
                { "paymentStatus": status.as_str() },
                { "paymentStatus": { "$exists": false } },
            ] }
        } else {
            doc! { "paymentStatus": status.as_str() }
        };
        self.registration_docs(filter).await
    }

    async fn course_forms_with_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<Result<CourseRegForm>>> {
        let filter = if status == PaymentStatus::default() {
            doc! { "$or": [
                { "status": status.as_str() },
                { "status": { "$exists": false } },
            ] }
        } else {
            doc! { "status": status.as_str() }
        };
        self.course_form_docs(filter).await
    }

    async fn set_registration_payment_status(
        &self,
        key: &RegistrationKey,
        status: PaymentStatus,
    ) -> Result<UpdateOutcome> {
        if key.is_empty() {
            return Ok(UpdateOutcome::default());
        }
        Self::set_status(
            &self.registrations,
            "paymentStatus",
            registration_filter(key),
            status,
        )
        .await
    }

    async fn set_course_form_status(
        &self,
        key: &CourseFormKey,
        status: PaymentStatus,
    ) -> Result<UpdateOutcome> {
        if key.is_empty() {
            return Ok(UpdateOutcome::default());
        }
        Self::set_status(&self.course_forms, "status", course_form_filter(key), status).await
    }
}

/// Matches documents not already in `status`. A missing field reads as
/// PENDING, so it only counts as different when the target is not PENDING.
fn pending_aware_ne(status: PaymentStatus) -> Document {
    if status == PaymentStatus::default() {
        doc! { "$exists": true, "$ne": status.as_str() }
    } else {
        doc! { "$ne": status.as_str() }
    }
}

fn duplicate_key_message(error: &mongodb::error::Error) -> Option<String> {
    if let ErrorKind::Write(WriteFailure::WriteError(ref write_err)) = *error.kind {
        if write_err.code == 11000 {
            return Some(write_err.message.clone());
        }
    }
    None
}

/// Portal documents use ObjectIds; records created here use UUID strings.
fn id_bson(id: &str) -> Bson {
    match ObjectId::parse_str(id) {
        Ok(oid) => Bson::ObjectId(oid),
        Err(_) => Bson::String(id.to_string()),
    }
}

fn id_string(document: &Document) -> Result<String> {
    match document.get("_id") {
        Some(Bson::ObjectId(oid)) => Ok(oid.to_hex()),
        Some(Bson::String(id)) => Ok(id.clone()),
        other => Err(StorageError::Corrupt {
            id: format!("{:?}", other),
            reason: "unsupported _id type".to_string(),
        }),
    }
}

fn bson_datetime(value: DateTime<Utc>) -> mongodb::bson::DateTime {
    mongodb::bson::DateTime::from_millis(value.timestamp_millis())
}

fn read_datetime(document: &Document, field: &str) -> DateTime<Utc> {
    match document.get(field) {
        Some(Bson::DateTime(dt)) => {
            DateTime::from_timestamp_millis(dt.timestamp_millis()).unwrap_or_default()
        }
        Some(Bson::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_default(),
        _ => DateTime::<Utc>::default(),
    }
}

fn read_string(document: &Document, field: &str) -> Option<String> {
    match document.get(field) {
        Some(Bson::String(s)) => Some(s.clone()),
        _ => None,
    }
}

fn read_status<T>(document: &Document, field: &str, id: &str) -> Result<T>
where
    T: std::str::FromStr<Err = crate::status::UnknownStatus> + Default,
{
    match read_string(document, field) {
        Some(value) => value.parse().map_err(|e: crate::status::UnknownStatus| {
            StorageError::Corrupt {
                id: id.to_string(),
                reason: e.to_string(),
            }
        }),
        None => Ok(T::default()),
    }
}

/// Prices are stored in currency units by the portal.
fn read_price_cents(document: &Document) -> i64 {
    match document.get("price") {
        Some(Bson::Double(price)) => (price * 100.0).round() as i64,
        Some(Bson::Int32(price)) => i64::from(*price) * 100,
        Some(Bson::Int64(price)) => price * 100,
        _ => 0,
    }
}

fn registration_from_document(document: &Document) -> Result<Registration> {
    let id = id_string(document)?;
    let registration_number =
        read_string(document, "registrationNumber").ok_or_else(|| StorageError::Corrupt {
            id: id.clone(),
            reason: "missing registrationNumber".to_string(),
        })?;

    Ok(Registration {
        registration_number,
        email: read_string(document, "email").unwrap_or_default(),
        full_name: read_string(document, "fullName").unwrap_or_default(),
        order_id: read_string(document, "orderId"),
        payment_status: read_status::<PaymentStatus>(document, "paymentStatus", &id)?,
        status: read_status::<ApplicationStatus>(document, "status", &id)?,
        created_at: read_datetime(document, "createdAt"),
        updated_at: read_datetime(document, "updatedAt"),
        id,
    })
}

fn course_form_from_document(document: &Document) -> Result<CourseRegForm> {
    let id = id_string(document)?;
    let registration_number =
        read_string(document, "registrationNumber").ok_or_else(|| StorageError::Corrupt {
            id: id.clone(),
            reason: "missing registrationNumber".to_string(),
        })?;
    let subjects = match document.get("subjects") {
        Some(Bson::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };

    Ok(CourseRegForm {
        registration_number,
        order_id: read_string(document, "orderId"),
        status: read_status::<PaymentStatus>(document, "status", &id)?,
        price_cents: read_price_cents(document),
        subjects,
        created_at: read_datetime(document, "createdAt"),
        updated_at: read_datetime(document, "updatedAt"),
        id,
    })
}

fn registration_filter(key: &RegistrationKey) -> Document {
    match key {
        RegistrationKey::Id(id) => doc! { "_id": id_bson(id) },
        RegistrationKey::OrderId(order_id) => doc! { "orderId": order_id.as_str() },
        RegistrationKey::RegistrationNumber(number) => doc! { "registrationNumber": number.as_str() },
        RegistrationKey::RegistrationNumbers(numbers) => {
            doc! { "registrationNumber": { "$in": numbers.clone() } }
        }
        RegistrationKey::Email(email) => doc! { "email": email.as_str() },
    }
}

fn course_form_filter(key: &CourseFormKey) -> Document {
    match key {
        CourseFormKey::Id(id) => doc! { "_id": id_bson(id) },
        CourseFormKey::OrderId(order_id) => doc! { "orderId": order_id.as_str() },
        CourseFormKey::RegistrationNumber(number) => doc! { "registrationNumber": number.as_str() },
        CourseFormKey::RegistrationNumbers(numbers) => {
            doc! { "registrationNumber": { "$in": numbers.clone() } }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_names() {
        assert_eq!(REGISTRATIONS_COLLECTION, "registrations");
        assert_eq!(COURSE_REG_FORMS_COLLECTION, "courseregforms");
    }

    #[test]
    fn test_id_bson_prefers_object_ids() {
        let oid = ObjectId::new();
        assert_eq!(id_bson(&oid.to_hex()), Bson::ObjectId(oid));
        assert_eq!(
            id_bson("3f7c1a52-0000-4000-8000-000000000000"),
            Bson::String("3f7c1a52-0000-4000-8000-000000000000".to_string())
        );
    }

    #[test]
    fn test_pending_write_skips_documents_without_status() {
        assert_eq!(
            pending_aware_ne(PaymentStatus::Pending),
            doc! { "$exists": true, "$ne": "PENDING" }
        );
        assert_eq!(
            pending_aware_ne(PaymentStatus::Completed),
            doc! { "$ne": "COMPLETED" }
        );
    }

    #[test]
    fn test_portal_document_conversion() {
        let oid = ObjectId::new();
        let document = doc! {
            "_id": oid,
            "registrationNumber": "REG001",
            "orderId": "5O190127TN364715T",
            "status": "COMPLETED",
            "price": 125.5,
            "subjects": ["Math", "Physics"],
        };

        let form = course_form_from_document(&document).unwrap();
        assert_eq!(form.id, oid.to_hex());
        assert_eq!(form.status, PaymentStatus::Completed);
        assert_eq!(form.price_cents, 12_550);
        assert_eq!(form.subjects, vec!["Math", "Physics"]);
    }

    #[test]
    fn test_missing_payment_status_defaults_to_pending() {
        let document = doc! {
            "_id": "r1",
            "registrationNumber": "REG001",
            "email": "a@example.edu",
        };
        let registration = registration_from_document(&document).unwrap();
        assert_eq!(registration.payment_status, PaymentStatus::Pending);
        assert!(registration.order_id.is_none());
    }

    #[test]
    fn test_unknown_status_is_corrupt() {
        let document = doc! {
            "_id": "r1",
            "registrationNumber": "REG001",
            "paymentStatus": "PAID",
        };
        assert!(matches!(
            registration_from_document(&document),
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_registration_numbers_filter() {
        let filter = course_form_filter(&CourseFormKey::RegistrationNumbers(vec![
            "A".to_string(),
            "B".to_string(),
        ]));
        assert_eq!(
            filter,
            doc! { "registrationNumber": { "$in": ["A", "B"] } }
        );
    }
}
