//! Record storage interface.

use async_trait::async_trait;

use crate::records::{
    CourseFormKey, CourseRegForm, PairedOutcome, Registration, RegistrationKey, UpdateOutcome,
};
use crate::status::PaymentStatus;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Duplicate registration number: {0}")]
    DuplicateRegistration(String),

    #[error("Duplicate record id: {0}")]
    DuplicateId(String),

    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Injected failure for record {0}")]
    Injected(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(#[from] chrono::ParseError),

    #[error("JSON column error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[cfg(feature = "mongodb")]
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
}

/// Interface for the two collections carrying payment status.
///
/// Implementations:
/// - `InMemoryRecordStore`: process-local maps (tests, standalone runs)
/// - `SqliteRecordStore`: SQLite via sqlx
/// - `MongoRecordStore`: MongoDB collections shared with the portal
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new registration. Registration numbers are unique.
    async fn insert_registration(&self, registration: Registration) -> Result<()>;

    /// Insert a new course registration form.
    async fn insert_course_form(&self, form: CourseRegForm) -> Result<()>;

    /// Registrations selected by `key`.
    async fn find_registrations(&self, key: &RegistrationKey) -> Result<Vec<Registration>>;

    /// Course forms selected by `key`.
    async fn find_course_forms(&self, key: &CourseFormKey) -> Result<Vec<CourseRegForm>>;

    /// Registrations whose `paymentStatus` equals `status`.
    ///
    /// Rows are decoded one at a time: the outer error means the query
    /// failed, an inner error means that one record could not be read.
    async fn registrations_with_payment_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<Result<Registration>>>;

    /// Course forms whose `status` equals `status`, decoded per row.
    async fn course_forms_with_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<Result<CourseRegForm>>>;

    /// Set `paymentStatus` on every registration selected by `key`.
    ///
    /// Only records not already in `status` are touched, so repeated calls
    /// report `modified == 0`.
    async fn set_registration_payment_status(
        &self,
        key: &RegistrationKey,
        status: PaymentStatus,
    ) -> Result<UpdateOutcome>;

    /// Set `status` on every course form selected by `key`.
    async fn set_course_form_status(
        &self,
        key: &CourseFormKey,
        status: PaymentStatus,
    ) -> Result<UpdateOutcome>;

    /// Write `status` to both collections.
    ///
    /// The default performs two sequential writes. Backends that support
    /// multi-record transactions override this to make the pair atomic.
    async fn apply_paired(
        &self,
        registrations: &RegistrationKey,
        course_forms: &CourseFormKey,
        status: PaymentStatus,
    ) -> Result<PairedOutcome> {
        let registrations = self
            .set_registration_payment_status(registrations, status)
            .await?;
        let course_reg_forms = self.set_course_form_status(course_forms, status).await?;
        Ok(PairedOutcome {
            registrations,
            course_reg_forms,
        })
    }
}
