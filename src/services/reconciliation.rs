//! Payment-status reconciliation between registrations and course forms.
//!
//! `ReconciliationService` is the only mutation path for payment status.
//! HTTP handlers, the periodic scheduler and the operator binary all call
//! into it; none of them touch the store directly.
//!
//! ## Write paths
//!
//! ```text
//! client payment ──> record_payment() ──┐  (failures swallowed)
//! PayPal webhook ──> handle_webhook() ──┼──> RecordStore::apply_paired
//! admin/API call ──> update_status()  ──┘
//!
//! operator / scheduler ──> sweep() = forward_pass() + reverse_pass()
//! ```

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::interfaces::{RecordStore, StorageError};
use crate::records::{
    distinct_registration_numbers, CourseFormKey, PairedOutcome, RegistrationKey,
};
use crate::status::PaymentStatus;

mod inspect;
mod sweep;
mod update;
mod webhook;

pub use inspect::{CourseFormState, DriftEntry, PaymentView};
pub use sweep::{PassReport, SweepReport};
pub use update::{Identifier, StatusUpdateRequest, StatusUpdateResponse, ValidatedUpdate};
pub use webhook::{WebhookEvent, WebhookOutcome};

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors surfaced by the reconciliation service.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// Request is missing a field or carries an invalid value.
    #[error("{0}")]
    Validation(String),

    /// No record matches any supplied identifier.
    #[error("{0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Records selected for one paired write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Targets {
    pub registrations: RegistrationKey,
    pub course_forms: CourseFormKey,
}

/// Owns every read-modify-write on registration and course form status.
pub struct ReconciliationService {
    store: Arc<dyn RecordStore>,
}

impl ReconciliationService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Immediate write after a client-side payment confirmation.
    ///
    /// Never fails: the payment provider's webhook performs the same update
    /// idempotently, so any error here is logged and dropped.
    pub async fn record_payment(
        &self,
        order_id: &str,
        status: PaymentStatus,
    ) -> Option<PairedOutcome> {
        match self.apply_by_order_id(order_id, status).await {
            Ok(outcome) => {
                info!(
                    order_id = %order_id,
                    status = %status,
                    registrations_modified = outcome.registrations.modified,
                    course_forms_modified = outcome.course_reg_forms.modified,
                    "Immediate payment status update applied"
                );
                Some(outcome)
            }
            Err(e) => {
                warn!(
                    order_id = %order_id,
                    status = %status,
                    error = %e,
                    "Immediate payment status update failed, leaving it to webhook delivery"
                );
                None
            }
        }
    }

    /// Write `status` to every record tied to `order_id`.
    pub async fn apply_by_order_id(
        &self,
        order_id: &str,
        status: PaymentStatus,
    ) -> Result<PairedOutcome> {
        let targets = self.order_targets(order_id).await?.ok_or_else(|| {
            PaymentError::NotFound(format!("No records found for orderId {}", order_id))
        })?;
        self.apply(&targets, status).await
    }

    pub(crate) async fn apply(
        &self,
        targets: &Targets,
        status: PaymentStatus,
    ) -> Result<PairedOutcome> {
        debug!(?targets, status = %status, "Applying paired status update");
        Ok(self
            .store
            .apply_paired(&targets.registrations, &targets.course_forms, status)
            .await?)
    }

    /// Resolve the records tied to a payment order.
    ///
    /// The order id is not written to both collections atomically by the
    /// portal, so whichever side lacks it is resolved through the
    /// registration numbers found on the other side.
    pub(crate) async fn order_targets(&self, order_id: &str) -> Result<Option<Targets>> {
        let registrations = self
            .store
            .find_registrations(&RegistrationKey::OrderId(order_id.to_string()))
            .await?;
        let course_forms = self
            .store
            .find_course_forms(&CourseFormKey::OrderId(order_id.to_string()))
            .await?;

        if registrations.is_empty() && course_forms.is_empty() {
            return Ok(None);
        }

        let registration_key = if registrations.is_empty() {
            let numbers = distinct_registration_numbers(
                course_forms.iter().map(|f| f.registration_number.as_str()),
            );
            debug!(
                order_id = %order_id,
                registration_numbers = ?numbers,
                "No registration carries the order id, resolving through course forms"
            );
            RegistrationKey::RegistrationNumbers(numbers)
        } else {
            RegistrationKey::OrderId(order_id.to_string())
        };

        let course_form_key = if course_forms.is_empty() {
            CourseFormKey::RegistrationNumbers(distinct_registration_numbers(
                registrations.iter().map(|r| r.registration_number.as_str()),
            ))
        } else {
            CourseFormKey::OrderId(order_id.to_string())
        };

        Ok(Some(Targets {
            registrations: registration_key,
            course_forms: course_form_key,
        }))
    }

    pub(crate) async fn registration_number_targets(&self, number: &str) -> Result<Option<Targets>> {
        let registrations = self
            .store
            .find_registrations(&RegistrationKey::RegistrationNumber(number.to_string()))
            .await?;
        let course_forms = self
            .store
            .find_course_forms(&CourseFormKey::RegistrationNumber(number.to_string()))
            .await?;

        if registrations.is_empty() && course_forms.is_empty() {
            return Ok(None);
        }

        Ok(Some(Targets {
            registrations: RegistrationKey::RegistrationNumber(number.to_string()),
            course_forms: CourseFormKey::RegistrationNumber(number.to_string()),
        }))
    }

    pub(crate) async fn email_targets(&self, email: &str) -> Result<Option<Targets>> {
        let registrations = self
            .store
            .find_registrations(&RegistrationKey::Email(email.to_string()))
            .await?;

        if registrations.is_empty() {
            return Ok(None);
        }

        let numbers = distinct_registration_numbers(
            registrations.iter().map(|r| r.registration_number.as_str()),
        );
        Ok(Some(Targets {
            registrations: RegistrationKey::Email(email.to_string()),
            course_forms: CourseFormKey::RegistrationNumbers(numbers),
        }))
    }
}
