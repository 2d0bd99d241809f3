//! Status update by orderId, registrationNumber or email.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{PaymentError, ReconciliationService, Result, Targets};
use crate::records::UpdateOutcome;
use crate::status::PaymentStatus;

/// Body of a status update call. Every field is optional on the wire so that
/// missing values produce a validation message instead of a decode error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    pub order_id: Option<String>,
    pub registration_number: Option<String>,
    pub email: Option<String>,
    pub status: Option<String>,
}

/// An identifying field, in matching precedence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    OrderId(String),
    RegistrationNumber(String),
    Email(String),
}

impl Identifier {
    /// Wire name of the field.
    pub fn field(&self) -> &'static str {
        match self {
            Identifier::OrderId(_) => "orderId",
            Identifier::RegistrationNumber(_) => "registrationNumber",
            Identifier::Email(_) => "email",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Identifier::OrderId(v) | Identifier::RegistrationNumber(v) | Identifier::Email(v) => v,
        }
    }
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUpdate {
    /// Supplied identifiers: orderId, then registrationNumber, then email.
    pub identifiers: Vec<Identifier>,
    pub status: PaymentStatus,
}

impl StatusUpdateRequest {
    /// Check the request without touching storage.
    pub fn validate(&self) -> Result<ValidatedUpdate> {
        let status = non_blank(&self.status).ok_or_else(|| {
            PaymentError::Validation("Missing required parameter: status".to_string())
        })?;

        let mut identifiers = Vec::new();
        if let Some(order_id) = non_blank(&self.order_id) {
            identifiers.push(Identifier::OrderId(order_id));
        }
        if let Some(number) = non_blank(&self.registration_number) {
            identifiers.push(Identifier::RegistrationNumber(number));
        }
        if let Some(email) = non_blank(&self.email) {
            identifiers.push(Identifier::Email(email));
        }
        if identifiers.is_empty() {
            return Err(PaymentError::Validation(
                "Missing required parameter: orderId, registrationNumber, or email".to_string(),
            ));
        }

        let status = status.parse::<PaymentStatus>().map_err(|e| {
            PaymentError::Validation(format!(
                "{}. Must be one of: {}",
                e,
                PaymentStatus::allowed_values()
            ))
        })?;

        Ok(ValidatedUpdate {
            identifiers,
            status,
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Successful update summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateResponse {
    pub message: String,
    /// Field whose value selected the records.
    pub matched_by: String,
    pub status: PaymentStatus,
    pub registrations: UpdateOutcome,
    pub course_reg_forms: UpdateOutcome,
}

impl ReconciliationService {
    /// Locate records by the first identifier that matches and write `status`
    /// to both collections.
    ///
    /// Validation happens before any storage access. Calling again with the
    /// same arguments succeeds with zero modifications.
    pub async fn update_status(&self, request: &StatusUpdateRequest) -> Result<StatusUpdateResponse> {
        let update = request.validate()?;

        for identifier in &update.identifiers {
            let Some(targets) = self.targets_for(identifier).await? else {
                debug!(
                    field = identifier.field(),
                    value = %identifier.value(),
                    "No records matched, trying next identifier"
                );
                continue;
            };

            let outcome = self.apply(&targets, update.status).await?;
            info!(
                field = identifier.field(),
                value = %identifier.value(),
                status = %update.status,
                registrations_matched = outcome.registrations.matched,
                registrations_modified = outcome.registrations.modified,
                course_forms_matched = outcome.course_reg_forms.matched,
                course_forms_modified = outcome.course_reg_forms.modified,
                "Payment status updated"
            );

            return Ok(StatusUpdateResponse {
                message: format!(
                    "Payment status set to {} by {}: registrations matched {}, modified {}; course forms matched {}, modified {}",
                    update.status,
                    identifier.field(),
                    outcome.registrations.matched,
                    outcome.registrations.modified,
                    outcome.course_reg_forms.matched,
                    outcome.course_reg_forms.modified,
                ),
                matched_by: identifier.field().to_string(),
                status: update.status,
                registrations: outcome.registrations,
                course_reg_forms: outcome.course_reg_forms,
            });
        }

        let tried = update
            .identifiers
            .iter()
            .map(|i| format!("{}={}", i.field(), i.value()))
            .collect::<Vec<_>>()
            .join(", ");
        Err(PaymentError::NotFound(format!(
            "No matching records found for {}",
            tried
        )))
    }

    async fn targets_for(&self, identifier: &Identifier) -> Result<Option<Targets>> {
        match identifier {
            Identifier::OrderId(order_id) => self.order_targets(order_id).await,
            Identifier::RegistrationNumber(number) => {
                self.registration_number_targets(number).await
            }
            Identifier::Email(email) => self.email_targets(email).await,
        }
    }
}
