use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use crate::services::reconciliation::PaymentView;
use crate::services::{
    PaymentError, ReconciliationService, StatusUpdateRequest, StatusUpdateResponse, SweepReport,
    WebhookEvent, WebhookOutcome,
};
use crate::status::PaymentStatus;

pub(super) type AppState = Arc<ReconciliationService>;

/// Body of the client-side payment confirmation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmation {
    pub order_id: Option<String>,
    pub status: Option<String>,
}

impl PaymentConfirmation {
    fn validate(&self) -> Result<(String, PaymentStatus), PaymentError> {
        let order_id = self
            .order_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                PaymentError::Validation("Missing required parameter: orderId".to_string())
            })?;

        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => PaymentStatus::Completed,
            Some(value) => value.parse::<PaymentStatus>().map_err(|e| {
                PaymentError::Validation(format!(
                    "{}. Must be one of: {}",
                    e,
                    PaymentStatus::allowed_values()
                ))
            })?,
        };

        Ok((order_id.to_string(), status))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageBody {
    pub message: String,
}

pub(super) async fn health() -> StatusCode {
    StatusCode::OK
}

pub(super) async fn update_status(
    State(service): State<AppState>,
    payload: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> Result<Json<StatusUpdateResponse>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(service.update_status(&request).await?))
}

/// Immediate write after the client confirms a payment. Storage problems
/// never reach the caller; the webhook repeats the update.
pub(super) async fn complete_payment(
    State(service): State<AppState>,
    payload: Result<Json<PaymentConfirmation>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageBody>), ApiError> {
    let Json(confirmation) = payload?;
    let (order_id, status) = confirmation.validate()?;

    service.record_payment(&order_id, status).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageBody {
            message: format!("Payment status {} recorded for order {}", status, order_id),
        }),
    ))
}

pub(super) async fn paypal_webhook(
    State(service): State<AppState>,
    payload: Result<Json<WebhookEvent>, JsonRejection>,
) -> Result<Json<WebhookOutcome>, ApiError> {
    let Json(event) = payload?;
    Ok(Json(service.handle_webhook(&event).await?))
}

pub(super) async fn reconcile(
    State(service): State<AppState>,
) -> Result<Json<SweepReport>, ApiError> {
    Ok(Json(service.sweep().await?))
}

pub(super) async fn registration_payment(
    State(service): State<AppState>,
    Path(registration_number): Path<String>,
) -> Result<Json<PaymentView>, ApiError> {
    Ok(Json(service.inspect(&registration_number).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_defaults_to_completed() {
        let confirmation = PaymentConfirmation {
            order_id: Some("ORDER-1".into()),
            status: None,
        };
        assert_eq!(
            confirmation.validate().unwrap(),
            ("ORDER-1".to_string(), PaymentStatus::Completed)
        );
    }

    #[test]
    fn test_confirmation_requires_order_id() {
        let confirmation = PaymentConfirmation {
            order_id: Some(" ".into()),
            status: Some("COMPLETED".into()),
        };
        assert!(matches!(
            confirmation.validate(),
            Err(PaymentError::Validation(_))
        ));
    }

    #[test]
    fn test_confirmation_rejects_unknown_status() {
        let confirmation = PaymentConfirmation {
            order_id: Some("ORDER-1".into()),
            status: Some("PAID".into()),
        };
        match confirmation.validate() {
            Err(PaymentError::Validation(message)) => {
                assert!(message.starts_with("Invalid status value: PAID"))
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
