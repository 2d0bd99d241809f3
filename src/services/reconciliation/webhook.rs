//! PayPal webhook fallback.
//!
//! The provider redelivers until it receives a 2xx, which makes the webhook
//! the coarse-grained retry for a failed immediate write. Signature
//! verification happens in front of this service.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::{PaymentError, ReconciliationService, Result};
use crate::records::PairedOutcome;
use crate::status::PaymentStatus;

/// Subset of a PayPal webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: Option<String>,
    pub event_type: String,
    #[serde(default)]
    pub resource: Value,
}

impl WebhookEvent {
    /// Status the event settles the order to, or `None` for event types
    /// that carry no settlement information.
    pub fn target_status(&self) -> Option<PaymentStatus> {
        match self.event_type.as_str() {
            "CHECKOUT.ORDER.COMPLETED" | "PAYMENT.CAPTURE.COMPLETED" => {
                Some(PaymentStatus::Completed)
            }
            "PAYMENT.CAPTURE.PENDING" => Some(PaymentStatus::Pending),
            "PAYMENT.CAPTURE.DENIED" | "PAYMENT.CAPTURE.DECLINED" => Some(PaymentStatus::Failed),
            "PAYMENT.CAPTURE.REFUNDED" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }

    /// Order the event refers to.
    ///
    /// Order events carry it as the resource id; capture events carry it in
    /// `supplementary_data.related_ids.order_id`, or in `custom_id` when the
    /// portal set one at order creation.
    pub fn order_id(&self) -> Option<String> {
        let candidate = if self.event_type.starts_with("CHECKOUT.ORDER.") {
            self.resource.get("id").and_then(Value::as_str)
        } else {
            self.resource
                .pointer("/supplementary_data/related_ids/order_id")
                .and_then(Value::as_str)
                .or_else(|| self.resource.get("custom_id").and_then(Value::as_str))
        };
        candidate
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }
}

/// What the webhook handler did with an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum WebhookOutcome {
    /// Event type carries no settlement information.
    Ignored { event_type: String },
    /// A PENDING event arrived for an order that already settled.
    #[serde(rename_all = "camelCase")]
    Superseded {
        order_id: String,
        status: PaymentStatus,
    },
    /// Status written to the order's records.
    #[serde(rename_all = "camelCase")]
    Applied {
        order_id: String,
        status: PaymentStatus,
        outcome: PairedOutcome,
    },
}

impl ReconciliationService {
    /// Apply a provider webhook event.
    ///
    /// Redelivery of the same event is harmless: the second write modifies
    /// nothing. PayPal does not order deliveries, so a PENDING event never
    /// overwrites an order that already has a COMPLETED record.
    pub async fn handle_webhook(&self, event: &WebhookEvent) -> Result<WebhookOutcome> {
        let Some(status) = event.target_status() else {
            debug!(
                event_id = ?event.id,
                event_type = %event.event_type,
                "Ignoring webhook event"
            );
            return Ok(WebhookOutcome::Ignored {
                event_type: event.event_type.clone(),
            });
        };

        let order_id = event.order_id().ok_or_else(|| {
            PaymentError::Validation(format!(
                "Webhook event {} carries no order id",
                event.event_type
            ))
        })?;

        if status == PaymentStatus::Pending && self.order_settled(&order_id).await? {
            info!(
                event_id = ?event.id,
                event_type = %event.event_type,
                order_id = %order_id,
                "Order already completed, ignoring late PENDING event"
            );
            return Ok(WebhookOutcome::Superseded { order_id, status });
        }

        let outcome = self.apply_by_order_id(&order_id, status).await?;
        info!(
            event_id = ?event.id,
            event_type = %event.event_type,
            order_id = %order_id,
            status = %status,
            registrations_modified = outcome.registrations.modified,
            course_forms_modified = outcome.course_reg_forms.modified,
            "Webhook payment status applied"
        );

        Ok(WebhookOutcome::Applied {
            order_id,
            status,
            outcome,
        })
    }
}

impl ReconciliationService {
    /// Whether any record tied to the order is COMPLETED.
    async fn order_settled(&self, order_id: &str) -> Result<bool> {
        let Some(targets) = self.order_targets(order_id).await? else {
            return Ok(false);
        };
        let registrations = self.store.find_registrations(&targets.registrations).await?;
        if registrations.iter().any(|r| r.payment_status.is_completed()) {
            return Ok(true);
        }
        let forms = self.store.find_course_forms(&targets.course_forms).await?;
        Ok(forms.iter().any(|f| f.status.is_completed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(event_type: &str, resource: Value) -> WebhookEvent {
        WebhookEvent {
            id: Some("WH-1".to_string()),
            event_type: event_type.to_string(),
            resource,
        }
    }

    #[test]
    fn test_order_event_uses_resource_id() {
        let e = event("CHECKOUT.ORDER.COMPLETED", json!({ "id": "5O190127TN364715T" }));
        assert_eq!(e.order_id().as_deref(), Some("5O190127TN364715T"));
        assert_eq!(e.target_status(), Some(PaymentStatus::Completed));
    }

    #[test]
    fn test_capture_event_uses_related_order_id() {
        let e = event(
            "PAYMENT.CAPTURE.COMPLETED",
            json!({
                "id": "CAPTURE-1",
                "custom_id": "IGNORED",
                "supplementary_data": { "related_ids": { "order_id": "ORDER-7" } }
            }),
        );
        assert_eq!(e.order_id().as_deref(), Some("ORDER-7"));
    }

    #[test]
    fn test_capture_event_falls_back_to_custom_id() {
        let e = event(
            "PAYMENT.CAPTURE.REFUNDED",
            json!({ "id": "REFUND-1", "custom_id": "ORDER-9" }),
        );
        assert_eq!(e.order_id().as_deref(), Some("ORDER-9"));
        assert_eq!(e.target_status(), Some(PaymentStatus::Refunded));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            event("PAYMENT.CAPTURE.DENIED", Value::Null).target_status(),
            Some(PaymentStatus::Failed)
        );
        assert_eq!(
            event("PAYMENT.CAPTURE.PENDING", Value::Null).target_status(),
            Some(PaymentStatus::Pending)
        );
        assert_eq!(
            event("CHECKOUT.ORDER.APPROVED", Value::Null).target_status(),
            None
        );
    }

    #[test]
    fn test_blank_order_id_is_absent() {
        let e = event("CHECKOUT.ORDER.COMPLETED", json!({ "id": "  " }));
        assert!(e.order_id().is_none());
    }
}
