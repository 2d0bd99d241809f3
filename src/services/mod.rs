//! Reconciliation services.

pub mod reconciliation;
pub mod scheduler;

pub use reconciliation::{
    PaymentError, ReconciliationService, StatusUpdateRequest, StatusUpdateResponse, SweepReport,
    WebhookEvent, WebhookOutcome,
};
pub use scheduler::SweepScheduler;
