//! Status enumerations shared by both record kinds.
//!
//! `PaymentStatus` is stored verbatim as `Registration.paymentStatus` and as
//! `CourseRegForm.status`, so the two collections can never drift apart in
//! vocabulary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Settlement state of a purchase or one of its line items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// Every status, in wire order.
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Pending,
        PaymentStatus::Completed,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
    ];

    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, PaymentStatus::Completed)
    }

    /// Comma-separated list of accepted values, for error messages.
    pub fn allowed_values() -> String {
        Self::ALL
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known status value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid status value: {value}")]
pub struct UnknownStatus {
    pub value: String,
}

impl FromStr for PaymentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "COMPLETED" => Ok(PaymentStatus::Completed),
            "FAILED" => Ok(PaymentStatus::Failed),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            other => Err(UnknownStatus {
                value: other.to_string(),
            }),
        }
    }
}

/// Approval state of an application. Independent of payment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "PENDING",
            ApplicationStatus::Approved => "APPROVED",
            ApplicationStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ApplicationStatus::Pending),
            "APPROVED" => Ok(ApplicationStatus::Approved),
            "REJECTED" => Ok(ApplicationStatus::Rejected),
            other => Err(UnknownStatus {
                value: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_status_parse() {
        for status in PaymentStatus::ALL {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_payment_status_parse_is_case_sensitive() {
        let err = "completed".parse::<PaymentStatus>().unwrap_err();
        assert_eq!(err.value, "completed");
        assert!("INVALID_STATUS".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn test_payment_status_serde_uses_wire_names() {
        let json = serde_json::to_string(&PaymentStatus::Refunded).unwrap();
        assert_eq!(json, "\"REFUNDED\"");
        let parsed: PaymentStatus = serde_json::from_str("\"COMPLETED\"").unwrap();
        assert_eq!(parsed, PaymentStatus::Completed);
    }

    #[test]
    fn test_allowed_values() {
        assert_eq!(
            PaymentStatus::allowed_values(),
            "PENDING, COMPLETED, FAILED, REFUNDED"
        );
    }

    #[test]
    fn test_defaults() {
        assert_eq!(PaymentStatus::default(), PaymentStatus::Pending);
        assert_eq!(ApplicationStatus::default(), ApplicationStatus::Pending);
    }
}
