//! Record types for the two collections that carry payment status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::{ApplicationStatus, PaymentStatus};

/// One applicant/purchaser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub registration_number: String,
    pub email: String,
    pub full_name: String,
    pub order_id: Option<String>,
    pub payment_status: PaymentStatus,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    /// New pending registration with a fresh record id.
    pub fn new(
        registration_number: impl Into<String>,
        email: impl Into<String>,
        full_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            registration_number: registration_number.into(),
            email: email.into(),
            full_name: full_name.into(),
            order_id: None,
            payment_status: PaymentStatus::Pending,
            status: ApplicationStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    pub fn with_payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = status;
        self
    }
}

/// One course/subject selection tied to a registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRegForm {
    pub id: String,
    pub registration_number: String,
    pub order_id: Option<String>,
    pub status: PaymentStatus,
    pub price_cents: i64,
    pub subjects: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CourseRegForm {
    /// New pending line item with a fresh record id.
    pub fn new(registration_number: impl Into<String>, price_cents: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            registration_number: registration_number.into(),
            order_id: None,
            status: PaymentStatus::Pending,
            price_cents,
            subjects: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_subjects<I, S>(mut self, subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subjects = subjects.into_iter().map(Into::into).collect();
        self
    }
}

/// Selects registrations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationKey {
    Id(String),
    OrderId(String),
    RegistrationNumber(String),
    /// Matches nothing when empty.
    RegistrationNumbers(Vec<String>),
    Email(String),
}

impl RegistrationKey {
    /// Whether a record is selected by this key.
    pub fn matches(&self, registration: &Registration) -> bool {
        match self {
            RegistrationKey::Id(id) => &registration.id == id,
            RegistrationKey::OrderId(order_id) => {
                registration.order_id.as_deref() == Some(order_id.as_str())
            }
            RegistrationKey::RegistrationNumber(number) => {
                &registration.registration_number == number
            }
            RegistrationKey::RegistrationNumbers(numbers) => {
                numbers.contains(&registration.registration_number)
            }
            RegistrationKey::Email(email) => &registration.email == email,
        }
    }

    /// True when the key cannot match anything.
    pub fn is_empty(&self) -> bool {
        matches!(self, RegistrationKey::RegistrationNumbers(numbers) if numbers.is_empty())
    }
}

/// Selects course registration forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourseFormKey {
    Id(String),
    OrderId(String),
    RegistrationNumber(String),
    /// Matches nothing when empty.
    RegistrationNumbers(Vec<String>),
}

impl CourseFormKey {
    pub fn matches(&self, form: &CourseRegForm) -> bool {
        match self {
            CourseFormKey::Id(id) => &form.id == id,
            CourseFormKey::OrderId(order_id) => form.order_id.as_deref() == Some(order_id.as_str()),
            CourseFormKey::RegistrationNumber(number) => &form.registration_number == number,
            CourseFormKey::RegistrationNumbers(numbers) => {
                numbers.contains(&form.registration_number)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CourseFormKey::RegistrationNumbers(numbers) if numbers.is_empty())
    }
}

/// Result of a status write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    /// Records selected by the key.
    pub matched: u64,
    /// Records whose status actually changed.
    pub modified: u64,
}

impl UpdateOutcome {
    pub fn new(matched: u64, modified: u64) -> Self {
        Self { matched, modified }
    }
}

/// Result of a write to both collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairedOutcome {
    pub registrations: UpdateOutcome,
    pub course_reg_forms: UpdateOutcome,
}

impl PairedOutcome {
    pub fn matched_any(&self) -> bool {
        self.registrations.matched > 0 || self.course_reg_forms.matched > 0
    }
}

/// Distinct registration numbers in first-seen order.
pub fn distinct_registration_numbers<'a, I>(numbers: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = Vec::new();
    for number in numbers {
        if !seen.iter().any(|n: &String| n == number) {
            seen.push(number.to_string());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_serializes_camel_case() {
        let registration = Registration::new("REG001", "a@example.edu", "Ada")
            .with_order_id("ORDER-1")
            .with_payment_status(PaymentStatus::Completed);
        let value = serde_json::to_value(&registration).unwrap();
        assert_eq!(value["registrationNumber"], "REG001");
        assert_eq!(value["orderId"], "ORDER-1");
        assert_eq!(value["paymentStatus"], "COMPLETED");
        assert_eq!(value["status"], "PENDING");
    }

    #[test]
    fn test_registration_key_matches() {
        let registration = Registration::new("REG001", "a@example.edu", "Ada").with_order_id("O1");
        assert!(RegistrationKey::OrderId("O1".into()).matches(&registration));
        assert!(!RegistrationKey::OrderId("O2".into()).matches(&registration));
        assert!(RegistrationKey::Email("a@example.edu".into()).matches(&registration));
        assert!(RegistrationKey::RegistrationNumbers(vec!["X".into(), "REG001".into()])
            .matches(&registration));
        assert!(!RegistrationKey::RegistrationNumbers(vec![]).matches(&registration));
    }

    #[test]
    fn test_course_form_key_without_order_id() {
        let form = CourseRegForm::new("REG001", 5000);
        assert!(!CourseFormKey::OrderId("O1".into()).matches(&form));
        assert!(CourseFormKey::RegistrationNumber("REG001".into()).matches(&form));
    }

    #[test]
    fn test_empty_keys() {
        assert!(RegistrationKey::RegistrationNumbers(vec![]).is_empty());
        assert!(CourseFormKey::RegistrationNumbers(vec![]).is_empty());
        assert!(!CourseFormKey::OrderId(String::new()).is_empty());
    }

    #[test]
    fn test_distinct_registration_numbers_keeps_order() {
        let numbers = distinct_registration_numbers(["B", "A", "B", "C", "A"]);
        assert_eq!(numbers, vec!["B", "A", "C"]);
    }
}
