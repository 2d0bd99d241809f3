//! Read-only consistency views.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::warn;

use super::{PaymentError, ReconciliationService, Result};
use crate::records::{CourseFormKey, CourseRegForm, Registration, RegistrationKey};
use crate::status::PaymentStatus;

/// Registration and course forms sharing one registration number.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub registration: Registration,
    pub course_reg_forms: Vec<CourseRegForm>,
    /// Whether both sides currently agree on COMPLETED.
    pub consistent: bool,
}

/// Status of one course form inside a drift entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseFormState {
    pub id: String,
    pub status: PaymentStatus,
}

/// A registration number whose records disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftEntry {
    pub registration_number: String,
    /// `None` when the registration record is missing.
    pub payment_status: Option<PaymentStatus>,
    pub course_reg_forms: Vec<CourseFormState>,
}

impl fmt::Display for DriftEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registration = self
            .payment_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "MISSING".to_string());
        let forms = self
            .course_reg_forms
            .iter()
            .map(|form| format!("{}={}", form.id, form.status))
            .collect::<Vec<_>>()
            .join(", ");
        write!(
            f,
            "{}: registration {}, course forms [{}]",
            self.registration_number, registration, forms
        )
    }
}

/// Whether a registration and its forms satisfy the COMPLETED agreement.
pub(crate) fn is_consistent(registration: Option<&Registration>, forms: &[CourseRegForm]) -> bool {
    let registration_completed = registration
        .map(|r| r.payment_status.is_completed())
        .unwrap_or(false);
    let any_form_completed = forms.iter().any(|f| f.status.is_completed());
    let all_forms_completed = forms.iter().all(|f| f.status.is_completed());

    if registration_completed && !all_forms_completed {
        return false;
    }
    if any_form_completed && !registration_completed {
        return false;
    }
    true
}

impl ReconciliationService {
    /// Current records for one registration number.
    pub async fn inspect(&self, registration_number: &str) -> Result<PaymentView> {
        let registration = self
            .store
            .find_registrations(&RegistrationKey::RegistrationNumber(
                registration_number.to_string(),
            ))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                PaymentError::NotFound(format!(
                    "No registration found for registrationNumber {}",
                    registration_number
                ))
            })?;
        let course_reg_forms = self
            .store
            .find_course_forms(&CourseFormKey::RegistrationNumber(
                registration_number.to_string(),
            ))
            .await?;

        let consistent = is_consistent(Some(&registration), &course_reg_forms);
        Ok(PaymentView {
            registration,
            course_reg_forms,
            consistent,
        })
    }

    /// Every registration number whose records currently disagree.
    ///
    /// Records that cannot be read are logged and left out; an error is
    /// returned only when the candidate queries themselves fail.
    pub async fn drift(&self) -> Result<Vec<DriftEntry>> {
        let mut candidates = Vec::new();
        for row in self
            .store
            .registrations_with_payment_status(PaymentStatus::Completed)
            .await?
        {
            match row {
                Ok(registration) => candidates.push(registration.registration_number),
                Err(e) => warn!(error = %e, "Unreadable registration left out of drift listing"),
            }
        }
        for row in self
            .store
            .course_forms_with_status(PaymentStatus::Completed)
            .await?
        {
            match row {
                Ok(form) => candidates.push(form.registration_number),
                Err(e) => warn!(error = %e, "Unreadable course form left out of drift listing"),
            }
        }
        candidates.sort();
        candidates.dedup();

        let mut drift = BTreeMap::new();
        for number in candidates {
            let (registration, forms) = match self.load_pair(&number).await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(
                        registration_number = %number,
                        error = %e,
                        "Unreadable records left out of drift listing"
                    );
                    continue;
                }
            };

            if !is_consistent(registration.as_ref(), &forms) {
                drift.insert(
                    number.clone(),
                    DriftEntry {
                        registration_number: number,
                        payment_status: registration.map(|r| r.payment_status),
                        course_reg_forms: forms
                            .into_iter()
                            .map(|f| CourseFormState {
                                id: f.id,
                                status: f.status,
                            })
                            .collect(),
                    },
                );
            }
        }

        Ok(drift.into_values().collect())
    }

    async fn load_pair(&self, number: &str) -> Result<(Option<Registration>, Vec<CourseRegForm>)> {
        let registration = self
            .store
            .find_registrations(&RegistrationKey::RegistrationNumber(number.to_string()))
            .await?
            .into_iter()
            .next();
        let forms = self
            .store
            .find_course_forms(&CourseFormKey::RegistrationNumber(number.to_string()))
            .await?;
        Ok((registration, forms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(status: PaymentStatus) -> Registration {
        Registration::new("REG001", "a@example.edu", "Ada").with_payment_status(status)
    }

    fn form(status: PaymentStatus) -> CourseRegForm {
        CourseRegForm::new("REG001", 1000).with_status(status)
    }

    #[test]
    fn test_consistent_when_all_completed() {
        let r = registration(PaymentStatus::Completed);
        assert!(is_consistent(
            Some(&r),
            &[form(PaymentStatus::Completed), form(PaymentStatus::Completed)]
        ));
    }

    #[test]
    fn test_consistent_when_nothing_completed() {
        let r = registration(PaymentStatus::Pending);
        assert!(is_consistent(
            Some(&r),
            &[form(PaymentStatus::Failed), form(PaymentStatus::Pending)]
        ));
    }

    #[test]
    fn test_registration_ahead_of_forms() {
        let r = registration(PaymentStatus::Completed);
        assert!(!is_consistent(Some(&r), &[form(PaymentStatus::Pending)]));
    }

    #[test]
    fn test_form_ahead_of_registration() {
        let r = registration(PaymentStatus::Pending);
        assert!(!is_consistent(
            Some(&r),
            &[form(PaymentStatus::Completed), form(PaymentStatus::Pending)]
        ));
    }

    #[test]
    fn test_completed_form_without_registration() {
        assert!(!is_consistent(None, &[form(PaymentStatus::Completed)]));
    }

    #[test]
    fn test_drift_entry_display() {
        let entry = DriftEntry {
            registration_number: "REG002".to_string(),
            payment_status: None,
            course_reg_forms: vec![CourseFormState {
                id: "f1".to_string(),
                status: PaymentStatus::Completed,
            }],
        };
        assert_eq!(
            entry.to_string(),
            "REG002: registration MISSING, course forms [f1=COMPLETED]"
        );
    }
}
