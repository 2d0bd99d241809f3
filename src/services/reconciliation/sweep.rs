//! Two-pass reconciliation sweep.
//!
//! COMPLETED always wins: the forward pass pushes a completed registration
//! down to its course forms, the reverse pass pushes a completed course form
//! up to its registration. Neither pass ever demotes a record.

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use super::{ReconciliationService, Result};
use crate::records::{distinct_registration_numbers, CourseFormKey, RegistrationKey};
use crate::status::PaymentStatus;

/// Counters for one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Completed records examined on the source side.
    pub scanned: u64,
    /// Counterpart records escalated to COMPLETED.
    pub updated: u64,
    /// Counterpart records already COMPLETED.
    pub unchanged: u64,
    /// Lookups or writes that failed and were skipped.
    pub errors: u64,
    /// Course forms whose registration does not exist (reverse pass only).
    pub orphaned: u64,
}

/// Outcome of a full sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Registration -> course forms.
    pub forward: PassReport,
    /// Course forms -> registration.
    pub reverse: PassReport,
}

impl SweepReport {
    pub fn total_updated(&self) -> u64 {
        self.forward.updated + self.reverse.updated
    }

    pub fn total_errors(&self) -> u64 {
        self.forward.errors + self.reverse.errors
    }
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Reconciliation summary")?;
        writeln!(
            f,
            "  Forward pass (completed registrations -> course forms): scanned {} registrations",
            self.forward.scanned
        )?;
        writeln!(
            f,
            "    course forms updated: {}, already completed: {}, errors: {}",
            self.forward.updated, self.forward.unchanged, self.forward.errors
        )?;
        writeln!(
            f,
            "  Reverse pass (completed course forms -> registrations): scanned {} course forms",
            self.reverse.scanned
        )?;
        writeln!(
            f,
            "    registrations updated: {}, already completed: {}, missing: {}, errors: {}",
            self.reverse.updated, self.reverse.unchanged, self.reverse.orphaned, self.reverse.errors
        )?;
        write!(
            f,
            "  Total updated: {}, total errors: {}",
            self.total_updated(),
            self.total_errors()
        )
    }
}

impl ReconciliationService {
    /// Run the forward pass, then the reverse pass.
    ///
    /// Per-record failures, including records that cannot be decoded, are
    /// counted and skipped. An error is returned only when a pass cannot
    /// query its candidates at all.
    pub async fn sweep(&self) -> Result<SweepReport> {
        info!("Reconciliation sweep starting");
        let forward = self.forward_pass().await?;
        let reverse = self.reverse_pass().await?;
        let report = SweepReport { forward, reverse };

        info!(
            forward_updated = report.forward.updated,
            reverse_updated = report.reverse.updated,
            errors = report.total_errors(),
            "Reconciliation sweep finished"
        );
        Ok(report)
    }

    /// Escalate the course forms of every completed registration.
    pub async fn forward_pass(&self) -> Result<PassReport> {
        let rows = self
            .store
            .registrations_with_payment_status(PaymentStatus::Completed)
            .await?;

        let mut report = PassReport {
            scanned: rows.len() as u64,
            ..PassReport::default()
        };

        for row in rows {
            let registration = match row {
                Ok(registration) => registration,
                Err(e) => {
                    warn!(error = %e, "Unreadable completed registration, skipping");
                    report.errors += 1;
                    continue;
                }
            };

            let forms = match self
                .store
                .find_course_forms(&CourseFormKey::RegistrationNumber(
                    registration.registration_number.clone(),
                ))
                .await
            {
                Ok(forms) => forms,
                Err(e) => {
                    warn!(
                        registration_number = %registration.registration_number,
                        error = %e,
                        "Failed to load course forms, skipping registration"
                    );
                    report.errors += 1;
                    continue;
                }
            };

            for form in forms {
                if form.status.is_completed() {
                    report.unchanged += 1;
                    continue;
                }

                match self
                    .store
                    .set_course_form_status(
                        &CourseFormKey::Id(form.id.clone()),
                        PaymentStatus::Completed,
                    )
                    .await
                {
                    Ok(outcome) if outcome.modified > 0 => {
                        info!(
                            registration_number = %form.registration_number,
                            course_form = %form.id,
                            previous = %form.status,
                            "Course form escalated to COMPLETED"
                        );
                        report.updated += 1;
                    }
                    Ok(_) => report.unchanged += 1,
                    Err(e) => {
                        warn!(
                            registration_number = %form.registration_number,
                            course_form = %form.id,
                            error = %e,
                            "Failed to update course form, skipping"
                        );
                        report.errors += 1;
                    }
                }
            }
        }

        Ok(report)
    }

    /// Escalate the registration behind every completed course form.
    pub async fn reverse_pass(&self) -> Result<PassReport> {
        let rows = self
            .store
            .course_forms_with_status(PaymentStatus::Completed)
            .await?;

        let mut report = PassReport {
            scanned: rows.len() as u64,
            ..PassReport::default()
        };

        let mut forms = Vec::with_capacity(rows.len());
        for row in rows {
            match row {
                Ok(form) => forms.push(form),
                Err(e) => {
                    warn!(error = %e, "Unreadable completed course form, skipping");
                    report.errors += 1;
                }
            }
        }

        let numbers =
            distinct_registration_numbers(forms.iter().map(|f| f.registration_number.as_str()));

        for number in numbers {
            let registrations = match self
                .store
                .find_registrations(&RegistrationKey::RegistrationNumber(number.clone()))
                .await
            {
                Ok(registrations) => registrations,
                Err(e) => {
                    warn!(
                        registration_number = %number,
                        error = %e,
                        "Failed to load registration, skipping"
                    );
                    report.errors += 1;
                    continue;
                }
            };

            if registrations.is_empty() {
                warn!(
                    registration_number = %number,
                    "Completed course form has no registration"
                );
                report.orphaned += 1;
                continue;
            }

            for registration in registrations {
                if registration.payment_status.is_completed() {
                    report.unchanged += 1;
                    continue;
                }

                match self
                    .store
                    .set_registration_payment_status(
                        &RegistrationKey::Id(registration.id.clone()),
                        PaymentStatus::Completed,
                    )
                    .await
                {
                    Ok(outcome) if outcome.modified > 0 => {
                        info!(
                            registration_number = %registration.registration_number,
                            previous = %registration.payment_status,
                            "Registration escalated to COMPLETED"
                        );
                        report.updated += 1;
                    }
                    Ok(_) => report.unchanged += 1,
                    Err(e) => {
                        warn!(
                            registration_number = %registration.registration_number,
                            error = %e,
                            "Failed to update registration, skipping"
                        );
                        report.errors += 1;
                    }
                }
            }
        }

        Ok(report)
    }
}
