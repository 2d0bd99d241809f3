//! RecordStore interface tests.
//!
//! These tests verify the contract of the RecordStore trait.
//! Each storage implementation should run these tests.

use uuid::Uuid;

use paysync::interfaces::{RecordStore, StorageError};
use paysync::records::{
    CourseFormKey, CourseRegForm, Registration, RegistrationKey, UpdateOutcome,
};
use paysync::status::PaymentStatus;

/// Registration number unique to one test run, so shared databases stay isolated.
pub fn unique_number(prefix: &str) -> String {
    format!("test_{}_{}", prefix, Uuid::new_v4().simple())
}

fn registration(number: &str) -> Registration {
    Registration::new(number, format!("{}@example.edu", number), "Test Applicant")
}

// =============================================================================
// Inserts and lookups
// =============================================================================

pub async fn test_find_registration_by_each_key<S: RecordStore>(store: &S) {
    let number = unique_number("lookup");
    let order_id = format!("ORDER-{}", number);
    let record = registration(&number).with_order_id(&order_id);
    let id = record.id.clone();
    store
        .insert_registration(record)
        .await
        .expect("insert should succeed");

    for key in [
        RegistrationKey::Id(id.clone()),
        RegistrationKey::OrderId(order_id.clone()),
        RegistrationKey::RegistrationNumber(number.clone()),
        RegistrationKey::RegistrationNumbers(vec![number.clone(), "test_absent".to_string()]),
        RegistrationKey::Email(format!("{}@example.edu", number)),
    ] {
        let found = store
            .find_registrations(&key)
            .await
            .expect("find should succeed");
        assert_eq!(found.len(), 1, "key {:?} should match", key);
        assert_eq!(found[0].id, id);
        assert_eq!(found[0].order_id.as_deref(), Some(order_id.as_str()));
        assert_eq!(found[0].payment_status, PaymentStatus::Pending);
    }
}

pub async fn test_find_registration_missing<S: RecordStore>(store: &S) {
    let found = store
        .find_registrations(&RegistrationKey::RegistrationNumber(unique_number("none")))
        .await
        .expect("find should succeed");
    assert!(found.is_empty());

    let found = store
        .find_registrations(&RegistrationKey::RegistrationNumbers(vec![]))
        .await
        .expect("empty key should succeed");
    assert!(found.is_empty());
}

pub async fn test_duplicate_registration_number_rejected<S: RecordStore>(store: &S) {
    let number = unique_number("dup");
    store
        .insert_registration(registration(&number))
        .await
        .expect("first insert should succeed");

    let result = store.insert_registration(registration(&number)).await;
    assert!(
        matches!(result, Err(StorageError::DuplicateRegistration(ref n)) if *n == number),
        "second insert should be rejected, got {:?}",
        result
    );
}

pub async fn test_course_form_fields_survive<S: RecordStore>(store: &S) {
    let number = unique_number("fields");
    let form = CourseRegForm::new(&number, 12_550)
        .with_order_id("ORDER-F")
        .with_subjects(["Mathematics", "Physics"]);
    let id = form.id.clone();
    store
        .insert_course_form(form)
        .await
        .expect("insert should succeed");

    let found = store
        .find_course_forms(&CourseFormKey::Id(id.clone()))
        .await
        .expect("find should succeed");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].registration_number, number);
    assert_eq!(found[0].price_cents, 12_550);
    assert_eq!(found[0].subjects, vec!["Mathematics", "Physics"]);
    assert_eq!(found[0].order_id.as_deref(), Some("ORDER-F"));
    assert_eq!(found[0].status, PaymentStatus::Pending);
}

pub async fn test_status_queries<S: RecordStore>(store: &S) {
    let number = unique_number("status");
    store
        .insert_registration(registration(&number).with_payment_status(PaymentStatus::Completed))
        .await
        .expect("insert should succeed");
    store
        .insert_course_form(CourseRegForm::new(&number, 100).with_status(PaymentStatus::Completed))
        .await
        .expect("insert should succeed");
    store
        .insert_course_form(CourseRegForm::new(&number, 100).with_status(PaymentStatus::Failed))
        .await
        .expect("insert should succeed");

    let completed = store
        .registrations_with_payment_status(PaymentStatus::Completed)
        .await
        .expect("query should succeed");
    assert_eq!(
        completed
            .iter()
            .filter(|row| matches!(row, Ok(r) if r.registration_number == number))
            .count(),
        1
    );

    let forms = store
        .course_forms_with_status(PaymentStatus::Completed)
        .await
        .expect("query should succeed");
    assert_eq!(
        forms
            .iter()
            .filter(|row| matches!(row, Ok(f) if f.registration_number == number))
            .count(),
        1
    );
}

// =============================================================================
// Status writes
// =============================================================================

pub async fn test_status_write_counts<S: RecordStore>(store: &S) {
    let number = unique_number("write");
    store
        .insert_course_form(CourseRegForm::new(&number, 100))
        .await
        .expect("insert should succeed");
    store
        .insert_course_form(CourseRegForm::new(&number, 100).with_status(PaymentStatus::Completed))
        .await
        .expect("insert should succeed");

    let key = CourseFormKey::RegistrationNumber(number.clone());
    let first = store
        .set_course_form_status(&key, PaymentStatus::Completed)
        .await
        .expect("update should succeed");
    assert_eq!(first, UpdateOutcome::new(2, 1));

    let second = store
        .set_course_form_status(&key, PaymentStatus::Completed)
        .await
        .expect("update should succeed");
    assert_eq!(second, UpdateOutcome::new(2, 0));
}

pub async fn test_status_write_without_match<S: RecordStore>(store: &S) {
    let outcome = store
        .set_registration_payment_status(
            &RegistrationKey::RegistrationNumber(unique_number("nobody")),
            PaymentStatus::Completed,
        )
        .await
        .expect("update should succeed");
    assert_eq!(outcome, UpdateOutcome::default());

    let outcome = store
        .set_course_form_status(
            &CourseFormKey::RegistrationNumbers(vec![]),
            PaymentStatus::Completed,
        )
        .await
        .expect("empty key should succeed");
    assert_eq!(outcome, UpdateOutcome::default());
}

pub async fn test_status_write_can_demote<S: RecordStore>(store: &S) {
    let number = unique_number("refund");
    store
        .insert_registration(registration(&number).with_payment_status(PaymentStatus::Completed))
        .await
        .expect("insert should succeed");

    let outcome = store
        .set_registration_payment_status(
            &RegistrationKey::RegistrationNumber(number.clone()),
            PaymentStatus::Refunded,
        )
        .await
        .expect("update should succeed");
    assert_eq!(outcome, UpdateOutcome::new(1, 1));

    let found = store
        .find_registrations(&RegistrationKey::RegistrationNumber(number))
        .await
        .expect("find should succeed");
    assert_eq!(found[0].payment_status, PaymentStatus::Refunded);
    assert!(found[0].updated_at >= found[0].created_at);
}

pub async fn test_apply_paired<S: RecordStore>(store: &S) {
    let number = unique_number("paired");
    store
        .insert_registration(registration(&number))
        .await
        .expect("insert should succeed");
    for _ in 0..3 {
        store
            .insert_course_form(CourseRegForm::new(&number, 100))
            .await
            .expect("insert should succeed");
    }

    let outcome = store
        .apply_paired(
            &RegistrationKey::RegistrationNumber(number.clone()),
            &CourseFormKey::RegistrationNumber(number.clone()),
            PaymentStatus::Completed,
        )
        .await
        .expect("paired update should succeed");
    assert_eq!(outcome.registrations, UpdateOutcome::new(1, 1));
    assert_eq!(outcome.course_reg_forms, UpdateOutcome::new(3, 3));

    let forms = store
        .find_course_forms(&CourseFormKey::RegistrationNumber(number))
        .await
        .expect("find should succeed");
    assert!(forms.iter().all(|f| f.status == PaymentStatus::Completed));
}

/// Run all RecordStore contract tests against a store.
#[macro_export]
macro_rules! run_record_store_tests {
    ($store:expr) => {
        use $crate::storage::record_store_tests::*;

        test_find_registration_by_each_key($store).await;
        println!("  test_find_registration_by_each_key: PASSED");

        test_find_registration_missing($store).await;
        println!("  test_find_registration_missing: PASSED");

        test_duplicate_registration_number_rejected($store).await;
        println!("  test_duplicate_registration_number_rejected: PASSED");

        test_course_form_fields_survive($store).await;
        println!("  test_course_form_fields_survive: PASSED");

        test_status_queries($store).await;
        println!("  test_status_queries: PASSED");

        test_status_write_counts($store).await;
        println!("  test_status_write_counts: PASSED");

        test_status_write_without_match($store).await;
        println!("  test_status_write_without_match: PASSED");

        test_status_write_can_demote($store).await;
        println!("  test_status_write_can_demote: PASSED");

        test_apply_paired($store).await;
        println!("  test_apply_paired: PASSED");
    };
}
