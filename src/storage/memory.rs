//! In-memory RecordStore.
//!
//! Backs tests and standalone runs. Failure injection switches let tests
//! exercise the per-record error paths of the sweep and the immediate writer.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::interfaces::{RecordStore, Result, StorageError};
use crate::records::{
    CourseFormKey, CourseRegForm, PairedOutcome, Registration, RegistrationKey, UpdateOutcome,
};
use crate::status::PaymentStatus;

#[derive(Default)]
struct Collections {
    registrations: Vec<Registration>,
    course_forms: Vec<CourseRegForm>,
}

impl Collections {
    fn set_registration_status(
        &mut self,
        key: &RegistrationKey,
        status: PaymentStatus,
    ) -> UpdateOutcome {
        let now = Utc::now();
        let mut outcome = UpdateOutcome::default();
        for registration in self.registrations.iter_mut().filter(|r| key.matches(r)) {
            outcome.matched += 1;
            if registration.payment_status != status {
                registration.payment_status = status;
                registration.updated_at = now;
                outcome.modified += 1;
            }
        }
        outcome
    }

    fn set_course_form_status(&mut self, key: &CourseFormKey, status: PaymentStatus) -> UpdateOutcome {
        let now = Utc::now();
        let mut outcome = UpdateOutcome::default();
        for form in self.course_forms.iter_mut().filter(|f| key.matches(f)) {
            outcome.matched += 1;
            if form.status != status {
                form.status = status;
                form.updated_at = now;
                outcome.modified += 1;
            }
        }
        outcome
    }
}

/// RecordStore that keeps both collections in process memory.
#[derive(Default)]
pub struct InMemoryRecordStore {
    collections: RwLock<Collections>,
    fail_on_read: RwLock<bool>,
    fail_on_update: RwLock<HashSet<String>>,
    corrupt: RwLock<HashSet<String>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every read fail.
    pub async fn set_fail_on_read(&self, fail: bool) {
        *self.fail_on_read.write().await = fail;
    }

    /// Make any write touching the record with `id` fail.
    pub async fn fail_updates_for(&self, id: impl Into<String>) {
        self.fail_on_update.write().await.insert(id.into());
    }

    /// Make the record with `id` unreadable, as a row holding an unknown
    /// enum value would be. Writes still reach it.
    pub async fn mark_corrupt(&self, id: impl Into<String>) {
        self.corrupt.write().await.insert(id.into());
    }

    pub async fn clear_failures(&self) {
        *self.fail_on_read.write().await = false;
        self.fail_on_update.write().await.clear();
        self.corrupt.write().await.clear();
    }

    /// Snapshot of the registration with `registration_number`.
    pub async fn registration(&self, registration_number: &str) -> Option<Registration> {
        self.collections
            .read()
            .await
            .registrations
            .iter()
            .find(|r| r.registration_number == registration_number)
            .cloned()
    }

    /// Snapshot of the course form with `id`.
    pub async fn course_form(&self, id: &str) -> Option<CourseRegForm> {
        self.collections
            .read()
            .await
            .course_forms
            .iter()
            .find(|f| f.id == id)
            .cloned()
    }

    async fn check_read(&self) -> Result<()> {
        if *self.fail_on_read.read().await {
            return Err(StorageError::Injected("read".to_string()));
        }
        Ok(())
    }

    async fn decode<T: Clone>(&self, id: &str, record: &T) -> Result<T> {
        if self.corrupt.read().await.contains(id) {
            return Err(StorageError::Corrupt {
                id: id.to_string(),
                reason: "marked corrupt".to_string(),
            });
        }
        Ok(record.clone())
    }

    async fn check_registration_update(
        &self,
        collections: &Collections,
        key: &RegistrationKey,
    ) -> Result<()> {
        let failing = self.fail_on_update.read().await;
        if let Some(registration) = collections
            .registrations
            .iter()
            .find(|r| key.matches(r) && failing.contains(&r.id))
        {
            return Err(StorageError::Injected(registration.id.clone()));
        }
        Ok(())
    }

    async fn check_course_form_update(
        &self,
        collections: &Collections,
        key: &CourseFormKey,
    ) -> Result<()> {
        let failing = self.fail_on_update.read().await;
        if let Some(form) = collections
            .course_forms
            .iter()
            .find(|f| key.matches(f) && failing.contains(&f.id))
        {
            return Err(StorageError::Injected(form.id.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert_registration(&self, registration: Registration) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections
            .registrations
            .iter()
            .any(|r| r.registration_number == registration.registration_number)
        {
            return Err(StorageError::DuplicateRegistration(
                registration.registration_number,
            ));
        }
        if collections.registrations.iter().any(|r| r.id == registration.id) {
            return Err(StorageError::DuplicateId(registration.id));
        }
        collections.registrations.push(registration);
        Ok(())
    }

    async fn insert_course_form(&self, form: CourseRegForm) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.course_forms.iter().any(|f| f.id == form.id) {
            return Err(StorageError::DuplicateId(form.id));
        }
        collections.course_forms.push(form);
        Ok(())
    }

    async fn find_registrations(&self, key: &RegistrationKey) -> Result<Vec<Registration>> {
        self.check_read().await?;
        let collections = self.collections.read().await;
        let mut found = Vec::new();
        for registration in collections.registrations.iter().filter(|r| key.matches(r)) {
            found.push(self.decode(&registration.id, registration).await?);
        }
        Ok(found)
    }

    async fn find_course_forms(&self, key: &CourseFormKey) -> Result<Vec<CourseRegForm>> {
        self.check_read().await?;
        let collections = self.collections.read().await;
        let mut found = Vec::new();
        for form in collections.course_forms.iter().filter(|f| key.matches(f)) {
            found.push(self.decode(&form.id, form).await?);
        }
        Ok(found)
    }

    async fn registrations_with_payment_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<Result<Registration>>> {
        self.check_read().await?;
        let collections = self.collections.read().await;
        let mut rows = Vec::new();
        for registration in collections
            .registrations
            .iter()
            .filter(|r| r.payment_status == status)
        {
            rows.push(self.decode(&registration.id, registration).await);
        }
        Ok(rows)
    }

    async fn course_forms_with_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<Result<CourseRegForm>>> {
        self.check_read().await?;
        let collections = self.collections.read().await;
        let mut rows = Vec::new();
        for form in collections.course_forms.iter().filter(|f| f.status == status) {
            rows.push(self.decode(&form.id, form).await);
        }
        Ok(rows)
    }

    async fn set_registration_payment_status(
        &self,
        key: &RegistrationKey,
        status: PaymentStatus,
    ) -> Result<UpdateOutcome> {
        let mut collections = self.collections.write().await;
        self.check_registration_update(&collections, key).await?;
        Ok(collections.set_registration_status(key, status))
    }

    async fn set_course_form_status(
        &self,
        key: &CourseFormKey,
        status: PaymentStatus,
    ) -> Result<UpdateOutcome> {
        let mut collections = self.collections.write().await;
        self.check_course_form_update(&collections, key).await?;
        Ok(collections.set_course_form_status(key, status))
    }

    /// Both writes happen under one lock, so readers never see half a pair.
    async fn apply_paired(
        &self,
        registrations: &RegistrationKey,
        course_forms: &CourseFormKey,
        status: PaymentStatus,
    ) -> Result<PairedOutcome> {
        let mut collections = self.collections.write().await;
        self.check_registration_update(&collections, registrations)
            .await?;
        self.check_course_form_update(&collections, course_forms)
            .await?;
        Ok(PairedOutcome {
            registrations: collections.set_registration_status(registrations, status),
            course_reg_forms: collections.set_course_form_status(course_forms, status),
        })
    }
}
