//! Abstract interfaces for paysync components.
//!
//! These traits define the contracts for:
//! - Record storage (registrations and course registration forms)

pub mod record_store;

pub use record_store::{RecordStore, Result, StorageError};
