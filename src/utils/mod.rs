//! Shared utilities for paysync binaries.

pub mod bootstrap;
pub mod retry;
