//! paysync - payment-status reconciliation
//!
//! Keeps the payment status on portal registrations and on their course
//! registration forms in agreement. Payment confirmations, PayPal webhooks
//! and manual fix-ups all write both sides through one service; a two-pass
//! sweep repairs whatever drift remains.

pub mod api;
pub mod config;
pub mod interfaces;
pub mod records;
pub mod services;
pub mod status;
pub mod storage;
pub mod utils;
