//! # Billet Gateway Library
//!
//! Client side of a bank's billet (boleto) validation API.
//!
//! Modules:
//! - `barcode` - check digits and barcode / digitable line conversion
//! - `cnab` - picture grammar and fixed-width field encoding
//! - `client` - bearer assertion, request signing and the signed bank client
//! - `cache` - bearer token cache with single-flight renewal
//! - `config` - YAML settings and credentials
//! - `server` - HTTP adapter over the client

pub mod barcode;
pub mod cache;
pub mod client;
pub mod cnab;
pub mod config;
pub mod error;
pub mod observability;
pub mod resilience;
pub mod server;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::barcode::{check_digit, to_barcode, to_digitable_line, Barcode};
pub use crate::client::billing_client::BillingClient;
pub use crate::error::{BilletError, Result};
