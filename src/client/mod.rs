pub mod assertion;
pub mod billing_client;
pub mod signing;
pub mod types;

pub use billing_client::BillingClient;
pub use types::{BankResponse, BilletRecord, RequestParams};
