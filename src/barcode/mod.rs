//! Billet barcode handling.
//!
//! - `check_digit` - modulo-10 weighted check digit of one line block
//! - `converter` - barcode <-> digitable line conversion

pub mod check_digit;
pub mod converter;

pub use check_digit::check_digit;
pub use converter::{to_barcode, to_digitable_line, verify_digitable_line, Barcode};
