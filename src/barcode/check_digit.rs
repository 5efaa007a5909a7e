use crate::error::{BilletError, Result};

/// Modulo-10 check digit of a digitable line block.
///
/// Weights alternate 2, 1, 2, ... starting from the rightmost digit; a
/// weighted product above 9 contributes the sum of its two digits. A total
/// that is already a multiple of ten yields `'0'`.
pub fn check_digit(field: &str) -> Result<char> {
    if field.is_empty() {
        return Err(BilletError::validation("check digit field is empty"));
    }

    let mut total = 0u32;
    for (position, ch) in field.chars().rev().enumerate() {
        let digit = ch
            .to_digit(10)
            .ok_or_else(|| BilletError::validation(format!("check digit field '{}' is not numeric", field)))?;
        let weight = if position % 2 == 0 { 2 } else { 1 };
        let product = digit * weight;
        total += if product > 9 { product / 10 + product % 10 } else { product };
    }

    let digit = (10 - total % 10) % 10;
    Ok(char::from(b'0' + digit as u8))
}
