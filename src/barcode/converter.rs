use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::barcode::check_digit::check_digit;
use crate::error::{BilletError, Result};

pub const BARCODE_LEN: usize = 44;
/// Bank slip digitable line: three checked blocks, general digit, factor and value.
pub const BANK_LINE_LEN: usize = 47;
/// Collection (utility/tax) slip line: four blocks of 11 digits plus one check digit each.
pub const COLLECTION_LINE_LEN: usize = 48;

const COLLECTION_BLOCK_LEN: usize = 12;

/// Group widths of the printed line, each followed by its separator.
const LINE_TEMPLATE: [(usize, &str); 8] = [
    (5, "."),
    (5, " "),
    (5, "."),
    (6, " "),
    (5, "."),
    (6, " "),
    (1, " "),
    (14, ""),
];

fn digits_only(input: &str) -> String {
    input.chars().filter(char::is_ascii_digit).collect()
}

/// Normalizes a barcode or digitable line into the 44-digit barcode.
pub fn to_barcode(input: &str) -> Result<String> {
    let candidate = digits_only(input);

    match candidate.len() {
        BARCODE_LEN => Ok(candidate),
        BANK_LINE_LEN => Ok([
            &candidate[0..4],
            &candidate[32..47],
            &candidate[4..9],
            &candidate[10..20],
            &candidate[21..31],
        ]
        .concat()),
        COLLECTION_LINE_LEN => Ok(candidate
            .as_bytes()
            .chunks(COLLECTION_BLOCK_LEN)
            .flat_map(|block| &block[..COLLECTION_BLOCK_LEN - 1])
            .map(|&b| char::from(b))
            .collect()),
        digits => Err(BilletError::MalformedInput { digits }),
    }
}

/// Normalizes a barcode or digitable line into the printed digitable line.
///
/// Collection slip lines (48 digits) have no printed template here and are
/// returned as plain digits.
pub fn to_digitable_line(input: &str) -> Result<String> {
    let candidate = digits_only(input);

    match candidate.len() {
        BARCODE_LEN => {
            let block1 = [&candidate[0..4], &candidate[19..24]].concat();
            let block2 = &candidate[24..34];
            let block3 = &candidate[34..44];

            let mut line = String::with_capacity(BANK_LINE_LEN);
            line.push_str(&block1);
            line.push(check_digit(&block1)?);
            line.push_str(block2);
            line.push(check_digit(block2)?);
            line.push_str(block3);
            line.push(check_digit(block3)?);
            // general check digit, due date factor, value
            line.push_str(&candidate[4..19]);

            Ok(format_line(&line))
        }
        BANK_LINE_LEN => Ok(format_line(&candidate)),
        COLLECTION_LINE_LEN => Ok(candidate),
        digits => Err(BilletError::MalformedInput { digits }),
    }
}

/// Recomputes the three block check digits of a bank slip line.
pub fn verify_digitable_line(input: &str) -> Result<bool> {
    let candidate = digits_only(input);
    if candidate.len() != BANK_LINE_LEN {
        return Err(BilletError::MalformedInput { digits: candidate.len() });
    }

    let blocks = [(0..9, 9), (10..20, 20), (21..31, 31)];
    for (body, digit_at) in blocks {
        let expected = check_digit(&candidate[body])?;
        if candidate.as_bytes()[digit_at] != expected as u8 {
            return Ok(false);
        }
    }
    Ok(true)
}

fn format_line(digits: &str) -> String {
    let mut formatted = String::with_capacity(digits.len() + LINE_TEMPLATE.len());
    let mut offset = 0;
    for (width, separator) in LINE_TEMPLATE {
        formatted.push_str(&digits[offset..offset + width]);
        formatted.push_str(separator);
        offset += width;
    }
    formatted
}

/// A validated 44-digit billet barcode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Barcode(String);

impl Barcode {
    /// Accepts a barcode or any accepted digitable line form.
    pub fn parse(input: &str) -> Result<Self> {
        to_barcode(input).map(Barcode)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn digitable_line(&self) -> Result<String> {
        to_digitable_line(&self.0)
    }
}

impl FromStr for Barcode {
    type Err = BilletError;

    fn from_str(s: &str) -> Result<Self> {
        Barcode::parse(s)
    }
}

impl fmt::Display for Barcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Barcode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
