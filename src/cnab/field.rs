use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use serde_json::Value;

use crate::cnab::picture::{parse_picture, Casing, DateComponent, DateFormat, DateSegment, FieldKind};
use crate::error::{BilletError, Result};

/// A value to be written into a fixed-width field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldValue {
    #[default]
    Empty,
    Text(String),
    Number(Decimal),
    Date(NaiveDate),
}

impl FieldValue {
    fn is_absent(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(text) => text.is_empty(),
            _ => false,
        }
    }

    /// Textual form used for domain membership checks.
    fn domain_key(&self) -> String {
        match self {
            FieldValue::Empty => String::new(),
            FieldValue::Text(text) => text.clone(),
            FieldValue::Number(number) => number.normalize().to_string(),
            FieldValue::Date(date) => date.format("%Y-%m-%d").to_string(),
        }
    }

    fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(FieldValue::Empty),
            Value::String(text) => Ok(FieldValue::Text(text.clone())),
            Value::Number(number) => Decimal::from_str(&number.to_string())
                .or_else(|_| Decimal::from_scientific(&number.to_string()))
                .map(FieldValue::Number)
                .map_err(|e| BilletError::validation(format!("invalid numeric value {}: {}", number, e))),
            other => Err(BilletError::validation(format!("unsupported field value {}", other))),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(Decimal::from(value))
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Number(Decimal::from(value))
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

impl TryFrom<f64> for FieldValue {
    type Error = BilletError;

    fn try_from(value: f64) -> Result<Self> {
        Decimal::try_from(value)
            .map(FieldValue::Number)
            .map_err(|e| BilletError::validation(format!("{} is not a representable number: {}", value, e)))
    }
}

/// Typed description of one fixed-width field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "FieldDefinition")]
pub struct FieldSpec {
    title: Option<String>,
    kind: FieldKind,
    default: Option<FieldValue>,
    domain: Option<Vec<String>>,
}

impl FieldSpec {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            title: None,
            kind,
            default: None,
            domain: None,
        }
    }

    pub fn from_picture(picture: &str) -> Result<Self> {
        let picture = parse_picture(picture)?;
        Ok(Self {
            title: picture.title,
            ..Self::new(picture.kind)
        })
    }

    pub fn alphanumeric(length: usize, casing: Casing) -> Self {
        Self::new(FieldKind::Alphanumeric { length, casing })
    }

    pub fn numeric(length: usize, decimal_places: u32) -> Self {
        Self::new(FieldKind::Numeric { length, decimal_places })
    }

    pub fn date(format: &str) -> Result<Self> {
        DateFormat::parse(format).map(|format| Self::new(FieldKind::Date(format)))
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_default(mut self, default: impl Into<FieldValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_domain<I, S>(mut self, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domain = Some(allowed.into_iter().map(Into::into).collect());
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Width in characters; `0` means unbounded.
    pub fn length(&self) -> usize {
        match &self.kind {
            FieldKind::Alphanumeric { length, .. } | FieldKind::Numeric { length, .. } => *length,
            FieldKind::Date(format) => format.len(),
        }
    }

    /// Canonical picture string of this field, without title.
    pub fn picture(&self) -> String {
        match &self.kind {
            FieldKind::Alphanumeric { length, casing } => match casing {
                Casing::Upper => format!("A({})(U)", length),
                Casing::Lower => format!("A({})(L)", length),
                Casing::None => format!("A({})", length),
            },
            FieldKind::Numeric { length, decimal_places: 0 } => format!("N({})", length),
            FieldKind::Numeric { length, decimal_places } => format!("N({})({})", length, decimal_places),
            FieldKind::Date(format) => format.pattern().to_owned(),
        }
    }

    /// Encodes `value` into this field's fixed-width text.
    pub fn encode(&self, value: impl Into<FieldValue>) -> Result<String> {
        let mut value = value.into();
        if value.is_absent() {
            if let Some(default) = &self.default {
                value = default.clone();
            }
        }

        if let Some(domain) = &self.domain {
            let key = value.domain_key();
            if !domain.contains(&key) {
                return Err(BilletError::validation(format!(
                    "value '{}' for field {} is not one of {:?}",
                    key,
                    self.title.as_deref().unwrap_or("<untitled>"),
                    domain
                )));
            }
        }

        match &self.kind {
            FieldKind::Alphanumeric { length, casing } => {
                let text = match value {
                    FieldValue::Empty => String::new(),
                    FieldValue::Text(text) => text,
                    FieldValue::Number(number) => number.to_string(),
                    FieldValue::Date(_) => {
                        return Err(BilletError::validation("alphanumeric field does not take a date"))
                    }
                };
                Ok(encode_text(&text, *length, *casing))
            }
            FieldKind::Numeric { length, decimal_places } => {
                let digits = match value {
                    FieldValue::Empty => String::new(),
                    FieldValue::Text(text) => text.chars().filter(char::is_ascii_digit).collect(),
                    FieldValue::Number(number) => number_digits(number, *decimal_places),
                    FieldValue::Date(_) => {
                        return Err(BilletError::validation("numeric field does not take a date"))
                    }
                };
                Ok(pad_digits(&digits, *length))
            }
            FieldKind::Date(format) => {
                let date = match value {
                    FieldValue::Date(date) => date,
                    FieldValue::Number(millis) => date_from_millis(millis)?,
                    FieldValue::Empty | FieldValue::Text(_) => {
                        return Err(BilletError::validation(format!(
                            "date field '{}' requires a date or epoch milliseconds",
                            format
                        )))
                    }
                };
                Ok(encode_date(date, format))
            }
        }
    }
}

impl FromStr for FieldSpec {
    type Err = BilletError;

    fn from_str(s: &str) -> Result<Self> {
        FieldSpec::from_picture(s)
    }
}

/// Applies casing, then truncates (keeping the prefix) or right-pads with spaces.
pub fn encode_text(value: &str, length: usize, casing: Casing) -> String {
    let text = casing.apply(value);
    if length == 0 {
        return text;
    }
    let mut encoded: String = text.chars().take(length).collect();
    let missing = length - encoded.chars().count();
    encoded.extend(std::iter::repeat(' ').take(missing));
    encoded
}

/// Keeps the `length` least significant characters, or left-pads with zeros.
pub fn pad_digits(digits: &str, length: usize) -> String {
    let count = digits.chars().count();
    if length == 0 || count == length {
        digits.to_owned()
    } else if count > length {
        digits.chars().skip(count - length).collect()
    } else {
        format!("{}{}", "0".repeat(length - count), digits)
    }
}

/// Fixed-point rendering of `number` without the decimal separator or sign.
fn number_digits(number: Decimal, decimal_places: u32) -> String {
    let rounded = number.round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.*}", decimal_places as usize, rounded)
        .chars()
        .filter(char::is_ascii_digit)
        .collect()
}

fn date_from_millis(millis: Decimal) -> Result<NaiveDate> {
    millis
        .trunc()
        .to_i64()
        .and_then(DateTime::from_timestamp_millis)
        .map(|instant| instant.date_naive())
        .ok_or_else(|| BilletError::validation(format!("{} is not a valid epoch milliseconds instant", millis)))
}

fn encode_date(date: NaiveDate, format: &DateFormat) -> String {
    let mut encoded = String::with_capacity(format.len());
    for segment in format.segments() {
        match segment {
            DateSegment::Literal(literal) => encoded.push_str(literal),
            DateSegment::Component(component, width) => {
                let value = match component {
                    DateComponent::Day => date.day() as i64,
                    DateComponent::Month => date.month() as i64,
                    DateComponent::Year => date.year() as i64,
                };
                encoded.push_str(&pad_digits(&value.abs().to_string(), *width));
            }
        }
    }
    encoded
}

/// Serialized field descriptor, as found in layout files.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDescriptor {
    #[serde(rename = "type")]
    pub kind: DescriptorKind,
    pub title: Option<String>,
    #[serde(default)]
    pub length: usize,
    pub casing: Option<String>,
    pub decimal: Option<u32>,
    pub format: Option<String>,
    pub default: Option<Value>,
    pub domain: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum DescriptorKind {
    #[serde(rename = "A", alias = "a")]
    Alphanumeric,
    #[serde(rename = "N", alias = "n")]
    Numeric,
    #[serde(rename = "D", alias = "d")]
    Date,
}

/// Either a picture string or an explicit descriptor.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FieldDefinition {
    Picture(String),
    Descriptor(FieldDescriptor),
}

impl TryFrom<FieldDescriptor> for FieldSpec {
    type Error = BilletError;

    fn try_from(descriptor: FieldDescriptor) -> Result<Self> {
        let kind = match descriptor.kind {
            DescriptorKind::Alphanumeric => {
                let casing = match descriptor.casing.as_deref() {
                    None | Some("") => Casing::None,
                    Some(c) if c.eq_ignore_ascii_case("u") => Casing::Upper,
                    Some(c) if c.eq_ignore_ascii_case("l") => Casing::Lower,
                    Some(other) => return Err(BilletError::validation(format!("unknown casing '{}'", other))),
                };
                FieldKind::Alphanumeric { length: descriptor.length, casing }
            }
            DescriptorKind::Numeric => FieldKind::Numeric {
                length: descriptor.length,
                decimal_places: descriptor.decimal.unwrap_or(0),
            },
            DescriptorKind::Date => {
                let format = descriptor
                    .format
                    .as_deref()
                    .ok_or_else(|| BilletError::validation("date descriptor requires a format"))?;
                FieldKind::Date(DateFormat::parse(format)?)
            }
        };

        let default = descriptor.default.as_ref().map(FieldValue::from_json).transpose()?;
        let domain = descriptor.domain.map(|values| {
            values
                .iter()
                .map(|value| match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect()
        });

        Ok(Self {
            title: descriptor.title,
            kind,
            default,
            domain,
        })
    }
}

impl TryFrom<FieldDefinition> for FieldSpec {
    type Error = BilletError;

    fn try_from(definition: FieldDefinition) -> Result<Self> {
        match definition {
            FieldDefinition::Picture(picture) => FieldSpec::from_picture(&picture),
            FieldDefinition::Descriptor(descriptor) => FieldSpec::try_from(descriptor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn numeric_with_decimals_drops_separator_and_pads() {
        let field = FieldSpec::numeric(10, 2);
        assert_eq!(field.encode(dec!(258.7)).unwrap(), "0000025870");
        assert_eq!(field.encode(FieldValue::try_from(258.7).unwrap()).unwrap(), "0000025870");
    }

    #[test]
    fn numeric_rounds_half_away_from_zero() {
        let field = FieldSpec::numeric(5, 1);
        assert_eq!(field.encode(dec!(12.25)).unwrap(), "00123");
        assert_eq!(field.encode(dec!(12.24)).unwrap(), "00122");
    }

    #[test]
    fn numeric_truncates_leading_digits() {
        let field = FieldSpec::numeric(4, 0);
        assert_eq!(field.encode(123456i64).unwrap(), "3456");
        assert_eq!(field.encode("12.345-6").unwrap(), "3456");
    }

    #[test]
    fn numeric_with_zero_length_is_unbounded() {
        let field: FieldSpec = "n(0)(2)".parse().unwrap();
        assert_eq!(field.encode(dec!(258.7)).unwrap(), "25870");
    }

    #[test]
    fn alphanumeric_truncates_and_pads() {
        let field: FieldSpec = "<nomeDoFundo>A(10)".parse().unwrap();
        assert_eq!(field.title(), Some("nomeDoFundo"));
        let encoded = field.encode("Nome do Fundo").unwrap();
        assert_eq!(encoded, "Nome do Fu");
        assert_eq!(encoded.len(), 10);

        let field = FieldSpec::alphanumeric(20, Casing::None);
        assert_eq!(field.encode("Nome do Fundo").unwrap(), "Nome do Fundo       ");
    }

    #[test]
    fn alphanumeric_applies_casing() {
        let field: FieldSpec = "A(10)(u)".parse().unwrap();
        assert_eq!(field.encode("uPpERcASe").unwrap(), "UPPERCASE ");
        let field: FieldSpec = "A(4)(L)".parse().unwrap();
        assert_eq!(field.encode("ABCDEF").unwrap(), "abcd");
    }

    #[test]
    fn alphanumeric_width_counts_characters() {
        let field = FieldSpec::alphanumeric(6, Casing::Upper);
        assert_eq!(field.encode("joão").unwrap(), "JOÃO  ");
    }

    #[test]
    fn date_pads_each_component() {
        let field: FieldSpec = "ddmmaaaa".parse().unwrap();
        assert_eq!(field.length(), 8);
        assert_eq!(field.encode(date(2024, 3, 5)).unwrap(), "05032024");

        let field: FieldSpec = "dd/mm/yy".parse().unwrap();
        assert_eq!(field.encode(date(2024, 11, 9)).unwrap(), "09/11/24");
    }

    #[test]
    fn date_accepts_epoch_milliseconds() {
        let field = FieldSpec::date("yyyymmdd").unwrap();
        // 2024-03-05T12:00:00Z
        assert_eq!(field.encode(1_709_640_000_000i64).unwrap(), "20240305");
    }

    #[test]
    fn date_rejects_text() {
        let field = FieldSpec::date("ddmmyyyy").unwrap();
        assert!(matches!(field.encode("05/03/2024"), Err(BilletError::Validation(_))));
        assert!(matches!(field.encode(FieldValue::Empty), Err(BilletError::Validation(_))));
    }

    #[test]
    fn default_replaces_absent_values() {
        let field = FieldSpec::numeric(3, 0).with_default(7i64);
        assert_eq!(field.encode(FieldValue::Empty).unwrap(), "007");
        assert_eq!(field.encode("").unwrap(), "007");
        assert_eq!(field.encode(0i64).unwrap(), "000");
    }

    #[test]
    fn domain_is_checked_before_encoding() {
        let field = FieldSpec::alphanumeric(1, Casing::None)
            .with_title("tipo")
            .with_domain(["C", "D"]);
        assert_eq!(field.encode("C").unwrap(), "C");
        assert!(matches!(field.encode("X"), Err(BilletError::Validation(_))));

        let field = FieldSpec::numeric(2, 0).with_domain(["1", "2"]).with_default(1i64);
        assert_eq!(field.encode(FieldValue::Empty).unwrap(), "01");
        assert_eq!(field.encode(dec!(2.00)).unwrap(), "02");
    }

    #[test]
    fn picture_renders_back() {
        for picture in ["A(10)", "A(5)(U)", "A(5)(L)", "N(10)(2)", "N(8)", "ddmmyyyy"] {
            assert_eq!(FieldSpec::from_picture(picture).unwrap().picture(), picture);
        }
    }

    #[test]
    fn descriptors_skip_picture_parsing() {
        let spec: FieldSpec = serde_json::from_value(json!({
            "type": "N",
            "title": "valor",
            "length": 10,
            "decimal": 2,
            "default": 0
        }))
        .unwrap();
        assert_eq!(spec.title(), Some("valor"));
        assert_eq!(spec.encode(FieldValue::Empty).unwrap(), "0000000000");

        let spec: FieldSpec = serde_json::from_value(json!({ "type": "D", "format": "ddmmyy" })).unwrap();
        assert_eq!(spec.length(), 6);

        let spec: FieldSpec = serde_json::from_value(json!("<banco>N(3)")).unwrap();
        assert_eq!(spec.encode("237").unwrap(), "237");

        let spec: FieldSpec =
            serde_json::from_value(json!({ "type": "A", "length": 1, "domain": ["1", 2] })).unwrap();
        assert_eq!(spec.encode("2").unwrap(), "2");
    }

    #[test]
    fn invalid_descriptors_are_rejected() {
        assert!(serde_json::from_value::<FieldSpec>(json!({ "type": "D" })).is_err());
        assert!(serde_json::from_value::<FieldSpec>(json!({ "type": "A", "length": 2, "casing": "X" })).is_err());
        assert!(serde_json::from_value::<FieldSpec>(json!("Q(1)")).is_err());
    }
}
