use std::collections::HashMap;

use chrono::NaiveDate;
use http::Method;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BilletError, Result};

/// Parameters of an ad-hoc signed call. Every field has a default so an
/// empty JSON object is a valid request (`POST /` without body).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestParams {
    pub method: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub query: Vec<(String, String)>,
    pub payload: Option<Value>,
    /// Signs with this token instead of the cached one.
    pub token: Option<String>,
}

impl RequestParams {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method: Some(method.to_string()),
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn method(&self) -> Result<Method> {
        match &self.method {
            None => Ok(Method::POST),
            Some(method) => Method::from_bytes(method.trim().to_uppercase().as_bytes())
                .map_err(|_| BilletError::validation(format!("invalid HTTP method '{}'", method))),
        }
    }

    pub fn url(&self) -> &str {
        self.url.as_deref().unwrap_or("/")
    }
}

/// Body of the title validation call.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationPayload<'a> {
    pub agencia: u32,
    #[serde(rename = "tipoEntrada")]
    pub tipo_entrada: u8,
    #[serde(rename = "dadosEntrada")]
    pub dados_entrada: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub consulta_fator_data_vencimento_response: TitleData,
}

/// The parts of the bank's title data the gateway uses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleData {
    pub valor_titulo: Decimal,
    /// `YYYYMMDD`, possibly followed by more digits
    pub data_vencimento: u64,
    #[serde(default)]
    pub nome_cedente: Option<String>,
    #[serde(default)]
    pub cnpj_beneficiario: Option<u64>,
    #[serde(default)]
    pub cpf_cnpj_pagador: Option<u64>,
}

/// Normalized billet data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BilletRecord {
    pub barcode: String,
    pub digitable_line: String,
    pub name: String,
    /// Beneficiary (or payer) CPF with 11 digits or CNPJ with 14
    pub cpf_cnpj: String,
    /// Two decimal places, `.` separator
    pub amount: String,
    /// `YYYY-MM-DD`
    pub due_date: String,
}

impl BilletRecord {
    pub fn from_title(barcode: String, digitable_line: String, title: TitleData) -> Result<Self> {
        let identifier = title
            .cnpj_beneficiario
            .filter(|id| *id != 0)
            .or(title.cpf_cnpj_pagador)
            .map(format_document)
            .unwrap_or_default();

        Ok(Self {
            barcode,
            digitable_line,
            name: title.nome_cedente.unwrap_or_default(),
            cpf_cnpj: identifier,
            amount: format_amount(title.valor_titulo),
            due_date: format_due_date(title.data_vencimento)?,
        })
    }
}

/// CPF (up to 11 digits) or CNPJ, zero padded to its natural width.
pub fn format_document(id: u64) -> String {
    let digits = id.to_string();
    let width = if digits.len() <= 11 { 11 } else { 14 };
    format!("{:0>width$}", digits, width = width)
}

pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.2}", rounded)
}

pub fn format_due_date(raw: u64) -> Result<String> {
    let digits = raw.to_string();
    let date = digits
        .get(..8)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y%m%d").ok())
        .ok_or_else(|| BilletError::validation(format!("invalid due date {}", raw)))?;
    Ok(date.format("%Y-%m-%d").to_string())
}

/// Outcome of an ad-hoc signed call.
#[derive(Debug, Clone, Serialize)]
pub struct BankResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub data: Value,
}
