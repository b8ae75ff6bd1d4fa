//! Schema validator: raw response text → typed [`Transaction`]s.
//!
//! The text must parse as one JSON value and that value must be an array.
//! Each element is decoded into [`RawTransaction`] (no string → number
//! coercion) and then checked: non-empty description, finite amount, and a
//! date that names a real calendar day.
//!
//! Under [`ValidationPolicy::Strict`] the first invalid element rejects the
//! whole response; under [`ValidationPolicy::Lenient`] it is dropped and
//! counted.

use crate::config::ValidationPolicy;
use crate::error::DocumentError;
use crate::output::Transaction;
use crate::schema::RawTransaction;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::warn;

/// Transactions accepted from one response, plus the number dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub transactions: Vec<Transaction>,
    pub dropped: usize,
}

/// Validate `raw` against the transaction schema.
pub fn validate_response(raw: &str, policy: ValidationPolicy) -> Result<Validated, DocumentError> {
    let malformed = |reason: String| DocumentError::MalformedResponse {
        reason,
        raw: raw.to_string(),
    };

    let value: Value =
        serde_json::from_str(raw).map_err(|e| malformed(format!("not valid JSON: {e}")))?;

    let elements = match value {
        Value::Array(items) => items,
        other => {
            return Err(malformed(format!(
                "expected a JSON array, got {}",
                json_kind(&other)
            )))
        }
    };

    let mut transactions = Vec::with_capacity(elements.len());
    let mut dropped = 0;

    for (idx, element) in elements.into_iter().enumerate() {
        match validate_element(element) {
            Ok(tx) => transactions.push(tx),
            Err(reason) => match policy {
                ValidationPolicy::Strict => {
                    return Err(malformed(format!("element {idx}: {reason}")));
                }
                ValidationPolicy::Lenient => {
                    warn!("Dropping element {}: {}", idx, reason);
                    dropped += 1;
                }
            },
        }
    }

    Ok(Validated {
        transactions,
        dropped,
    })
}

fn validate_element(element: Value) -> Result<Transaction, String> {
    if !element.is_object() {
        return Err(format!("expected an object, got {}", json_kind(&element)));
    }
    let raw: RawTransaction = serde_json::from_value(element).map_err(|e| e.to_string())?;

    let description = raw.description.trim();
    if description.is_empty() {
        return Err("description is empty".into());
    }
    if !raw.amount.is_finite() {
        return Err(format!("amount {} is not finite", raw.amount));
    }
    let date = parse_date(&raw.date).ok_or_else(|| format!("unparseable date '{}'", raw.date))?;

    Ok(Transaction {
        date,
        description: description.to_string(),
        amount: raw.amount,
        category: raw.category.trim().to_string(),
        notes: raw
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
    })
}

/// `YYYY-MM-DD`, optionally followed by a time part after `T` or a space.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    let day = text.split(['T', ' ']).next().unwrap_or(text);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
