//! The transaction response schema shared by the Extraction Invoker and the
//! Schema Validator.
//!
//! The invoker sends [`transaction_array_schema`] to the service; the validator
//! decodes each element into [`RawTransaction`]. Both are defined here, next to
//! each other, and a unit test checks that the serde field names and the JSON
//! schema's `required` list agree.

use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

/// Bumped whenever a field is added, removed or retyped.
pub const SCHEMA_VERSION: u32 = 1;

/// Fields every element of the response array must carry.
pub const REQUIRED_FIELDS: [&str; 4] = ["date", "description", "amount", "category"];

/// One element of the service's response array, before semantic checks.
///
/// Strings are never coerced to numbers: `"amount": "4.50"` fails to decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub date: String,
    pub description: String,
    pub amount: f64,
    pub category: String,
    #[serde(default, deserialize_with = "lenient_notes")]
    pub notes: Option<String>,
}

/// `notes` is outside the schema; a value of any other type reads as absent.
fn lenient_notes<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

static TRANSACTION_ARRAY_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "$id": format!("statement-ledger/transactions/v{SCHEMA_VERSION}"),
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "date": {
                    "type": "string",
                    "description": "Transaction date in YYYY-MM-DD format."
                },
                "description": {
                    "type": "string",
                    "description": "A clean, concise description of the transaction."
                },
                "amount": {
                    "type": "number",
                    "description": "Transaction amount. Negative for debits/expenses, positive for credits/deposits."
                },
                "category": {
                    "type": "string",
                    "description": "A relevant category like 'Groceries', 'Salary', 'Bills', etc."
                }
            },
            "required": REQUIRED_FIELDS
        }
    })
});

/// JSON Schema for the array of transactions the service must return.
pub fn transaction_array_schema() -> &'static Value {
    &TRANSACTION_ARRAY_SCHEMA
}
