//! Output types: transactions, the merged ledger, per-document reports and
//! the insight report.

use crate::error::InsightError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Category label used for spending whose category is blank.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// One ledger entry.
///
/// Negative `amount` is an outflow (debit, expense); positive is an inflow
/// (credit, deposit). Built only by the schema validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Transaction {
    pub fn is_outflow(&self) -> bool {
        self.amount < 0.0
    }

    pub fn is_inflow(&self) -> bool {
        self.amount > 0.0
    }
}

/// The merged, date-ordered transaction sequence of one batch.
///
/// Read-only once built: there is no way to insert, remove or edit a single
/// record. Building a new ledger is the only way to change its contents.
///
/// Serialises as a plain array. Deserialising re-checks every record and
/// re-sorts, so a decoded ledger holds the same invariants as a built one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Transaction>", into = "Vec<Transaction>")]
pub struct Ledger {
    transactions: Vec<Transaction>,
}

impl TryFrom<Vec<Transaction>> for Ledger {
    type Error = String;

    fn try_from(transactions: Vec<Transaction>) -> Result<Self, Self::Error> {
        for (idx, t) in transactions.iter().enumerate() {
            if t.description.trim().is_empty() {
                return Err(format!("transaction {idx}: description is empty"));
            }
            if !t.amount.is_finite() {
                return Err(format!("transaction {idx}: amount is not finite"));
            }
        }
        Ok(Self::from_unsorted(transactions))
    }
}

impl From<Ledger> for Vec<Transaction> {
    fn from(ledger: Ledger) -> Self {
        ledger.transactions
    }
}

impl Ledger {
    /// Stable-sort `transactions` by date and wrap them.
    ///
    /// Records with equal dates keep their arrival order.
    pub(crate) fn from_unsorted(mut transactions: Vec<Transaction>) -> Self {
        transactions.sort_by(|a, b| a.date.cmp(&b.date));
        Self { transactions }
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transaction> {
        self.transactions.iter()
    }

    /// SHA-256 over the ledger's canonical JSON, hex encoded.
    ///
    /// Two ledgers with the same records in the same order share a fingerprint.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_vec(&self.transactions).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&json);
        format!("{:x}", hasher.finalize())
    }

    /// Totals and the per-category spending breakdown.
    pub fn stats(&self) -> LedgerStats {
        let mut total_income = 0.0;
        let mut total_spending = 0.0;
        let mut by_category: HashMap<&str, f64> = HashMap::new();
        let mut first_seen: Vec<&str> = Vec::new();

        for t in &self.transactions {
            if t.is_inflow() {
                total_income += t.amount;
            } else if t.is_outflow() {
                total_spending += t.amount;
                let category = if t.category.trim().is_empty() {
                    UNCATEGORIZED
                } else {
                    t.category.as_str()
                };
                let entry = by_category.entry(category).or_insert_with(|| {
                    first_seen.push(category);
                    0.0
                });
                *entry += t.amount.abs();
            }
        }

        let mut spending_by_category: Vec<CategoryTotal> = first_seen
            .into_iter()
            .map(|c| CategoryTotal {
                category: c.to_string(),
                total: by_category[c],
            })
            .collect();
        spending_by_category.sort_by(|a, b| b.total.total_cmp(&a.total));

        LedgerStats {
            transaction_count: self.transactions.len(),
            total_income,
            total_spending,
            net: total_income + total_spending,
            spending_by_category,
            first_date: self.transactions.first().map(|t| t.date),
            last_date: self.transactions.last().map(|t| t.date),
        }
    }
}

impl<'a> IntoIterator for &'a Ledger {
    type Item = &'a Transaction;
    type IntoIter = std::slice::Iter<'a, Transaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.transactions.iter()
    }
}

/// Summary figures over a [`Ledger`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub transaction_count: usize,
    /// Sum of positive amounts.
    pub total_income: f64,
    /// Sum of negative amounts (itself negative or zero).
    pub total_spending: f64,
    pub net: f64,
    /// Absolute outflow per category, largest first.
    pub spending_by_category: Vec<CategoryTotal>,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
}

/// Outcome of one input document within a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    /// 0-based position in the input list.
    pub index: usize,
    pub name: String,
    pub mime_type: String,
    /// Frames sent to the Extraction Service (0 if rasterisation failed).
    pub frame_count: usize,
    /// Transactions contributed to the ledger.
    pub transaction_count: usize,
    /// Elements dropped by lenient validation.
    pub dropped_rows: usize,
    pub duration_ms: u64,
    /// Set only for documents skipped under `BatchPolicy::SkipFailed`.
    pub error: Option<String>,
}

impl DocumentReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a successful batch: the ledger plus per-document reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    pub ledger: Ledger,
    pub documents: Vec<DocumentReport>,
    pub total_duration_ms: u64,
}

impl BatchOutput {
    pub fn succeeded(&self) -> usize {
        self.documents.iter().filter(|d| d.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.documents.len() - self.succeeded()
    }
}

/// Free-text analysis of one specific ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightReport {
    /// Markdown with one heading per section.
    pub text: String,
    /// [`Ledger::fingerprint`] of the ledger the report was generated from.
    pub ledger_fingerprint: String,
    pub transaction_count: usize,
}

impl InsightReport {
    /// Whether this report describes exactly `ledger`.
    pub fn is_for(&self, ledger: &Ledger) -> bool {
        self.transaction_count == ledger.len() && self.ledger_fingerprint == ledger.fingerprint()
    }
}

/// What happened in the insight stage of a session.
#[derive(Debug, Clone)]
pub enum InsightOutcome {
    /// The ledger was empty (or insights were disabled); no call was made.
    Skipped,
    Generated(InsightReport),
    Failed(InsightError),
}

impl InsightOutcome {
    pub fn report(&self) -> Option<&InsightReport> {
        match self {
            InsightOutcome::Generated(r) => Some(r),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&InsightError> {
        match self {
            InsightOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// A full session result: the batch and the (isolated) insight outcome.
#[derive(Debug, Clone)]
pub struct SessionOutput {
    pub batch: BatchOutput,
    pub insights: InsightOutcome,
}

impl SessionOutput {
    pub fn ledger(&self) -> &Ledger {
        &self.batch.ledger
    }
}
