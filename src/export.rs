//! Delimited-text export of a [`Ledger`].
//!
//! Columns are `Date,Description,Amount,Category,Notes`. The header row and
//! the amount are bare; textual fields are quoted and embedded quotes are
//! doubled, so descriptions containing commas or quotes survive a
//! spreadsheet import.

use crate::error::LedgerError;
use crate::output::Ledger;
use csv::{QuoteStyle, WriterBuilder};
use std::io::{self, Write};
use std::path::Path;

/// Header row of the export.
pub const CSV_HEADER: [&str; 5] = ["Date", "Description", "Amount", "Category", "Notes"];

/// Write `ledger` as CSV to `writer`.
pub fn write_csv<W: Write>(ledger: &Ledger, mut writer: W) -> io::Result<()> {
    writeln!(writer, "{}", CSV_HEADER.join(","))?;

    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::NonNumeric)
        .from_writer(writer);
    for t in ledger {
        let date = t.date.format("%Y-%m-%d").to_string();
        let amount = t.amount.to_string();
        wtr.write_record([
            date.as_str(),
            t.description.as_str(),
            amount.as_str(),
            t.category.as_str(),
            t.notes.as_deref().unwrap_or(""),
        ])?;
    }
    wtr.flush()
}

/// Render `ledger` as a CSV string.
pub fn to_csv_string(ledger: &Ledger) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_csv(ledger, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Write the CSV export to `path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_csv_file(ledger: &Ledger, path: impl AsRef<Path>) -> Result<(), LedgerError> {
    let path = path.as_ref();
    let fail = |source: io::Error| LedgerError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(fail)?;
        }
    }

    let tmp_path = path.with_extension("csv.tmp");
    tokio::fs::write(&tmp_path, to_csv_string(ledger))
        .await
        .map_err(fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)
}
