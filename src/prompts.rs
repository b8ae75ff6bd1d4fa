//! Instructions sent to the Extraction and Summary services.
//!
//! Callers can override both via
//! [`crate::config::ExtractionConfig::extraction_prompt`] and
//! [`crate::config::ExtractionConfig::insight_prompt`]; the constants here are
//! used only when no override is provided.

/// Default instruction for turning statement page images into transactions.
pub const EXTRACTION_PROMPT: &str = r#"You are an expert financial assistant specialized in extracting transaction data from bank statements.
Analyze the following bank statement pages. These pages may come from one or more documents. Extract all individual transactions.
Ignore headers, footers, summaries, advertisements, and any non-transactional information.
For each transaction, provide the date, a clean description, and the amount.
- Format all dates as YYYY-MM-DD. If the year is not present, infer it from the statement date if available, otherwise assume the current year.
- Represent withdrawals, debits, and expenses as negative numbers.
- Represent deposits, credits, and payments to the account as positive numbers.
- Assign a relevant category to each transaction (e.g., Groceries, Dining, Transport, Salary, Bills, Shopping, Entertainment, Rent, Other). Use a different category when none of these fit.
- Provide the output ONLY as a valid JSON array of objects. Do not include any other text, explanations, or markdown formatting.
Each object in the array should have the keys: "date", "description", "amount", and "category"."#;

/// Default instruction for the insight report. The ledger JSON is appended by
/// [`insight_message`].
pub const INSIGHT_PROMPT: &str = r#"You are a helpful financial analyst. Based on the following JSON transaction data, provide a concise and practical financial insights summary.
The summary should be written in a human-readable format. Use markdown for structure.

The analysis must include:
1.  **Financial Summary:** A short, 1-2 sentence overview of the financial activity.
2.  **Top 3 Spending Categories:** Identify and list the top three spending categories by total amount spent (sum of absolute outflows).
3.  **Unusual or Large Transactions:** Point out 1-2 transactions that are unusually large compared to the others or are from a noteworthy category.
4.  **Potential Recurring Payments:** Detect and list 2-3 potential recurring payments or subscriptions.
5.  **Smart Saving Suggestions:** Provide 2-3 actionable saving suggestions based directly on the spending patterns observed in the data.

Please format your entire response using Markdown, starting each section with a heading (e.g., '### Financial Summary')."#;

/// System-message suffix carrying the response schema.
pub fn schema_instruction(schema_json: &str) -> String {
    format!(
        "Your response must be a single JSON value that validates against this JSON Schema:\n{schema_json}"
    )
}

/// Full user message for the Summary Service.
pub fn insight_message(instruction: &str, transactions_json: &str) -> String {
    format!("{instruction}\n\nHere is the transaction data:\n{transactions_json}")
}
