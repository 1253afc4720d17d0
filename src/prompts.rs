//! Prompts sent to the vision model.
//!
//! Kept in one place so the extraction schema can be read next to the
//! [`crate::model::Transaction`] it feeds, and so tests can check that the
//! two stay in sync. Callers can override the extraction prompt via
//! [`crate::config::ScanConfig::prompt`].

/// Instruction sent with every statement page.
pub const EXTRACTION_PROMPT: &str = r#"Extract ALL transaction data from this bank statement image.
Identify the bank name, account number, and account type first.
Note: the account type is usually 'compte titres' or 'compte PEA'.
If the account type is 'Compte PEA' or mentions 'Plan Epargne Action', set is_pea to true.

For each transaction row, extract:
- Transaction reference (the bank's unique identifier for the operation)
- Date
- Target asset (name, ISIN, exchange if available)
- Price
- Quantity
- Transaction type (Buy or Sell)
- Fees and taxes
- is_pea (boolean, true if the account is a PEA)

Output MUST be a JSON object with a "transactions" key containing a list of objects.
Fields for each transaction:
- reference (string)
- bank_name (string)
- account_number (string)
- account_type (string, e.g. 'compte titres' or 'compte PEA')
- date (string)
- target: { isin: string, name: string, exchange: string }
- price (number)
- quantity (number)
- type (string: "Buy" or "Sell")
- fees (number)
- taxes (number)
- is_pea (boolean)

If information is missing, use null, or 0.0 for numbers.
Return ONLY valid JSON."#;

/// Short text-only prompt used by the backend self-check.
pub const HEALTH_CHECK_PROMPT: &str = "Say hello in one short sentence.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_every_schema_field() {
        let fields = [
            "reference",
            "bank_name",
            "account_number",
            "account_type",
            "date",
            "target",
            "isin",
            "exchange",
            "price",
            "quantity",
            "type",
            "fees",
            "taxes",
            "is_pea",
        ];
        for field in fields {
            assert!(EXTRACTION_PROMPT.contains(field), "prompt lacks {field}");
        }
    }

    #[test]
    fn prompt_asks_for_json_only() {
        assert!(EXTRACTION_PROMPT.contains("\"transactions\""));
        assert!(EXTRACTION_PROMPT.ends_with("Return ONLY valid JSON."));
    }
}
