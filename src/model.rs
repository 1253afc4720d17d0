//! Ledger data model: transactions and the account groups that own them.
//!
//! The same types describe fresh model output (after coercion) and the
//! ledger on disk. Every field goes through the lenient adapters in
//! [`crate::policy`], so a ledger hand-edited or written by an older tool
//! still loads.

use crate::policy::{self, UNKNOWN_LABEL};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The traded instrument, as far as the statement tells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionTarget {
    #[serde(default, deserialize_with = "policy::de_text")]
    pub isin: Option<String>,
    #[serde(default, deserialize_with = "policy::de_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "policy::de_text")]
    pub exchange: Option<String>,
}

/// One extracted trading event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Bank reference of the operation; unique across the whole ledger when present.
    #[serde(default, deserialize_with = "policy::de_text")]
    pub reference: Option<String>,
    #[serde(default, deserialize_with = "policy::de_text")]
    pub bank_name: Option<String>,
    #[serde(default, deserialize_with = "policy::de_text")]
    pub account_number: Option<String>,
    #[serde(default, deserialize_with = "policy::de_text")]
    pub account_type: Option<String>,
    /// Kept exactly as printed on the statement.
    #[serde(default, deserialize_with = "policy::de_text")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "policy::de_target")]
    pub target: TransactionTarget,
    #[serde(default, deserialize_with = "policy::de_number")]
    pub price: f64,
    #[serde(default, deserialize_with = "policy::de_number")]
    pub quantity: f64,
    /// "Buy" or "Sell" in practice; not enforced.
    #[serde(rename = "type", default, deserialize_with = "policy::de_text")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "policy::de_number")]
    pub fees: f64,
    #[serde(default, deserialize_with = "policy::de_number")]
    pub taxes: f64,
    #[serde(default, deserialize_with = "policy::de_flag")]
    pub is_pea: bool,
    /// Fields outside the schema, carried through to the ledger untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Transaction {
    /// Reference usable for deduplication: trimmed and non-empty.
    pub fn reference_key(&self) -> Option<&str> {
        self.reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }

    /// Key of the owning account group.
    pub fn account_key(&self) -> &str {
        self.account_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN_LABEL)
    }
}

/// All transactions of one bank account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountGroup {
    #[serde(default = "policy::unknown_label", deserialize_with = "policy::de_label")]
    pub bank_name: String,
    #[serde(default = "policy::unknown_label", deserialize_with = "policy::de_label")]
    pub account_number: String,
    #[serde(default = "policy::unknown_label", deserialize_with = "policy::de_label")]
    pub account_type: String,
    #[serde(default, deserialize_with = "policy::de_flag")]
    pub is_pea: bool,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl AccountGroup {
    /// Start an empty group from the account fields of its first transaction.
    pub fn seeded_from(tx: &Transaction) -> Self {
        let label = |field: &Option<String>| {
            field
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(UNKNOWN_LABEL)
                .to_string()
        };
        Self {
            bank_name: label(&tx.bank_name),
            account_number: tx.account_key().to_string(),
            account_type: label(&tx.account_type),
            is_pea: tx.is_pea,
            transactions: Vec::new(),
        }
    }

    /// Group key, matching [`Transaction::account_key`].
    pub fn account_key(&self) -> &str {
        let trimmed = self.account_number.trim();
        if trimmed.is_empty() {
            UNKNOWN_LABEL
        } else {
            trimmed
        }
    }
}

/// Total number of transactions across all groups.
pub fn transaction_count(groups: &[AccountGroup]) -> usize {
    groups.iter().map(|g| g.transactions.len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lenient_transaction_from_model_output() {
        let tx: Transaction = serde_json::from_value(json!({
            "reference": 991,
            "account_number": "FR76 0001",
            "date": "12/03/2024",
            "target": {"isin": "FR0000120271", "name": "TOTALENERGIES", "exchange": null},
            "price": "61,20",
            "quantity": null,
            "type": "Buy",
            "is_pea": true,
            "page_note": "continued"
        }))
        .unwrap();

        assert_eq!(tx.reference.as_deref(), Some("991"));
        assert_eq!(tx.price, 61.2);
        assert_eq!(tx.quantity, 0.0);
        assert_eq!(tx.fees, 0.0);
        assert_eq!(tx.kind.as_deref(), Some("Buy"));
        assert_eq!(tx.target.exchange, None);
        assert_eq!(tx.extra["page_note"], json!("continued"));
        assert!(tx.is_pea);
    }

    #[test]
    fn target_of_wrong_shape_becomes_empty() {
        let tx: Transaction = serde_json::from_value(json!({"target": "TOTAL"})).unwrap();
        assert_eq!(tx.target, TransactionTarget::default());
    }

    #[test]
    fn serialises_type_and_extra_fields() {
        let mut tx = Transaction {
            reference: Some("A1".into()),
            kind: Some("Sell".into()),
            ..Default::default()
        };
        tx.extra.insert("currency".into(), json!("EUR"));
        let v = serde_json::to_value(&tx).unwrap();
        assert_eq!(v["type"], json!("Sell"));
        assert_eq!(v["currency"], json!("EUR"));
        assert_eq!(v["fees"], json!(0.0));
        assert!(v.get("kind").is_none());
    }

    #[test]
    fn keys_ignore_blank_values() {
        let tx = Transaction {
            reference: Some("   ".into()),
            account_number: Some(" 123 ".into()),
            ..Default::default()
        };
        assert_eq!(tx.reference_key(), None);
        assert_eq!(tx.account_key(), "123");
        assert_eq!(Transaction::default().account_key(), UNKNOWN_LABEL);
    }

    #[test]
    fn group_seeded_with_unknown_labels() {
        let tx = Transaction {
            account_number: Some("42".into()),
            bank_name: Some(String::new()),
            is_pea: true,
            ..Default::default()
        };
        let g = AccountGroup::seeded_from(&tx);
        assert_eq!(g.bank_name, UNKNOWN_LABEL);
        assert_eq!(g.account_type, UNKNOWN_LABEL);
        assert_eq!(g.account_number, "42");
        assert!(g.is_pea);
        assert!(g.transactions.is_empty());
    }

    #[test]
    fn group_with_nulls_loads() {
        let g: AccountGroup = serde_json::from_value(json!({
            "bank_name": null,
            "account_number": "123",
            "is_pea": null,
            "transactions": []
        }))
        .unwrap();
        assert_eq!(g.bank_name, UNKNOWN_LABEL);
        assert_eq!(g.account_type, UNKNOWN_LABEL);
        assert!(!g.is_pea);
    }
}
