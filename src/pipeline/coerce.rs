//! Record coercion: parsed JSON → flat list of [`Transaction`]s.
//!
//! Accepted payload shapes:
//!
//! * an array — every element is one record
//! * an object with a `transactions` array — that array
//! * any other object — the object itself is one record
//! * anything else — no records
//!
//! Field-level defaults (numbers, flags, labels) come from [`crate::policy`].

use crate::error::PageError;
use crate::model::Transaction;
use crate::pipeline::normalize::{locate_json, Candidate};
use crate::policy::settle_is_pea;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Bytes of the offending reply kept in a [`PageError::ParseFailed`].
const SNIPPET_LEN: usize = 100;

/// Turn one raw model reply into transactions.
///
/// Blank replies become [`PageError::EmptyResponse`]; candidates that are not
/// JSON become [`PageError::ParseFailed`]. Both are page-local.
pub fn interpret_response(raw: &str, page_num: usize) -> Result<Vec<Transaction>, PageError> {
    let candidate = match locate_json(raw) {
        Candidate::NoPayload => return Err(PageError::EmptyResponse { page: page_num }),
        Candidate::Json(text) => text,
    };

    let value: Value = serde_json::from_str(candidate).map_err(|e| PageError::ParseFailed {
        page: page_num,
        detail: e.to_string(),
        snippet: snippet(raw.trim()),
    })?;

    let records = records_from_value(value);
    debug!("Page {}: payload holds {} record(s)", page_num, records.len());

    Ok(records.into_iter().filter_map(coerce_record).collect())
}

/// Flatten a parsed payload into raw record mappings.
pub fn records_from_value(value: Value) -> Vec<Map<String, Value>> {
    match value {
        Value::Array(items) => objects_only(items),
        Value::Object(mut map) => match map.remove("transactions") {
            Some(Value::Array(items)) => objects_only(items),
            Some(other) => {
                warn!(
                    "Ignoring payload: 'transactions' is {} rather than a list",
                    kind_of(&other)
                );
                Vec::new()
            }
            None => vec![map],
        },
        other => {
            debug!("Payload is a bare {}; no records", kind_of(&other));
            Vec::new()
        }
    }
}

/// Apply the coercion policy to one record.
///
/// Returns `None` only if the record cannot be represented at all, which the
/// lenient field adapters make practically unreachable.
pub fn coerce_record(mut record: Map<String, Value>) -> Option<Transaction> {
    settle_is_pea(&mut record);
    match serde_json::from_value(Value::Object(record)) {
        Ok(tx) => Some(tx),
        Err(e) => {
            warn!("Dropping record that could not be coerced: {}", e);
            None
        }
    }
}

fn objects_only(items: Vec<Value>) -> Vec<Map<String, Value>> {
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            other => {
                warn!("Skipping non-object record ({})", kind_of(&other));
                None
            }
        })
        .collect()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// First [`SNIPPET_LEN`] bytes of `text`, cut on a char boundary.
fn snippet(text: &str) -> String {
    if text.len() <= SNIPPET_LEN {
        return text.to_string();
    }
    let mut end = SNIPPET_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fenced_empty_transactions_yields_nothing() {
        let txs = interpret_response(" ```json\n{\"transactions\":[]}\n``` ", 1).unwrap();
        assert!(txs.is_empty());
    }

    #[test]
    fn blank_reply_is_empty_response() {
        let err = interpret_response("   ", 3).unwrap_err();
        assert!(matches!(err, PageError::EmptyResponse { page: 3 }));
    }

    #[test]
    fn prose_only_reply_is_parse_error() {
        let err = interpret_response("No transactions visible on this page.", 2).unwrap_err();
        match err {
            PageError::ParseFailed { page, snippet, .. } => {
                assert_eq!(page, 2);
                assert!(snippet.starts_with("No transactions"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn array_payload() {
        let raw = r#"[{"reference":"A1","price":10},{"reference":"A2","price":"11,5"}]"#;
        let txs = interpret_response(raw, 1).unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[1].price, 11.5);
    }

    #[test]
    fn wrapped_transactions_payload_with_prose() {
        let raw = "Here is the JSON:\n{\"transactions\": [{\"reference\": \"R9\", \"account_type\": \"Compte PEA\"}]}";
        let txs = interpret_response(raw, 1).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].reference.as_deref(), Some("R9"));
        assert!(txs[0].is_pea, "PEA derived from account_type");
    }

    #[test]
    fn single_object_is_one_record() {
        let records = records_from_value(json!({"reference": "S1", "type": "Sell"}));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["reference"], json!("S1"));
    }

    #[test]
    fn scalar_payload_has_no_records() {
        assert!(records_from_value(json!(42)).is_empty());
        assert!(records_from_value(json!("text")).is_empty());
        assert!(records_from_value(json!(null)).is_empty());
    }

    #[test]
    fn non_list_transactions_key_has_no_records() {
        assert!(records_from_value(json!({"transactions": null})).is_empty());
        assert!(records_from_value(json!({"transactions": {"reference": "X"}})).is_empty());
    }

    #[test]
    fn non_object_elements_skipped() {
        let records = records_from_value(json!([{"reference": "A"}, "junk", 3]));
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn missing_fields_default() {
        let tx = coerce_record(Map::new()).unwrap();
        assert_eq!(tx.price, 0.0);
        assert_eq!(tx.quantity, 0.0);
        assert!(!tx.is_pea);
        assert_eq!(tx.reference, None);
    }

    #[test]
    fn explicit_null_numbers_default_like_absent_ones() {
        let tx = coerce_record(
            json!({"price": null, "quantity": null, "fees": null})
                .as_object()
                .cloned()
                .unwrap(),
        )
        .unwrap();
        assert_eq!((tx.price, tx.quantity, tx.fees, tx.taxes), (0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        let long = "é".repeat(80);
        let s = snippet(&long);
        assert!(s.ends_with('…'));
        assert!(s.len() <= SNIPPET_LEN + '…'.len_utf8());
    }
}
