//! Coercion policy: how loosely-typed model output becomes a [`Transaction`].
//!
//! Vision models are asked for a strict schema but routinely answer with
//! strings where numbers belong, `null` for anything they could not read, and
//! French-formatted amounts (`"1 234,56"`). Every field-level default lives in
//! this module so the rules can be read, and tested, in one place:
//!
//! | Field | Accepted shapes | When absent / unusable |
//! |-------|-----------------|------------------------|
//! | `price`, `quantity`, `fees`, `taxes` | number, numeric string (spaces or NBSP as thousands separators, `,` as decimal separator) | `0.0` |
//! | `reference`, `bank_name`, `account_number`, `account_type`, `date`, `type`, `target.*` | string, number or bool rendered as text | absent |
//! | `target` | object | empty target |
//! | `is_pea` | bool, `true/false/yes/no/oui/non/1/0`, number (non-zero is true) | derived from `account_type` ([`account_type_is_pea`]) |
//!
//! Absent and explicit `null` are treated identically everywhere.
//!
//! [`Transaction`]: crate::model::Transaction

use crate::model::TransactionTarget;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Label used for account fields the model did not supply.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Lowercase substrings that mark an account type as a PEA
/// (Plan d'Épargne en Actions).
pub const PEA_MARKERS: &[&str] = &[
    "pea",
    "plan epargne action",
    "plan épargne action",
    "plan d'epargne en actions",
    "plan d'épargne en actions",
];

/// `true` when the account type text names a PEA. Missing text is `false`.
pub fn account_type_is_pea(account_type: Option<&str>) -> bool {
    let Some(text) = account_type else {
        return false;
    };
    let lowered = text.to_lowercase();
    PEA_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Replace the record's `is_pea` with a plain boolean.
///
/// An explicit, interpretable flag wins; otherwise the flag is derived from
/// `account_type`, even when that field is missing too.
pub fn settle_is_pea(record: &mut Map<String, Value>) {
    let explicit = record.get("is_pea").and_then(flag_from_value);
    let is_pea = explicit.unwrap_or_else(|| {
        let account_type = record.get("account_type").and_then(text_from_value);
        account_type_is_pea(account_type.as_deref())
    });
    record.insert("is_pea".to_string(), Value::Bool(is_pea));
}

/// Numeric field rule. Unusable input yields `0.0`.
pub fn number_from_value(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Value::String(s) => parse_amount(s).unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Text field rule: strings as-is, scalars rendered, everything else absent.
pub fn text_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Boolean flag rule. `None` means "not interpretable".
pub fn flag_from_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "oui" | "1" => Some(true),
            "false" | "no" | "non" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Parse an amount as printed on a statement: `"1 234,56 €"`, `"1,234.56"`,
/// `"-12.5"`.
fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | ','))
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    // The right-most separator is the decimal one when both appear.
    let normalised = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) if cleaned.matches(',').count() == 1 => cleaned.replace(',', "."),
        (Some(_), None) => cleaned.replace(',', ""),
        _ => cleaned,
    };

    normalised.parse::<f64>().ok().filter(|v| v.is_finite())
}

// ── serde adapters ───────────────────────────────────────────────────────────
//
// Used through `#[serde(deserialize_with = ...)]` on the model types so that
// the same rules apply to fresh model output and to ledgers loaded from disk.

pub(crate) fn de_number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(number_from_value(&Value::deserialize(d)?))
}

pub(crate) fn de_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(text_from_value(&Value::deserialize(d)?))
}

pub(crate) fn de_flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(flag_from_value(&Value::deserialize(d)?).unwrap_or(false))
}

pub(crate) fn de_label<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(text_from_value(&Value::deserialize(d)?)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(unknown_label))
}

pub(crate) fn de_target<'de, D: Deserializer<'de>>(d: D) -> Result<TransactionTarget, D::Error> {
    match Value::deserialize(d)? {
        v @ Value::Object(_) => Ok(serde_json::from_value(v).unwrap_or_default()),
        _ => Ok(TransactionTarget::default()),
    }
}

pub(crate) fn unknown_label() -> String {
    UNKNOWN_LABEL.to_string()
}
