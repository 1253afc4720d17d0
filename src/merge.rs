//! Incremental merge of freshly extracted transactions into the ledger.
//!
//! [`merge`] is a pure function: the existing ledger is borrowed, never
//! mutated, and the merged ledger is returned for the caller to persist.
//! All bookkeeping (the set of seen references, the account index) lives on
//! the stack of a single call.
//!
//! ## Rules
//!
//! * A reference already present anywhere in the ledger, in any account,
//!   rejects the incoming record. Within one batch only the first occurrence
//!   of a reference survives.
//! * Records without a usable reference cannot be judged duplicates and are
//!   always kept.
//! * Kept records are appended to the group with their account number
//!   (`"Unknown"` when missing), creating it if needed.
//! * A group's `is_pea` only ever goes from `false` to `true`.
//!
//! Ordering is stable: existing groups first, then new groups in first-seen
//! order; within a group, existing transactions first, then new ones in
//! arrival order.

use crate::model::{AccountGroup, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// What a merge did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    /// Transactions appended to the ledger.
    pub added: usize,
    /// Incoming records dropped because their reference was already known.
    pub duplicates_skipped: usize,
    /// Added records that carried no usable reference.
    pub unreferenced: usize,
    /// Account groups created by this merge.
    pub accounts_created: usize,
    /// Groups whose `is_pea` flag was raised by this merge.
    pub accounts_promoted: usize,
}

/// Merged ledger plus the accounting of how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub groups: Vec<AccountGroup>,
    pub report: MergeReport,
}

/// Merge `incoming` into `existing`, returning the new ledger.
pub fn merge(existing: &[AccountGroup], incoming: &[Transaction]) -> Vec<AccountGroup> {
    merge_with_report(existing, incoming).groups
}

/// [`merge`], also reporting what was added and skipped.
pub fn merge_with_report(existing: &[AccountGroup], incoming: &[Transaction]) -> MergeOutcome {
    let mut report = MergeReport::default();

    let mut seen: HashSet<&str> = existing
        .iter()
        .flat_map(|g| g.transactions.iter())
        .filter_map(Transaction::reference_key)
        .collect();

    let mut kept: Vec<&Transaction> = Vec::with_capacity(incoming.len());
    for tx in incoming {
        match tx.reference_key() {
            Some(reference) if seen.contains(reference) => {
                debug!("Skipping duplicate reference {}", reference);
                report.duplicates_skipped += 1;
            }
            Some(reference) => {
                seen.insert(reference);
                kept.push(tx);
            }
            None => {
                report.unreferenced += 1;
                kept.push(tx);
            }
        }
    }

    info!(
        "Deduplication: {} duplicates skipped",
        report.duplicates_skipped
    );

    if kept.is_empty() {
        return MergeOutcome {
            groups: existing.to_vec(),
            report,
        };
    }

    let (mut groups, mut index) = index_groups(existing);

    for tx in kept {
        let key = tx.account_key();
        let slot = match index.get(key) {
            Some(&slot) => slot,
            None => {
                groups.push(AccountGroup::seeded_from(tx));
                index.insert(key.to_string(), groups.len() - 1);
                report.accounts_created += 1;
                groups.len() - 1
            }
        };

        let group = &mut groups[slot];
        if !group.is_pea && tx.is_pea {
            group.is_pea = true;
            report.accounts_promoted += 1;
        }
        group.transactions.push(tx.clone());
        report.added += 1;
    }

    MergeOutcome { groups, report }
}

/// Copy the existing groups and index them by account key.
///
/// A hand-edited ledger may list the same account twice; such groups are
/// folded into the first one so every account key maps to exactly one group.
fn index_groups(existing: &[AccountGroup]) -> (Vec<AccountGroup>, HashMap<String, usize>) {
    let mut groups: Vec<AccountGroup> = Vec::with_capacity(existing.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(existing.len());

    for group in existing {
        match index.get(group.account_key()) {
            Some(&slot) => {
                let target = &mut groups[slot];
                target.is_pea |= group.is_pea;
                target.transactions.extend(group.transactions.iter().cloned());
            }
            None => {
                index.insert(group.account_key().to_string(), groups.len());
                groups.push(group.clone());
            }
        }
    }

    (groups, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::transaction_count;

    fn tx(reference: Option<&str>, account: Option<&str>, is_pea: bool) -> Transaction {
        Transaction {
            reference: reference.map(String::from),
            account_number: account.map(String::from),
            bank_name: Some("Boursorama".into()),
            account_type: Some(if is_pea { "Compte PEA" } else { "compte titres" }.into()),
            is_pea,
            ..Default::default()
        }
    }

    fn group(account: &str, is_pea: bool, txs: Vec<Transaction>) -> AccountGroup {
        AccountGroup {
            bank_name: "Boursorama".into(),
            account_number: account.into(),
            account_type: "compte titres".into(),
            is_pea,
            transactions: txs,
        }
    }

    fn all_references(groups: &[AccountGroup]) -> Vec<String> {
        groups
            .iter()
            .flat_map(|g| g.transactions.iter())
            .filter_map(|t| t.reference_key().map(String::from))
            .collect()
    }

    #[test]
    fn duplicate_in_batch_does_not_promote() {
        let incoming = vec![
            tx(Some("A1"), Some("123"), false),
            tx(Some("A1"), Some("123"), true),
        ];
        let outcome = merge_with_report(&[], &incoming);

        assert_eq!(outcome.groups.len(), 1);
        let g = &outcome.groups[0];
        assert_eq!(g.account_number, "123");
        assert_eq!(g.transactions.len(), 1);
        assert_eq!(g.transactions[0].reference.as_deref(), Some("A1"));
        assert!(!g.is_pea);
        assert_eq!(outcome.report.duplicates_skipped, 1);
        assert_eq!(outcome.report.accounts_promoted, 0);
    }

    #[test]
    fn empty_incoming_returns_existing() {
        let existing = vec![group("1", false, vec![tx(Some("X"), Some("1"), false)])];
        assert_eq!(merge(&existing, &[]), existing);
    }

    #[test]
    fn all_duplicates_returns_existing() {
        let existing = vec![group("1", false, vec![tx(Some("X"), Some("1"), false)])];
        let outcome = merge_with_report(&existing, &[tx(Some("X"), Some("1"), true)]);
        assert_eq!(outcome.groups, existing);
        assert_eq!(outcome.report.added, 0);
    }

    #[test]
    fn rerun_is_idempotent() {
        let batch = vec![
            tx(Some("A"), Some("1"), false),
            tx(Some("B"), Some("2"), true),
            tx(Some("C"), Some("1"), false),
        ];
        let once = merge(&[], &batch);
        let twice = merge(&once, &batch);
        assert_eq!(once, twice);
    }

    #[test]
    fn references_unique_across_accounts() {
        let existing = vec![group("1", false, vec![tx(Some("R"), Some("1"), false)])];
        let incoming = vec![
            tx(Some("R"), Some("2"), false),
            tx(Some("S"), Some("2"), false),
            tx(Some("S"), Some("3"), false),
        ];
        let merged = merge(&existing, &incoming);

        let refs = all_references(&merged);
        let unique: HashSet<&String> = refs.iter().collect();
        assert_eq!(refs.len(), unique.len());
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn unreferenced_records_always_added() {
        let existing = vec![group("1", false, vec![tx(None, Some("1"), false)])];
        let incoming = vec![
            tx(None, Some("1"), false),
            tx(Some(""), Some("1"), false),
            tx(Some("  "), Some("9"), false),
        ];
        let outcome = merge_with_report(&existing, &incoming);
        assert_eq!(
            transaction_count(&outcome.groups),
            transaction_count(&existing) + incoming.len()
        );
        assert_eq!(outcome.report.unreferenced, 3);
    }

    #[test]
    fn pea_flag_never_reset() {
        let existing = vec![group("7", true, vec![tx(Some("P1"), Some("7"), true)])];
        let merged = merge(&existing, &[tx(Some("P2"), Some("7"), false)]);
        assert!(merged[0].is_pea);
        assert_eq!(merged[0].transactions.len(), 2);
    }

    #[test]
    fn pea_flag_promoted_by_merged_record() {
        let existing = vec![group("7", false, vec![tx(Some("P1"), Some("7"), false)])];
        let outcome = merge_with_report(&existing, &[tx(Some("P2"), Some("7"), true)]);
        assert!(outcome.groups[0].is_pea);
        assert_eq!(outcome.report.accounts_promoted, 1);
        // Input left untouched.
        assert!(!existing[0].is_pea);
    }

    #[test]
    fn grouping_and_ordering() {
        let existing = vec![
            group("B", false, vec![tx(Some("b1"), Some("B"), false)]),
            group("A", false, vec![tx(Some("a1"), Some("A"), false)]),
        ];
        let incoming = vec![
            tx(Some("c1"), Some("C"), false),
            tx(Some("a2"), Some("A"), false),
            tx(Some("d1"), None, false),
            tx(Some("c2"), Some("C"), false),
            tx(Some("b2"), Some("B"), false),
        ];
        let outcome = merge_with_report(&existing, &incoming);
        let order: Vec<&str> = outcome
            .groups
            .iter()
            .map(|g| g.account_number.as_str())
            .collect();
        assert_eq!(order, vec!["B", "A", "C", "Unknown"]);

        let refs_of = |i: usize| -> Vec<&str> {
            outcome.groups[i]
                .transactions
                .iter()
                .filter_map(|t| t.reference.as_deref())
                .collect()
        };
        assert_eq!(refs_of(0), vec!["b1", "b2"]);
        assert_eq!(refs_of(1), vec!["a1", "a2"]);
        assert_eq!(refs_of(2), vec!["c1", "c2"]);
        assert_eq!(refs_of(3), vec!["d1"]);
        assert_eq!(outcome.report.accounts_created, 2);
        assert_eq!(outcome.report.added, 5);
    }

    #[test]
    fn every_account_in_exactly_one_group() {
        let incoming: Vec<Transaction> = (0..20)
            .map(|i| {
                let acct = format!("acct-{}", i % 3);
                let reference = format!("r{i}");
                tx(Some(reference.as_str()), Some(acct.as_str()), i % 5 == 0)
            })
            .collect();
        let merged = merge(&[], &incoming);
        assert_eq!(merged.len(), 3);
        for g in &merged {
            assert!(g.transactions.iter().all(|t| t.account_key() == g.account_number));
        }
        assert_eq!(transaction_count(&merged), 20);
    }

    #[test]
    fn new_group_seeded_from_first_record() {
        let first = Transaction {
            reference: Some("N1".into()),
            account_number: Some("555".into()),
            bank_name: Some("Fortuneo".into()),
            account_type: Some("PEA".into()),
            is_pea: true,
            ..Default::default()
        };
        let merged = merge(&[], &[first]);
        assert_eq!(merged[0].bank_name, "Fortuneo");
        assert_eq!(merged[0].account_type, "PEA");
        assert!(merged[0].is_pea);
    }

    #[test]
    fn repeated_accounts_in_ledger_are_folded() {
        let existing = vec![
            group("1", false, vec![tx(Some("a"), Some("1"), false)]),
            group("1", true, vec![tx(Some("b"), Some("1"), false)]),
        ];
        let merged = merge(&existing, &[tx(Some("c"), Some("1"), false)]);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].is_pea);
        assert_eq!(all_references(&merged), vec!["a", "b", "c"]);
    }
}
