//! Ledger persistence: one JSON array of account groups on disk.
//!
//! The ledger is read once at the start of a run and rewritten wholesale at
//! the end. Writes go to a temporary file in the same directory which is then
//! renamed over the ledger, so an interrupted save leaves the previous ledger
//! in place. Concurrent runs against one ledger are not supported.

use crate::error::TradesError;
use crate::model::{transaction_count, AccountGroup};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Load the ledger, treating a missing or blank file as empty.
///
/// Unreadable files and invalid JSON are reported as errors; see
/// [`load_ledger_or_empty`] for the forgiving variant used by a run.
pub async fn load_ledger(path: &Path) -> Result<Vec<AccountGroup>, TradesError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No ledger at {}; starting empty", path.display());
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(TradesError::StoreReadFailed {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let groups: Vec<AccountGroup> =
        serde_json::from_slice(&bytes).map_err(|e| TradesError::StoreCorrupt {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

    info!(
        "Loaded {} account(s), {} transaction(s) from {}",
        groups.len(),
        transaction_count(&groups),
        path.display()
    );
    Ok(groups)
}

/// Load the ledger; any failure is logged and treated as an empty ledger.
pub async fn load_ledger_or_empty(path: &Path) -> Vec<AccountGroup> {
    match load_ledger(path).await {
        Ok(groups) => groups,
        Err(e) => {
            warn!("{e}; continuing with an empty ledger");
            Vec::new()
        }
    }
}

/// Write the ledger as pretty-printed JSON, replacing any previous content.
pub async fn save_ledger(path: &Path, groups: &[AccountGroup]) -> Result<(), TradesError> {
    let mut json = serde_json::to_vec_pretty(groups)
        .map_err(|e| TradesError::Internal(format!("ledger serialisation: {e}")))?;
    json.push(b'\n');

    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic(&target, &json))
        .await
        .map_err(|e| TradesError::Internal(format!("save task panicked: {e}")))??;

    info!(
        "Saved {} account(s), {} transaction(s) to {}",
        groups.len(),
        transaction_count(groups),
        path.display()
    );
    Ok(())
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), TradesError> {
    let write_failed = |source: std::io::Error| TradesError::StoreWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(write_failed)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".ledger-")
        .suffix(".tmp")
        .tempfile_in(&dir)
        .map_err(write_failed)?;
    tmp.write_all(contents).map_err(write_failed)?;
    tmp.as_file().sync_all().map_err(write_failed)?;
    tmp.persist(path).map_err(|e| write_failed(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Transaction;

    fn sample() -> Vec<AccountGroup> {
        vec![AccountGroup {
            bank_name: "Société Générale".into(),
            account_number: "0001".into(),
            account_type: "Compte PEA".into(),
            is_pea: true,
            transactions: vec![Transaction {
                reference: Some("SG-1".into()),
                price: 12.5,
                quantity: 3.0,
                kind: Some("Buy".into()),
                is_pea: true,
                ..Default::default()
            }],
        }]
    }

    #[tokio::test]
    async fn missing_ledger_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let groups = load_ledger(&dir.path().join("results.json")).await.unwrap();
        assert!(groups.is_empty());
    }

    #[tokio::test]
    async fn blank_ledger_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, "  \n").unwrap();
        assert!(load_ledger(&path).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_ledger_is_reported_then_forgiven() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = load_ledger(&path).await.unwrap_err();
        assert!(matches!(err, TradesError::StoreCorrupt { .. }));
        assert!(load_ledger_or_empty(&path).await.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_preserves_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/results.json");
        let groups = sample();

        save_ledger(&path, &groups).await.unwrap();
        let loaded = load_ledger(&path).await.unwrap();
        assert_eq!(loaded, groups);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Société Générale"), "non-ASCII kept as-is");
        assert!(text.contains("\n  {\n    \"bank_name\""), "two-space indent");
    }

    #[tokio::test]
    async fn save_overwrites_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, "[]").unwrap();

        save_ledger(&path, &sample()).await.unwrap();
        save_ledger(&path, &[]).await.unwrap();

        assert!(load_ledger(&path).await.unwrap().is_empty());
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
