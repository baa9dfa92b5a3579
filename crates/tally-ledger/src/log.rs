// crates/tally-ledger/src/log.rs
//
// Append-only transaction log.
//
// Ids are assigned under the log mutex and are strictly monotonic. Batch
// appends (the two sides of a transfer, unstake principal + reward) receive
// consecutive ids so a cross-account operation is one contiguous run in
// the log.
//
// Older entries can be archived: they are folded into a balance snapshot
// and dropped from the tail. Snapshot + tail replay to the same balances
// as the unarchived full log — a tested invariant.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use tally_core::account::BalanceKey;
use tally_core::error::TallyError;
use tally_core::tx::{TransactionRecord, TxDraft};

/// Balances folded out of archived log entries, up to and including
/// `through_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub through_id: u64,
    pub balances: Vec<(BalanceKey, u64)>,
}

/// Serializable image of the whole log, for state export/import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogExport {
    pub next_id: u64,
    pub snapshot: Option<BalanceSnapshot>,
    pub entries: Vec<TransactionRecord>,
}

struct LogInner {
    next_id: u64,
    snapshot: Option<BalanceSnapshot>,
    entries: Vec<TransactionRecord>,
}

/// The append-only, strictly ordered transaction log.
pub struct TransactionLog {
    inner: Mutex<LogInner>,
}

impl TransactionLog {
    /// Create an empty log. Ids start at 1.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LogInner {
                next_id: 1,
                snapshot: None,
                entries: Vec::new(),
            }),
        }
    }

    /// Restore a log from an export.
    pub fn from_export(export: LogExport) -> Self {
        Self {
            inner: Mutex::new(LogInner {
                next_id: export.next_id,
                snapshot: export.snapshot,
                entries: export.entries,
            }),
        }
    }

    /// Append a single record. Returns the record with its assigned id.
    pub fn append(&self, draft: TxDraft) -> Result<TransactionRecord, TallyError> {
        let mut records = self.append_batch(vec![draft])?;
        // append_batch returns exactly as many records as drafts.
        records
            .pop()
            .ok_or_else(|| TallyError::Validation("empty append".to_string()))
    }

    /// Append several records with consecutive ids under one lock hold.
    pub fn append_batch(
        &self,
        drafts: Vec<TxDraft>,
    ) -> Result<Vec<TransactionRecord>, TallyError> {
        if drafts.is_empty() {
            return Err(TallyError::Validation(
                "transaction batch must not be empty".to_string(),
            ));
        }
        for draft in &drafts {
            if draft.signed_amount == 0 {
                return Err(TallyError::Validation(
                    "log entries must carry a non-zero signed amount".to_string(),
                ));
            }
        }

        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut out = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let id = inner.next_id;
            inner.next_id += 1;
            let record = draft.into_record(id);
            inner.entries.push(record.clone());
            out.push(record);
        }
        Ok(out)
    }

    /// Id the next appended record will receive.
    pub fn next_id(&self) -> u64 {
        self.locked(|inner| inner.next_id)
    }

    /// Clone of the (unarchived) tail entries, in append order.
    pub fn entries(&self) -> Vec<TransactionRecord> {
        self.locked(|inner| inner.entries.clone())
    }

    /// Clone of the archive snapshot, if one exists.
    pub fn archived_snapshot(&self) -> Option<BalanceSnapshot> {
        self.locked(|inner| inner.snapshot.clone())
    }

    /// Recompute per-(account, token) balances from the snapshot base plus
    /// the tail entries.
    ///
    /// Fails with `Validation` if the log is internally inconsistent (a
    /// replayed balance would go negative) — that never happens for a log
    /// written through the orchestrator.
    pub fn replay(&self) -> Result<HashMap<BalanceKey, u64>, TallyError> {
        self.locked(|inner| {
            let mut balances: HashMap<BalanceKey, u64> = match &inner.snapshot {
                Some(snapshot) => snapshot.balances.iter().cloned().collect(),
                None => HashMap::new(),
            };
            apply_entries(&mut balances, &inner.entries)?;
            Ok(balances)
        })
    }

    /// Archive every entry with id <= `through_id` into the balance
    /// snapshot and drop it from the tail.
    pub fn archive_through(&self, through_id: u64) -> Result<(), TallyError> {
        self.locked(|inner| {
            let mut balances: HashMap<BalanceKey, u64> = match &inner.snapshot {
                Some(snapshot) => snapshot.balances.iter().cloned().collect(),
                None => HashMap::new(),
            };
            let mut tail = Vec::new();
            let mut archived = Vec::new();
            for entry in inner.entries.drain(..) {
                if entry.id <= through_id {
                    archived.push(entry);
                } else {
                    tail.push(entry);
                }
            }
            apply_entries(&mut balances, &archived)?;
            inner.entries = tail;
            inner.snapshot = Some(BalanceSnapshot {
                through_id,
                balances: balances.into_iter().collect(),
            });
            Ok(())
        })
    }

    /// Serializable image of the log.
    pub fn export(&self) -> LogExport {
        self.locked(|inner| LogExport {
            next_id: inner.next_id,
            snapshot: inner.snapshot.clone(),
            entries: inner.entries.clone(),
        })
    }

    fn locked<R>(&self, f: impl FnOnce(&mut LogInner) -> R) -> R {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut inner)
    }
}

impl Default for TransactionLog {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_entries(
    balances: &mut HashMap<BalanceKey, u64>,
    entries: &[TransactionRecord],
) -> Result<(), TallyError> {
    for entry in entries {
        let key = BalanceKey {
            account: entry.account.clone(),
            token: entry.token,
        };
        let current = balances.get(&key).copied().unwrap_or(0) as i128;
        let next = current + entry.signed_amount as i128;
        if next < 0 || next > u64::MAX as i128 {
            return Err(TallyError::Validation(format!(
                "log entry {} drives balance of {} out of range",
                entry.id, key
            )));
        }
        balances.insert(key, next as u64);
    }
    Ok(())
}
