// crates/tally-service/src/snapshot.rs
//
// Whole-state snapshot: balances, positions, and the transaction log.
// Serialized as pretty JSON; the CLI uses it as its state file between
// invocations. Rate-limit windows are deliberately ephemeral and are not
// part of the snapshot.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use tally_core::account::BalanceKey;
use tally_core::error::TallyError;
use tally_ledger::log::LogExport;
use tally_staking::position::StakePosition;

/// Serializable image of an orchestrator's mutable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    pub balances: Vec<(BalanceKey, u64)>,
    pub positions: Vec<StakePosition>,
    pub log: LogExport,
}

impl ServiceSnapshot {
    /// Write the snapshot to `path` as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), TallyError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| {
            TallyError::Serialization(format!("writing {}: {}", path.display(), e))
        })
    }

    /// Load a snapshot from `path`.
    pub fn load(path: &Path) -> Result<Self, TallyError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            TallyError::NotFound(format!("state file {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&contents)?)
    }
}
