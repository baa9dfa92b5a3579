// crates/tally-cli/src/state.rs
//
// State-file plumbing shared by every subcommand: load config + snapshot,
// build an orchestrator, persist the snapshot after a mutation.

use std::path::PathBuf;
use std::sync::Arc;

use tally_core::clock::SystemClock;
use tally_core::traits::AllowAll;
use tally_service::{Orchestrator, ServiceConfig, ServiceSnapshot};

/// One CLI invocation's handle on the economy.
pub struct CliContext {
    pub orchestrator: Orchestrator,
    state_path: PathBuf,
}

impl CliContext {
    /// Load config and state. A missing state file means a fresh economy;
    /// a missing config file is an error (the flag was explicit).
    pub fn open(
        config_path: Option<&str>,
        state_path: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let config = match config_path {
            Some(path) => ServiceConfig::load(path)?,
            None => ServiceConfig::default(),
        };

        let state_path = PathBuf::from(state_path);
        let orchestrator = if state_path.exists() {
            let snapshot = ServiceSnapshot::load(&state_path)?;
            Orchestrator::from_snapshot(
                config,
                snapshot,
                Arc::new(AllowAll),
                Arc::new(SystemClock),
            )
        } else {
            Orchestrator::new(config, Arc::new(AllowAll), Arc::new(SystemClock))
        };

        Ok(Self {
            orchestrator,
            state_path,
        })
    }

    /// Write the current state back to the state file.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.orchestrator.export_snapshot().save(&self.state_path)?;
        Ok(())
    }
}
