// crates/tally-service/src/config.rs
//
// Aggregate service configuration. Every table ships with defaults; a TOML
// file overrides whichever sections it names.

use serde::{Deserialize, Serialize};
use std::fs;

use tally_core::error::TallyError;
use tally_core::token::TokenRegistry;
use tally_policy::actions::ActionGate;
use tally_policy::ratelimit::RateLimitConfig;
use tally_policy::rewards::RewardPolicy;
use tally_policy::tier::TierSchedule;
use tally_staking::pool::StakingConfig;

/// Aggregate configuration for the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub tokens: TokenRegistry,

    #[serde(default)]
    pub rewards: RewardPolicy,

    #[serde(default)]
    pub actions: ActionGate,

    #[serde(default)]
    pub tiers: TierSchedule,

    #[serde(default)]
    pub staking: StakingConfig,

    #[serde(default)]
    pub rate_limits: RateLimitConfig,

    /// Bound on balance-lock acquisition, in milliseconds.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    2_000
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            tokens: TokenRegistry::default(),
            rewards: RewardPolicy::default(),
            actions: ActionGate::default(),
            tiers: TierSchedule::default(),
            staking: StakingConfig::default(),
            rate_limits: RateLimitConfig::default(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file at the given path.
    pub fn load(path: &str) -> Result<Self, TallyError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            TallyError::NotFound(format!("config file {}: {}", path, e))
        })?;
        toml::from_str(&contents)
            .map_err(|e| TallyError::Serialization(format!("config file {}: {}", path, e)))
    }
}
