// crates/tally-staking/src/pool.rs
//
// Staking pool types and their static configuration.
//
// APY is expressed in integer basis points (500 = 5%) so accrual math
// stays in integers end to end.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use tally_core::token::TokenType;

const DAY_SECS: u64 = 86_400;

/// The staking pools offered by the ledger.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PoolType {
    Basic,
    Extended,
    Premium,
}

impl fmt::Display for PoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolType::Basic => write!(f, "basic"),
            PoolType::Extended => write!(f, "extended"),
            PoolType::Premium => write!(f, "premium"),
        }
    }
}

/// One pool's static parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Token this pool escrows and pays yield in.
    pub token: TokenType,
    /// Annual yield in basis points.
    pub apy_bps: u32,
    /// Smallest stake accepted, in smallest units.
    pub min_stake: u64,
    /// Lock period in seconds. 0 means positions are immediately
    /// unlockable.
    pub lock_secs: u64,
}

/// Static table of staking pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakingConfig {
    pub pools: HashMap<PoolType, PoolConfig>,
}

impl Default for StakingConfig {
    /// Shipped pools. Spark amounts are in hundredths.
    fn default() -> Self {
        let pools = HashMap::from([
            (
                PoolType::Basic,
                PoolConfig {
                    token: TokenType::Spark,
                    apy_bps: 500,
                    min_stake: 10_000,
                    lock_secs: 7 * DAY_SECS,
                },
            ),
            (
                PoolType::Extended,
                PoolConfig {
                    token: TokenType::Spark,
                    apy_bps: 1_200,
                    min_stake: 100_000,
                    lock_secs: 30 * DAY_SECS,
                },
            ),
            (
                PoolType::Premium,
                PoolConfig {
                    token: TokenType::Crest,
                    apy_bps: 800,
                    min_stake: 50,
                    lock_secs: 14 * DAY_SECS,
                },
            ),
        ]);
        Self { pools }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pools_present() {
        let config = StakingConfig::default();
        assert_eq!(config.pools.len(), 3);
        assert_eq!(config.pools[&PoolType::Basic].apy_bps, 500);
        assert_eq!(config.pools[&PoolType::Premium].token, TokenType::Crest);
    }

    #[test]
    fn test_pool_type_display() {
        assert_eq!(PoolType::Basic.to_string(), "basic");
        assert_eq!(PoolType::Extended.to_string(), "extended");
    }
}
