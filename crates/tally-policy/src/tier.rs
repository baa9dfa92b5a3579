// crates/tally-policy/src/tier.rs
//
// Tier calculation: a pure function of current balances.
//
// An account holds the highest tier whose per-token minimums it meets.
// Because every threshold is a minimum, the result is monotonic
// non-decreasing in each token's balance. Callers recompute the tier on
// every gating check instead of caching it, so a stored tier can never
// drift from the balances that justify it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use tally_core::token::TokenType;

/// Minimum balances an account must hold to reach `tier`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierThreshold {
    pub tier: u8,
    pub minimums: HashMap<TokenType, u64>,
}

/// The ordered ladder of tier thresholds. Tier 0 is implicit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSchedule {
    pub thresholds: Vec<TierThreshold>,
}

impl Default for TierSchedule {
    /// Shipped ladder. Spark minimums are in hundredths.
    fn default() -> Self {
        Self {
            thresholds: vec![
                TierThreshold {
                    tier: 1,
                    minimums: HashMap::from([(TokenType::Spark, 100_000)]),
                },
                TierThreshold {
                    tier: 2,
                    minimums: HashMap::from([
                        (TokenType::Spark, 1_000_000),
                        (TokenType::Honor, 50),
                    ]),
                },
                TierThreshold {
                    tier: 3,
                    minimums: HashMap::from([
                        (TokenType::Spark, 5_000_000),
                        (TokenType::Honor, 200),
                    ]),
                },
            ],
        }
    }
}

/// Compute the tier for the given balances. Pure and stateless.
pub fn tier_for(schedule: &TierSchedule, balances: &HashMap<TokenType, u64>) -> u8 {
    schedule
        .thresholds
        .iter()
        .filter(|threshold| {
            threshold.minimums.iter().all(|(&token, &minimum)| {
                balances.get(&token).copied().unwrap_or(0) >= minimum
            })
        })
        .map(|threshold| threshold.tier)
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balances(spark: u64, honor: u64) -> HashMap<TokenType, u64> {
        HashMap::from([(TokenType::Spark, spark), (TokenType::Honor, honor)])
    }

    #[test]
    fn test_empty_balances_are_tier_zero() {
        let schedule = TierSchedule::default();
        assert_eq!(tier_for(&schedule, &HashMap::new()), 0);
    }

    #[test]
    fn test_single_token_threshold() {
        let schedule = TierSchedule::default();
        assert_eq!(tier_for(&schedule, &balances(99_999, 0)), 0);
        assert_eq!(tier_for(&schedule, &balances(100_000, 0)), 1);
    }

    #[test]
    fn test_multi_token_threshold_requires_all_minimums() {
        let schedule = TierSchedule::default();
        // Enough spark for tier 2 but no honor: stays at tier 1.
        assert_eq!(tier_for(&schedule, &balances(1_000_000, 0)), 1);
        assert_eq!(tier_for(&schedule, &balances(1_000_000, 50)), 2);
    }

    #[test]
    fn test_highest_satisfied_tier_wins() {
        let schedule = TierSchedule::default();
        assert_eq!(tier_for(&schedule, &balances(5_000_000, 200)), 3);
    }

    #[test]
    fn test_monotonic_in_each_balance() {
        let schedule = TierSchedule::default();
        let mut previous = 0;
        for spark in [0u64, 50_000, 100_000, 1_000_000, 5_000_000] {
            let tier = tier_for(&schedule, &balances(spark, 200));
            assert!(tier >= previous);
            previous = tier;
        }
    }
}
