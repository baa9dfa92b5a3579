// crates/tally-staking/src/position.rs
//
// Stake positions and the accrual formula.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tally_core::account::AccountId;

use crate::pool::PoolType;

/// Seconds in the accrual year (365 days).
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Lifecycle state, derived from the position's fields and "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionState {
    /// Escrowed and still inside the lock period.
    Active,
    /// Escrowed, lock period elapsed; may be unstaked.
    Unlockable,
    /// Unstaked. Terminal.
    Closed,
}

/// One stake position. `amount` is immutable once created; additional
/// stake means a new position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakePosition {
    pub id: Uuid,
    pub account: AccountId,
    pub pool: PoolType,
    /// Escrowed principal, in smallest units of the pool's token.
    pub amount: u64,
    pub created_at: DateTime<Utc>,
    pub unlock_at: DateTime<Utc>,
    pub last_reward_claim_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl StakePosition {
    /// Derived lifecycle state at `now`.
    pub fn state(&self, now: DateTime<Utc>) -> PositionState {
        if self.closed_at.is_some() {
            PositionState::Closed
        } else if now >= self.unlock_at {
            PositionState::Unlockable
        } else {
            PositionState::Active
        }
    }

    /// Whether the principal is still escrowed (not Closed).
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }
}

/// Yield accrued by `amount` at `apy_bps` between `from` and `to`:
///
/// ```text
/// floor(amount * apy_bps * elapsed_secs / (10_000 * SECONDS_PER_YEAR))
/// ```
///
/// Truncates downward; negative elapsed (clock regression) accrues zero.
pub fn accrued_reward(
    amount: u64,
    apy_bps: u32,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> u64 {
    let elapsed = (to - from).num_seconds();
    if elapsed <= 0 {
        return 0;
    }
    let numerator = amount as u128 * apy_bps as u128 * elapsed as u128;
    (numerator / (10_000u128 * SECONDS_PER_YEAR as u128)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_accrual_over_a_full_year() {
        let from = Utc::now();
        let to = from + Duration::seconds(SECONDS_PER_YEAR as i64);
        // 10_000 units at 5% APY over one year = 500 units.
        assert_eq!(accrued_reward(10_000, 500, from, to), 500);
    }

    #[test]
    fn test_accrual_truncates_downward() {
        let from = Utc::now();
        // One second of 10_000 at 5%: 500/31_536_000 of a unit -> 0.
        let to = from + Duration::seconds(1);
        assert_eq!(accrued_reward(10_000, 500, from, to), 0);
    }

    #[test]
    fn test_accrual_half_year() {
        let from = Utc::now();
        let to = from + Duration::seconds((SECONDS_PER_YEAR / 2) as i64);
        assert_eq!(accrued_reward(10_000, 500, from, to), 250);
    }

    #[test]
    fn test_accrual_zero_for_negative_elapsed() {
        let from = Utc::now();
        let to = from - Duration::seconds(10);
        assert_eq!(accrued_reward(10_000, 500, from, to), 0);
    }

    #[test]
    fn test_accrual_large_values_no_overflow() {
        let from = Utc::now();
        let to = from + Duration::seconds(SECONDS_PER_YEAR as i64 * 10);
        let amount = u64::MAX / 2;
        // Must not panic; u128 intermediate carries it.
        let reward = accrued_reward(amount, 10_000, from, to);
        assert!(reward > 0);
    }

    #[test]
    fn test_derived_state_transitions() {
        let now = Utc::now();
        let mut position = StakePosition {
            id: Uuid::now_v7(),
            account: AccountId::from("alice"),
            pool: PoolType::Basic,
            amount: 10_000,
            created_at: now,
            unlock_at: now + Duration::days(7),
            last_reward_claim_at: now,
            closed_at: None,
        };

        assert_eq!(position.state(now), PositionState::Active);
        assert_eq!(
            position.state(now + Duration::days(7)),
            PositionState::Unlockable
        );

        position.closed_at = Some(now + Duration::days(8));
        assert_eq!(
            position.state(now + Duration::days(9)),
            PositionState::Closed
        );
    }

    #[test]
    fn test_zero_lock_is_immediately_unlockable() {
        let now = Utc::now();
        let position = StakePosition {
            id: Uuid::now_v7(),
            account: AccountId::from("alice"),
            pool: PoolType::Basic,
            amount: 10_000,
            created_at: now,
            unlock_at: now,
            last_reward_claim_at: now,
            closed_at: None,
        };
        assert_eq!(position.state(now), PositionState::Unlockable);
    }
}
