// crates/tally-staking/src/engine.rs
//
// The staking engine: position bookkeeping and pool totals.
//
// The engine is a plain `&mut self` struct; the orchestrator wraps it in a
// mutex and holds that mutex across the paired ledger transaction, which
// is what makes stake/claim/unstake atomic. The engine itself never
// touches the balance store — escrowed value is represented entirely by
// open positions, and `total_staked(pool)` equals the sum of open position
// amounts in that pool at all times.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use tally_core::account::AccountId;
use tally_core::error::TallyError;
use tally_core::token::TokenType;

use crate::pool::{PoolConfig, PoolType, StakingConfig};
use crate::position::{accrued_reward, StakePosition};

/// Everything `unstake` needs to settle a position: read-only quote taken
/// under the engine lock, finalized after the ledger credit commits.
#[derive(Debug, Clone)]
pub struct UnstakeQuote {
    pub position_id: Uuid,
    pub pool: PoolType,
    pub principal: u64,
    pub reward: u64,
}

/// Manages all stake positions and per-pool totals.
pub struct StakingEngine {
    config: StakingConfig,
    positions: HashMap<Uuid, StakePosition>,
    totals: HashMap<PoolType, u64>,
}

impl StakingEngine {
    pub fn new(config: StakingConfig) -> Self {
        Self {
            config,
            positions: HashMap::new(),
            totals: HashMap::new(),
        }
    }

    /// Rebuild an engine from exported positions (snapshot restore).
    /// Pool totals are recomputed from the open positions.
    pub fn from_positions(config: StakingConfig, positions: Vec<StakePosition>) -> Self {
        let mut engine = Self::new(config);
        for position in positions {
            if position.is_open() {
                *engine.totals.entry(position.pool).or_insert(0) += position.amount;
            }
            engine.positions.insert(position.id, position);
        }
        engine
    }

    /// Look up a pool's configuration. `UnknownPool` if unregistered.
    pub fn pool(&self, pool: PoolType) -> Result<&PoolConfig, TallyError> {
        self.config
            .pools
            .get(&pool)
            .ok_or_else(|| TallyError::UnknownPool(pool.to_string()))
    }

    /// Validate a prospective stake without recording it. Returns the pool
    /// config so the caller knows which token to debit.
    pub fn validate_stake(
        &self,
        pool: PoolType,
        amount: u64,
    ) -> Result<&PoolConfig, TallyError> {
        let config = self.pool(pool)?;
        if amount < config.min_stake {
            return Err(TallyError::Validation(format!(
                "stake of {} is below the {} pool minimum of {}",
                amount, pool, config.min_stake
            )));
        }
        Ok(config)
    }

    /// Record a new position after the caller has escrowed the principal.
    /// `unlock_at = now + lock_secs`; a zero lock makes the position
    /// immediately unlockable.
    pub fn record_stake(
        &mut self,
        account: &AccountId,
        pool: PoolType,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Result<StakePosition, TallyError> {
        let lock_secs = self.validate_stake(pool, amount)?.lock_secs;
        let unlock_at = now + Duration::seconds(lock_secs as i64);
        let position = StakePosition {
            id: Uuid::now_v7(),
            account: account.clone(),
            pool,
            amount,
            created_at: now,
            unlock_at,
            last_reward_claim_at: now,
            closed_at: None,
        };
        *self.totals.entry(pool).or_insert(0) += amount;
        self.positions.insert(position.id, position.clone());
        Ok(position)
    }

    /// A position owned by `account`. `NotFound` for unknown ids and for
    /// positions held by other accounts.
    pub fn position(
        &self,
        account: &AccountId,
        id: Uuid,
    ) -> Result<&StakePosition, TallyError> {
        self.positions
            .get(&id)
            .filter(|position| position.account == *account)
            .ok_or_else(|| TallyError::NotFound(format!("position {} for {}", id, account)))
    }

    /// All open (non-closed) positions for `account`.
    pub fn open_positions(&self, account: &AccountId) -> Vec<&StakePosition> {
        let mut positions: Vec<&StakePosition> = self
            .positions
            .values()
            .filter(|position| position.account == *account && position.is_open())
            .collect();
        positions.sort_by_key(|position| position.id);
        positions
    }

    pub fn open_position_count(&self, account: &AccountId) -> u32 {
        self.open_positions(account).len() as u32
    }

    /// Yield accrued by one open position since its last claim.
    pub fn pending_reward_for(
        &self,
        position: &StakePosition,
        now: DateTime<Utc>,
    ) -> Result<u64, TallyError> {
        let config = self.pool(position.pool)?;
        Ok(accrued_reward(
            position.amount,
            config.apy_bps,
            position.last_reward_claim_at,
            now,
        ))
    }

    /// Total pending yield across all of `account`'s open positions, per
    /// token, plus the ids touched. Read-only; the caller credits the
    /// totals and then calls `mark_claimed` on the ids.
    pub fn pending_rewards(
        &self,
        account: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<(HashMap<TokenType, u64>, Vec<Uuid>), TallyError> {
        let mut totals = HashMap::new();
        let mut touched = Vec::new();
        for position in self.open_positions(account) {
            let config = self.pool(position.pool)?;
            let reward = accrued_reward(
                position.amount,
                config.apy_bps,
                position.last_reward_claim_at,
                now,
            );
            *totals.entry(config.token).or_insert(0) += reward;
            touched.push(position.id);
        }
        Ok((totals, touched))
    }

    /// Reset `last_reward_claim_at` for every touched position.
    pub fn mark_claimed(&mut self, ids: &[Uuid], now: DateTime<Utc>) {
        for id in ids {
            if let Some(position) = self.positions.get_mut(id) {
                position.last_reward_claim_at = now;
            }
        }
    }

    /// Quote an unstake: `StillLocked` before `unlock_at`, `NotFound` for
    /// unknown/foreign/closed positions. Read-only.
    pub fn quote_unstake(
        &self,
        account: &AccountId,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<UnstakeQuote, TallyError> {
        let position = self.position(account, id)?;
        if !position.is_open() {
            return Err(TallyError::NotFound(format!(
                "position {} is already closed",
                id
            )));
        }
        if now < position.unlock_at {
            return Err(TallyError::StillLocked {
                position: id,
                unlock_at: position.unlock_at,
            });
        }
        let reward = self.pending_reward_for(position, now)?;
        Ok(UnstakeQuote {
            position_id: id,
            pool: position.pool,
            principal: position.amount,
            reward,
        })
    }

    /// Close a quoted position: transition to Closed, decrement the pool
    /// total, and mark its reward claimed. Called only after the paired
    /// ledger credit has committed.
    pub fn finalize_unstake(&mut self, id: Uuid, now: DateTime<Utc>) -> Result<(), TallyError> {
        let position = self
            .positions
            .get_mut(&id)
            .filter(|position| position.is_open())
            .ok_or_else(|| TallyError::NotFound(format!("open position {}", id)))?;
        position.closed_at = Some(now);
        position.last_reward_claim_at = now;
        let amount = position.amount;
        let pool = position.pool;
        if let Some(total) = self.totals.get_mut(&pool) {
            *total = total.saturating_sub(amount);
        }
        Ok(())
    }

    /// Escrowed total for a pool: the sum of all open position amounts.
    pub fn total_staked(&self, pool: PoolType) -> u64 {
        self.totals.get(&pool).copied().unwrap_or(0)
    }

    /// All positions, for state export.
    pub fn export_positions(&self) -> Vec<StakePosition> {
        let mut positions: Vec<StakePosition> = self.positions.values().cloned().collect();
        positions.sort_by_key(|position| position.id);
        positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::{PositionState, SECONDS_PER_YEAR};

    fn engine() -> StakingEngine {
        StakingEngine::new(StakingConfig::default())
    }

    fn alice() -> AccountId {
        AccountId::from("alice")
    }

    fn sum_open(engine: &StakingEngine, pool: PoolType) -> u64 {
        engine
            .export_positions()
            .iter()
            .filter(|p| p.pool == pool && p.is_open())
            .map(|p| p.amount)
            .sum()
    }

    #[test]
    fn test_stake_below_minimum_rejected() {
        let engine = engine();
        let err = engine.validate_stake(PoolType::Basic, 9_999).unwrap_err();
        assert!(matches!(err, TallyError::Validation(_)));
    }

    #[test]
    fn test_record_stake_creates_active_position() {
        let mut engine = engine();
        let now = Utc::now();
        let position = engine
            .record_stake(&alice(), PoolType::Basic, 10_000, now)
            .unwrap();

        assert_eq!(position.state(now), PositionState::Active);
        assert_eq!(position.unlock_at, now + Duration::seconds(7 * 86_400));
        assert_eq!(engine.total_staked(PoolType::Basic), 10_000);
    }

    #[test]
    fn test_pool_total_tracks_open_positions() {
        let mut engine = engine();
        let now = Utc::now();
        engine
            .record_stake(&alice(), PoolType::Basic, 10_000, now)
            .unwrap();
        let second = engine
            .record_stake(&alice(), PoolType::Basic, 20_000, now)
            .unwrap();
        assert_eq!(
            engine.total_staked(PoolType::Basic),
            sum_open(&engine, PoolType::Basic)
        );

        let later = now + Duration::seconds(8 * 86_400);
        engine.quote_unstake(&alice(), second.id, later).unwrap();
        engine.finalize_unstake(second.id, later).unwrap();
        assert_eq!(engine.total_staked(PoolType::Basic), 10_000);
        assert_eq!(
            engine.total_staked(PoolType::Basic),
            sum_open(&engine, PoolType::Basic)
        );
    }

    #[test]
    fn test_unstake_before_unlock_is_still_locked() {
        let mut engine = engine();
        let now = Utc::now();
        let position = engine
            .record_stake(&alice(), PoolType::Basic, 10_000, now)
            .unwrap();

        let err = engine
            .quote_unstake(&alice(), position.id, now + Duration::days(6))
            .unwrap_err();
        assert!(matches!(err, TallyError::StillLocked { .. }));
    }

    #[test]
    fn test_unstake_quote_after_unlock_includes_reward() {
        let mut engine = engine();
        let now = Utc::now();
        let position = engine
            .record_stake(&alice(), PoolType::Basic, 1_000_000, now)
            .unwrap();

        let after_a_year = now + Duration::seconds(SECONDS_PER_YEAR as i64);
        let quote = engine
            .quote_unstake(&alice(), position.id, after_a_year)
            .unwrap();
        assert_eq!(quote.principal, 1_000_000);
        // 5% of 1_000_000 over exactly one year.
        assert_eq!(quote.reward, 50_000);
    }

    #[test]
    fn test_unstake_foreign_position_is_not_found() {
        let mut engine = engine();
        let now = Utc::now();
        let position = engine
            .record_stake(&alice(), PoolType::Basic, 10_000, now)
            .unwrap();

        let err = engine
            .quote_unstake(&AccountId::from("bob"), position.id, now)
            .unwrap_err();
        assert!(matches!(err, TallyError::NotFound(_)));
    }

    #[test]
    fn test_closed_position_cannot_be_unstaked_twice() {
        let mut engine = engine();
        let now = Utc::now();
        let position = engine
            .record_stake(&alice(), PoolType::Basic, 10_000, now)
            .unwrap();
        let later = now + Duration::days(8);
        engine.finalize_unstake(position.id, later).unwrap();

        assert!(engine.quote_unstake(&alice(), position.id, later).is_err());
        assert!(engine.finalize_unstake(position.id, later).is_err());
    }

    #[test]
    fn test_pending_rewards_sum_and_reset() {
        let mut engine = engine();
        let now = Utc::now();
        engine
            .record_stake(&alice(), PoolType::Basic, 1_000_000, now)
            .unwrap();
        engine
            .record_stake(&alice(), PoolType::Extended, 1_000_000, now)
            .unwrap();

        let after_a_year = now + Duration::seconds(SECONDS_PER_YEAR as i64);
        let (totals, touched) = engine.pending_rewards(&alice(), after_a_year).unwrap();
        // 5% + 12% on 1_000_000 each, both Spark pools.
        assert_eq!(totals[&TokenType::Spark], 50_000 + 120_000);
        assert_eq!(touched.len(), 2);

        engine.mark_claimed(&touched, after_a_year);
        let (totals, _) = engine.pending_rewards(&alice(), after_a_year).unwrap();
        assert_eq!(totals.get(&TokenType::Spark).copied().unwrap_or(0), 0);
    }

    #[test]
    fn test_amount_is_immutable_additional_stake_is_new_position() {
        let mut engine = engine();
        let now = Utc::now();
        engine
            .record_stake(&alice(), PoolType::Basic, 10_000, now)
            .unwrap();
        engine
            .record_stake(&alice(), PoolType::Basic, 10_000, now)
            .unwrap();
        assert_eq!(engine.open_position_count(&alice()), 2);
    }

    #[test]
    fn test_restore_from_positions_rebuilds_totals() {
        let mut engine = engine();
        let now = Utc::now();
        engine
            .record_stake(&alice(), PoolType::Basic, 10_000, now)
            .unwrap();
        let closed = engine
            .record_stake(&alice(), PoolType::Basic, 20_000, now)
            .unwrap();
        engine.finalize_unstake(closed.id, now + Duration::days(8)).unwrap();

        let restored =
            StakingEngine::from_positions(StakingConfig::default(), engine.export_positions());
        assert_eq!(restored.total_staked(PoolType::Basic), 10_000);
        assert_eq!(restored.open_position_count(&alice()), 1);
    }
}
