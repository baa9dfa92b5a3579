// crates/tally-service/src/orchestrator.rs
//
// The orchestrator: Tally's public operation surface.
//
// Composition rules that make operations atomic and auditable:
//   - Balance mutations and their log appends happen inside the same
//     per-key ledger lock, so per-key log order matches balance order and
//     the store and log can never diverge (a failed closure commits
//     nothing and appends nothing).
//   - Staking operations hold the engine mutex across the paired ledger
//     transaction. Lock order is always engine -> ledger keys; the
//     reverse nesting never occurs.
//   - The injected AuthorizationProvider is consulted before any grant or
//     spend commits; the injected Clock supplies every timestamp.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use tally_core::account::{AccountId, BalanceKey};
use tally_core::clock::Clock;
use tally_core::error::TallyError;
use tally_core::token::TokenType;
use tally_core::traits::AuthorizationProvider;
use tally_core::tx::{TxDraft, TxKind};
use tally_ledger::log::TransactionLog;
use tally_ledger::store::LedgerStore;
use tally_policy::actions::{AccountSnapshot, ActionGate, Authorization};
use tally_policy::ratelimit::RateLimiter;
use tally_policy::rewards::{GrantContext, RewardPolicy};
use tally_policy::tier::{tier_for, TierSchedule};
use tally_staking::engine::StakingEngine;
use tally_staking::pool::PoolType;
use tally_staking::position::StakePosition;

use crate::config::ServiceConfig;
use crate::snapshot::ServiceSnapshot;

/// Result of a successful grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantOutcome {
    pub token: TokenType,
    pub amount: u64,
    pub new_balance: u64,
    pub tx_id: u64,
}

/// Result of a successful action execution. All fields are `None` for a
/// free (unregistered) action, which debits nothing and logs nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub token: Option<TokenType>,
    pub cost: Option<u64>,
    pub new_balance: Option<u64>,
    pub tx_id: Option<u64>,
}

/// Result of a successful stake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeOutcome {
    pub position_id: Uuid,
    pub unlock_at: DateTime<Utc>,
    pub new_balance: u64,
    pub tx_id: u64,
}

/// Result of a reward claim across all of an account's open positions.
/// Empty maps mean nothing had accrued yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimOutcome {
    pub claimed: HashMap<TokenType, u64>,
    pub new_balances: HashMap<TokenType, u64>,
    pub tx_ids: Vec<u64>,
}

/// Result of a successful unstake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnstakeOutcome {
    pub principal_returned: u64,
    pub rewards_claimed: u64,
    pub new_balance: u64,
    pub tx_id: u64,
}

/// Result of a successful transfer. `tx_id` is the transfer-out record;
/// the paired transfer-in record holds the next consecutive id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub from_balance: u64,
    pub to_balance: u64,
    pub tx_id: u64,
}

/// The public service surface of the Tally economy.
pub struct Orchestrator {
    ledger: LedgerStore,
    log: TransactionLog,
    rewards: RewardPolicy,
    gate: ActionGate,
    tiers: TierSchedule,
    staking: Mutex<StakingEngine>,
    limiter: RateLimiter,
    auth: Arc<dyn AuthorizationProvider>,
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    pub fn new(
        config: ServiceConfig,
        auth: Arc<dyn AuthorizationProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::restore(config, auth, clock, HashMap::new(), Vec::new(), TransactionLog::new())
    }

    /// Rebuild an orchestrator from an exported state snapshot.
    pub fn from_snapshot(
        config: ServiceConfig,
        snapshot: ServiceSnapshot,
        auth: Arc<dyn AuthorizationProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::restore(
            config,
            auth,
            clock,
            snapshot.balances.into_iter().collect(),
            snapshot.positions,
            TransactionLog::from_export(snapshot.log),
        )
    }

    fn restore(
        config: ServiceConfig,
        auth: Arc<dyn AuthorizationProvider>,
        clock: Arc<dyn Clock>,
        balances: HashMap<BalanceKey, u64>,
        positions: Vec<StakePosition>,
        log: TransactionLog,
    ) -> Self {
        let ledger = LedgerStore::with_balances(
            config.tokens.clone(),
            Duration::from_millis(config.lock_timeout_ms),
            balances,
        );
        Self {
            ledger,
            log,
            rewards: config.rewards,
            gate: config.actions,
            tiers: config.tiers,
            staking: Mutex::new(StakingEngine::from_positions(config.staking, positions)),
            limiter: RateLimiter::new(config.rate_limits),
            auth,
            clock,
        }
    }

    // -----------------------------------------------------------------
    // Public operations
    // -----------------------------------------------------------------

    /// Credit the reward for a recognized earning event.
    pub fn grant(
        &self,
        account: &AccountId,
        event: &str,
        ctx: &GrantContext,
    ) -> Result<GrantOutcome, TallyError> {
        let now = self.clock.now();
        self.limiter.check_and_count(account, "grant", now)?;
        let (token, amount) = self.rewards.amount_for(event, ctx)?;
        self.approve(account, "grant")?;

        let key = BalanceKey {
            account: account.clone(),
            token,
        };
        let outcome = self.ledger.with_keys(std::slice::from_ref(&key), |txn| {
            let new_balance = txn.credit(&key, amount)?;
            let record = self.log.append(TxDraft {
                account: account.clone(),
                kind: TxKind::Grant,
                token,
                signed_amount: amount as i64,
                balance_after: new_balance,
                timestamp: now,
                metadata: serde_json::json!({
                    "event": event,
                    "quality": ctx.quality,
                    "context": ctx.metadata,
                }),
            })?;
            Ok(GrantOutcome {
                token,
                amount,
                new_balance,
                tx_id: record.id,
            })
        })?;

        info!(
            account = %account,
            event,
            token = %token,
            amount,
            tx_id = outcome.tx_id,
            "grant committed"
        );
        Ok(outcome)
    }

    /// Advisory affordability/eligibility check for an action. Read-only;
    /// `execute_action` re-runs this under the balance lock.
    pub fn check_action(&self, account: &AccountId, action: &str) -> Authorization {
        let snapshot = self.account_snapshot(account);
        self.gate.authorize(action, &snapshot)
    }

    /// Execute an action: re-authorize under the balance lock, debit the
    /// cost, and append the spend record as one atomic unit.
    pub fn execute_action(
        &self,
        account: &AccountId,
        action: &str,
    ) -> Result<ActionOutcome, TallyError> {
        let now = self.clock.now();
        self.limiter.check_and_count(account, "action", now)?;
        self.approve(account, "execute_action")?;

        let def = match self.gate.definition(action) {
            // Unregistered actions are free: nothing to debit or log.
            Err(_) => {
                info!(account = %account, action, "free action executed");
                return Ok(ActionOutcome {
                    token: None,
                    cost: None,
                    new_balance: None,
                    tx_id: None,
                });
            }
            Ok(def) => def.clone(),
        };

        // Position count is read outside the ledger lock: engine and
        // ledger locks are never nested in this direction.
        let active_positions = self.engine().open_position_count(account);

        let key = BalanceKey {
            account: account.clone(),
            token: def.token,
        };
        let outcome = self.ledger.with_keys(std::slice::from_ref(&key), |txn| {
            let mut balances = self.ledger.balances_for(account);
            balances.insert(def.token, txn.balance(&key)?);
            let snapshot = AccountSnapshot {
                tier: tier_for(&self.tiers, &balances),
                balances,
                active_positions,
            };

            let auth = self.gate.authorize(action, &snapshot);
            if !auth.approved {
                let available = txn.balance(&key)?;
                if available < def.cost {
                    return Err(TallyError::InsufficientBalance {
                        available,
                        required: def.cost,
                    });
                }
                return Err(TallyError::NotEligible(
                    auth.reason.unwrap_or_else(|| "not eligible".to_string()),
                ));
            }

            let new_balance = txn.debit(&key, def.cost)?;
            let record = self.log.append(TxDraft {
                account: account.clone(),
                kind: TxKind::Spend,
                token: def.token,
                signed_amount: -(def.cost as i64),
                balance_after: new_balance,
                timestamp: now,
                metadata: serde_json::json!({ "action": action }),
            })?;
            Ok(ActionOutcome {
                token: Some(def.token),
                cost: Some(def.cost),
                new_balance: Some(new_balance),
                tx_id: Some(record.id),
            })
        })?;

        info!(
            account = %account,
            action,
            cost = def.cost,
            "action executed"
        );
        Ok(outcome)
    }

    /// Escrow spendable balance into a new stake position.
    pub fn stake(
        &self,
        account: &AccountId,
        pool: PoolType,
        amount: u64,
    ) -> Result<StakeOutcome, TallyError> {
        let now = self.clock.now();
        self.limiter.check_and_count(account, "stake", now)?;
        self.approve(account, "stake")?;

        let mut engine = self.engine();
        let token = engine.validate_stake(pool, amount)?.token;

        let key = BalanceKey {
            account: account.clone(),
            token,
        };
        let outcome = self.ledger.with_keys(std::slice::from_ref(&key), |txn| {
            let new_balance = txn.debit(&key, amount)?;
            let position = engine.record_stake(account, pool, amount, now)?;
            let record = self.log.append(TxDraft {
                account: account.clone(),
                kind: TxKind::Stake,
                token,
                signed_amount: -(amount as i64),
                balance_after: new_balance,
                timestamp: now,
                metadata: serde_json::json!({
                    "pool": pool.to_string(),
                    "position": position.id,
                }),
            })?;
            Ok(StakeOutcome {
                position_id: position.id,
                unlock_at: position.unlock_at,
                new_balance,
                tx_id: record.id,
            })
        })?;

        info!(
            account = %account,
            pool = %pool,
            amount,
            position = %outcome.position_id,
            "stake recorded"
        );
        Ok(outcome)
    }

    /// Claim accrued yield across all of the account's open positions as
    /// one atomic batch: the credit commits and every touched position's
    /// claim timestamp resets, or neither happens.
    pub fn claim_staking_rewards(&self, account: &AccountId) -> Result<ClaimOutcome, TallyError> {
        let now = self.clock.now();
        self.limiter.check_and_count(account, "claim", now)?;
        self.approve(account, "claim_staking_rewards")?;

        let mut engine = self.engine();
        let (totals, touched) = engine.pending_rewards(account, now)?;
        let payable: Vec<(TokenType, u64)> = {
            let mut payable: Vec<(TokenType, u64)> = totals
                .iter()
                .filter(|(_, &amount)| amount > 0)
                .map(|(&token, &amount)| (token, amount))
                .collect();
            payable.sort_by_key(|&(token, _)| token);
            payable
        };

        if payable.is_empty() {
            // Nothing accrued; still reset the claim markers so the next
            // accrual window starts now.
            engine.mark_claimed(&touched, now);
            return Ok(ClaimOutcome {
                claimed: HashMap::new(),
                new_balances: HashMap::new(),
                tx_ids: Vec::new(),
            });
        }

        let keys: Vec<BalanceKey> = payable
            .iter()
            .map(|&(token, _)| BalanceKey {
                account: account.clone(),
                token,
            })
            .collect();

        let outcome = self.ledger.with_keys(&keys, |txn| {
            let mut drafts = Vec::new();
            let mut new_balances = HashMap::new();
            for (key, &(token, amount)) in keys.iter().zip(payable.iter()) {
                let new_balance = txn.credit(key, amount)?;
                new_balances.insert(token, new_balance);
                drafts.push(TxDraft {
                    account: account.clone(),
                    kind: TxKind::Reward,
                    token,
                    signed_amount: amount as i64,
                    balance_after: new_balance,
                    timestamp: now,
                    metadata: serde_json::json!({ "positions": touched }),
                });
            }
            let records = self.log.append_batch(drafts)?;
            Ok(ClaimOutcome {
                claimed: payable.iter().cloned().collect(),
                new_balances,
                tx_ids: records.iter().map(|r| r.id).collect(),
            })
        })?;

        engine.mark_claimed(&touched, now);
        info!(
            account = %account,
            positions = touched.len(),
            "staking rewards claimed"
        );
        Ok(outcome)
    }

    /// Close an unlockable position: claim its pending yield, return the
    /// escrowed principal to the spendable balance, and decrement the
    /// pool total — one atomic operation.
    pub fn unstake(
        &self,
        account: &AccountId,
        position_id: Uuid,
    ) -> Result<UnstakeOutcome, TallyError> {
        let now = self.clock.now();
        self.limiter.check_and_count(account, "unstake", now)?;
        self.approve(account, "unstake")?;

        let mut engine = self.engine();
        let quote = engine.quote_unstake(account, position_id, now)?;
        let token = engine.pool(quote.pool)?.token;

        let key = BalanceKey {
            account: account.clone(),
            token,
        };
        let outcome = self.ledger.with_keys(std::slice::from_ref(&key), |txn| {
            let after_principal = txn.credit(&key, quote.principal)?;
            let mut drafts = vec![TxDraft {
                account: account.clone(),
                kind: TxKind::Unstake,
                token,
                signed_amount: quote.principal as i64,
                balance_after: after_principal,
                timestamp: now,
                metadata: serde_json::json!({ "position": position_id }),
            }];

            let mut new_balance = after_principal;
            if quote.reward > 0 {
                new_balance = txn.credit(&key, quote.reward)?;
                drafts.push(TxDraft {
                    account: account.clone(),
                    kind: TxKind::Reward,
                    token,
                    signed_amount: quote.reward as i64,
                    balance_after: new_balance,
                    timestamp: now,
                    metadata: serde_json::json!({ "positions": [position_id] }),
                });
            }

            let records = self.log.append_batch(drafts)?;
            Ok(UnstakeOutcome {
                principal_returned: quote.principal,
                rewards_claimed: quote.reward,
                new_balance,
                tx_id: records[0].id,
            })
        })?;

        engine.finalize_unstake(position_id, now)?;
        info!(
            account = %account,
            position = %position_id,
            principal = quote.principal,
            reward = quote.reward,
            "position unstaked"
        );
        Ok(outcome)
    }

    /// Move spendable balance between two accounts as one atomic pair of
    /// entries. A cap failure on the credit side rolls back the debit.
    pub fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        token: TokenType,
        amount: u64,
    ) -> Result<TransferOutcome, TallyError> {
        let now = self.clock.now();
        if from == to {
            return Err(TallyError::Validation(
                "cannot transfer to the same account".to_string(),
            ));
        }
        if !self.ledger.registry().transferable(token) {
            return Err(TallyError::NonTransferable(token));
        }
        self.limiter.check_and_count(from, "transfer", now)?;
        self.approve(from, "transfer")?;

        let from_key = BalanceKey {
            account: from.clone(),
            token,
        };
        let to_key = BalanceKey {
            account: to.clone(),
            token,
        };
        let outcome = self
            .ledger
            .with_keys(&[from_key.clone(), to_key.clone()], |txn| {
                let from_balance = txn.debit(&from_key, amount)?;
                let to_balance = txn.credit(&to_key, amount)?;
                let records = self.log.append_batch(vec![
                    TxDraft {
                        account: from.clone(),
                        kind: TxKind::TransferOut,
                        token,
                        signed_amount: -(amount as i64),
                        balance_after: from_balance,
                        timestamp: now,
                        metadata: serde_json::json!({ "to": to }),
                    },
                    TxDraft {
                        account: to.clone(),
                        kind: TxKind::TransferIn,
                        token,
                        signed_amount: amount as i64,
                        balance_after: to_balance,
                        timestamp: now,
                        metadata: serde_json::json!({ "from": from }),
                    },
                ])?;
                Ok(TransferOutcome {
                    from_balance,
                    to_balance,
                    tx_id: records[0].id,
                })
            })?;

        info!(
            from = %from,
            to = %to,
            token = %token,
            amount,
            tx_id = outcome.tx_id,
            "transfer committed"
        );
        Ok(outcome)
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    /// Spendable balance for (account, token).
    pub fn balance(&self, account: &AccountId, token: TokenType) -> u64 {
        self.ledger.balance(account, token)
    }

    /// Tier derived fresh from the account's current balances.
    pub fn tier(&self, account: &AccountId) -> u8 {
        tier_for(&self.tiers, &self.ledger.balances_for(account))
    }

    /// Point-in-time view used by the action gate.
    pub fn account_snapshot(&self, account: &AccountId) -> AccountSnapshot {
        let balances = self.ledger.balances_for(account);
        AccountSnapshot {
            tier: tier_for(&self.tiers, &balances),
            balances,
            active_positions: self.engine().open_position_count(account),
        }
    }

    /// The account's open stake positions.
    pub fn open_positions(&self, account: &AccountId) -> Vec<StakePosition> {
        self.engine()
            .open_positions(account)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Escrowed total for a pool.
    pub fn total_staked(&self, pool: PoolType) -> u64 {
        self.engine().total_staked(pool)
    }

    /// The transaction log.
    pub fn log(&self) -> &TransactionLog {
        &self.log
    }

    /// The balance store.
    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    /// Verify that replaying the log reproduces the store's balances.
    pub fn verify_replay(&self) -> Result<(), TallyError> {
        let replayed = self.log.replay()?;
        let stored = self.ledger.export_balances();

        let mut keys: Vec<&BalanceKey> = replayed.keys().chain(stored.keys()).collect();
        keys.sort();
        keys.dedup();
        for key in keys {
            let from_log = replayed.get(key).copied().unwrap_or(0);
            let from_store = stored.get(key).copied().unwrap_or(0);
            if from_log != from_store {
                return Err(TallyError::Validation(format!(
                    "replay mismatch for {}: log says {}, store says {}",
                    key, from_log, from_store
                )));
            }
        }
        Ok(())
    }

    /// Export the full mutable state for persistence.
    pub fn export_snapshot(&self) -> ServiceSnapshot {
        let mut balances: Vec<(BalanceKey, u64)> =
            self.ledger.export_balances().into_iter().collect();
        balances.sort();
        ServiceSnapshot {
            balances,
            positions: self.engine().export_positions(),
            log: self.log.export(),
        }
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn engine(&self) -> MutexGuard<'_, StakingEngine> {
        self.staking
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn approve(&self, account: &AccountId, operation: &str) -> Result<(), TallyError> {
        if self.auth.approve(account, operation) {
            Ok(())
        } else {
            warn!(account = %account, operation, "authorization provider refused operation");
            Err(TallyError::Denied(format!(
                "{} for {}",
                operation, account
            )))
        }
    }
}
