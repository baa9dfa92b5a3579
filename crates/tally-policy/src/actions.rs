// crates/tally-policy/src/actions.rs
//
// Action gate: the static table mapping named spendable actions to a cost
// and optional eligibility predicates.
//
// An unregistered action is free — the gate approves it with no cost.
// For registered actions the affordability check runs first, then the
// eligibility rules in declared order; the first failure supplies the
// denial reason. Authorization here is advisory (the check half of
// check/execute); the orchestrator re-runs it under the balance lock
// before debiting, which closes the race.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use tally_core::error::TallyError;
use tally_core::token::TokenType;

/// Eligibility predicates evaluated against an account snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum EligibilityRule {
    /// Account tier (derived fresh from balances) must be at least `tier`.
    MinTier { tier: u8 },
    /// Balance of `token` must be at least `amount` (smallest units).
    MinBalance { token: TokenType, amount: u64 },
    /// Account must hold at least `count` open (non-closed) stake positions.
    MinActivePositions { count: u32 },
}

/// One registered action's cost and gating rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCost {
    pub token: TokenType,
    /// Cost in smallest units of `token`.
    pub cost: u64,
    #[serde(default)]
    pub rules: Vec<EligibilityRule>,
}

/// Point-in-time view of one account, assembled by the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct AccountSnapshot {
    pub balances: HashMap<TokenType, u64>,
    /// Tier derived from `balances` at snapshot time (never cached).
    pub tier: u8,
    /// Number of open stake positions.
    pub active_positions: u32,
}

impl AccountSnapshot {
    pub fn balance(&self, token: TokenType) -> u64 {
        self.balances.get(&token).copied().unwrap_or(0)
    }
}

/// The gate's verdict for one (account, action) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authorization {
    pub approved: bool,
    /// Cost in smallest units; `None` for free (unregistered) actions.
    pub cost: Option<u64>,
    pub token: Option<TokenType>,
    /// Why the action was denied; `None` when approved.
    pub reason: Option<String>,
}

impl Authorization {
    fn free() -> Self {
        Self {
            approved: true,
            cost: None,
            token: None,
            reason: None,
        }
    }

    fn priced(def: &ActionCost, reason: Option<String>) -> Self {
        Self {
            approved: reason.is_none(),
            cost: Some(def.cost),
            token: Some(def.token),
            reason,
        }
    }
}

/// Static table of gated actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionGate {
    actions: HashMap<String, ActionCost>,
}

impl ActionGate {
    pub fn new(actions: HashMap<String, ActionCost>) -> Self {
        Self { actions }
    }

    /// Look up a registered action's definition. `UnknownAction` if the
    /// action is not in the table (note: `authorize` treats those as free;
    /// this lookup is for admin/introspection paths that need the entry).
    pub fn definition(&self, action: &str) -> Result<&ActionCost, TallyError> {
        self.actions
            .get(action)
            .ok_or_else(|| TallyError::UnknownAction(action.to_string()))
    }

    /// Evaluate affordability and eligibility for `action` against the
    /// given account snapshot.
    pub fn authorize(&self, action: &str, snapshot: &AccountSnapshot) -> Authorization {
        let def = match self.actions.get(action) {
            // Absence means the action is free.
            None => return Authorization::free(),
            Some(def) => def,
        };

        let available = snapshot.balance(def.token);
        if available < def.cost {
            return Authorization::priced(
                def,
                Some(format!(
                    "insufficient balance: have {}, need {}",
                    available, def.cost
                )),
            );
        }

        for rule in &def.rules {
            if let Some(reason) = Self::check_rule(rule, snapshot) {
                return Authorization::priced(def, Some(reason));
            }
        }

        Authorization::priced(def, None)
    }

    fn check_rule(rule: &EligibilityRule, snapshot: &AccountSnapshot) -> Option<String> {
        match rule {
            EligibilityRule::MinTier { tier } => {
                if snapshot.tier < *tier {
                    return Some(format!(
                        "requires tier {}, account is tier {}",
                        tier, snapshot.tier
                    ));
                }
            }
            EligibilityRule::MinBalance { token, amount } => {
                let held = snapshot.balance(*token);
                if held < *amount {
                    return Some(format!(
                        "requires at least {} {}, account holds {}",
                        amount, token, held
                    ));
                }
            }
            EligibilityRule::MinActivePositions { count } => {
                if snapshot.active_positions < *count {
                    return Some(format!(
                        "requires {} open stake positions, account has {}",
                        count, snapshot.active_positions
                    ));
                }
            }
        }
        None
    }
}

impl Default for ActionGate {
    /// The shipped action table. Spark costs are in hundredths.
    fn default() -> Self {
        let mut actions = HashMap::new();
        actions.insert(
            "boost_post".to_string(),
            ActionCost {
                token: TokenType::Spark,
                cost: 5_000,
                rules: Vec::new(),
            },
        );
        actions.insert(
            "custom_flair".to_string(),
            ActionCost {
                token: TokenType::Spark,
                cost: 25_000,
                rules: vec![EligibilityRule::MinTier { tier: 1 }],
            },
        );
        actions.insert(
            "open_stall".to_string(),
            ActionCost {
                token: TokenType::Spark,
                cost: 100_000,
                rules: vec![
                    EligibilityRule::MinTier { tier: 2 },
                    EligibilityRule::MinBalance {
                        token: TokenType::Honor,
                        amount: 25,
                    },
                ],
            },
        );
        Self { actions }
    }
}
