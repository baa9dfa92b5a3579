// crates/tally-policy/src/lib.rs
//
// tally-policy: the static rule tables of the Tally economy.
//
// Earning events map to token amounts (fixed or quality-scored ranges),
// spendable actions map to costs plus eligibility predicates, tiers derive
// from balances, and per-account call rates are bounded by hourly windows.
// All tables ship with defaults and deserialize from the service TOML
// config. Nothing in this crate mutates balances; policy decides, the
// orchestrator applies.

pub mod actions;
pub mod ratelimit;
pub mod rewards;
pub mod tier;

pub use actions::{AccountSnapshot, ActionCost, ActionGate, Authorization, EligibilityRule};
pub use ratelimit::{RateLimitConfig, RateLimiter};
pub use rewards::{GrantContext, RewardAmount, RewardPolicy, RewardRate};
pub use tier::{tier_for, TierSchedule, TierThreshold};
