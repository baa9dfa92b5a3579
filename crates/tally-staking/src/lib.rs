// crates/tally-staking/src/lib.rs
//
// tally-staking: pools, positions, and yield accrual.
//
// Staking escrows spendable balance into a position (value-preserving
// reservation, not destruction). Positions are immutable in amount once
// created; additional stake means a new position. Yield accrues
// time-proportionally against the pool's APY and always truncates
// downward, so a pool is never shown to owe more than its stated rate.
//
// Position lifecycle: Active -> Unlockable (time-triggered) -> Closed
// (on unstake). No other transitions exist.

pub mod engine;
pub mod pool;
pub mod position;

pub use engine::{StakingEngine, UnstakeQuote};
pub use pool::{PoolConfig, PoolType, StakingConfig};
pub use position::{accrued_reward, PositionState, StakePosition, SECONDS_PER_YEAR};
