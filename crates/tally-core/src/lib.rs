// crates/tally-core/src/lib.rs
//
// tally-core: Core types, token configuration, errors, and trait seams for
// the Tally reward ledger.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines the canonical data structures, the error taxonomy, and the
// injected capability traits (clock, authorization) used throughout Tally.
//
// All monetary values are tracked in the smallest unit of their token type
// (e.g. 1.00 Spark = 100 units at 2 decimal places). Integer arithmetic
// only; the ledger never touches floating point.

pub mod account;
pub mod clock;
pub mod error;
pub mod token;
pub mod traits;
pub mod tx;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use tally_core::TokenType;`

pub use account::{AccountId, BalanceKey};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::TallyError;
pub use token::{TokenConfig, TokenRegistry, TokenType};
pub use traits::{AllowAll, AuthorizationProvider};
pub use tx::{TransactionRecord, TxDraft, TxKind};
