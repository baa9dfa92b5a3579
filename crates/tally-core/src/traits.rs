// crates/tally-core/src/traits.rs

use crate::account::AccountId;

/// External approval gate consulted before committing any grant or spend.
///
/// Implemented by an external collaborator (moderation service, fraud
/// checks, feature flags). The orchestrator calls it synchronously and
/// never depends on how approval is decided.
pub trait AuthorizationProvider: Send + Sync {
    /// Return `true` to allow `operation` (e.g. "grant", "execute_action")
    /// for `account` to proceed.
    fn approve(&self, account: &AccountId, operation: &str) -> bool;
}

/// Default provider that approves everything.
#[derive(Debug, Default)]
pub struct AllowAll;

impl AuthorizationProvider for AllowAll {
    fn approve(&self, _account: &AccountId, _operation: &str) -> bool {
        true
    }
}
