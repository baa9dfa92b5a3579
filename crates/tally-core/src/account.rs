// crates/tally-core/src/account.rs
//
// Account identifiers and balance keys.
//
// The caller's account id is authenticated by an external collaborator
// before it reaches the ledger; here it is an opaque string.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::token::TokenType;

/// Opaque account identifier.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Key of a single balance cell: one account's holding of one token type.
///
/// `Ord` is derived so operations touching several keys can always acquire
/// locks in one canonical (sorted) order.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BalanceKey {
    pub account: AccountId,
    pub token: TokenType,
}

impl BalanceKey {
    pub fn new(account: impl Into<AccountId>, token: TokenType) -> Self {
        Self {
            account: account.into(),
            token,
        }
    }
}

impl fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.token)
    }
}
