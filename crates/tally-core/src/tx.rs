// crates/tally-core/src/tx.rs
//
// Transaction records: the immutable entries of the append-only log.
//
// `signed_amount` is the delta applied to the spendable balance: positive
// for credits (grant, transfer-in, unstake principal return, reward),
// negative for debits (spend, transfer-out, stake escrow).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::account::AccountId;
use crate::token::TokenType;

/// The kind of balance-affecting operation a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TxKind {
    /// Credit issued for a recognized earning event.
    Grant,
    /// Debit paid to execute a gated action.
    Spend,
    /// Debit side of an account-to-account transfer.
    TransferOut,
    /// Credit side of an account-to-account transfer.
    TransferIn,
    /// Debit of spendable balance into staking escrow.
    Stake,
    /// Return of escrowed principal to the spendable balance.
    Unstake,
    /// Newly minted staking yield.
    Reward,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxKind::Grant => "grant",
            TxKind::Spend => "spend",
            TxKind::TransferOut => "transfer-out",
            TxKind::TransferIn => "transfer-in",
            TxKind::Stake => "stake",
            TxKind::Unstake => "unstake",
            TxKind::Reward => "reward",
        };
        write!(f, "{}", s)
    }
}

/// One immutable entry of the transaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Monotonically increasing log id, assigned by the log on append.
    pub id: u64,
    pub account: AccountId,
    pub kind: TxKind,
    pub token: TokenType,
    /// Signed delta in smallest units. Never zero.
    pub signed_amount: i64,
    /// Spendable balance of (account, token) immediately after this entry.
    pub balance_after: u64,
    pub timestamp: DateTime<Utc>,
    /// Free-form context: event name, action name, counterparty, position id.
    pub metadata: serde_json::Value,
}

/// A record minus its id — what callers hand to `TransactionLog::append`.
#[derive(Debug, Clone)]
pub struct TxDraft {
    pub account: AccountId,
    pub kind: TxKind,
    pub token: TokenType,
    pub signed_amount: i64,
    pub balance_after: u64,
    pub timestamp: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

impl TxDraft {
    /// Attach a log id, producing the immutable record.
    pub fn into_record(self, id: u64) -> TransactionRecord {
        TransactionRecord {
            id,
            account: self.account,
            kind: self.kind,
            token: self.token,
            signed_amount: self.signed_amount,
            balance_after: self.balance_after,
            timestamp: self.timestamp,
            metadata: self.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display_matches_serde_tag() {
        let kind = TxKind::TransferOut;
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, format!("\"{}\"", kind));
    }

    #[test]
    fn test_draft_into_record_preserves_fields() {
        let draft = TxDraft {
            account: AccountId::from("alice"),
            kind: TxKind::Grant,
            token: TokenType::Spark,
            signed_amount: 50,
            balance_after: 50,
            timestamp: Utc::now(),
            metadata: serde_json::json!({"event": "daily_login"}),
        };
        let record = draft.clone().into_record(7);
        assert_eq!(record.id, 7);
        assert_eq!(record.signed_amount, draft.signed_amount);
        assert_eq!(record.balance_after, draft.balance_after);
        assert_eq!(record.metadata["event"], "daily_login");
    }
}
