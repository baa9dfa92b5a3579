// crates/tally-policy/src/rewards.rs
//
// Reward policy: the static table mapping named earning events to token
// amounts.
//
// Range-based events resolve through a caller-supplied quality score
// (0..=100) from an external scoring collaborator:
//
//     amount = min + (max - min) * quality / 100    (integer floor)
//
// The policy never generates randomness; identical inputs always resolve
// to identical amounts.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use tally_core::error::TallyError;
use tally_core::token::TokenType;

/// How an event's amount is determined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RewardAmount {
    /// Always the same amount (smallest units).
    Fixed(u64),
    /// Scaled linearly by the caller-supplied quality score.
    QualityRange { min: u64, max: u64 },
}

/// One earning event's reward configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRate {
    pub token: TokenType,
    pub amount: RewardAmount,
}

/// Caller-supplied context for a grant.
///
/// `quality` comes from a separate scoring collaborator, never from inside
/// the ledger. Required for range-based events, ignored for fixed ones.
#[derive(Debug, Clone, Default)]
pub struct GrantContext {
    /// Quality score in 0..=100.
    pub quality: Option<u8>,
    /// Free-form metadata carried into the transaction record.
    pub metadata: serde_json::Value,
}

impl GrantContext {
    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality: Some(quality),
            metadata: serde_json::Value::Null,
        }
    }
}

/// Static table of earning events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardPolicy {
    rates: HashMap<String, RewardRate>,
}

impl RewardPolicy {
    pub fn new(rates: HashMap<String, RewardRate>) -> Self {
        Self { rates }
    }

    /// The registered event names.
    pub fn event_names(&self) -> Vec<&str> {
        self.rates.keys().map(String::as_str).collect()
    }

    /// Look up an event's rate. `UnknownEvent` if unregistered.
    pub fn rate(&self, event: &str) -> Result<&RewardRate, TallyError> {
        self.rates
            .get(event)
            .ok_or_else(|| TallyError::UnknownEvent(event.to_string()))
    }

    /// Resolve the amount (and token) an event grants under `ctx`.
    ///
    /// # Errors
    /// - `UnknownEvent` for an unregistered event name.
    /// - `Validation` if a range event has no quality score, the score is
    ///   above 100, or the configured range is inverted.
    pub fn amount_for(
        &self,
        event: &str,
        ctx: &GrantContext,
    ) -> Result<(TokenType, u64), TallyError> {
        let rate = self.rate(event)?;
        let amount = match rate.amount {
            RewardAmount::Fixed(amount) => amount,
            RewardAmount::QualityRange { min, max } => {
                if max < min {
                    return Err(TallyError::Validation(format!(
                        "event {} has an inverted reward range [{}, {}]",
                        event, min, max
                    )));
                }
                let quality = ctx.quality.ok_or_else(|| {
                    TallyError::Validation(format!(
                        "event {} requires a quality score",
                        event
                    ))
                })?;
                if quality > 100 {
                    return Err(TallyError::Validation(format!(
                        "quality score {} is out of range 0..=100",
                        quality
                    )));
                }
                let span = (max - min) as u128;
                min + (span * quality as u128 / 100) as u64
            }
        };
        Ok((rate.token, amount))
    }
}

impl Default for RewardPolicy {
    /// The shipped earning events. Spark amounts are in hundredths
    /// (2 decimal places).
    fn default() -> Self {
        let mut rates = HashMap::new();
        rates.insert(
            "daily_login".to_string(),
            RewardRate {
                token: TokenType::Spark,
                amount: RewardAmount::Fixed(1_000),
            },
        );
        rates.insert(
            "content_submission".to_string(),
            RewardRate {
                token: TokenType::Spark,
                amount: RewardAmount::QualityRange {
                    min: 1_000,
                    max: 5_000,
                },
            },
        );
        rates.insert(
            "peer_endorsement".to_string(),
            RewardRate {
                token: TokenType::Honor,
                amount: RewardAmount::Fixed(5),
            },
        );
        rates.insert(
            "referral".to_string(),
            RewardRate {
                token: TokenType::Spark,
                amount: RewardAmount::Fixed(10_000),
            },
        );
        Self { rates }
    }
}
