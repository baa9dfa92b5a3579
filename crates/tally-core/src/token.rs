// crates/tally-core/src/token.rs
//
// Token types and their static configuration.
//
// Tally is a closed-loop economy with three internal token types:
//   - Spark: the main earnable currency (2 decimal places, transferable)
//   - Crest: premium currency (0 decimal places, transferable)
//   - Honor: reputation points (0 decimal places, NOT transferable)
//
// All amounts are u64 values in the token's smallest unit. 1.00 Spark is
// 100 units. Integer accounting avoids floating-point precision issues in
// balance calculations.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The kinds of token tracked by the ledger.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Main earnable currency.
    Spark,
    /// Premium currency.
    Crest,
    /// Reputation points. Non-transferable by default.
    Honor,
}

impl TokenType {
    /// All token types, in canonical order.
    pub const ALL: [TokenType; 3] = [TokenType::Spark, TokenType::Crest, TokenType::Honor];
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Spark => write!(f, "spark"),
            TokenType::Crest => write!(f, "crest"),
            TokenType::Honor => write!(f, "honor"),
        }
    }
}

/// Static per-token configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Number of decimal places in the display representation.
    /// 2 means the smallest unit is one hundredth of a whole token.
    pub decimal_places: u32,
    /// Hard cap on any single (account, token) balance, in smallest units.
    pub max_balance: u64,
    /// Whether account-to-account transfers of this token are allowed.
    pub transferable: bool,
}

impl TokenConfig {
    /// Render an amount in smallest units as a whole-token decimal string.
    ///
    /// # Example
    /// A config with 2 decimal places renders 12345 as "123.45".
    pub fn format_amount(&self, amount: u64) -> String {
        if self.decimal_places == 0 {
            return amount.to_string();
        }
        let scale = 10u64.pow(self.decimal_places);
        let whole = amount / scale;
        let frac = amount % scale;
        format!(
            "{}.{:0width$}",
            whole,
            frac,
            width = self.decimal_places as usize
        )
    }
}

/// Registry of token configurations, keyed by token type.
///
/// Shipped with sensible defaults; overridable from the service TOML config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRegistry {
    configs: HashMap<TokenType, TokenConfig>,
}

impl TokenRegistry {
    /// Build a registry from an explicit config table.
    pub fn new(configs: HashMap<TokenType, TokenConfig>) -> Self {
        Self { configs }
    }

    /// Look up the configuration for a token type.
    ///
    /// Every `TokenType` variant is present in the default registry; a
    /// custom registry missing a variant falls back to the default config
    /// for that variant.
    pub fn config(&self, token: TokenType) -> TokenConfig {
        self.configs
            .get(&token)
            .cloned()
            .unwrap_or_else(|| default_config(token))
    }

    /// Whether transfers of the given token type are allowed.
    pub fn transferable(&self, token: TokenType) -> bool {
        self.config(token).transferable
    }

    /// The balance cap for the given token type, in smallest units.
    pub fn max_balance(&self, token: TokenType) -> u64 {
        self.config(token).max_balance
    }
}

fn default_config(token: TokenType) -> TokenConfig {
    match token {
        TokenType::Spark => TokenConfig {
            decimal_places: 2,
            max_balance: 1_000_000_000_000,
            transferable: true,
        },
        TokenType::Crest => TokenConfig {
            decimal_places: 0,
            max_balance: 1_000_000_000,
            transferable: true,
        },
        TokenType::Honor => TokenConfig {
            decimal_places: 0,
            max_balance: 1_000_000,
            transferable: false,
        },
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        let configs = TokenType::ALL
            .iter()
            .map(|&t| (t, default_config(t)))
            .collect();
        Self { configs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_covers_all_tokens() {
        let registry = TokenRegistry::default();
        for token in TokenType::ALL {
            assert!(registry.max_balance(token) > 0);
        }
    }

    #[test]
    fn test_honor_is_not_transferable() {
        let registry = TokenRegistry::default();
        assert!(registry.transferable(TokenType::Spark));
        assert!(registry.transferable(TokenType::Crest));
        assert!(!registry.transferable(TokenType::Honor));
    }

    #[test]
    fn test_format_amount_two_decimals() {
        let config = TokenRegistry::default().config(TokenType::Spark);
        assert_eq!(config.format_amount(12345), "123.45");
        assert_eq!(config.format_amount(5), "0.05");
        assert_eq!(config.format_amount(0), "0.00");
    }

    #[test]
    fn test_format_amount_zero_decimals() {
        let config = TokenRegistry::default().config(TokenType::Honor);
        assert_eq!(config.format_amount(42), "42");
    }

    #[test]
    fn test_missing_entry_falls_back_to_default() {
        let registry = TokenRegistry::new(HashMap::new());
        assert!(!registry.transferable(TokenType::Honor));
        assert_eq!(
            registry.config(TokenType::Spark),
            default_config(TokenType::Spark)
        );
    }
}
