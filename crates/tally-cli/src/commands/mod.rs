// crates/tally-cli/src/commands/mod.rs
//
// Command module declarations and shared argument parsing.

pub mod action;
pub mod balance;
pub mod grant;
pub mod log;
pub mod stake;
pub mod transfer;

use tally_core::token::TokenType;
use tally_staking::pool::PoolType;

/// Parse a token name argument.
pub fn parse_token(name: &str) -> Result<TokenType, Box<dyn std::error::Error>> {
    match name.to_ascii_lowercase().as_str() {
        "spark" => Ok(TokenType::Spark),
        "crest" => Ok(TokenType::Crest),
        "honor" => Ok(TokenType::Honor),
        other => Err(format!("unknown token '{}' (expected spark, crest, or honor)", other).into()),
    }
}

/// Parse a staking pool name argument.
pub fn parse_pool(name: &str) -> Result<PoolType, Box<dyn std::error::Error>> {
    match name.to_ascii_lowercase().as_str() {
        "basic" => Ok(PoolType::Basic),
        "extended" => Ok(PoolType::Extended),
        "premium" => Ok(PoolType::Premium),
        other => Err(format!(
            "unknown pool '{}' (expected basic, extended, or premium)",
            other
        )
        .into()),
    }
}
