// crates/tally-cli/src/commands/balance.rs
//
// `tally balance` — account balances, tier, and open position count.

use serde::Serialize;
use tabled::Tabled;

use tally_core::account::AccountId;
use tally_core::token::TokenType;

use crate::output::{format_json, format_table};
use crate::state::CliContext;

#[derive(Tabled)]
struct BalanceRow {
    #[tabled(rename = "TOKEN")]
    token: TokenType,
    #[tabled(rename = "BALANCE")]
    balance: String,
    #[tabled(rename = "UNITS")]
    units: u64,
}

#[derive(Serialize)]
struct BalanceReport {
    account: AccountId,
    tier: u8,
    balances: Vec<(TokenType, u64)>,
    open_positions: u32,
}

pub fn run(ctx: &CliContext, account: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let account = AccountId::from(account);
    let snapshot = ctx.orchestrator.account_snapshot(&account);
    let registry = ctx.orchestrator.ledger().registry();

    if json {
        let mut balances: Vec<(TokenType, u64)> = TokenType::ALL
            .iter()
            .map(|&token| (token, snapshot.balance(token)))
            .collect();
        balances.sort();
        let report = BalanceReport {
            account,
            tier: snapshot.tier,
            balances,
            open_positions: snapshot.active_positions,
        };
        println!("{}", format_json(&report));
        return Ok(());
    }

    let rows: Vec<BalanceRow> = TokenType::ALL
        .iter()
        .map(|&token| {
            let units = snapshot.balance(token);
            BalanceRow {
                token,
                balance: registry.config(token).format_amount(units),
                units,
            }
        })
        .collect();

    println!("Account: {}", account);
    println!("Tier:    {}", snapshot.tier);
    println!("{}", format_table(&rows));
    if snapshot.active_positions > 0 {
        println!(
            "Open stake positions: {} (see `tally stake positions`)",
            snapshot.active_positions
        );
    }

    Ok(())
}
