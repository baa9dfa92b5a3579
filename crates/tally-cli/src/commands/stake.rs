// crates/tally-cli/src/commands/stake.rs
//
// `tally stake {add, claim, remove, positions}` — staking commands.

use clap::Subcommand;
use tabled::Tabled;
use uuid::Uuid;

use tally_core::account::AccountId;
use tally_staking::position::StakePosition;

use crate::commands::parse_pool;
use crate::output::{format_json, format_table};
use crate::state::CliContext;

/// Staking subcommands.
#[derive(Debug, Subcommand)]
pub enum StakeCmd {
    /// Escrow spendable balance into a pool.
    Add {
        /// Account that stakes.
        #[arg(long)]
        account: String,
        /// Pool name: basic, extended, or premium.
        #[arg(long)]
        pool: String,
        /// Amount in smallest units.
        #[arg(long)]
        amount: u64,
    },
    /// Claim accrued yield across all open positions.
    Claim {
        /// Account that claims.
        #[arg(long)]
        account: String,
    },
    /// Close an unlockable position and return its principal.
    Remove {
        /// Account that unstakes.
        #[arg(long)]
        account: String,
        /// Position id (UUID).
        #[arg(long)]
        position: Uuid,
    },
    /// List an account's open positions.
    Positions {
        /// Account to inspect.
        #[arg(long)]
        account: String,
    },
}

#[derive(Tabled)]
struct PositionRow {
    #[tabled(rename = "POSITION")]
    id: Uuid,
    #[tabled(rename = "POOL")]
    pool: String,
    #[tabled(rename = "AMOUNT")]
    amount: u64,
    #[tabled(rename = "UNLOCKS")]
    unlock_at: String,
}

impl From<&StakePosition> for PositionRow {
    fn from(position: &StakePosition) -> Self {
        Self {
            id: position.id,
            pool: position.pool.to_string(),
            amount: position.amount,
            unlock_at: position.unlock_at.to_rfc3339(),
        }
    }
}

pub fn run(ctx: &CliContext, cmd: &StakeCmd, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        StakeCmd::Add {
            account,
            pool,
            amount,
        } => add(ctx, account, pool, *amount, json),
        StakeCmd::Claim { account } => claim(ctx, account, json),
        StakeCmd::Remove { account, position } => remove(ctx, account, *position, json),
        StakeCmd::Positions { account } => positions(ctx, account, json),
    }
}

fn add(
    ctx: &CliContext,
    account: &str,
    pool: &str,
    amount: u64,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let pool = parse_pool(pool)?;
    let outcome = ctx
        .orchestrator
        .stake(&AccountId::from(account), pool, amount)?;
    ctx.save()?;

    if json {
        println!("{}", format_json(&outcome));
        return Ok(());
    }

    println!("Staked {} into the {} pool.", amount, pool);
    println!("  Position: {}", outcome.position_id);
    println!("  Unlocks:  {}", outcome.unlock_at.to_rfc3339());
    println!(
        "  Remaining spendable balance: {}  (tx {})",
        outcome.new_balance, outcome.tx_id
    );

    Ok(())
}

fn claim(ctx: &CliContext, account: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = ctx
        .orchestrator
        .claim_staking_rewards(&AccountId::from(account))?;
    ctx.save()?;

    if json {
        println!("{}", format_json(&outcome));
        return Ok(());
    }

    if outcome.claimed.is_empty() {
        println!("Nothing accrued yet.");
        return Ok(());
    }

    let registry = ctx.orchestrator.ledger().registry();
    for (token, amount) in &outcome.claimed {
        let config = registry.config(*token);
        println!(
            "Claimed {} {} (new balance {})",
            config.format_amount(*amount),
            token,
            config.format_amount(outcome.new_balances[token])
        );
    }

    Ok(())
}

fn remove(
    ctx: &CliContext,
    account: &str,
    position: Uuid,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = ctx.orchestrator.unstake(&AccountId::from(account), position)?;
    ctx.save()?;

    if json {
        println!("{}", format_json(&outcome));
        return Ok(());
    }

    println!("Closed position {}.", position);
    println!("  Principal returned: {}", outcome.principal_returned);
    println!("  Rewards claimed:    {}", outcome.rewards_claimed);
    println!(
        "  New balance:        {}  (tx {})",
        outcome.new_balance, outcome.tx_id
    );

    Ok(())
}

fn positions(ctx: &CliContext, account: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let positions = ctx.orchestrator.open_positions(&AccountId::from(account));

    if json {
        println!("{}", format_json(&positions));
        return Ok(());
    }

    if positions.is_empty() {
        println!("No open positions for {}.", account);
        return Ok(());
    }

    let rows: Vec<PositionRow> = positions.iter().map(PositionRow::from).collect();
    println!("{}", format_table(&rows));

    Ok(())
}
