// crates/tally-cli/src/commands/action.rs
//
// `tally action {check, execute}` — gated action commands.
//
// `check` is advisory and never touches the state file; `execute` debits
// the cost and appends a spend record.

use clap::Subcommand;

use tally_core::account::AccountId;

use crate::output::format_json;
use crate::state::CliContext;

/// Gated action subcommands.
#[derive(Debug, Subcommand)]
pub enum ActionCmd {
    /// Check whether an account can afford (and is eligible for) an action.
    Check {
        /// Account to check.
        #[arg(long)]
        account: String,
        /// Action name (e.g. boost_post).
        #[arg(long)]
        action: String,
    },
    /// Execute an action, debiting its cost.
    Execute {
        /// Account to debit.
        #[arg(long)]
        account: String,
        /// Action name (e.g. boost_post).
        #[arg(long)]
        action: String,
    },
}

pub fn run(ctx: &CliContext, cmd: &ActionCmd, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        ActionCmd::Check { account, action } => check(ctx, account, action, json),
        ActionCmd::Execute { account, action } => execute(ctx, account, action, json),
    }
}

fn check(
    ctx: &CliContext,
    account: &str,
    action: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let auth = ctx.orchestrator.check_action(&AccountId::from(account), action);

    if json {
        println!("{}", format_json(&auth));
        return Ok(());
    }

    match (auth.approved, auth.cost, auth.token) {
        (true, None, _) => println!("'{}' is a free action.", action),
        (true, Some(cost), Some(token)) => {
            let config = ctx.orchestrator.ledger().registry().config(token);
            println!(
                "'{}' is allowed: costs {} {}",
                action,
                config.format_amount(cost),
                token
            );
        }
        _ => {
            println!("'{}' is not allowed for {}.", action, account);
            if let Some(reason) = &auth.reason {
                println!("  Reason: {}", reason);
            }
        }
    }

    Ok(())
}

fn execute(
    ctx: &CliContext,
    account: &str,
    action: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = ctx
        .orchestrator
        .execute_action(&AccountId::from(account), action)?;
    ctx.save()?;

    if json {
        println!("{}", format_json(&outcome));
        return Ok(());
    }

    match (outcome.cost, outcome.token, outcome.new_balance, outcome.tx_id) {
        (Some(cost), Some(token), Some(balance), Some(tx_id)) => {
            let config = ctx.orchestrator.ledger().registry().config(token);
            println!(
                "Executed '{}': spent {} {}",
                action,
                config.format_amount(cost),
                token
            );
            println!(
                "  New balance: {} {}  (tx {})",
                config.format_amount(balance),
                token,
                tx_id
            );
        }
        _ => println!("Executed '{}' (free action, nothing debited).", action),
    }

    Ok(())
}
