// crates/tally-cli/src/commands/grant.rs
//
// `tally grant` — credit the reward for an earning event.

use tally_core::account::AccountId;
use tally_policy::rewards::GrantContext;

use crate::output::format_json;
use crate::state::CliContext;

pub fn run(
    ctx: &CliContext,
    account: &str,
    event: &str,
    quality: Option<u8>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let account = AccountId::from(account);
    let grant_ctx = match quality {
        Some(quality) => GrantContext::with_quality(quality),
        None => GrantContext::default(),
    };

    let outcome = ctx.orchestrator.grant(&account, event, &grant_ctx)?;
    ctx.save()?;

    if json {
        println!("{}", format_json(&outcome));
        return Ok(());
    }

    let config = ctx.orchestrator.ledger().registry().config(outcome.token);
    println!(
        "Granted {} {} to {} for '{}'",
        config.format_amount(outcome.amount),
        outcome.token,
        account,
        event
    );
    println!(
        "  New balance: {} {}  (tx {})",
        config.format_amount(outcome.new_balance),
        outcome.token,
        outcome.tx_id
    );

    Ok(())
}
