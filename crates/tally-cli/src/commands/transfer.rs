// crates/tally-cli/src/commands/transfer.rs
//
// `tally transfer` — move tokens between two accounts.

use tally_core::account::AccountId;

use crate::commands::parse_token;
use crate::output::format_json;
use crate::state::CliContext;

pub fn run(
    ctx: &CliContext,
    from: &str,
    to: &str,
    token: &str,
    amount: u64,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let token = parse_token(token)?;
    let outcome = ctx.orchestrator.transfer(
        &AccountId::from(from),
        &AccountId::from(to),
        token,
        amount,
    )?;
    ctx.save()?;

    if json {
        println!("{}", format_json(&outcome));
        return Ok(());
    }

    let config = ctx.orchestrator.ledger().registry().config(token);
    println!(
        "Transferred {} {} from {} to {}  (tx {})",
        config.format_amount(amount),
        token,
        from,
        to,
        outcome.tx_id
    );
    println!("  {}: {}", from, config.format_amount(outcome.from_balance));
    println!("  {}: {}", to, config.format_amount(outcome.to_balance));

    Ok(())
}
