// crates/tally-cli/src/commands/log.rs
//
// `tally log {show, verify, archive}` — transaction log commands.

use clap::Subcommand;
use tabled::Tabled;

use tally_core::tx::TransactionRecord;

use crate::output::{format_json, format_table};
use crate::state::CliContext;

/// Transaction log subcommands.
#[derive(Debug, Subcommand)]
pub enum LogCmd {
    /// Show the most recent log entries.
    Show {
        /// Maximum number of entries to display.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Replay the log and compare against stored balances.
    Verify,
    /// Fold entries up to an id into the archive snapshot.
    Archive {
        /// Archive every entry with id <= this value.
        #[arg(long)]
        through: u64,
    },
}

#[derive(Tabled)]
struct LogRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "ACCOUNT")]
    account: String,
    #[tabled(rename = "KIND")]
    kind: String,
    #[tabled(rename = "TOKEN")]
    token: String,
    #[tabled(rename = "AMOUNT")]
    amount: i64,
    #[tabled(rename = "BALANCE")]
    balance_after: u64,
    #[tabled(rename = "AT")]
    timestamp: String,
}

impl From<&TransactionRecord> for LogRow {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            id: record.id,
            account: record.account.to_string(),
            kind: record.kind.to_string(),
            token: record.token.to_string(),
            amount: record.signed_amount,
            balance_after: record.balance_after,
            timestamp: record.timestamp.to_rfc3339(),
        }
    }
}

pub fn run(ctx: &CliContext, cmd: &LogCmd, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        LogCmd::Show { limit } => show(ctx, *limit, json),
        LogCmd::Verify => verify(ctx),
        LogCmd::Archive { through } => archive(ctx, *through),
    }
}

fn show(ctx: &CliContext, limit: usize, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let entries = ctx.orchestrator.log().entries();
    let tail_start = entries.len().saturating_sub(limit);
    let tail = &entries[tail_start..];

    if json {
        println!("{}", format_json(&tail));
        return Ok(());
    }

    if let Some(snapshot) = ctx.orchestrator.log().archived_snapshot() {
        println!(
            "(entries through id {} are archived into a balance snapshot)",
            snapshot.through_id
        );
    }
    if tail.is_empty() {
        println!("The log is empty.");
        return Ok(());
    }

    let rows: Vec<LogRow> = tail.iter().map(LogRow::from).collect();
    println!("{}", format_table(&rows));

    Ok(())
}

fn verify(ctx: &CliContext) -> Result<(), Box<dyn std::error::Error>> {
    ctx.orchestrator.verify_replay()?;
    println!("OK: replaying the log reproduces every stored balance.");
    Ok(())
}

fn archive(ctx: &CliContext, through: u64) -> Result<(), Box<dyn std::error::Error>> {
    ctx.orchestrator.log().archive_through(through)?;
    ctx.save()?;
    println!("Archived entries through id {}.", through);
    Ok(())
}
