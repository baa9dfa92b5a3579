// crates/tally-cli/src/main.rs
//
// CLI entrypoint for the Tally economy developer tools.
//
// Each invocation loads the economy state from a JSON snapshot file, runs
// one operation through the orchestrator, and writes the state back.
// Configuration (token caps, reward tables, pools, tiers) comes from an
// optional TOML file; anything unspecified uses the shipped defaults.

mod commands;
mod output;
mod state;

use clap::{Parser, Subcommand};
use commands::action::ActionCmd;
use commands::log::LogCmd;
use commands::stake::StakeCmd;

/// Tally CLI — closed-loop reward ledger tools.
#[derive(Parser, Debug)]
#[command(
    name = "tally",
    version = "0.1.0",
    about = "Tally CLI — earn, spend, stake, and transfer in a closed-loop token economy"
)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<String>,

    /// Path to the economy state file.
    #[arg(long, global = true, default_value = "tally_state.json")]
    state: String,

    /// Emit JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Credit the reward for an earning event.
    Grant {
        /// Account to credit.
        #[arg(long)]
        account: String,
        /// Registered event name (e.g. daily_login).
        #[arg(long)]
        event: String,
        /// Quality score 0..=100, required for range-based events.
        #[arg(long)]
        quality: Option<u8>,
    },

    /// Gated actions: check affordability, execute.
    #[command(subcommand)]
    Action(ActionCmd),

    /// Staking: add, claim, remove, positions.
    #[command(subcommand)]
    Stake(StakeCmd),

    /// Move tokens between two accounts.
    Transfer {
        /// Sending account.
        #[arg(long)]
        from: String,
        /// Receiving account.
        #[arg(long)]
        to: String,
        /// Token type: spark, crest, or honor.
        #[arg(long)]
        token: String,
        /// Amount in smallest units.
        #[arg(long)]
        amount: u64,
    },

    /// Show an account's balances, tier, and open positions.
    Balance {
        /// Account to inspect.
        #[arg(long)]
        account: String,
    },

    /// Transaction log: show, verify, archive.
    #[command(subcommand)]
    Log(LogCmd),
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = state::CliContext::open(cli.config.as_deref(), &cli.state)?;

    match &cli.command {
        Commands::Grant {
            account,
            event,
            quality,
        } => commands::grant::run(&ctx, account, event, *quality, cli.json)?,
        Commands::Action(cmd) => commands::action::run(&ctx, cmd, cli.json)?,
        Commands::Stake(cmd) => commands::stake::run(&ctx, cmd, cli.json)?,
        Commands::Transfer {
            from,
            to,
            token,
            amount,
        } => commands::transfer::run(&ctx, from, to, token, *amount, cli.json)?,
        Commands::Balance { account } => commands::balance::run(&ctx, account, cli.json)?,
        Commands::Log(cmd) => commands::log::run(&ctx, cmd, cli.json)?,
    }

    Ok(())
}
