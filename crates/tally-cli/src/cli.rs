use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;

/// Query exchange account balances and history as canonical events.
///
/// Credentials come from `TALLY_BITMEX_API_KEY` / `TALLY_BITMEX_API_SECRET`.
#[derive(Debug, Parser)]
#[command(name = "tally", version)]
pub struct Cli {
    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that the configured credentials are accepted by the exchange
    ValidateKey,
    /// Current holdings valued at the given spot price
    Balances(BalancesArgs),
    /// Closed margin positions within a time window
    MarginHistory(WindowArgs),
    /// Deposits and withdrawals within a time window
    Movements(WindowArgs),
}

#[derive(Debug, Args)]
pub struct BalancesArgs {
    /// USD spot price used to value the settlement asset
    #[arg(long)]
    pub spot_price: Decimal,
}

#[derive(Debug, Args)]
pub struct WindowArgs {
    /// Window start, inclusive (RFC3339, e.g. 2018-01-01T00:00:00Z)
    #[arg(long)]
    pub start: String,

    /// Window end, inclusive (RFC3339)
    #[arg(long)]
    pub end: String,
}
