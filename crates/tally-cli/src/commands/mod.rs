mod balances;
mod history;
mod validate_key;

use std::sync::Arc;

use serde::Serialize;
use tally_core::{
    BitmexAdapter, Credentials, MessageSink, ReqwestHttpClient, StaticAssetRegistry,
};

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<(), CliError> {
    let adapter = build_adapter()?;

    match &cli.command {
        Command::ValidateKey => validate_key::run(&adapter, cli.pretty).await,
        Command::Balances(args) => balances::run(&adapter, args, cli.pretty).await,
        Command::MarginHistory(args) => history::margin(&adapter, args, cli.pretty).await,
        Command::Movements(args) => history::movements(&adapter, args, cli.pretty).await,
    }
}

fn build_adapter() -> Result<BitmexAdapter, CliError> {
    let api_key =
        std::env::var("TALLY_BITMEX_API_KEY").map_err(|_| CliError::MissingCredentials)?;
    let secret =
        std::env::var("TALLY_BITMEX_API_SECRET").map_err(|_| CliError::MissingCredentials)?;

    Ok(BitmexAdapter::new(
        Credentials::new(api_key, secret.into_bytes()),
        Arc::new(ReqwestHttpClient::new()),
        Arc::new(StaticAssetRegistry::default()),
        Arc::new(StderrSink),
    ))
}

/// Mirrors batch warnings to the terminal as they surface.
struct StderrSink;

impl MessageSink for StderrSink {
    fn warn(&self, message: &str) {
        eprintln!("warning: {message}");
    }

    fn error(&self, message: &str) {
        eprintln!("error: {message}");
    }
}

pub(crate) fn render<T: Serialize>(value: &T, pretty: bool) -> Result<(), CliError> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{output}");
    Ok(())
}
