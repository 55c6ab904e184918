use tally_core::{BitmexAdapter, TimeWindow, UtcDateTime};

use crate::cli::WindowArgs;
use crate::error::CliError;

fn window(args: &WindowArgs) -> Result<TimeWindow, CliError> {
    let start = UtcDateTime::parse(&args.start)?;
    let end = UtcDateTime::parse(&args.end)?;
    Ok(TimeWindow::new(start, end)?)
}

pub async fn margin(
    adapter: &BitmexAdapter,
    args: &WindowArgs,
    pretty: bool,
) -> Result<(), CliError> {
    let collected = adapter.margin_history(window(args)?).await?;
    super::render(&collected, pretty)
}

pub async fn movements(
    adapter: &BitmexAdapter,
    args: &WindowArgs,
    pretty: bool,
) -> Result<(), CliError> {
    let collected = adapter.deposits_withdrawals(window(args)?).await?;
    super::render(&collected, pretty)
}
