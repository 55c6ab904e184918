use tally_core::{BitmexAdapter, StaticPriceOracle};

use crate::cli::BalancesArgs;
use crate::error::CliError;

pub async fn run(
    adapter: &BitmexAdapter,
    args: &BalancesArgs,
    pretty: bool,
) -> Result<(), CliError> {
    let oracle = StaticPriceOracle::new().with_price("BTC", args.spot_price);
    let balances = adapter.balances(&oracle).await?;
    super::render(&balances, pretty)
}
