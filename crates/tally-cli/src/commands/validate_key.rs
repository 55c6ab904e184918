use serde_json::json;
use tally_core::{ApiKeyValidity, BitmexAdapter};

use crate::error::CliError;

pub async fn run(adapter: &BitmexAdapter, pretty: bool) -> Result<(), CliError> {
    let validity = adapter.check_api_key().await?;
    let output = match &validity {
        ApiKeyValidity::Valid => json!({"valid": true}),
        ApiKeyValidity::Invalid { reason } => json!({"valid": false, "reason": reason}),
    };
    super::render(&output, pretty)
}
