use std::time::Duration;

use crate::domain::Location;

/// Per-exchange request quota configuration.
///
/// The core never sleeps or retries; an exhausted quota surfaces immediately
/// with `retry_after` as the recommended delay for the calling layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangePolicy {
    pub location: Location,
    pub quota_window: Duration,
    pub quota_limit: u32,
    pub retry_after: Duration,
}

impl ExchangePolicy {
    /// BitMEX allows 120 requests per minute per account.
    pub fn bitmex_default() -> Self {
        Self {
            location: Location::Bitmex,
            quota_window: Duration::from_secs(60),
            quota_limit: 120,
            retry_after: Duration::from_secs(1),
        }
    }

    pub fn default_for(location: Location) -> Self {
        match location {
            Location::Bitmex => Self::bitmex_default(),
        }
    }
}
