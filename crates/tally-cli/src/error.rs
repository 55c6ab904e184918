use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("TALLY_BITMEX_API_KEY and TALLY_BITMEX_API_SECRET must be set")]
    MissingCredentials,

    #[error(transparent)]
    Validation(#[from] tally_core::ValidationError),

    #[error(transparent)]
    Remote(#[from] tally_core::RemoteError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::MissingCredentials | Self::Validation(_) => 2,
            Self::Remote(_) => 6,
            Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}
