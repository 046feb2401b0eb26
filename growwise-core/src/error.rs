use thiserror::Error;

#[derive(Error, Debug)]
pub enum GrowError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Provider unavailable (status {status:?}): {message}")]
    ProviderUnavailable {
        status: Option<u16>,
        message: String,
    },

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GrowError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// True for errors caused by the caller's input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::InvalidImage(_)
                | Self::NotFound(_)
                | Self::PayloadTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GrowError>;
