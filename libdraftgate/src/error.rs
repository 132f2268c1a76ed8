//! Error types for Draftgate

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DraftgateError>;

#[derive(Error, Debug)]
pub enum DraftgateError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Publish failed: {0}")]
    Publish(#[from] PublishError),

    #[error("Scheduler unavailable: {0}")]
    SchedulerUnavailable(String),

    #[error("A record with id {0} already exists")]
    AlreadyExists(String),

    #[error("Policy denied: {0}")]
    PolicyDenied(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl DraftgateError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            DraftgateError::InvalidInput(_) => 3,
            DraftgateError::PolicyDenied(_) => 3,
            DraftgateError::Publish(PublishError::Credentials(_)) => 2,
            DraftgateError::Publish(_) => 1,
            DraftgateError::SchedulerUnavailable(_) => 1,
            DraftgateError::AlreadyExists(_) => 1,
            DraftgateError::Config(_) => 1,
            DraftgateError::Store(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone)]
pub enum PublishError {
    #[error("Missing or invalid credentials: {0}")]
    Credentials(String),

    #[error("Publisher API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),
}
