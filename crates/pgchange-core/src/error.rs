use thiserror::Error;

/// Core error type for pgchange operations.
#[derive(Error, Debug)]
pub enum PgChangeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Migration {0} has already been run.")]
    AlreadyApplied(String),

    #[error(
        "Migration(s) {} have already been run but do not exist in the migrations directory.",
        .missing.join(", ")
    )]
    Drift { missing: Vec<String> },

    #[error("Unable to find migration {0}")]
    NotFound(String),

    #[error("Migration {name} failed: {message}")]
    Execution { name: String, message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

impl PgChangeError {
    /// Wrap a failure raised while a migration body was executing.
    pub fn execution(name: impl Into<String>, err: impl std::fmt::Display) -> Self {
        PgChangeError::Execution {
            name: name.into(),
            message: err.to_string(),
        }
    }
}

/// Result type alias using PgChangeError.
pub type Result<T> = std::result::Result<T, PgChangeError>;
