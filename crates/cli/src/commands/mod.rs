//! CLI subcommands.

pub mod catalog;
pub mod migrate;
pub mod orders;

use secrecy::SecretString;

/// Errors shared by the subcommands.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Input file could not be read.
    #[error("Could not read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Input file is not valid YAML for the expected shape.
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Input failed validation.
    #[error("{0}")]
    Invalid(String),

    /// The storefront rejected the operation.
    #[error(transparent)]
    Commerce(#[from] streetmerch_storefront::services::CommerceError),
}

/// Storefront database URL, `STOREFRONT_DATABASE_URL` first, then `DATABASE_URL`.
pub(crate) fn database_url() -> Result<SecretString, CommandError> {
    dotenvy::dotenv().ok();

    std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("STOREFRONT_DATABASE_URL"))
}
