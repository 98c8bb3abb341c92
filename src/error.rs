use thiserror::Error;

/// SQLSTATE codes the store classifies explicitly.
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";
const INTEGRITY_CONSTRAINT_CLASS: &str = "23";
const STRING_DATA_RIGHT_TRUNCATION: &str = "22001";
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique, foreign key or check constraint violated, or a value too large
    /// for its column.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The store aborted this transaction in favour of a concurrent one.
    #[error("Serialization failure: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// Failure of a store backend that does not speak SQL.
    #[error("Store error: {0}")]
    Store(String),

    #[error("{source}; rollback failed: {rollback}")]
    Rollback {
        source: Box<AppError>,
        rollback: Box<AppError>,
    },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Coarse class used by the request layer to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed or unacceptable request.
    Invalid,
    NotFound,
    /// Safe to retry once the caller has a deduplication key.
    Transient,
    Internal,
}

impl AppError {
    pub fn class(&self) -> ErrorClass {
        match self {
            AppError::Validation(_) => ErrorClass::Invalid,
            AppError::NotFound(_) => ErrorClass::NotFound,
            AppError::Conflict(_) | AppError::Serialization(_) | AppError::Cancelled(_) => {
                ErrorClass::Transient
            }
            AppError::Rollback { .. }
            | AppError::Database(_)
            | AppError::Store(_)
            | AppError::Config(_)
            | AppError::Migration(_)
            | AppError::Internal(_) => ErrorClass::Internal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Short label used for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Serialization(_) => "serialization",
            AppError::Database(_) => "database",
            AppError::Store(_) => "store",
            AppError::Rollback { .. } => "rollback",
            AppError::Cancelled(_) => "cancelled",
            AppError::Config(_) => "config",
            AppError::Migration(_) => "migration",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = err {
            return AppError::NotFound("row not found".to_string());
        }

        let code = err
            .as_database_error()
            .and_then(|db| db.code())
            .map(|code| code.into_owned());

        match code.as_deref() {
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) | Some(LOCK_NOT_AVAILABLE) => {
                tracing::debug!(sqlstate = ?code, "classified store error as serialization failure");
                AppError::Serialization(err.to_string())
            }
            Some(c)
                if c.starts_with(INTEGRITY_CONSTRAINT_CLASS)
                    || c == STRING_DATA_RIGHT_TRUNCATION
                    || c == NUMERIC_VALUE_OUT_OF_RANGE =>
            {
                tracing::debug!(sqlstate = c, "classified store error as conflict");
                AppError::Conflict(err.to_string())
            }
            _ => AppError::Database(err),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}
