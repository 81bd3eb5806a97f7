use thiserror::Error;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Not found")]
    NotFound,
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Internal error")]
    Internal,
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Stable label used in logs and metric attributes.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Database(_) => "database",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound => "not_found",
            Self::PermissionDenied(_) => "permission_denied",
            Self::InvalidState(_) => "invalid_state",
            Self::Internal => "internal",
        }
    }

    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        self.db_code().as_deref() == Some(UNIQUE_VIOLATION)
    }

    #[must_use]
    pub fn is_foreign_key_violation(&self) -> bool {
        self.db_code().as_deref() == Some(FOREIGN_KEY_VIOLATION)
    }

    fn db_code(&self) -> Option<String> {
        match self {
            Self::Database(sqlx::Error::Database(e)) => e.code().map(|c| c.into_owned()),
            _ => None,
        }
    }
}
