use thiserror::Error;

/// Errors raised by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the row.
    #[error("unique constraint '{constraint}' violated")]
    UniqueViolation { constraint: String },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("migration failed: {0}")]
    Migration(String),
    #[error("database error: {0}")]
    Db(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return StoreError::UniqueViolation {
                    constraint: db.constraint().unwrap_or_default().to_string(),
                };
            }
        }
        StoreError::Db(err)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
