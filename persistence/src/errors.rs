use thiserror::Error;

/// Errors surfaced by the handle directory and blob store. The dispatcher
/// cares about exactly one distinction: `AlreadyExists` vs everything else.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("handle already in use")]
    AlreadyExists,
    #[error("persistence backend error: {0}")]
    Backend(#[from] sqlx::Error),
}

impl PersistenceError {
    /// Maps a raw backend error into `AlreadyExists` when it's a unique
    /// constraint violation, matching the `SQLITE_CONSTRAINT_UNIQUE` mapping
    /// this store's semantics are grounded on.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return PersistenceError::AlreadyExists;
            }
        }
        PersistenceError::Backend(err)
    }
}
