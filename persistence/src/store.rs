use async_trait::async_trait;
use common::GameId;

use crate::errors::PersistenceError;

/// Maximum size of a per-(user, title) extra-mem blob.
pub const MAX_BLOB_LEN: usize = 0x2000;

/// The five operations the rest of the system needs from the persistent
/// store: handle directory CRUD plus the per-user blob.
#[async_trait]
pub trait HandleStore: Send + Sync {
    async fn create_handle(
        &self,
        game: GameId,
        user: &str,
        index: i64,
        handle: &str,
    ) -> Result<(), PersistenceError>;

    async fn replace_handle(
        &self,
        game: GameId,
        user: &str,
        index: i64,
        handle: &str,
    ) -> Result<(), PersistenceError>;

    /// Deletes the handle at `index`, then shifts every higher index for
    /// this (game, user) down by one within a single transaction.
    async fn delete_handle(
        &self,
        game: GameId,
        user: &str,
        index: i64,
    ) -> Result<(), PersistenceError>;

    /// Returns the ordered handle list for (game, user). If empty and
    /// `default` is non-empty, attempts to create it at index 0 first; a
    /// racing `AlreadyExists` from a concurrent creator is swallowed, and an
    /// empty list is returned in that case.
    async fn list_handles(
        &self,
        game: GameId,
        user: &str,
        default: &str,
    ) -> Result<Vec<String>, PersistenceError>;

    async fn get_blob(&self, game: GameId, user: &str) -> Result<Vec<u8>, PersistenceError>;

    /// Overwrites `data` at `offset` in the user's blob, growing it (up to
    /// [`MAX_BLOB_LEN`]) with zero bytes if necessary.
    async fn put_blob(
        &self,
        game: GameId,
        user: &str,
        offset: usize,
        data: &[u8],
    ) -> Result<(), PersistenceError>;
}
