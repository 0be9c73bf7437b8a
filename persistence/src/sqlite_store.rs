//! SQLite-backed implementation of [`HandleStore`], the same storage engine
//! (and the same ~1s busy-timeout-then-fail-fast contention policy) as the
//! system this one replaces.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use common::GameId;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::errors::PersistenceError;
use crate::store::{HandleStore, MAX_BLOB_LEN};

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_path: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{database_path}"))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(1));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    #[cfg(test)]
    pub async fn connect_in_memory() -> Self {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite pool");
        let store = Self { pool };
        store.run_migrations().await.expect("run migrations");
        store
    }
}

#[async_trait]
impl HandleStore for SqliteStore {
    async fn create_handle(
        &self,
        game: GameId,
        user: &str,
        index: i64,
        handle: &str,
    ) -> Result<(), PersistenceError> {
        sqlx::query(
            "INSERT INTO user_handle (user_name, game, handle_index, handle) VALUES (?, ?, ?, ?)",
        )
        .bind(user)
        .bind(game as i64)
        .bind(index)
        .bind(handle)
        .execute(&self.pool)
        .await
        .map_err(PersistenceError::from_sqlx)?;
        Ok(())
    }

    async fn replace_handle(
        &self,
        game: GameId,
        user: &str,
        index: i64,
        handle: &str,
    ) -> Result<(), PersistenceError> {
        sqlx::query(
            "UPDATE user_handle SET handle = ? WHERE user_name = ? AND game = ? AND handle_index = ?",
        )
        .bind(handle)
        .bind(user)
        .bind(game as i64)
        .bind(index)
        .execute(&self.pool)
        .await
        .map_err(PersistenceError::from_sqlx)?;
        Ok(())
    }

    async fn delete_handle(
        &self,
        game: GameId,
        user: &str,
        index: i64,
    ) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await.map_err(PersistenceError::from_sqlx)?;

        sqlx::query(
            "DELETE FROM user_handle WHERE user_name = ? AND game = ? AND handle_index = ?",
        )
        .bind(user)
        .bind(game as i64)
        .bind(index)
        .execute(&mut *tx)
        .await
        .map_err(PersistenceError::from_sqlx)?;

        for i in (index + 1)..8 {
            let result = sqlx::query(
                "UPDATE user_handle SET handle_index = handle_index - 1 WHERE user_name = ? AND game = ? AND handle_index = ?",
            )
            .bind(user)
            .bind(game as i64)
            .bind(i)
            .execute(&mut *tx)
            .await
            .map_err(PersistenceError::from_sqlx)?;
            if result.rows_affected() == 0 {
                break;
            }
        }

        tx.commit().await.map_err(PersistenceError::from_sqlx)?;
        Ok(())
    }

    async fn list_handles(
        &self,
        game: GameId,
        user: &str,
        default: &str,
    ) -> Result<Vec<String>, PersistenceError> {
        let rows = sqlx::query(
            "SELECT handle FROM user_handle WHERE user_name = ? AND game = ? ORDER BY handle_index",
        )
        .bind(user)
        .bind(game as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(PersistenceError::from_sqlx)?;

        let mut handles: Vec<String> = rows.into_iter().map(|row| row.get(0)).collect();

        if handles.is_empty() && !default.is_empty() {
            match self.create_handle(game, user, 0, default).await {
                Ok(()) => handles.push(default.to_string()),
                Err(PersistenceError::AlreadyExists) => {}
                Err(other) => return Err(other),
            }
        }
        Ok(handles)
    }

    async fn get_blob(&self, game: GameId, user: &str) -> Result<Vec<u8>, PersistenceError> {
        let row = sqlx::query("SELECT extramem FROM user_extramem WHERE user_name = ? AND game = ?")
            .bind(user)
            .bind(game as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(PersistenceError::from_sqlx)?;
        Ok(row.map(|r| r.get(0)).unwrap_or_default())
    }

    async fn put_blob(
        &self,
        game: GameId,
        user: &str,
        offset: usize,
        data: &[u8],
    ) -> Result<(), PersistenceError> {
        let mut blob = self.get_blob(game, user).await?;
        let needed = (offset + data.len()).min(MAX_BLOB_LEN);
        let write_len = needed.saturating_sub(offset);
        if blob.len() < needed {
            blob.resize(needed, 0);
        }
        blob[offset..offset + write_len].copy_from_slice(&data[..write_len]);

        let existing =
            sqlx::query("SELECT 1 FROM user_extramem WHERE user_name = ? AND game = ?")
                .bind(user)
                .bind(game as i64)
                .fetch_optional(&self.pool)
                .await
                .map_err(PersistenceError::from_sqlx)?;

        if existing.is_some() {
            sqlx::query("UPDATE user_extramem SET extramem = ? WHERE user_name = ? AND game = ?")
                .bind(&blob)
                .bind(user)
                .bind(game as i64)
                .execute(&self.pool)
                .await
                .map_err(PersistenceError::from_sqlx)?;
        } else {
            sqlx::query(
                "INSERT INTO user_extramem (user_name, game, extramem) VALUES (?, ?, ?)",
            )
            .bind(user)
            .bind(game as i64)
            .bind(&blob)
            .execute(&self.pool)
            .await
            .map_err(PersistenceError::from_sqlx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_handle_is_already_exists() {
        let store = SqliteStore::connect_in_memory().await;
        store
            .create_handle(GameId::Daytona, "alice", 0, "BOB")
            .await
            .unwrap();
        let err = store
            .create_handle(GameId::Daytona, "carol", 0, "BOB")
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::AlreadyExists));
    }

    #[tokio::test]
    async fn delete_shifts_indices_down() {
        let store = SqliteStore::connect_in_memory().await;
        for (i, h) in ["A", "B", "C", "D"].iter().enumerate() {
            store
                .create_handle(GameId::Daytona, "alice", i as i64, h)
                .await
                .unwrap();
        }
        store.delete_handle(GameId::Daytona, "alice", 1).await.unwrap();
        let handles = store
            .list_handles(GameId::Daytona, "alice", "")
            .await
            .unwrap();
        assert_eq!(handles, vec!["A", "C", "D"]);
    }

    #[tokio::test]
    async fn list_handles_creates_default_when_empty() {
        let store = SqliteStore::connect_in_memory().await;
        let handles = store
            .list_handles(GameId::Daytona, "newuser", "newuser.us")
            .await
            .unwrap();
        assert_eq!(handles, vec!["newuser.us"]);
    }

    #[tokio::test]
    async fn blob_grows_on_write_and_reads_back() {
        let store = SqliteStore::connect_in_memory().await;
        store
            .put_blob(GameId::Daytona, "alice", 10, b"hello")
            .await
            .unwrap();
        let blob = store.get_blob(GameId::Daytona, "alice").await.unwrap();
        assert_eq!(blob.len(), 15);
        assert_eq!(&blob[10..15], b"hello");
    }

    #[tokio::test]
    async fn blob_growth_is_capped_at_max_len() {
        let store = SqliteStore::connect_in_memory().await;
        store
            .put_blob(GameId::Daytona, "alice", MAX_BLOB_LEN - 2, b"abcdef")
            .await
            .unwrap();
        let blob = store.get_blob(GameId::Daytona, "alice").await.unwrap();
        assert_eq!(blob.len(), MAX_BLOB_LEN);
    }

    #[tokio::test]
    async fn cross_title_handles_do_not_collide() {
        let store = SqliteStore::connect_in_memory().await;
        store
            .create_handle(GameId::Daytona, "alice", 0, "ZZZ")
            .await
            .unwrap();
        store
            .create_handle(GameId::Tetris, "bob", 0, "ZZZ")
            .await
            .unwrap();
        let a = store.list_handles(GameId::Daytona, "alice", "").await.unwrap();
        let b = store.list_handles(GameId::Tetris, "bob", "").await.unwrap();
        assert_eq!(a, vec!["ZZZ"]);
        assert_eq!(b, vec!["ZZZ"]);
    }
}
