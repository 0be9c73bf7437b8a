//! Handle-directory operations the Gate's request handlers call through to
//! [`persistence::HandleStore`], plus the sanitisation rule for
//! server-derived default handles.

use common::title::{sanitize_default_handle, Title};
use persistence::{HandleStore, PersistenceError};

use crate::synthetic::{is_synthetic, SyntheticAllocator};

/// Distinguishes the two ways a handle can collide, since the Gate replies
/// with different (but client-indistinguishable) opcodes for each: a
/// collision against some other user's handle, versus a rename target that
/// is already one of the *same* user's own other handle slots.
#[derive(Debug)]
pub enum HandleError {
    AlreadyExists,
    OwnHandleCollision,
    Persistence(PersistenceError),
}

impl From<PersistenceError> for HandleError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::AlreadyExists => HandleError::AlreadyExists,
            other => HandleError::Persistence(other),
        }
    }
}

/// Lists handles for `user`, synthesising a single `Player<N>` handle for
/// the bypass usernames instead of touching the store.
pub async fn list_handles(
    store: &dyn HandleStore,
    synth: &SyntheticAllocator,
    title: &Title,
    user: &str,
) -> Result<Vec<String>, PersistenceError> {
    if is_synthetic(user) {
        return Ok(vec![synth.allocate(title.id)]);
    }
    let default = sanitize_default_handle(title, user);
    store.list_handles(title.id, user, &default).await
}

pub async fn add_handle(
    store: &dyn HandleStore,
    title: &Title,
    user: &str,
    index: i64,
    handle: &str,
) -> Result<(), HandleError> {
    if is_synthetic(user) {
        return Err(HandleError::AlreadyExists);
    }
    store.create_handle(title.id, user, index, handle).await?;
    Ok(())
}

/// Replaces the handle at `index`. A rename target already held by one of
/// this same user's *other* handle slots is reported as
/// [`HandleError::OwnHandleCollision`] rather than the generic
/// `AlreadyExists`, even though both currently render identically to the
/// client — the distinction matters if a future reply diverges.
pub async fn replace_handle(
    store: &dyn HandleStore,
    title: &Title,
    user: &str,
    index: i64,
    handle: &str,
) -> Result<(), HandleError> {
    if is_synthetic(user) {
        return Err(HandleError::AlreadyExists);
    }
    let existing = store.list_handles(title.id, user, "").await?;
    let collides_with_self = existing
        .iter()
        .enumerate()
        .any(|(i, h)| i as i64 != index && h == handle);
    if collides_with_self {
        return Err(HandleError::OwnHandleCollision);
    }
    store.replace_handle(title.id, user, index, handle).await?;
    Ok(())
}

pub async fn delete_handle(
    store: &dyn HandleStore,
    title: &Title,
    user: &str,
    index: i64,
) -> Result<(), PersistenceError> {
    store.delete_handle(title.id, user, index).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::GameId;
    use persistence::SqliteStore;

    fn title() -> &'static Title {
        Title::for_id(GameId::Daytona)
    }

    #[tokio::test]
    async fn synthetic_user_never_touches_the_store() {
        let store = SqliteStore::connect_in_memory().await;
        let synth = SyntheticAllocator::new();
        let handles = list_handles(&store, &synth, title(), "dream").await.unwrap();
        assert_eq!(handles, vec!["Player1".to_string()]);
    }

    #[tokio::test]
    async fn add_then_duplicate_reports_already_exists() {
        let store = SqliteStore::connect_in_memory().await;
        add_handle(&store, title(), "alice", 0, "BOB").await.unwrap();
        let err = add_handle(&store, title(), "carol", 0, "BOB").await.unwrap_err();
        assert!(matches!(err, HandleError::AlreadyExists));
    }

    #[tokio::test]
    async fn synthetic_user_rejected_from_add() {
        let store = SqliteStore::connect_in_memory().await;
        let err = add_handle(&store, title(), "dream", 0, "X").await.unwrap_err();
        assert!(matches!(err, HandleError::AlreadyExists));
    }

    #[tokio::test]
    async fn replace_against_own_other_handle_is_own_collision() {
        let store = SqliteStore::connect_in_memory().await;
        add_handle(&store, title(), "alice", 0, "A").await.unwrap();
        add_handle(&store, title(), "alice", 1, "B").await.unwrap();
        let err = replace_handle(&store, title(), "alice", 0, "B").await.unwrap_err();
        assert!(matches!(err, HandleError::OwnHandleCollision));
    }

    #[tokio::test]
    async fn replace_against_another_users_handle_is_already_exists() {
        let store = SqliteStore::connect_in_memory().await;
        add_handle(&store, title(), "alice", 0, "A").await.unwrap();
        add_handle(&store, title(), "carol", 0, "C").await.unwrap();
        let err = replace_handle(&store, title(), "carol", 0, "A").await.unwrap_err();
        assert!(matches!(err, HandleError::AlreadyExists));
    }
}
