//! The three bypass-persistence usernames (`flycast1`, `flycast2`, `dream`)
//! that receive a server-assigned `Player<N>` handle instead of anything
//! from the handle directory, and are rejected from `HANDLE_ADD` /
//! `HANDLE_REPLACE`.

use std::collections::HashMap;
use std::sync::Mutex;

use common::GameId;

pub const SYNTHETIC_USERS: [&str; 3] = ["flycast1", "flycast2", "dream"];

pub fn is_synthetic(user: &str) -> bool {
    SYNTHETIC_USERS.contains(&user)
}

/// Hands out `Player<N>` handles per title, `N` cycling through `1..=99`.
/// There is no persistent-connection hook at the Gate layer to release a
/// slot on disconnect (Gate is stateless request/response, not a live
/// session), so this is a rotating counter rather than a true occupancy
/// set — the same realisation choice as the upstream allocator, which had
/// no disconnect signal to act on either.
pub struct SyntheticAllocator {
    next: Mutex<HashMap<GameId, u32>>,
}

impl SyntheticAllocator {
    pub fn new() -> Self {
        Self {
            next: Mutex::new(HashMap::new()),
        }
    }

    pub fn allocate(&self, game: GameId) -> String {
        let mut next = self.next.lock().expect("synthetic allocator mutex poisoned");
        let slot = next.entry(game).or_insert(1);
        let n = *slot;
        *slot = if n >= 99 { 1 } else { n + 1 };
        format!("Player{n}")
    }
}

impl Default for SyntheticAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_the_fixed_synthetic_names() {
        assert!(is_synthetic("flycast1"));
        assert!(is_synthetic("dream"));
        assert!(!is_synthetic("alice"));
    }

    #[test]
    fn allocator_cycles_and_is_per_title() {
        let alloc = SyntheticAllocator::new();
        assert_eq!(alloc.allocate(GameId::Daytona), "Player1");
        assert_eq!(alloc.allocate(GameId::Daytona), "Player2");
        assert_eq!(alloc.allocate(GameId::Tetris), "Player1");
    }

    #[test]
    fn allocator_wraps_after_99() {
        let alloc = SyntheticAllocator::new();
        for _ in 1..99 {
            alloc.allocate(GameId::Daytona);
        }
        assert_eq!(alloc.allocate(GameId::Daytona), "Player99");
        assert_eq!(alloc.allocate(GameId::Daytona), "Player1");
    }
}
