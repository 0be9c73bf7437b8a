//! Bounded-parallelism webhook poster. Mirrors the upstream behaviour this
//! system replaces closely enough to be surprising: the "player joined
//! lobby" rate limit is a single global timer shared across every title, not
//! one per lobby or per title.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::GameId;
use tokio::sync::Mutex;

use crate::payload::Notification;

const MAX_CONCURRENT_POSTS: usize = 5;
const LOBBY_JOIN_RATE_LIMIT: Duration = Duration::from_secs(5 * 60);

#[derive(Clone)]
pub struct NotificationSink {
    webhook_url: Option<Arc<str>>,
    client: reqwest::Client,
    in_flight: Arc<AtomicUsize>,
    last_lobby_join_notif: Arc<Mutex<Option<Instant>>>,
}

impl NotificationSink {
    pub fn new(webhook_url: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .user_agent("iwango-server/discord-webhook")
            .build()
            .expect("reqwest client");
        Self {
            webhook_url: webhook_url.map(Arc::from),
            client,
            in_flight: Arc::new(AtomicUsize::new(0)),
            last_lobby_join_notif: Arc::new(Mutex::new(None)),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub async fn lobby_joined(
        &self,
        game: GameId,
        username: &str,
        lobby_name: &str,
        player_list: &[String],
    ) {
        {
            let mut last = self.last_lobby_join_notif.lock().await;
            let now = Instant::now();
            if let Some(prev) = *last {
                if now.duration_since(prev) < LOBBY_JOIN_RATE_LIMIT {
                    return;
                }
            }
            *last = Some(now);
        }
        let notif = Notification::lobby_joined(game, username, lobby_name, player_list);
        self.post(notif).await;
    }

    pub async fn game_created(
        &self,
        game: GameId,
        username: &str,
        game_name: &str,
        player_list: &[String],
    ) {
        let notif = Notification::game_created(game, username, game_name, player_list);
        self.post(notif).await;
    }

    async fn post(&self, notif: Notification) {
        let Some(url) = self.webhook_url.clone() else {
            return;
        };
        if self.in_flight.fetch_add(1, Ordering::SeqCst) >= MAX_CONCURRENT_POSTS {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!("discord webhook max in-flight count reached, dropping notification");
            return;
        }

        let client = self.client.clone();
        let in_flight = self.in_flight.clone();
        tokio::spawn(async move {
            let result = client.post(url.as_ref()).json(&notif).send().await;
            match result {
                Ok(resp) if !resp.status().is_success() => {
                    tracing::error!(status = %resp.status(), "discord webhook returned error status");
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::error!(error = %err, "discord webhook request failed");
                }
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_sink_is_a_no_op() {
        let sink = NotificationSink::disabled();
        sink.lobby_joined(GameId::Daytona, "alice", "Test", &["alice".into()])
            .await;
        sink.game_created(GameId::Daytona, "alice", "T", &["alice".into()])
            .await;
    }
}
