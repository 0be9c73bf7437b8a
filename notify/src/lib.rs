//! Fire-and-forget Discord webhook notifications for lobby and team events.

pub mod payload;
pub mod sink;

pub use payload::Notification;
pub use sink::NotificationSink;
