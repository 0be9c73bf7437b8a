//! Shared types and ambient infrastructure used by every IWANGO server crate:
//! the title registry, the wire framing codec, the Shift-JIS/full-width text
//! bridge, configuration loading, and tracing setup.

pub mod codec;
pub mod config;
pub mod logging;
pub mod text;
pub mod title;

pub use title::{GameId, Title};
