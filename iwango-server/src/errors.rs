//! The one error type the process supervisor itself can hit. Everything
//! else (framing, dispatch, persistence) already has its own typed error at
//! its own layer; a `SupervisorError` only ever means "exit non-zero before
//! any acceptor starts".

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to read config: {0}")]
    Config(#[from] common::config::ConfigError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}
