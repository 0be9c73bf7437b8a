//! Loader for the `iwango.cfg` configuration file: a flat `key=value` /
//! `key:value` map, `#`-commented, read once at startup and shared
//! thereafter via `Arc`.

use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// The default path used when no config path is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "iwango.cfg";

/// A flat string map loaded from `iwango.cfg`. Kept as a map rather than a
/// fixed struct: new per-title override keys need no code change here.
#[derive(Debug, Clone, Default)]
pub struct Config {
    values: HashMap<String, String>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let text = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.display().to_string(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    /// Returns an empty config, used when no file is present and the caller
    /// has decided that's acceptable (e.g. a from-scratch local run).
    pub fn empty() -> Self {
        Self::default()
    }

    fn parse(text: &str) -> Self {
        let mut values = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let split_at = line.find(['=', ':']);
            let Some(idx) = split_at else { continue };
            let key = line[..idx].trim().to_string();
            let value = line[idx + 1..].trim().to_string();
            if !key.is_empty() {
                values.insert(key, value);
            }
        }
        Self { values }
    }

    /// Looks up a key, falling back to `default` and logging once (at
    /// `DEBUG`) when the key is absent, to help operators catch typos in
    /// their config file without spamming the log on every lookup.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        match self.values.get(key) {
            Some(v) => v.as_str(),
            None => {
                tracing::debug!(key, default, "config key not set, using default");
                default
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn database_path(&self) -> &str {
        self.get_or("DatabasePath", "iwango.db")
    }

    pub fn discord_webhook(&self) -> Option<&str> {
        self.get("DiscordWebhook").filter(|s| !s.is_empty())
    }

    pub fn server_name(&self, title_key: &str, default: &str) -> String {
        self.get_or(&format!("{title_key}ServerName"), default)
            .to_string()
    }

    pub fn motd(&self, title_key: &str, default: &str) -> String {
        self.get_or(&format!("{title_key}MOTD"), default).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_equals_and_colon_separated_keys() {
        let cfg = Config::parse(
            "# a comment\nDatabasePath=iwango.db\nDiscordWebhook: https://example.com\n\nTetrisMOTD = hello world\n",
        );
        assert_eq!(cfg.get("DatabasePath"), Some("iwango.db"));
        assert_eq!(cfg.get("DiscordWebhook"), Some("https://example.com"));
        assert_eq!(cfg.get("TetrisMOTD"), Some("hello world"));
    }

    #[test]
    fn missing_key_falls_back_to_default() {
        let cfg = Config::empty();
        assert_eq!(cfg.get_or("DatabasePath", "iwango.db"), "iwango.db");
    }

    #[test]
    fn comment_and_blank_lines_are_ignored() {
        let cfg = Config::parse("   \n# nothing here\n   # also nothing\n");
        assert!(cfg.get("anything").is_none());
    }
}
