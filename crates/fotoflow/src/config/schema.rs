use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// Path to the SQLite database file. Defaults to the canonical
    /// per-user location when omitted.
    #[serde(default)]
    pub database_path: Option<String>,
    pub storage_root: String,
    #[serde(default = "default_signed_url_ttl_minutes")]
    pub signed_url_ttl_minutes: u32,
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
}

fn default_signed_url_ttl_minutes() -> u32 {
    60
}

fn default_notification_capacity() -> usize {
    100
}
