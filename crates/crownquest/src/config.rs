//! Server configuration.

use std::time::Duration;

use crate::CrownQuestError;

/// Where the server listens, how long it waits on clients, and which
/// helper programs it runs.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// WebSocket listener for the game protocol.
    pub ws_addr: String,
    /// HTTP listener for `/api/grid` and `/api/map-image`.
    pub http_addr: String,
    /// A new connection must send its first frame within this.
    pub handshake_timeout: Duration,
    /// A connection silent for this long is dropped.
    pub idle_timeout: Duration,
    /// Grid generator program and leading arguments. The start space id
    /// is appended; a JSON grid is expected on stdout.
    pub grid_command: Vec<String>,
    /// Map renderer program and leading arguments. The spaces and the
    /// player positions are appended as JSON; base64 PNG on stdout.
    pub map_command: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_addr: "127.0.0.1:3000".into(),
            http_addr: "127.0.0.1:3001".into(),
            handshake_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            grid_command: vec!["python3".into(), "scripts/grid_generator.py".into()],
            map_command: vec!["python3".into(), "scripts/map_generator.py".into()],
        }
    }
}

impl ServerConfig {
    /// Reads overrides from the process environment:
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `CROWNQUEST_WS_ADDR` | `ws_addr` |
    /// | `CROWNQUEST_HTTP_ADDR` | `http_addr` |
    /// | `CROWNQUEST_GRID_CMD` | `grid_command` (split on whitespace) |
    /// | `CROWNQUEST_MAP_CMD` | `map_command` (split on whitespace) |
    /// | `CROWNQUEST_HANDSHAKE_TIMEOUT_SECS` | `handshake_timeout` |
    /// | `CROWNQUEST_IDLE_TIMEOUT_SECS` | `idle_timeout` |
    pub fn from_env() -> Result<Self, CrownQuestError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CrownQuestError> {
        let mut config = Self::default();
        if let Some(addr) = lookup("CROWNQUEST_WS_ADDR") {
            config.ws_addr = addr;
        }
        if let Some(addr) = lookup("CROWNQUEST_HTTP_ADDR") {
            config.http_addr = addr;
        }
        if let Some(cmd) = lookup("CROWNQUEST_GRID_CMD") {
            config.grid_command = split_command(&cmd);
        }
        if let Some(cmd) = lookup("CROWNQUEST_MAP_CMD") {
            config.map_command = split_command(&cmd);
        }
        if let Some(secs) = lookup("CROWNQUEST_HANDSHAKE_TIMEOUT_SECS") {
            config.handshake_timeout = parse_secs("CROWNQUEST_HANDSHAKE_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("CROWNQUEST_IDLE_TIMEOUT_SECS") {
            config.idle_timeout = parse_secs("CROWNQUEST_IDLE_TIMEOUT_SECS", &secs)?;
        }
        Ok(config)
    }
}

fn split_command(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_owned).collect()
}

fn parse_secs(key: &str, raw: &str) -> Result<Duration, CrownQuestError> {
    raw.trim()
        .parse()
        .map(Duration::from_secs)
        .map_err(|_| CrownQuestError::Config(format!("{key} must be a whole number of seconds")))
}
