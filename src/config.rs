//! Server configuration loaded from TOML with environment overrides.

use crate::error::ConfigError;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Environment variable that overrides the engine executable path.
pub const ENGINE_PATH_ENV: &str = "STOCKFISH_PATH";

/// Configuration for the chess server, its engine and its session policy.
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the UCI engine executable.
    #[serde(default = "default_engine_path")]
    engine_path: String,

    /// UCI `Hash` option in megabytes.
    #[serde(default = "default_engine_hash_mb")]
    engine_hash_mb: u32,

    /// UCI `Threads` option.
    #[serde(default = "default_engine_threads")]
    engine_threads: u32,

    /// Optional UCI `Skill Level` option (0-20).
    #[serde(default)]
    engine_skill_level: Option<u8>,

    /// Engine-side search time per move, in milliseconds.
    #[serde(default = "default_move_time_ms")]
    move_time_ms: u64,

    /// Extra allowance before the engine is declared unresponsive.
    #[serde(default = "default_engine_grace_ms")]
    engine_grace_ms: u64,

    /// Pause before an engine turn is searched.
    #[serde(default = "default_engine_reply_delay_ms")]
    engine_reply_delay_ms: u64,

    /// Number of background workers running engine turns.
    #[serde(default = "default_engine_workers")]
    engine_workers: usize,

    /// Hard cap on live sessions.
    #[serde(default = "default_max_sessions")]
    max_sessions: usize,

    /// Above this many sessions, finished sessions are swept.
    #[serde(default = "default_soft_session_limit")]
    soft_session_limit: usize,

    /// Sessions older than this are swept regardless of status.
    #[serde(default = "default_session_max_age_secs")]
    session_max_age_secs: u64,

    /// Period of the expiry sweeper.
    #[serde(default = "default_sweep_interval_secs")]
    sweep_interval_secs: u64,

    /// Host to bind the HTTP server to.
    #[serde(default = "default_host")]
    host: String,

    /// Port to bind the HTTP server to.
    #[serde(default = "default_port")]
    port: u16,
}

fn default_engine_path() -> String {
    "stockfish".to_string()
}

fn default_engine_hash_mb() -> u32 {
    16
}

fn default_engine_threads() -> u32 {
    2
}

fn default_move_time_ms() -> u64 {
    2000
}

fn default_engine_grace_ms() -> u64 {
    3000
}

fn default_engine_reply_delay_ms() -> u64 {
    500
}

fn default_engine_workers() -> usize {
    4
}

fn default_max_sessions() -> usize {
    100
}

fn default_soft_session_limit() -> usize {
    80
}

fn default_session_max_age_secs() -> u64 {
    24 * 60 * 60
}

fn default_sweep_interval_secs() -> u64 {
    60 * 60
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            engine_path: default_engine_path(),
            engine_hash_mb: default_engine_hash_mb(),
            engine_threads: default_engine_threads(),
            engine_skill_level: None,
            move_time_ms: default_move_time_ms(),
            engine_grace_ms: default_engine_grace_ms(),
            engine_reply_delay_ms: default_engine_reply_delay_ms(),
            engine_workers: default_engine_workers(),
            max_sessions: default_max_sessions(),
            soft_session_limit: default_soft_session_limit(),
            session_max_age_secs: default_session_max_age_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    #[instrument(skip(content))]
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        info!(engine_path = %config.engine_path, max_sessions = config.max_sessions, "Config loaded");
        Ok(config)
    }

    /// Loads the file if it exists, otherwise starts from defaults, then
    /// applies the engine path environment override.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = if path.as_ref().exists() {
            Self::from_file(path)?
        } else {
            info!("Config file not found, using defaults");
            Self::default()
        };

        if let Ok(engine_path) = std::env::var(ENGINE_PATH_ENV) {
            info!(%engine_path, "Engine path overridden from environment");
            config.engine_path = engine_path;
        }

        Ok(config)
    }

    /// Checks cross-field constraints.
    #[instrument(skip(self))]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sessions == 0 {
            return Err(ConfigError::new("max_sessions must be at least 1"));
        }
        if self.soft_session_limit > self.max_sessions {
            return Err(ConfigError::new(format!(
                "soft_session_limit ({}) exceeds max_sessions ({})",
                self.soft_session_limit, self.max_sessions
            )));
        }
        if self.engine_workers == 0 {
            return Err(ConfigError::new("engine_workers must be at least 1"));
        }
        if self.move_time_ms == 0 {
            return Err(ConfigError::new("move_time_ms must be positive"));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::new("sweep_interval_secs must be positive"));
        }
        Ok(())
    }

    /// Overrides the engine executable path.
    pub fn with_engine_path(mut self, engine_path: impl Into<String>) -> Self {
        self.engine_path = engine_path.into();
        self
    }

    /// Overrides the bind address.
    pub fn with_bind(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Overrides the session caps.
    pub fn with_session_limits(mut self, max_sessions: usize, soft_session_limit: usize) -> Self {
        self.max_sessions = max_sessions;
        self.soft_session_limit = soft_session_limit;
        self
    }

    /// Overrides the pause before engine turns.
    pub fn with_engine_reply_delay_ms(mut self, delay_ms: u64) -> Self {
        self.engine_reply_delay_ms = delay_ms;
        self
    }

    /// Search time per move.
    pub fn move_time(&self) -> Duration {
        Duration::from_millis(self.move_time_ms)
    }

    /// Grace allowance past the search time.
    pub fn engine_grace(&self) -> Duration {
        Duration::from_millis(self.engine_grace_ms)
    }

    /// Pause before an engine turn.
    pub fn engine_reply_delay(&self) -> Duration {
        Duration::from_millis(self.engine_reply_delay_ms)
    }

    /// Age ceiling for sessions.
    pub fn session_max_age(&self) -> Duration {
        Duration::from_secs(self.session_max_age_secs)
    }

    /// Sweeper period.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
