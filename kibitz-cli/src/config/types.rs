use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

pub use kibitz_core::config::DEFAULT_ENGINE;
use kibitz_core::config::{
    DEFAULT_DEPTH, DEFAULT_IDLE_TIMEOUT, DEFAULT_SEARCH_TIMEOUT, DEFAULT_SHUTDOWN_GRACE,
    DEFAULT_SWEEP_INTERVAL,
};
use kibitz_core::{EngineConfig, ManagerConfig, ReaperConfig};
use serde::{Deserialize, Serialize};

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawKibitzConfig {
    #[serde(default)]
    pub engine: RawEngineSection,

    #[serde(default)]
    pub sessions: RawSessionsSection,
}

/// Engine section as stored in TOML (optional fields for proper merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawEngineSection {
    pub path: Option<String>,
    pub args: Option<Vec<String>>,
    pub search_timeout_secs: Option<u64>,
    pub shutdown_grace_ms: Option<u64>,
    pub default_depth: Option<u32>,
    /// UCI options; numbers and booleans are accepted and sent as text
    pub options: Option<BTreeMap<String, toml::Value>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSessionsSection {
    pub idle_timeout_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KibitzConfig {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub sessions: SessionsSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSection {
    /// Engine binary, looked up on PATH when not absolute
    pub path: String,

    pub args: Vec<String>,

    /// Upper bound on one search; 0 disables the bound
    pub search_timeout_secs: u64,

    /// Time between `quit` and a forced kill
    pub shutdown_grace_ms: u64,

    /// Depth used when a request gives none
    pub default_depth: u32,

    /// Sent as `setoption` during the handshake
    pub options: BTreeMap<String, String>,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            path: DEFAULT_ENGINE.to_string(),
            args: Vec::new(),
            search_timeout_secs: DEFAULT_SEARCH_TIMEOUT.as_secs(),
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE.as_millis() as u64,
            default_depth: DEFAULT_DEPTH,
            options: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsSection {
    /// Sessions unused for longer than this are disposed
    pub idle_timeout_secs: u64,

    /// How often idle sessions are looked for
    pub sweep_interval_secs: u64,
}

impl Default for SessionsSection {
    fn default() -> Self {
        Self {
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT.as_secs(),
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL.as_secs(),
        }
    }
}

impl KibitzConfig {
    /// Settings for the engine manager
    pub fn manager_config(&self) -> ManagerConfig {
        let engine = EngineConfig {
            path: PathBuf::from(&self.engine.path),
            args: self.engine.args.clone(),
            options: self
                .engine
                .options
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            search_timeout: match self.engine.search_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            shutdown_grace: Duration::from_millis(self.engine.shutdown_grace_ms),
        };

        ManagerConfig {
            engine,
            reaper: ReaperConfig {
                idle_timeout: Duration::from_secs(self.sessions.idle_timeout_secs),
                sweep_interval: Duration::from_secs(self.sessions.sweep_interval_secs),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = KibitzConfig::default();
        assert_eq!(config.engine.path, "stockfish");
        assert_eq!(config.engine.default_depth, 17);
        assert_eq!(config.engine.shutdown_grace_ms, 500);
        assert_eq!(config.sessions.idle_timeout_secs, 600);
        assert_eq!(config.sessions.sweep_interval_secs, 60);
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = KibitzConfig::default();
        config.engine.path = "/opt/engines/sf".to_string();
        config.engine.args = vec!["--bench".to_string()];
        config
            .engine
            .options
            .insert("Threads".to_string(), "4".to_string());

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: KibitzConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.engine.path, "/opt/engines/sf");
        assert_eq!(parsed.engine.args, vec!["--bench"]);
        assert_eq!(parsed.engine.options["Threads"], "4");
    }

    #[test]
    fn test_raw_config_partial_parsing() {
        let toml_str = r#"
[engine]
search_timeout_secs = 30

[engine.options]
Threads = 2
"UCI_ShowWDL" = true
"#;
        let raw: RawKibitzConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(raw.engine.search_timeout_secs, Some(30));
        assert!(raw.engine.path.is_none());
        assert!(raw.sessions.idle_timeout_secs.is_none());
        let options = raw.engine.options.unwrap();
        assert_eq!(options["Threads"], toml::Value::Integer(2));
    }

    #[test]
    fn test_raw_config_empty_uses_none() {
        let raw: RawKibitzConfig = toml::from_str("").unwrap();

        assert!(raw.engine.path.is_none());
        assert!(raw.engine.options.is_none());
        assert!(raw.sessions.sweep_interval_secs.is_none());
    }

    #[test]
    fn test_manager_config_zero_timeout_disables_bound() {
        let mut config = KibitzConfig::default();
        config.engine.search_timeout_secs = 0;
        config.sessions.idle_timeout_secs = 120;

        let manager = config.manager_config();

        assert!(manager.engine.search_timeout.is_none());
        assert_eq!(manager.reaper.idle_timeout, Duration::from_secs(120));
        assert_eq!(manager.engine.path, PathBuf::from("stockfish"));
    }
}
