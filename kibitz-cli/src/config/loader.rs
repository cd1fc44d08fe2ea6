use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use kibitz_core::config::split_command;
use tracing::debug;

use super::types::{
    DEFAULT_ENGINE, EngineSection, KibitzConfig, RawEngineSection, RawKibitzConfig,
    RawSessionsSection, SessionsSection,
};

/// Overrides the configured engine command, e.g. `KIBITZ_ENGINE="sf --nnue"`
pub const ENGINE_ENV: &str = "KIBITZ_ENGINE";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project + explicit file + env)
    pub fn load(explicit: Option<&Path>) -> Result<KibitzConfig> {
        let mut raw = RawKibitzConfig::default();

        // Layer 1: User config
        let user_path = Self::user_config_path();
        if user_path.exists() {
            raw = Self::merge_raw(raw, Self::read(&user_path)?);
        }

        // Layer 2: Project config
        let project_path = Self::project_config_path();
        if project_path.exists() {
            raw = Self::merge_raw(raw, Self::read(&project_path)?);
        }

        // Layer 3: --config, which must exist
        if let Some(path) = explicit {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            raw = Self::merge_raw(raw, Self::read(path)?);
        }

        // Layer 4: environment
        if let Ok(command) = std::env::var(ENGINE_ENV)
            && !command.trim().is_empty()
        {
            raw = Self::apply_engine_override(raw, &command);
        }

        Self::finalize(raw)
    }

    /// Get user config path
    pub fn user_config_path() -> PathBuf {
        kibitz_paths::user_config_file()
    }

    /// Get project config path
    /// Can be overridden with KIBITZ_PROJECT_CONFIG_DIR env var
    pub fn project_config_path() -> PathBuf {
        let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        kibitz_paths::project_config_file(&root)
    }

    fn read(path: &Path) -> Result<RawKibitzConfig> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let raw = toml::from_str(&contents)
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        debug!(path = %path.display(), "Loaded config layer");
        Ok(raw)
    }

    /// Replace path and args with a whitespace-separated command
    fn apply_engine_override(mut raw: RawKibitzConfig, command: &str) -> RawKibitzConfig {
        let (path, args) = split_command(command);
        raw.engine.path = Some(path.display().to_string());
        raw.engine.args = Some(args);
        raw
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawKibitzConfig, overlay: RawKibitzConfig) -> RawKibitzConfig {
        RawKibitzConfig {
            engine: RawEngineSection {
                path: overlay.engine.path.or(base.engine.path),
                args: overlay.engine.args.or(base.engine.args),
                search_timeout_secs: overlay
                    .engine
                    .search_timeout_secs
                    .or(base.engine.search_timeout_secs),
                shutdown_grace_ms: overlay
                    .engine
                    .shutdown_grace_ms
                    .or(base.engine.shutdown_grace_ms),
                default_depth: overlay.engine.default_depth.or(base.engine.default_depth),
                // Options merge per key
                options: match (base.engine.options, overlay.engine.options) {
                    (Some(mut base), Some(overlay)) => {
                        base.extend(overlay);
                        Some(base)
                    }
                    (base, overlay) => overlay.or(base),
                },
            },
            sessions: RawSessionsSection {
                idle_timeout_secs: overlay
                    .sessions
                    .idle_timeout_secs
                    .or(base.sessions.idle_timeout_secs),
                sweep_interval_secs: overlay
                    .sessions
                    .sweep_interval_secs
                    .or(base.sessions.sweep_interval_secs),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawKibitzConfig) -> Result<KibitzConfig> {
        let engine_defaults = EngineSection::default();
        let session_defaults = SessionsSection::default();

        let config = KibitzConfig {
            engine: EngineSection {
                path: raw
                    .engine
                    .path
                    .filter(|p| !p.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_ENGINE.to_string()),
                args: raw.engine.args.unwrap_or_default(),
                search_timeout_secs: raw
                    .engine
                    .search_timeout_secs
                    .unwrap_or(engine_defaults.search_timeout_secs),
                shutdown_grace_ms: raw
                    .engine
                    .shutdown_grace_ms
                    .unwrap_or(engine_defaults.shutdown_grace_ms),
                default_depth: raw
                    .engine
                    .default_depth
                    .unwrap_or(engine_defaults.default_depth),
                options: raw
                    .engine
                    .options
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(name, value)| (name, option_text(value)))
                    .collect(),
            },
            sessions: SessionsSection {
                idle_timeout_secs: raw
                    .sessions
                    .idle_timeout_secs
                    .unwrap_or(session_defaults.idle_timeout_secs),
                sweep_interval_secs: raw
                    .sessions
                    .sweep_interval_secs
                    .unwrap_or(session_defaults.sweep_interval_secs),
            },
        };

        if config.engine.default_depth == 0 {
            bail!("engine.default_depth must be at least 1");
        }
        if config.sessions.sweep_interval_secs == 0 {
            bail!("sessions.sweep_interval_secs must be at least 1");
        }
        Ok(config)
    }
}

/// UCI option values are plain text on the wire
fn option_text(value: toml::Value) -> String {
    match value {
        toml::Value::String(s) => s,
        other => other.to_string(),
    }
}
