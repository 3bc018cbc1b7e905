//! Engine tuning knobs and TOML loading.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{GraphError, Result};

/// Tuning for a [`GraphProcessor`](crate::GraphProcessor).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Depth used when a request does not specify one.
    pub default_max_depth: usize,
    /// L2 change below which eigenvector power iteration stops.
    pub eigenvector_tolerance: f64,
    /// Iteration cap for eigenvector power iteration.
    pub eigenvector_max_iterations: usize,
    /// Accept vertices with negative weight.
    pub allow_negative_weights: bool,
    /// Threads for batch requests; `None` lets rayon decide.
    pub worker_threads: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_max_depth: 3,
            eigenvector_tolerance: 1e-6,
            eigenvector_max_iterations: 100,
            allow_negative_weights: false,
            worker_threads: None,
        }
    }
}

impl EngineConfig {
    /// Settings for exploring large snapshots interactively: shallow default
    /// depth and a tighter iteration cap.
    pub fn interactive() -> Self {
        Self {
            default_max_depth: 2,
            eigenvector_max_iterations: 50,
            ..Self::default()
        }
    }

    /// Loads configuration.
    ///
    /// An explicit path must exist. Without one, `<config dir>/tempograph/config.toml`
    /// is read when present and defaults are used otherwise.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self> {
        let config = match explicit {
            Some(path) => read_file(&path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => read_file(&path)?,
                _ => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|err| GraphError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings no computation can run with.
    pub fn validate(&self) -> Result<()> {
        if !(self.eigenvector_tolerance.is_finite() && self.eigenvector_tolerance > 0.0) {
            return Err(GraphError::Config(format!(
                "eigenvector_tolerance must be positive, got {}",
                self.eigenvector_tolerance
            )));
        }
        if self.eigenvector_max_iterations == 0 {
            return Err(GraphError::Config(
                "eigenvector_max_iterations must be at least 1".into(),
            ));
        }
        if self.worker_threads == Some(0) {
            return Err(GraphError::Config(
                "worker_threads must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// `<config dir>/tempograph/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tempograph").join("config.toml"))
}

fn read_file(path: &Path) -> Result<EngineConfig> {
    debug!(path = %path.display(), "loading engine config");
    let raw = fs::read_to_string(path).map_err(|err| {
        GraphError::Config(format!("failed to read {}: {err}", path.display()))
    })?;
    let config: EngineConfig = toml::from_str(&raw).map_err(|err| {
        GraphError::Config(format!("failed to parse {}: {err}", path.display()))
    })?;
    Ok(config)
}
