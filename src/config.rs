//! Render configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! serialized to a TOML table, the user's file is laid over it key by key,
//! and the merged table is deserialized and validated.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [render]
//! destination = "cpu"       # cpu | auto | gpu | gpu:primary | gpu:compatibility
//! quality = "default"       # none | low | medium | high | default
//!
//! [contexts]
//! warm = []                 # destinations whose contexts are built at startup
//!
//! [backend]
//! accelerators = ["primary", "compatibility"]
//!
//! [processing]
//! max_threads = 4           # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [render]
//! destination = "auto"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{GpuVariant, InterpolationQuality, RenderDestination, RenderOption};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `config.toml`.
///
/// All fields have defaults; unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Default render option for every operation.
    pub render: RenderSection,
    /// Contexts to build before the first operation.
    pub contexts: ContextsConfig,
    /// Which accelerator variants the software backend reports.
    pub backend: BackendConfig,
    /// Parallel frame processing settings.
    pub processing: ProcessingConfig,
}

impl RenderConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.contexts.warm.contains(&RenderDestination::Cpu) {
            return Err(ConfigError::Validation(
                "contexts.warm: cpu never has a render context".into(),
            ));
        }
        if self.processing.max_threads == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_threads must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn render_option(&self) -> RenderOption {
        RenderOption::new(self.render.destination, self.render.quality)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSection {
    pub destination: RenderDestination,
    pub quality: InterpolationQuality,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContextsConfig {
    pub warm: Vec<RenderDestination>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    /// An empty list describes a host without any accelerator.
    pub accelerators: Vec<GpuVariant>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            accelerators: GpuVariant::ALL.to_vec(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of worker threads for frame-wise operations.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_threads: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_threads.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Stock defaults as a TOML table, the base every user file is merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(RenderConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<RenderConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: RenderConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults when it is missing.
pub fn load_config(path: &Path) -> Result<RenderConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(path)?)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# rich-image Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Default render option
# ---------------------------------------------------------------------------
[render]
# Where pixel operations run:
#   "cpu"                always the CPU renderer
#   "auto"               an accelerator if one can be built, else the CPU,
#                        retrying on the CPU when the accelerator fails
#   "gpu" / "gpu:primary"    the primary accelerator, then compatibility
#   "gpu:compatibility"  the compatibility accelerator only
# Explicit gpu destinations never fall back to the CPU.
destination = "cpu"

# Interpolation used when resampling: none, low, medium, high, default.
quality = "default"

# ---------------------------------------------------------------------------
# Render contexts
# ---------------------------------------------------------------------------
[contexts]
# Destinations whose contexts are built up front instead of on first use.
# Example: warm = ["auto", "gpu:compatibility"]
warm = []

# ---------------------------------------------------------------------------
# Filter backend
# ---------------------------------------------------------------------------
[backend]
# Accelerator variants the backend may build contexts for.
# An empty list behaves like a host with no accelerator.
accelerators = ["primary", "compatibility"]

# ---------------------------------------------------------------------------
# Parallel processing
# ---------------------------------------------------------------------------
[processing]
# Maximum number of worker threads for multi-frame images.
# Omit to use all CPU cores. Values above the core count are clamped down.
# max_threads = 4
"##
}
