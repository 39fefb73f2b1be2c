//! Engine configuration loading.
//!
//! The expected YAML structure is:
//! ```yaml
//! clock:
//!   rate: 1
//!   timer_resolution_ms: 100
//!   media_resolution_ms: 20
//!   driver: thread
//! ```
//!
//! Every field is optional so that partial configs are accepted gracefully
//! (missing values fall back to their defaults). An out-of-range `rate` is
//! coerced to 1 rather than rejected, matching the engine's own clamp; an
//! unknown `driver` name is a hard error, since silently substituting a tick
//! source would change the platform's timing behaviour.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::driver::DriverKind;
use crate::types::Rate;

// ── Private YAML deserialization types ────────────────────────────────────────

/// Top-level wrapper that maps directly onto the YAML file layout.
///
/// Kept private – callers work with [`EngineConfig`] instead.
#[derive(Debug, Deserialize)]
struct EngineConfigFile {
    #[serde(default)]
    clock: ClockSection,
}

/// The `clock:` section as it appears in the YAML file.
#[derive(Debug, Deserialize, Default)]
struct ClockSection {
    rate: Option<u32>,
    timer_resolution_ms: Option<u64>,
    media_resolution_ms: Option<u64>,
    driver: Option<String>,
}

// ── Public configuration ──────────────────────────────────────────────────────

/// Default timer-clock resolution when the file does not specify one, in ms.
pub const DEFAULT_TIMER_RESOLUTION_MS: u64 = 100;

/// Default media-clock resolution (one audio frame), in ms.
pub const DEFAULT_MEDIA_RESOLUTION_MS: u64 = 20;

/// Resolved engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Clock rate multiplier, already validated/coerced.
    pub rate: Rate,
    /// Timer-clock period, in ms.
    pub timer_resolution_ms: u64,
    /// Media-clock period, in ms. 0 means no media clock.
    pub media_resolution_ms: u64,
    /// Which physical tick source to use.
    pub driver: DriverKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            rate: Rate::default(),
            timer_resolution_ms: DEFAULT_TIMER_RESOLUTION_MS,
            media_resolution_ms: DEFAULT_MEDIA_RESOLUTION_MS,
            driver: DriverKind::default(),
        }
    }
}

impl EngineConfig {
    /// Parse `path` into a resolved configuration.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, the YAML is
    /// structurally invalid, or the `driver` name is unknown.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot open configuration file: {}", path.display()))?;

        let file: EngineConfigFile = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse YAML file: {}", path.display()))?;

        let defaults = EngineConfig::default();
        let clock = file.clock;

        let driver = match clock.driver.as_deref() {
            None => defaults.driver,
            Some(name) => match DriverKind::from_name(name) {
                Some(kind) => kind,
                None => bail!("unknown driver kind '{name}' (valid: thread, runtime)"),
            },
        };

        let config = EngineConfig {
            rate: clock.rate.map(Rate::new).unwrap_or(defaults.rate),
            timer_resolution_ms: clock
                .timer_resolution_ms
                .unwrap_or(defaults.timer_resolution_ms),
            media_resolution_ms: clock
                .media_resolution_ms
                .unwrap_or(defaults.media_resolution_ms),
            driver,
        };

        info!(
            rate = config.rate.get(),
            timer_resolution_ms = config.timer_resolution_ms,
            media_resolution_ms = config.media_resolution_ms,
            driver = config.driver.as_str(),
            "engine configuration loaded"
        );
        Ok(config)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
