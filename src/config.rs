use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Tuning knobs for the sampling pipeline.
///
/// # Performance Impact
///
/// - `poll_interval_ms`: the fixed sampling cadence. Lower values tighten
///   input latency but wake the session task more often.
/// - `pump_interval_ms`: how often the backend drains hardware events to
///   refresh its cached state and detect connects/disconnects.
/// - `channel_capacity`: buffer depth of every derived event stream. There
///   is no backpressure; a consumer that falls this far behind observes a
///   lag error instead of stalling the sampler.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct Settings {
    /// Sampling interval in milliseconds.
    pub poll_interval_ms: u64,

    /// Backend event-pump interval in milliseconds.
    pub pump_interval_ms: u64,

    /// Capacity of each broadcast event stream.
    pub channel_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 15,
            pump_interval_ms: 4,
            channel_capacity: 64,
        }
    }
}

impl Settings {
    /// Load settings from the user config file, falling back to defaults
    /// when the file is missing or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            debug!("no config directory available, using default settings");
            return Self::default();
        };

        match fs::read_to_string(&path) {
            Ok(raw) => match toml::from_str(&raw) {
                Ok(settings) => {
                    info!("loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    warn!("invalid config at {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                debug!("no config file at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("padstream").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_cadence() {
        let settings = Settings::default();
        assert_eq!(settings.poll_interval_ms, 15);
        assert_eq!(settings.pump_interval_ms, 4);
        assert_eq!(settings.channel_capacity, 64);
    }

    #[test]
    fn partial_config_files_fill_in_defaults() {
        let settings: Settings = toml::from_str("poll_interval_ms = 8").unwrap();
        assert_eq!(settings.poll_interval_ms, 8);
        assert_eq!(settings.pump_interval_ms, 4);
        assert_eq!(settings.channel_capacity, 64);
    }
}
