use config::{Config, ConfigError, File};
use serde::Deserialize;

use crate::models::snapshot::ActivitySignal;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FaultlineConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub source: SourceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Directory the capture job writes snapshot documents into, flat or
    /// bucketed by `YYYY-MM/` month.
    pub history_dir: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            history_dir: "data/history".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    /// Path of the output artifact; also the durable checkpoint.
    pub artifact_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            artifact_path: "public/outages.json".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// How the source format marks an outage as active:
    /// `"explicit-flag"` or `"active-membership"`.
    pub activity_signal: ActivitySignal,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            activity_signal: ActivitySignal::ActiveMembership,
        }
    }
}

impl FaultlineConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        s.try_deserialize()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_capture_layout() {
        let config = FaultlineConfig::default();
        assert_eq!(config.store.history_dir, "data/history");
        assert_eq!(config.output.artifact_path, "public/outages.json");
        assert_eq!(config.source.activity_signal, ActivitySignal::ActiveMembership);
    }

    #[test]
    fn loads_partial_toml_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faultline.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[source]").unwrap();
        writeln!(file, "activity_signal = \"explicit-flag\"").unwrap();

        let config = FaultlineConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.source.activity_signal, ActivitySignal::ExplicitFlag);
        assert_eq!(config.store.history_dir, "data/history");
    }
}
