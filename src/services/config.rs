//! Application configuration
//!
//! Read from a JSON file. Every field has a default, so a partial file (or no
//! file at all) is fine.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio_clean::{BandLayout, NoiseReductionSettings, PresetCatalog};
use crate::media::{ExtractorKind, FfmpegSettings};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Built-in band layout used when no custom presets are given
    pub layout: BandLayout,
    /// Custom presets, replacing the layout's built-in table
    pub presets: Option<PresetCatalog>,
    pub noise_reduction: NoiseReductionSettings,
    pub ffmpeg: FfmpegSettings,
    pub extractor: ExtractorKind,
    /// Parent directory for per-run scratch directories
    pub scratch_root: Option<PathBuf>,
}

impl AppConfig {
    /// Load config from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        log::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// The presets the equalizer should use
    pub fn catalog(&self) -> PresetCatalog {
        self.presets
            .clone()
            .unwrap_or_else(|| PresetCatalog::builtin(self.layout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.catalog(), PresetCatalog::builtin(BandLayout::FourBand));
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "layout": "three-band", "ffmpeg": { "timeoutSecs": 30 }, "extractor": "symphonia" }"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.layout, BandLayout::ThreeBand);
        assert_eq!(config.ffmpeg.timeout_secs, 30);
        assert_eq!(config.ffmpeg.sample_rate, 44100);
        assert_eq!(config.extractor, ExtractorKind::Symphonia);
        assert_eq!(config.noise_reduction, NoiseReductionSettings::default());
        assert_eq!(config.catalog().presets[0].bands.len(), 3);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ layout: ").unwrap();

        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_custom_presets_override_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "presets": { "presets": [ { "name": "flat", "bands": [ { "gainDb": 0.0 } ] } ] } }"#,
        )
        .unwrap();

        let catalog = AppConfig::load(&path).unwrap().catalog();
        assert!(catalog.get("flat").is_ok());
        assert!(catalog.get("normal").is_err());
    }
}
