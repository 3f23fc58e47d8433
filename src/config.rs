// Configuration management for Camgrid

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::capture::{PacingMode, MAX_CHANNELS};
use crate::devices::DEFAULT_REOPEN_THRESHOLD;
use crate::encoding::ClipCodec;
use crate::video::GridRect;

/// Error type for loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub cameras: CameraConfig,

    #[serde(default)]
    pub recorder: RecorderConfig,

    /// Analytics upload; absent disables the poster
    #[serde(default)]
    pub analytics: Option<AnalyticsConfig>,
}

/// One configured camera slot. Slots without an entry are disabled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CameraSource {
    /// Mosaic slot, 1-4
    pub slot: u8,
    /// Network stream URI (rtsp://…) or local file path
    pub address: String,
    /// Override of the slot's default mosaic cell
    #[serde(default)]
    pub placement: Option<GridRect>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub sources: Vec<CameraSource>,

    /// Edge length in pixels of each camera cell; the mosaic is twice this wide and high
    #[serde(default = "default_unit_size")]
    pub unit_size: u32,

    #[serde(default)]
    pub pacing: PacingMode,

    /// Consecutive failed reads before a source is reopened
    #[serde(default = "default_reopen_threshold")]
    pub reopen_threshold: u32,

    /// Pause between acquisition loop iterations, in microseconds
    #[serde(default = "default_loop_interval_us")]
    pub loop_interval_us: u64,

    /// How long one read may wait for a frame, in milliseconds
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Save each camera's first frame here as `<slot>.jpg`
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            unit_size: default_unit_size(),
            pacing: PacingMode::default(),
            reopen_threshold: default_reopen_threshold(),
            loop_interval_us: default_loop_interval_us(),
            read_timeout_ms: default_read_timeout_ms(),
            snapshot_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Directory receiving finished clips
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Clip frame rate; measured from ingestion when unset
    #[serde(default)]
    pub fps: Option<u32>,

    /// Frames kept before a start signal (pre-roll)
    #[serde(default = "default_pre_roll_frames")]
    pub pre_roll_frames: usize,

    /// Frames appended after a stop signal (post-roll)
    #[serde(default = "default_post_roll_frames")]
    pub post_roll_frames: usize,

    #[serde(default)]
    pub codec: ClipCodec,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            fps: None,
            pre_roll_frames: default_pre_roll_frames(),
            post_roll_frames: default_post_roll_frames(),
            codec: ClipCodec::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Returns the last stored totals and visitor ids
    pub init_url: String,
    pub heatmap_url: String,
    pub area_visitor_url: String,
    pub visit_duration_url: String,

    /// Minimum seconds between uploads
    #[serde(default = "default_post_interval_secs")]
    pub post_interval_secs: u64,

    /// Exhibition area identifiers, in display order
    #[serde(default)]
    pub area_names: Vec<String>,
}

impl Config {
    /// Parse and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from disk or return default
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            match Self::load(path) {
                Ok(config) => return config,
                Err(e) => {
                    log::warn!("Failed to load config {:?}: {}", path, e);
                }
            }
        }

        Self::default()
    }

    /// Save config to disk
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let cameras = &self.cameras;
        if cameras.unit_size == 0 {
            return Err(ConfigError::Invalid("cameras.unit_size must be positive".into()));
        }

        let mut slots = HashSet::new();
        for source in &cameras.sources {
            if source.slot == 0 || source.slot as usize > MAX_CHANNELS {
                return Err(ConfigError::Invalid(format!(
                    "camera slot {} is outside 1..={}",
                    source.slot, MAX_CHANNELS
                )));
            }
            if !slots.insert(source.slot) {
                return Err(ConfigError::Invalid(format!(
                    "camera slot {} configured twice",
                    source.slot
                )));
            }
            if source.address.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "camera slot {} has an empty address",
                    source.slot
                )));
            }
            if let Some(rect) = source.placement {
                if !rect.is_unit_cell() {
                    return Err(ConfigError::Invalid(format!(
                        "camera slot {} placement {:?} is not a single grid cell",
                        source.slot, rect
                    )));
                }
            }
        }

        if self.recorder.fps == Some(0) {
            return Err(ConfigError::Invalid("recorder.fps must be positive".into()));
        }

        Ok(())
    }
}

/// Get the default directory for recorded clips
fn default_output_dir() -> PathBuf {
    dirs::video_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Videos")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("camgrid")
}

fn default_unit_size() -> u32 {
    540
}

fn default_reopen_threshold() -> u32 {
    DEFAULT_REOPEN_THRESHOLD
}

fn default_loop_interval_us() -> u64 {
    100
}

fn default_read_timeout_ms() -> u64 {
    1000
}

fn default_pre_roll_frames() -> usize {
    60
}

fn default_post_roll_frames() -> usize {
    60
}

fn default_post_interval_secs() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [cameras]
        unit_size = 320
        pacing = "synchronized"

        [[cameras.sources]]
        slot = 1
        address = "rtsp://10.0.0.1/profile1"

        [[cameras.sources]]
        slot = 3
        address = "data/videos/cam3_demo.mp4"

        [recorder]
        output_dir = "/tmp/clips"
        fps = 15
        pre_roll_frames = 5
        post_roll_frames = 3
        codec = "mjpeg"
    "#;

    #[test]
    fn parses_sample() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.cameras.unit_size, 320);
        assert_eq!(config.cameras.pacing, PacingMode::Synchronized);
        assert_eq!(config.cameras.sources.len(), 2);
        assert_eq!(config.cameras.reopen_threshold, 100);
        assert_eq!(config.recorder.fps, Some(15));
        assert_eq!(config.recorder.codec, ClipCodec::Mjpeg);
        assert!(config.analytics.is_none());
    }

    #[test]
    fn rejects_duplicate_and_out_of_range_slots() {
        let mut config = Config::default();
        config.cameras.sources = vec![
            CameraSource {
                slot: 2,
                address: "a.mp4".into(),
                placement: None,
            },
            CameraSource {
                slot: 2,
                address: "b.mp4".into(),
                placement: None,
            },
        ];
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.cameras.sources.truncate(1);
        config.cameras.sources[0].slot = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_fps() {
        let mut config = Config::default();
        config.recorder.fps = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("camgrid.toml");

        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.recorder.post_roll_frames = 9;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.recorder.post_roll_frames, 9);
        assert_eq!(loaded.cameras.sources, config.cameras.sources);
    }

    #[test]
    fn broken_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camgrid.toml");
        std::fs::write(&path, "cameras = 12").unwrap();

        let config = Config::load_or_default(&path);
        assert_eq!(config.cameras.unit_size, 540);
    }
}
