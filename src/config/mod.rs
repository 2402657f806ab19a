//! Application Configuration
//!
//! User settings stored in TOML format under the platform config directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Camera and playback settings
    pub camera: CameraSettings,
    /// Detection model settings
    pub detection: DetectionSettings,
    /// Marking recognition settings
    pub ocr: OcrSettings,
    /// Rule table and reporting settings
    pub inspection: InspectionSettings,
}

/// Camera and playback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSettings {
    /// Camera device index
    pub index: i32,
    /// Maximum processing FPS
    pub max_fps: u32,
    /// Directory of still images to play back instead of a camera
    pub playback_dir: Option<PathBuf>,
    /// Restart playback from the first image after the last
    pub loop_playback: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            index: 0,
            max_fps: 15,
            playback_dir: None,
            loop_playback: true,
        }
    }
}

/// Detection model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionSettings {
    /// Path to the ONNX detection model
    pub model_path: PathBuf,
    /// Path to the class names JSON array
    pub class_names_path: PathBuf,
    /// Square model input size in pixels
    pub input_size: u32,
    /// Minimum confidence for a detection to count
    pub confidence_threshold: f32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/pcb_detector.onnx"),
            class_names_path: PathBuf::from("models/class_names.json"),
            input_size: 640,
            confidence_threshold: 0.5,
        }
    }
}

/// Marking recognition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrSettings {
    /// Enable resistor marking recognition
    pub enabled: bool,
    /// Path to the ONNX recognition model
    pub model_path: PathBuf,
    /// Path to the character dictionary (one character per line)
    pub dict_path: PathBuf,
    /// Pixel margin added around a detection box before OCR
    pub crop_margin: u32,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            model_path: PathBuf::from("models/marking_rec.onnx"),
            dict_path: PathBuf::from("models/marking_dict.txt"),
            crop_margin: 5,
        }
    }
}

/// Rule table and reporting settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionSettings {
    /// Optional TOML rule file overriding the builtin rule table
    pub rules_file: Option<PathBuf>,
    /// Directory where inspection reports are written
    pub report_dir: PathBuf,
}

impl Default for InspectionSettings {
    fn default() -> Self {
        Self {
            rules_file: None,
            report_dir: PathBuf::from("reports"),
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let config: AppConfig =
        toml::from_str(&content).with_context(|| format!("Invalid config file {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Default location of the config file under the platform config directory.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "pcb-inspector", "pcb-inspector")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load the config from the given path, falling back to defaults when the
/// file is missing or unreadable.
pub fn load_or_default(path: Option<&Path>) -> AppConfig {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) => p,
            None => {
                warn!("No config directory available, using defaults");
                return AppConfig::default();
            }
        },
    };

    match load_config(&path) {
        Ok(config) => {
            info!("Loaded config from {:?}", path);
            config
        }
        Err(err) => {
            warn!("Using default config: {:#}", err);
            AppConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert_eq!(config.camera.index, 0);
        assert_eq!(config.camera.max_fps, 15);
        assert!(config.camera.playback_dir.is_none());

        assert_eq!(config.detection.input_size, 640);
        assert!((config.detection.confidence_threshold - 0.5).abs() < 0.01);

        assert!(config.ocr.enabled);
        assert_eq!(config.ocr.crop_margin, 5);

        assert!(config.inspection.rules_file.is_none());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = AppConfig::default();
        config.camera.index = 2;
        config.camera.playback_dir = Some(PathBuf::from("/tmp/frames"));
        config.detection.confidence_threshold = 0.35;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.camera.index, 2);
        assert_eq!(parsed.camera.playback_dir, Some(PathBuf::from("/tmp/frames")));
        assert!((parsed.detection.confidence_threshold - 0.35).abs() < 0.01);
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = AppConfig::default();
        config.ocr.enabled = false;

        let temp_file = NamedTempFile::new().unwrap();
        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert!(!loaded.ocr.enabled);
        assert_eq!(loaded.camera.max_fps, config.camera.max_fps);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        assert!(load_config(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_falls_back_on_missing_file() {
        let config = load_or_default(Some(Path::new("/nonexistent/config.toml")));
        assert_eq!(config.camera.max_fps, AppConfig::default().camera.max_fps);
    }
}
