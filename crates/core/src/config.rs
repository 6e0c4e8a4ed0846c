use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lighting::geometry::{MAX_OCTAVE, MIN_OCTAVE};
use crate::Settings;

/// Configuration manager for lighting settings
/// Separates the schema (valid ranges and descriptions) from the persisted values.
/// Configuration is stored in `<config dir>/linnlight/config.json` by default
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

/// Available configuration options with validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub device: DeviceConfigSchema,
    pub lighting: LightingConfigSchema,
    pub scale: ScaleConfigSchema,
    pub input: InputConfigSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfigSchema {
    pub device_name: ConfigOption<String>,
    pub poll_interval_ms: ConfigOption<u64>,
    pub octave_query_interval_ms: ConfigOption<u64>,
    pub send_scale_lights: ConfigOption<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightingConfigSchema {
    pub decay_ms: ConfigOption<f32>,
    pub blackout: ConfigOption<bool>,
    pub octave: ConfigOption<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleConfigSchema {
    pub scale_root: ConfigOption<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfigSchema {
    pub bend_range_semitones: ConfigOption<f32>,
}

/// Configuration option with validation and available choices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOption<T> {
    pub default: T,
    pub valid_range: Option<(T, T)>,
    pub description: String,
}

/// Persisted configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub settings: Settings,
    pub created_at: String,
    pub modified_at: String,
}

impl ConfigManager {
    /// Create a new configuration manager
    /// If no path is provided, defaults to the user's config directory
    pub fn new(config_path: Option<PathBuf>) -> Self {
        let config_path = config_path.unwrap_or_else(Self::default_path);

        Self {
            config_path,
            settings: Settings::default(),
        }
    }

    /// `<config dir>/linnlight/config.json`, or `config.json` when the platform has no
    /// config directory
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("linnlight").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    }

    /// Load settings from configuration file
    /// Writes and returns default settings if the file doesn't exist
    pub fn load(&mut self) -> Result<Settings, ConfigError> {
        if !self.config_path.exists() {
            log::info!(
                "No config at {}, writing defaults",
                self.config_path.display()
            );
            self.save()?;
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let config_file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        // Validate version compatibility
        if config_file.version != env!("CARGO_PKG_VERSION") {
            log::warn!(
                "Config file version {} doesn't match application version {}. Using defaults for new settings.",
                config_file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        Self::validate_settings(&config_file.settings).map_err(ConfigError::ValidationError)?;

        self.settings = config_file.settings;
        log::info!("Loaded config from {}", self.config_path.display());
        Ok(self.settings.clone())
    }

    /// Save current settings to configuration file
    pub fn save(&self) -> Result<(), ConfigError> {
        // Ensure config directory exists (if config is in a subdirectory)
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let created_at = self
            .read_created_at()
            .unwrap_or_else(|| now.clone());

        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            settings: self.settings.clone(),
            created_at,
            modified_at: now,
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(&self.config_path, content)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    fn read_created_at(&self) -> Option<String> {
        let content = fs::read_to_string(&self.config_path).ok()?;
        let config_file: ConfigFile = serde_json::from_str(&content).ok()?;
        Some(config_file.created_at)
    }

    /// Validate, update settings and save to file
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), ConfigError> {
        Self::validate_settings(&settings).map_err(ConfigError::ValidationError)?;
        self.settings = settings;
        self.save()
    }

    /// Get current settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get configuration file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get configuration schema with available options
    pub fn schema() -> ConfigSchema {
        let defaults = Settings::default();
        ConfigSchema {
            device: DeviceConfigSchema {
                device_name: ConfigOption {
                    default: defaults.device_name,
                    valid_range: None,
                    description: "MIDI port name fragment used to find the device".to_string(),
                },
                poll_interval_ms: ConfigOption {
                    default: defaults.poll_interval_ms,
                    valid_range: Some((5, 100)),
                    description: "Interval between lighting refreshes in milliseconds"
                        .to_string(),
                },
                octave_query_interval_ms: ConfigOption {
                    default: defaults.octave_query_interval_ms,
                    valid_range: Some((500, 10000)),
                    description: "How often the device octave is requested again".to_string(),
                },
                send_scale_lights: ConfigOption {
                    default: defaults.send_scale_lights,
                    valid_range: None,
                    description: "Also program the device's own note lights on scale changes"
                        .to_string(),
                },
            },
            lighting: LightingConfigSchema {
                decay_ms: ConfigOption {
                    default: defaults.decay_ms,
                    valid_range: Some((0.0, 2000.0)),
                    description: "Time for a released note to fade back to its scale color"
                        .to_string(),
                },
                blackout: ConfigOption {
                    default: defaults.blackout,
                    valid_range: None,
                    description: "Turn off every cell regardless of scale".to_string(),
                },
                octave: ConfigOption {
                    default: defaults.octave,
                    valid_range: Some((MIN_OCTAVE, MAX_OCTAVE)),
                    description: "Last octave reported by the device".to_string(),
                },
            },
            scale: ScaleConfigSchema {
                scale_root: ConfigOption {
                    default: defaults.scale_root,
                    valid_range: Some((0, 11)),
                    description: "Root pitch class (0 = C)".to_string(),
                },
            },
            input: InputConfigSchema {
                bend_range_semitones: ConfigOption {
                    default: defaults.bend_range_semitones,
                    valid_range: Some((0.0, 48.0)),
                    description: "Pitch bend range of the host input in semitones".to_string(),
                },
            },
        }
    }

    /// Validate settings against schema
    pub fn validate_settings(settings: &Settings) -> Result<(), Vec<String>> {
        fn check<T: PartialOrd + std::fmt::Display + Copy>(
            errors: &mut Vec<String>,
            name: &str,
            value: T,
            option: &ConfigOption<T>,
        ) {
            if let Some((min, max)) = option.valid_range {
                if value < min || value > max {
                    errors.push(format!("{} must be between {} and {}", name, min, max));
                }
            }
        }

        let mut errors = Vec::new();
        let schema = Self::schema();

        check(
            &mut errors,
            "poll_interval_ms",
            settings.poll_interval_ms,
            &schema.device.poll_interval_ms,
        );
        check(
            &mut errors,
            "octave_query_interval_ms",
            settings.octave_query_interval_ms,
            &schema.device.octave_query_interval_ms,
        );
        check(
            &mut errors,
            "decay_ms",
            settings.decay_ms,
            &schema.lighting.decay_ms,
        );
        check(&mut errors, "octave", settings.octave, &schema.lighting.octave);
        check(
            &mut errors,
            "scale_root",
            settings.scale_root,
            &schema.scale.scale_root,
        );
        check(
            &mut errors,
            "bend_range_semitones",
            settings.bend_range_semitones,
            &schema.input.bend_range_semitones,
        );

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
    #[error("Failed to parse config file: {0}")]
    ParseError(String),
    #[error("Failed to serialize config: {0}")]
    SerializeError(String),
    #[error("Config validation errors: {}", .0.join(", "))]
    ValidationError(Vec<String>),
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::lighting::ScaleKind;

    #[test]
    fn test_config_manager_new() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.json");

        let manager = ConfigManager::new(Some(config_path.clone()));
        assert_eq!(manager.config_path(), config_path);
        assert_eq!(manager.settings(), &Settings::default());
    }

    #[test]
    fn test_load_missing_file_writes_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        let mut manager = ConfigManager::new(Some(config_path.clone()));
        let settings = manager.load().unwrap();

        assert_eq!(settings, Settings::default());
        assert!(config_path.exists());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.json");

        let mut manager = ConfigManager::new(Some(config_path.clone()));

        // Modify settings
        let mut settings = Settings::default();
        settings.decay_ms = 1200.0;
        settings.blackout = true;
        settings.device_index = Some(3);
        settings.scale_kind = ScaleKind::Dorian;

        manager.update_settings(settings.clone()).unwrap();

        // Load into new manager
        let mut manager2 = ConfigManager::new(Some(config_path));
        let loaded_settings = manager2.load().unwrap();

        assert_eq!(loaded_settings, settings);
    }

    #[test]
    fn test_validation() {
        let mut settings = Settings::default();

        // Valid settings should pass
        assert!(ConfigManager::validate_settings(&settings).is_ok());

        settings.decay_ms = 2500.0;
        assert!(ConfigManager::validate_settings(&settings).is_err());

        settings.decay_ms = 500.0;
        settings.scale_root = 12;
        let errors = ConfigManager::validate_settings(&settings).unwrap_err();
        assert_eq!(errors, vec!["scale_root must be between 0 and 11".to_string()]);
    }

    #[test]
    fn test_update_rejects_invalid_settings() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = ConfigManager::new(Some(temp_dir.path().join("config.json")));

        let mut settings = Settings::default();
        settings.poll_interval_ms = 1;
        assert!(matches!(
            manager.update_settings(settings),
            Err(ConfigError::ValidationError(_))
        ));
        assert_eq!(manager.settings(), &Settings::default());
    }

    #[test]
    fn test_corrupt_file_is_a_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        fs::write(&config_path, "{ not json").unwrap();

        let mut manager = ConfigManager::new(Some(config_path));
        assert!(matches!(manager.load(), Err(ConfigError::ParseError(_))));
    }
}
