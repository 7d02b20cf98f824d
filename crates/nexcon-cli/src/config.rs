//! CLI settings
//!
//! Read from a YAML file (`nexcon.yaml` in the working directory unless
//! `--config` is given). Every key is optional; command-line flags override
//! the file.

use nexcon_core::export::writer_commands::DEFAULT_BROKER;
use nexcon_core::logging_facility::Profile;
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_SETTINGS_FILE: &str = "nexcon.yaml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Broker written into FileWriter commands
    pub broker: String,
    /// NeXus file name written into FileWriter commands
    pub output_file_name: String,
    pub logging: Profile,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            broker: DEFAULT_BROKER.to_string(),
            output_file_name: "output.nxs".to_string(),
            logging: Profile::default(),
        }
    }
}

impl Settings {
    /// Load settings
    ///
    /// An explicit path must exist. Without one, a missing `nexcon.yaml` means
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub fn load(explicit: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let path = match explicit {
            Some(path) => path,
            None => {
                let default = Path::new(DEFAULT_SETTINGS_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read settings {}: {}", path.display(), e))?;
        Self::from_yaml(&text)
    }

    /// # Errors
    ///
    /// Returns an error if `text` is not a valid settings document.
    pub fn from_yaml(text: &str) -> Result<Self, Box<dyn std::error::Error>> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings = Settings::from_yaml("broker: kafka.example:9092\n").unwrap();
        assert_eq!(settings.broker, "kafka.example:9092");
        assert_eq!(settings.output_file_name, "output.nxs");
        assert_eq!(settings.logging, Profile::Development);
    }

    #[test]
    fn test_logging_profile() {
        let settings = Settings::from_yaml("logging: production\n").unwrap();
        assert_eq!(settings.logging, Profile::Production);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(Settings::from_yaml("brokr: x\n").is_err());
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(Settings::from_yaml("").unwrap(), Settings::default());
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("absent.yaml");
        assert!(Settings::load(Some(&missing)).is_err());
    }
}
