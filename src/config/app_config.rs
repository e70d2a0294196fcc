// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Application configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Name of the backend runtime service that announces directory changes.
    pub runtime_name: String,
    /// Restore panel positions and sizes from the saved layout.
    pub restore_layout: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            runtime_name: "runtime".to_string(),
            restore_layout: true,
        }
    }
}

/// Navigation bar settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    /// Maximum number of status lines kept.
    pub status_log_capacity: usize,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            status_log_capacity: 100,
        }
    }
}

/// Panel module resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Use the generic adapter for types without a dedicated panel.
    #[serde(default)]
    pub generic_fallback: bool,
    /// Service type -> registered panel type.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub nav: NavConfig,
    #[serde(default)]
    pub modules: ModuleConfig,
}

impl AppConfig {
    /// Load config from TOML string.
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Serialize to TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.general.runtime_name, "runtime");
        assert!(config.general.restore_layout);
        assert_eq!(config.nav.status_log_capacity, 100);
        assert!(!config.modules.generic_fallback);
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml(
            r#"
            [general]
            runtime_name = "robot"
            restore_layout = false

            [modules]
            generic_fallback = true
            aliases = { mp3player = "audiofile" }
            "#,
        )
        .unwrap();
        assert_eq!(config.general.runtime_name, "robot");
        assert!(config.modules.generic_fallback);
        assert_eq!(config.modules.aliases["mp3player"], "audiofile");
        assert_eq!(config.nav.status_log_capacity, 100);
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = AppConfig::default();
        config.nav.status_log_capacity = 5;
        let back = AppConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(back.nav.status_log_capacity, 5);
    }
}
