// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Saved panel layout (position, size, visibility per service name).

use crate::registry::SizeClass;
use serde::{Deserialize, Serialize};

/// Layout of one panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPanel {
    pub name: String,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default)]
    pub size: SizeClass,
    #[serde(default)]
    pub hidden: bool,
}

/// All saved panel layouts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default)]
    pub panels: Vec<SavedPanel>,
}

impl LayoutConfig {
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_toml() {
        let layout = LayoutConfig::from_toml(
            r#"
            [[panels]]
            name = "player"
            x = 10
            size = "large"
            hidden = true
            "#,
        )
        .unwrap();
        assert_eq!(layout.panels.len(), 1);
        assert_eq!(layout.panels[0].x, 10);
        assert_eq!(layout.panels[0].y, 0);
        assert_eq!(layout.panels[0].size, SizeClass::Large);
        assert!(layout.panels[0].hidden);
    }
}
