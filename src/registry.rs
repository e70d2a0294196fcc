// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Panel registry: one descriptor per live backend service.
//!
//! The registry is an owned value with a defined lifecycle. The session
//! creates it at startup, feeds it directory changes, and clears it on
//! disconnect. Descriptors start unattached. A [`PanelController`] is
//! attached later and becomes the only way to reach the panel's hooks.

use crate::config::{LayoutConfig, SavedPanel};
use crate::controller::{LoadState, PanelController};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use svcpanel_ipc::{Message, RegistryChange, ServiceDescriptor};
use tracing::{debug, error, info, warn};

/// Size classes a panel can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    Small,
    #[default]
    Medium,
    Large,
    /// Presented on a full-screen surface.
    Full,
}

impl SizeClass {
    pub const ALL: [SizeClass; 4] = [Self::Small, Self::Medium, Self::Large, Self::Full];
}

/// Current, previous and offered sizes of a panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelSizing {
    pub current: SizeClass,
    pub previous: Option<SizeClass>,
    pub available: Vec<SizeClass>,
}

impl Default for PanelSizing {
    fn default() -> Self {
        Self {
            current: SizeClass::default(),
            previous: None,
            available: SizeClass::ALL.to_vec(),
        }
    }
}

/// Position on the panel surface. Higher `z` is drawn on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PanelPosition {
    pub x: i32,
    pub y: i32,
    pub z: u32,
}

/// Registry-side record of one service panel.
pub struct PanelDescriptor {
    /// Unique key, equal to the service name.
    pub name: String,
    /// Lowercased service type; selects the adapter.
    pub panel_type: String,
    /// Service type as announced.
    pub simple_name: String,
    pub position: PanelPosition,
    pub sizing: PanelSizing,
    /// Start hidden once wired (restored from a saved layout).
    pub start_hidden: bool,
    controller: Option<PanelController>,
    stashed_visible: Option<bool>,
}

impl PanelDescriptor {
    fn new(service: &ServiceDescriptor) -> Self {
        Self {
            name: service.name.clone(),
            panel_type: service.panel_type(),
            simple_name: service.simple_name.clone(),
            position: PanelPosition::default(),
            sizing: PanelSizing::default(),
            start_hidden: false,
            controller: None,
            stashed_visible: None,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.controller.is_some()
    }

    /// Whether the controller's hooks can be called.
    pub fn is_wired(&self) -> bool {
        self.controller.as_ref().is_some_and(|c| c.is_wired())
    }

    pub fn controller(&self) -> Option<&PanelController> {
        self.controller.as_ref()
    }

    pub fn controller_mut(&mut self) -> Option<&mut PanelController> {
        self.controller.as_mut()
    }

    pub fn summary(&self) -> PanelSummary {
        let (state, visible) = match self.controller.as_ref() {
            Some(c) => (Some(c.load_state()), c.is_visible()),
            None => (None, !self.start_hidden),
        };
        PanelSummary {
            name: self.name.clone(),
            panel_type: self.panel_type.clone(),
            simple_name: self.simple_name.clone(),
            position: self.position,
            size: self.sizing.current,
            state,
            visible,
        }
    }

    fn saved(&self) -> SavedPanel {
        let hidden = match self.controller.as_ref() {
            Some(c) => !c.is_visible(),
            None => self.start_hidden,
        };
        SavedPanel {
            name: self.name.clone(),
            x: self.position.x,
            y: self.position.y,
            size: self.sizing.current,
            hidden,
        }
    }
}

/// Serializable view of a panel for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub panel_type: String,
    pub simple_name: String,
    pub position: PanelPosition,
    pub size: SizeClass,
    /// `None` while unattached.
    pub state: Option<LoadState>,
    pub visible: bool,
}

/// Which panels a bulk visibility change reached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityReport {
    pub applied: Vec<String>,
    /// Panels whose hooks were not wired yet.
    pub skipped: Vec<String>,
}

/// Errors for panel operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PanelError {
    #[error("{0} panel already created")]
    AlreadyExists(String),
    #[error("could not get panel for {0}")]
    NotFound(String),
    #[error("service {0} is not in the directory")]
    UnknownService(String),
    #[error("panel {0} is not wired yet")]
    NotWired(String),
}

/// Map from service name to panel, iterated in registration order.
#[derive(Default)]
pub struct PanelRegistry {
    panels: HashMap<String, PanelDescriptor>,
    order: Vec<String>,
    /// Layout per service name, kept after release so it is persisted and
    /// restored when the service comes back.
    saved: HashMap<String, SavedPanel>,
    next_z: u32,
}

impl PanelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that restores positions and sizes from a saved layout.
    pub fn with_layout(layout: LayoutConfig) -> Self {
        let saved = layout
            .panels
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();
        Self {
            saved,
            ..Self::default()
        }
    }

    /// Create the panel for a service.
    ///
    /// A second call for the same name is logged and leaves the first
    /// descriptor untouched.
    pub fn add_service_panel(
        &mut self,
        service: &ServiceDescriptor,
    ) -> Result<&PanelDescriptor, PanelError> {
        info!("Adding service panel {}", service.name);
        if self.panels.contains_key(&service.name) {
            error!("{} panel already created", service.name);
            return Err(PanelError::AlreadyExists(service.name.clone()));
        }

        let mut panel = PanelDescriptor::new(service);
        panel.position.z = self.raise();
        if let Some(saved) = self.saved.get(&service.name) {
            debug!("Restoring layout for {}", service.name);
            panel.position.x = saved.x;
            panel.position.y = saved.y;
            panel.sizing.current = saved.size;
            panel.start_hidden = saved.hidden;
        }

        self.order.push(service.name.clone());
        let panel: &PanelDescriptor = self.panels.entry(service.name.clone()).or_insert(panel);
        Ok(panel)
    }

    /// Drop the panel for a service. Absent names are a no-op.
    pub fn remove_service_panel(&mut self, name: &str) -> Option<PanelDescriptor> {
        info!("Removing service panel {}", name);
        let panel = self.panels.remove(name)?;
        self.order.retain(|n| n != name);
        self.saved.insert(panel.name.clone(), panel.saved());
        Some(panel)
    }

    /// Look up a panel. A miss is logged.
    pub fn get_service_panel(&self, name: &str) -> Option<&PanelDescriptor> {
        let panel = self.panels.get(name);
        if panel.is_none() {
            error!("Could not get panel for {}", name);
        }
        panel
    }

    pub fn get_service_panel_mut(&mut self, name: &str) -> Option<&mut PanelDescriptor> {
        let panel = self.panels.get_mut(name);
        if panel.is_none() {
            error!("Could not get panel for {}", name);
        }
        panel
    }

    /// The live map. Iteration order is arbitrary; use
    /// [`panel_list`](Self::panel_list) for display order.
    pub fn panels(&self) -> &HashMap<String, PanelDescriptor> {
        &self.panels
    }

    /// Panels in registration order.
    pub fn panel_list(&self) -> Vec<&PanelDescriptor> {
        self.order
            .iter()
            .filter_map(|name| self.panels.get(name))
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.panels.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    /// Bind a controller to its descriptor, replacing any earlier one.
    pub fn attach(&mut self, controller: PanelController) -> Result<(), PanelError> {
        let name = controller.name().to_string();
        let panel = self
            .panels
            .get_mut(&name)
            .ok_or(PanelError::NotFound(name))?;
        panel.controller = Some(controller);
        panel.stashed_visible = None;
        Ok(())
    }

    pub fn controller_mut(&mut self, name: &str) -> Option<&mut PanelController> {
        self.panels.get_mut(name).and_then(|p| p.controller.as_mut())
    }

    /// Hide every wired panel, remembering whether it was visible.
    ///
    /// Repeated calls keep the visibility recorded by the first one until
    /// [`show_all`](Self::show_all) consumes it.
    pub fn hide_all(&mut self) -> VisibilityReport {
        let mut report = VisibilityReport::default();
        for name in &self.order {
            let Some(panel) = self.panels.get_mut(name) else {
                continue;
            };
            let outcome = match panel.controller.as_mut() {
                Some(ctrl) => {
                    let was_visible = ctrl.is_visible();
                    ctrl.hide(true).map(|_| was_visible)
                }
                None => Err(PanelError::NotWired(name.clone())),
            };
            match outcome {
                Ok(was_visible) => {
                    // keep the value from before the first hide_all
                    panel.stashed_visible.get_or_insert(was_visible);
                    report.applied.push(name.clone());
                }
                Err(e) => {
                    warn!("hide_all: {}", e);
                    report.skipped.push(name.clone());
                }
            }
        }
        report
    }

    /// Undo [`hide_all`](Self::hide_all). Panels it did not touch are shown.
    pub fn show_all(&mut self) -> VisibilityReport {
        let mut report = VisibilityReport::default();
        for name in &self.order {
            let Some(panel) = self.panels.get_mut(name) else {
                continue;
            };
            let restore = panel.stashed_visible.unwrap_or(true);
            let outcome = match panel.controller.as_mut() {
                Some(ctrl) => ctrl.hide(!restore),
                None => Err(PanelError::NotWired(name.clone())),
            };
            match outcome {
                Ok(()) => {
                    panel.stashed_visible = None;
                    report.applied.push(name.clone());
                }
                Err(e) => {
                    warn!("show_all: {}", e);
                    report.skipped.push(name.clone());
                }
            }
        }
        report
    }

    /// Apply a runtime directory message.
    ///
    /// Returns the change that was applied, or `None` when the message was
    /// not a directory change or had no effect.
    pub fn on_msg(&mut self, msg: &Message) -> Option<RegistryChange> {
        let change = match RegistryChange::from_message(msg) {
            Ok(Some(change)) => change,
            Ok(None) => {
                debug!("Registry ignoring {}", msg.method);
                return None;
            }
            Err(e) => {
                warn!("Registry dropping message: {}", e);
                return None;
            }
        };

        let applied = match &change {
            RegistryChange::Registered(service) => self.add_service_panel(service).is_ok(),
            RegistryChange::Released(name) => self.remove_service_panel(name).is_some(),
        };
        applied.then_some(change)
    }

    /// Move a panel and bring it to the front.
    pub fn set_position(&mut self, name: &str, x: i32, y: i32) -> Result<(), PanelError> {
        let z = self.next_z;
        let panel = self
            .get_service_panel_mut(name)
            .ok_or_else(|| PanelError::NotFound(name.to_string()))?;
        panel.position = PanelPosition { x, y, z };
        self.next_z += 1;
        Ok(())
    }

    /// Record new sizes reported by a panel's controller.
    pub fn notify_panel_sizes_changed(
        &mut self,
        name: &str,
        sizing: PanelSizing,
    ) -> Result<(), PanelError> {
        debug!("Sizes changed for {}: {:?}", name, sizing.current);
        let panel = self
            .get_service_panel_mut(name)
            .ok_or_else(|| PanelError::NotFound(name.to_string()))?;
        panel.sizing = sizing;
        Ok(())
    }

    /// Layout of live panels plus remembered layouts of released ones.
    pub fn layout_snapshot(&self) -> LayoutConfig {
        let mut saved = self.saved.clone();
        for panel in self.panels.values() {
            saved.insert(panel.name.clone(), panel.saved());
        }
        let mut panels: Vec<SavedPanel> = saved.into_values().collect();
        panels.sort_by(|a, b| a.name.cmp(&b.name));
        LayoutConfig { panels }
    }

    /// Drop every panel. Saved layouts are kept for the next session.
    pub fn clear(&mut self) {
        for panel in self.panels.values() {
            self.saved.insert(panel.name.clone(), panel.saved());
        }
        self.panels.clear();
        self.order.clear();
        info!("Panel registry cleared");
    }

    fn raise(&mut self) -> u32 {
        let z = self.next_z;
        self.next_z += 1;
        z
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{AdapterContext, AudioFileAdapter};
    use crate::transport::LocalBus;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn service(name: &str, simple_name: &str) -> ServiceDescriptor {
        ServiceDescriptor::new(name, simple_name)
    }

    fn registered(name: &str, simple_name: &str) -> Message {
        Message::new(
            "runtime",
            "onRegistered",
            vec![json!({"name": name, "simpleName": simple_name})],
        )
    }

    fn released(name: &str) -> Message {
        Message::new("runtime", "onReleased", vec![json!({"name": name})])
    }

    /// Attach a loaded AudioFile controller to `name`.
    fn wire(registry: &mut PanelRegistry, name: &str) {
        let (bus, _rx) = LocalBus::new("runtime");
        let mut ctrl = PanelController::resolve(registry, name).unwrap();
        let ctx = AdapterContext::new(name, Arc::new(bus));
        ctrl.complete_load(Ok(AudioFileAdapter::factory(ctx)));
        registry.attach(ctrl).unwrap();
    }

    #[test]
    fn test_add_sets_type_from_simple_name() {
        let mut registry = PanelRegistry::new();
        let panel = registry.add_service_panel(&service("svc1", "AudioFile")).unwrap();
        assert_eq!(panel.panel_type, "audiofile");
        assert_eq!(panel.simple_name, "AudioFile");
        assert!(!panel.is_attached());
    }

    #[test]
    fn test_duplicate_add_keeps_first() {
        let mut registry = PanelRegistry::new();
        registry.add_service_panel(&service("svc1", "AudioFile")).unwrap();
        let err = registry.add_service_panel(&service("svc1", "Led")).err();
        assert_eq!(err, Some(PanelError::AlreadyExists("svc1".to_string())));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get_service_panel("svc1").unwrap().simple_name, "AudioFile");
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut registry = PanelRegistry::new();
        registry.add_service_panel(&service("svc1", "AudioFile")).unwrap();
        assert!(registry.remove_service_panel("nope").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_missing_returns_none() {
        let registry = PanelRegistry::new();
        assert!(registry.get_service_panel("ghost").is_none());
    }

    #[test]
    fn test_on_msg_register_and_release() {
        let mut registry = PanelRegistry::new();
        registry.add_service_panel(&service("svc1", "AudioFile")).unwrap();

        let change = registry.on_msg(&registered("svc2", "Led"));
        assert!(matches!(change, Some(RegistryChange::Registered(_))));
        assert_eq!(registry.panel_list().len(), 2);

        let change = registry.on_msg(&released("svc2"));
        assert_eq!(change, Some(RegistryChange::Released("svc2".to_string())));
        assert_eq!(registry.panel_list().len(), 1);

        assert!(registry.on_msg(&Message::new("runtime", "onHeartbeat", vec![])).is_none());
        assert!(registry.on_msg(&released("svc2")).is_none());
    }

    #[test]
    fn test_panel_set_tracks_event_sequence() {
        let events = [
            ("a", true),
            ("b", true),
            ("a", false),
            ("c", true),
            ("b", true),
            ("b", false),
            ("a", true),
            ("c", false),
            ("c", false),
            ("d", true),
        ];
        let mut registry = PanelRegistry::new();
        let mut expected: HashSet<String> = HashSet::new();
        for (name, register) in events {
            if register {
                registry.on_msg(&registered(name, "Led"));
                expected.insert(name.to_string());
            } else {
                registry.on_msg(&released(name));
                expected.remove(name);
            }
            let actual: HashSet<String> = registry.panels().keys().cloned().collect();
            assert_eq!(actual, expected);
            assert_eq!(registry.panel_list().len(), expected.len());
        }
    }

    #[test]
    fn test_panel_list_in_registration_order() {
        let mut registry = PanelRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.add_service_panel(&service(name, "Led")).unwrap();
        }
        registry.remove_service_panel("alpha");
        registry.add_service_panel(&service("alpha", "Led")).unwrap();
        let names: Vec<&str> = registry.panel_list().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "mid", "alpha"]);
    }

    #[test]
    fn test_hide_all_skips_unwired() {
        let mut registry = PanelRegistry::new();
        registry.add_service_panel(&service("svc1", "AudioFile")).unwrap();
        registry.add_service_panel(&service("svc2", "Led")).unwrap();
        wire(&mut registry, "svc1");

        let report = registry.hide_all();
        assert_eq!(report.applied, vec!["svc1".to_string()]);
        assert_eq!(report.skipped, vec!["svc2".to_string()]);
        assert!(!registry.get_service_panel("svc1").unwrap().controller().unwrap().is_visible());
    }

    #[test]
    fn test_hide_all_then_show_all_restores() {
        let mut registry = PanelRegistry::new();
        for name in ["a", "b", "c"] {
            registry.add_service_panel(&service(name, "AudioFile")).unwrap();
            wire(&mut registry, name);
        }
        registry.controller_mut("b").unwrap().hide(true).unwrap();
        let before: Vec<bool> = registry
            .panel_list()
            .iter()
            .map(|p| p.controller().unwrap().is_visible())
            .collect();

        registry.hide_all();
        assert!(registry
            .panel_list()
            .iter()
            .all(|p| !p.controller().unwrap().is_visible()));

        registry.show_all();
        let after: Vec<bool> = registry
            .panel_list()
            .iter()
            .map(|p| p.controller().unwrap().is_visible())
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_double_hide_all_then_show_all_restores() {
        let mut registry = PanelRegistry::new();
        for name in ["a", "b"] {
            registry.add_service_panel(&service(name, "AudioFile")).unwrap();
            wire(&mut registry, name);
        }
        registry.controller_mut("b").unwrap().hide(true).unwrap();

        registry.hide_all();
        registry.hide_all();
        registry.show_all();

        assert!(registry.get_service_panel("a").unwrap().controller().unwrap().is_visible());
        assert!(!registry.get_service_panel("b").unwrap().controller().unwrap().is_visible());

        // the stash is consumed; a later round records afresh
        registry.controller_mut("b").unwrap().hide(false).unwrap();
        registry.hide_all();
        registry.show_all();
        assert!(registry.get_service_panel("b").unwrap().controller().unwrap().is_visible());
    }

    proptest! {
        #[test]
        fn test_panel_set_matches_any_event_sequence(
            events in prop::collection::vec((0usize..5, any::<bool>()), 0..60)
        ) {
            let mut registry = PanelRegistry::new();
            let mut model: Vec<String> = Vec::new();

            for (index, register) in events {
                let name = format!("svc{}", index);
                if register {
                    registry.on_msg(&registered(&name, "Led"));
                    if !model.contains(&name) {
                        model.push(name);
                    }
                } else {
                    registry.on_msg(&released(&name));
                    model.retain(|n| *n != name);
                }

                let keys: HashSet<String> = registry.panels().keys().cloned().collect();
                let expected: HashSet<String> = model.iter().cloned().collect();
                prop_assert_eq!(keys, expected);

                let listed: Vec<String> =
                    registry.panel_list().iter().map(|p| p.name.clone()).collect();
                prop_assert_eq!(&listed, &model);
            }
        }
    }

    #[test]
    fn test_set_position_brings_to_front() {
        let mut registry = PanelRegistry::new();
        registry.add_service_panel(&service("a", "Led")).unwrap();
        registry.add_service_panel(&service("b", "Led")).unwrap();
        registry.set_position("a", 0, 0).unwrap();

        let a = registry.get_service_panel("a").unwrap().position;
        let b = registry.get_service_panel("b").unwrap().position;
        assert!(a.z > b.z);
        assert_eq!((a.x, a.y), (0, 0));
        assert!(registry.set_position("ghost", 1, 1).is_err());
    }

    #[test]
    fn test_layout_survives_release() {
        let mut registry = PanelRegistry::new();
        registry.add_service_panel(&service("a", "Led")).unwrap();
        registry.set_position("a", 40, 80).unwrap();
        let sizing = PanelSizing {
            current: SizeClass::Large,
            ..PanelSizing::default()
        };
        registry.notify_panel_sizes_changed("a", sizing).unwrap();
        registry.remove_service_panel("a");

        let layout = registry.layout_snapshot();
        assert_eq!(layout.panels.len(), 1);

        let mut restored = PanelRegistry::with_layout(layout);
        let panel = restored.add_service_panel(&service("a", "Led")).unwrap();
        assert_eq!((panel.position.x, panel.position.y), (40, 80));
        assert_eq!(panel.sizing.current, SizeClass::Large);
    }

    #[test]
    fn test_clear_empties_registry() {
        let mut registry = PanelRegistry::new();
        registry.add_service_panel(&service("a", "Led")).unwrap();
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.panel_list().is_empty());
        assert_eq!(registry.layout_snapshot().panels.len(), 1);
    }
}
