// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Navigation shell state: connection indicator, status log, search.

use crate::registry::{PanelDescriptor, PanelError, PanelRegistry, VisibilityReport};
use std::collections::VecDeque;
use svcpanel_ipc::{Status, StatusLevel};
use tracing::{debug, info, warn};

/// Connection indicator shown in the navigation bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    Connected,
    #[default]
    Disconnected,
}

/// Bounded list of recent status lines, oldest first.
#[derive(Debug, Clone)]
pub struct StatusLog {
    entries: VecDeque<Status>,
    capacity: usize,
}

impl StatusLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, status: Status) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(status);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Status> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any kept line is an error.
    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|s| s.level == StatusLevel::Error)
    }
}

/// State behind the navigation bar.
#[derive(Debug, Clone)]
pub struct NavState {
    pub connection: ConnectionStatus,
    pub statuses: StatusLog,
    pub show_min_list: bool,
    /// Panel currently presented full screen.
    pub full_panel: Option<String>,
}

impl NavState {
    pub fn new(status_log_capacity: usize) -> Self {
        Self {
            connection: ConnectionStatus::default(),
            statuses: StatusLog::new(status_log_capacity),
            show_min_list: false,
            full_panel: None,
        }
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connection = if connected {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        };
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionStatus::Connected
    }

    pub fn add_status(&mut self, status: Status) {
        info!("Status {}: {}", status.name, status.detail);
        self.statuses.push(status);
    }

    pub fn toggle_min_list(&mut self) {
        self.show_min_list = !self.show_min_list;
        debug!("Min list shown: {}", self.show_min_list);
    }

    /// Panels whose name or type contains `query`, ignoring case.
    pub fn search<'a>(&self, registry: &'a PanelRegistry, query: &str) -> Vec<&'a PanelDescriptor> {
        let query = query.to_lowercase();
        registry
            .panel_list()
            .into_iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&query)
                    || p.simple_name.to_lowercase().contains(&query)
            })
            .collect()
    }

    /// Focus a search result: move it to the origin, on top of the others.
    pub fn select(&self, registry: &mut PanelRegistry, name: &str) -> Result<(), PanelError> {
        registry.set_position(name, 0, 0)
    }

    pub fn hide_all(&self, registry: &mut PanelRegistry) -> VisibilityReport {
        info!("Hiding all panels");
        registry.hide_all()
    }

    pub fn show_all(&self, registry: &mut PanelRegistry) -> VisibilityReport {
        info!("Showing all panels");
        registry.show_all()
    }

    pub fn present_full(&mut self, name: String) {
        if let Some(previous) = self.full_panel.replace(name) {
            warn!("Replacing full-screen panel {}", previous);
        }
    }

    pub fn close_full(&mut self) -> Option<String> {
        self.full_panel.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use svcpanel_ipc::ServiceDescriptor;

    fn status(detail: &str, level: StatusLevel) -> Status {
        Status {
            name: "svc".to_string(),
            level,
            key: None,
            detail: detail.to_string(),
        }
    }

    #[test]
    fn test_status_log_evicts_oldest() {
        let mut log = StatusLog::new(2);
        log.push(status("one", StatusLevel::Info));
        log.push(status("two", StatusLevel::Error));
        log.push(status("three", StatusLevel::Info));
        let details: Vec<&str> = log.iter().map(|s| s.detail.as_str()).collect();
        assert_eq!(details, vec!["two", "three"]);
        assert!(log.has_errors());
    }

    #[test]
    fn test_search_matches_name_and_type() {
        let mut registry = PanelRegistry::new();
        registry
            .add_service_panel(&ServiceDescriptor::new("jukebox", "AudioFile"))
            .unwrap();
        registry
            .add_service_panel(&ServiceDescriptor::new("led1", "Led"))
            .unwrap();
        let nav = NavState::new(10);

        let hits: Vec<&str> = nav.search(&registry, "AUDIO").iter().map(|p| p.name.as_str()).collect();
        assert_eq!(hits, vec!["jukebox"]);
        assert_eq!(nav.search(&registry, "").len(), 2);
        assert!(nav.search(&registry, "servo").is_empty());
    }

    #[test]
    fn test_select_raises_panel() {
        let mut registry = PanelRegistry::new();
        registry.add_service_panel(&ServiceDescriptor::new("a", "Led")).unwrap();
        registry.add_service_panel(&ServiceDescriptor::new("b", "Led")).unwrap();
        let nav = NavState::new(10);
        nav.select(&mut registry, "a").unwrap();
        let a = registry.get_service_panel("a").unwrap().position.z;
        let b = registry.get_service_panel("b").unwrap().position.z;
        assert!(a > b);
    }

    #[test]
    fn test_toggles() {
        let mut nav = NavState::new(10);
        assert!(!nav.is_connected());
        nav.set_connected(true);
        assert!(nav.is_connected());
        nav.toggle_min_list();
        assert!(nav.show_min_list);
        nav.present_full("a".to_string());
        assert_eq!(nav.close_full(), Some("a".to_string()));
        assert_eq!(nav.close_full(), None);
    }
}
