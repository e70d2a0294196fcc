// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per-panel controller binding a descriptor to its adapter.

use crate::adapters::{LoadResult, ServiceAdapter};
use crate::message::PanelEffect;
use crate::registry::{PanelError, PanelRegistry, PanelSizing, SizeClass};
use crate::transport::Topic;
use serde::Serialize;
use svcpanel_ipc::Message;
use tracing::{debug, info};
use uuid::Uuid;

/// Progress of a panel's adapter load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Loading,
    Loaded,
    /// No adapter could be loaded. Never retried.
    NotFound,
}

/// Controller for one panel.
///
/// Created in [`LoadState::Loading`]. Hooks become callable once the
/// adapter load succeeds; until then they return [`PanelError::NotWired`].
pub struct PanelController {
    name: String,
    panel_type: String,
    token: Uuid,
    load_state: LoadState,
    show: bool,
    init_done: bool,
    panel_names: Vec<String>,
    show_names: bool,
    sizing: PanelSizing,
    adapter: Option<Box<dyn ServiceAdapter>>,
}

impl PanelController {
    /// Build a controller for a registered panel.
    pub fn resolve(registry: &PanelRegistry, name: &str) -> Result<Self, PanelError> {
        let panel = registry
            .get_service_panel(name)
            .ok_or_else(|| PanelError::NotFound(name.to_string()))?;
        let mut ctrl = Self::new(&panel.name, &panel.panel_type);
        ctrl.show = !panel.start_hidden;
        ctrl.sizing = panel.sizing.clone();
        Ok(ctrl)
    }

    pub fn new(name: &str, panel_type: &str) -> Self {
        debug!("Panel controller for {} ({})", name, panel_type);
        Self {
            name: name.to_string(),
            panel_type: panel_type.to_string(),
            token: Uuid::new_v4(),
            load_state: LoadState::Loading,
            show: true,
            init_done: false,
            panel_names: Vec::new(),
            show_names: false,
            sizing: PanelSizing::default(),
            adapter: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn panel_type(&self) -> &str {
        &self.panel_type
    }

    /// Identifies this attachment; a load result carrying another token is stale.
    pub fn token(&self) -> Uuid {
        self.token
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn service_loaded(&self) -> bool {
        self.load_state == LoadState::Loaded
    }

    pub fn service_not_found(&self) -> bool {
        self.load_state == LoadState::NotFound
    }

    pub fn is_wired(&self) -> bool {
        self.service_loaded()
    }

    pub fn is_visible(&self) -> bool {
        self.show
    }

    pub fn is_init_done(&self) -> bool {
        self.init_done
    }

    pub fn panel_names(&self) -> &[String] {
        &self.panel_names
    }

    pub fn shows_names(&self) -> bool {
        self.show_names
    }

    pub fn sizing(&self) -> &PanelSizing {
        &self.sizing
    }

    /// Apply the outcome of the adapter load. Only the first outcome counts.
    pub fn complete_load(&mut self, result: LoadResult) {
        if self.load_state != LoadState::Loading {
            debug!("{}: load already settled", self.name);
            return;
        }
        match result {
            Ok(adapter) => {
                info!("Loaded panel module {} for {}", self.panel_type, self.name);
                self.adapter = Some(adapter);
                self.load_state = LoadState::Loaded;
            }
            Err(e) => {
                info!("Lazy loading wasn't successful for {}: {}", self.name, e);
                self.load_state = LoadState::NotFound;
            }
        }
    }

    fn ensure_wired(&self) -> Result<(), PanelError> {
        if self.is_wired() {
            Ok(())
        } else {
            Err(PanelError::NotWired(self.name.clone()))
        }
    }

    /// Create the message binding. Only the first call has an effect.
    pub fn init_done(&mut self) -> Result<Option<PanelEffect>, PanelError> {
        self.ensure_wired()?;
        if self.init_done {
            return Ok(None);
        }
        self.init_done = true;
        Ok(Some(PanelEffect::Subscribe(Topic::service(self.name.clone()))))
    }

    pub fn set_panel_names(&mut self, names: Vec<String>) -> Result<(), PanelError> {
        self.ensure_wired()?;
        info!("Setting panel names for {}: {:?}", self.name, names);
        self.panel_names = names;
        Ok(())
    }

    pub fn set_panel_show_names(&mut self, show: bool) -> Result<(), PanelError> {
        self.ensure_wired()?;
        info!("Setting panel show names for {}: {}", self.name, show);
        self.show_names = show;
        Ok(())
    }

    /// Offer a new set of size classes.
    pub fn set_panel_sizes(&mut self, sizes: Vec<SizeClass>) -> Result<PanelEffect, PanelError> {
        self.ensure_wired()?;
        info!("Setting panel sizes for {}", self.name);
        self.sizing.available = sizes;
        Ok(self.sizes_changed())
    }

    /// Hide or show the panel.
    pub fn hide(&mut self, to_hide: bool) -> Result<(), PanelError> {
        self.ensure_wired()?;
        self.show = !to_hide;
        Ok(())
    }

    /// Switch size class. `Full` also asks for the full-screen surface.
    pub fn change_size(&mut self, size: SizeClass) -> Result<Vec<PanelEffect>, PanelError> {
        self.ensure_wired()?;
        debug!("Change size {} {:?}", self.name, size);
        self.sizing.previous = Some(self.sizing.current);
        self.sizing.current = size;

        let mut effects = vec![self.sizes_changed()];
        if size == SizeClass::Full {
            effects.push(PanelEffect::PresentFull(self.name.clone()));
        }
        Ok(effects)
    }

    fn sizes_changed(&self) -> PanelEffect {
        PanelEffect::SizesChanged {
            name: self.name.clone(),
            sizing: self.sizing.clone(),
        }
    }

    /// Route an inbound message to the adapter.
    pub fn on_msg(&mut self, msg: &Message) {
        match self.adapter.as_mut() {
            Some(adapter) => adapter.on_msg(msg),
            None => debug!("{}: dropping {} before load", self.name, msg.method),
        }
    }

    pub fn adapter(&self) -> Option<&dyn ServiceAdapter> {
        self.adapter.as_deref()
    }

    pub fn adapter_mut(&mut self) -> Option<&mut (dyn ServiceAdapter + 'static)> {
        self.adapter.as_deref_mut()
    }

    /// Typed access to the loaded adapter.
    pub fn adapter_as<T: ServiceAdapter>(&self) -> Option<&T> {
        self.adapter.as_ref()?.as_any().downcast_ref::<T>()
    }

    pub fn adapter_as_mut<T: ServiceAdapter>(&mut self) -> Option<&mut T> {
        self.adapter.as_mut()?.as_any_mut().downcast_mut::<T>()
    }
}
