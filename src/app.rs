// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Panel session: owns the registry and routes bus traffic to panels.
//!
//! Everything runs on one task. Each transport event and each finished
//! adapter load is handled to completion before the next one is looked at.

use crate::adapters::{AdapterContext, LoadResult, ModuleLoader, ServiceAdapter};
use crate::config::{AppConfig, ConfigError, ConfigManager, LayoutConfig};
use crate::controller::PanelController;
use crate::message::PanelEffect;
use crate::registry::{PanelError, PanelRegistry, PanelSummary, SizeClass, VisibilityReport};
use crate::state::NavState;
use crate::transport::{Topic, Transport, TransportEvent};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use svcpanel_ipc::{
    Message, RegistryChange, Status, METHOD_REGISTERED, METHOD_RELEASED, METHOD_STATUS,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Finished adapter load for one attachment.
pub struct LoadOutcome {
    pub name: String,
    pub token: Uuid,
    pub result: LoadResult,
}

enum Step {
    Event(TransportEvent),
    Loaded(LoadOutcome),
    Closed,
}

/// Main session state.
pub struct Session {
    transport: Arc<dyn Transport>,
    loader: Arc<dyn ModuleLoader>,
    runtime_name: String,
    registry: PanelRegistry,
    nav: NavState,
    pending: FuturesUnordered<BoxFuture<'static, LoadOutcome>>,
    started: bool,
    config_manager: Option<ConfigManager>,
}

impl Session {
    /// Create a session. Nothing is subscribed until [`start`](Self::start).
    pub fn new(
        transport: Arc<dyn Transport>,
        loader: Arc<dyn ModuleLoader>,
        config: &AppConfig,
        layout: LayoutConfig,
    ) -> Self {
        let layout = if config.general.restore_layout {
            layout
        } else {
            LayoutConfig::default()
        };
        Self {
            runtime_name: transport.runtime_name(),
            transport,
            loader,
            registry: PanelRegistry::with_layout(layout),
            nav: NavState::new(config.nav.status_log_capacity),
            pending: FuturesUnordered::new(),
            started: false,
            config_manager: None,
        }
    }

    /// Persist the layout through `manager` on [`save_layout`](Self::save_layout).
    pub fn with_config_manager(mut self, manager: ConfigManager) -> Self {
        self.config_manager = Some(manager);
        self
    }

    pub fn registry(&self) -> &PanelRegistry {
        &self.registry
    }

    pub fn nav(&self) -> &NavState {
        &self.nav
    }

    pub fn nav_mut(&mut self) -> &mut NavState {
        &mut self.nav
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Number of adapter loads still in flight.
    pub fn pending_loads(&self) -> usize {
        self.pending.len()
    }

    /// Subscribe to directory changes, then seed panels from the snapshot.
    ///
    /// Subscribing first means a service registering in between is seen
    /// either in the snapshot or as an event; duplicates are ignored.
    pub fn start(&mut self) {
        info!("Starting panel session on {}", self.runtime_name);
        self.transport.subscribe(Topic::service(self.runtime_name.clone()));
        self.transport.subscribe(Topic::method(METHOD_STATUS));

        for service in self.transport.registry() {
            if self.registry.add_service_panel(&service).is_ok() {
                self.attach_logged(&service.name);
            }
        }

        self.nav.set_connected(self.transport.is_connected());
        self.started = true;
        info!("Session started with {} panels", self.registry.len());
    }

    /// Drop every panel and forget in-flight loads.
    pub fn teardown(&mut self) {
        for panel in self.registry.panel_list() {
            if panel.name != self.runtime_name {
                self.transport.unsubscribe(&Topic::service(panel.name.clone()));
            }
        }
        self.registry.clear();
        self.pending = FuturesUnordered::new();
        self.nav.full_panel = None;
        self.started = false;
    }

    /// Create the panel for a service known to the transport.
    pub fn add_service_panel(&mut self, name: &str) -> Result<(), PanelError> {
        let Some(service) = self.transport.service(name) else {
            error!("Service {} is not in the directory", name);
            return Err(PanelError::UnknownService(name.to_string()));
        };
        self.registry.add_service_panel(&service)?;
        self.attach_logged(name);
        Ok(())
    }

    /// Remove a panel and its message binding. Absent names are a no-op.
    pub fn remove_service_panel(&mut self, name: &str) {
        if self.registry.remove_service_panel(name).is_some() {
            self.detached(name);
        }
    }

    /// Bind a fresh controller to a panel and start loading its adapter.
    pub fn attach_panel(&mut self, name: &str) -> Result<(), PanelError> {
        let ctrl = PanelController::resolve(&self.registry, name)?;
        let token = ctrl.token();
        let panel_type = ctrl.panel_type().to_string();
        self.registry.attach(ctrl)?;

        debug!("Lazy-loading {} for {}", panel_type, name);
        let load = self
            .loader
            .load(&panel_type, AdapterContext::new(name, self.transport.clone()));
        let name = name.to_string();
        self.pending.push(
            async move {
                LoadOutcome {
                    name,
                    token,
                    result: load.await,
                }
            }
            .boxed(),
        );
        Ok(())
    }

    fn attach_logged(&mut self, name: &str) {
        if let Err(e) = self.attach_panel(name) {
            error!("Failed to attach panel {}: {}", name, e);
        }
    }

    fn detached(&mut self, name: &str) {
        if name != self.runtime_name {
            self.transport.unsubscribe(&Topic::service(name.to_string()));
        }
        if self.nav.full_panel.as_deref() == Some(name) {
            self.nav.full_panel = None;
        }
    }

    /// Apply a finished load unless its panel was released or re-attached.
    pub fn complete_load(&mut self, outcome: LoadOutcome) {
        let Some(ctrl) = self.registry.controller_mut(&outcome.name) else {
            debug!("Panel {} gone before its load finished", outcome.name);
            return;
        };
        if ctrl.token() != outcome.token {
            debug!("Discarding stale load for {}", outcome.name);
            return;
        }

        ctrl.complete_load(outcome.result);
        if !ctrl.is_wired() {
            return;
        }
        match ctrl.init_done() {
            Ok(effect) => self.apply_effects(effect.into_iter().collect()),
            Err(e) => warn!("init_done for {}: {}", outcome.name, e),
        }
    }

    /// Wait for every in-flight load and apply it.
    pub async fn drain_loads(&mut self) {
        while let Some(outcome) = self.pending.next().await {
            self.complete_load(outcome);
        }
    }

    /// Handle one transport event.
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                info!("Connected");
                self.nav.set_connected(true);
                if !self.started {
                    self.start();
                }
            }
            TransportEvent::Closed => {
                info!("Disconnected");
                self.nav.set_connected(false);
                self.teardown();
            }
            TransportEvent::Message(msg) => self.route(msg),
        }
    }

    fn route(&mut self, msg: Message) {
        if msg.name == self.runtime_name
            && (msg.method == METHOD_REGISTERED || msg.method == METHOD_RELEASED)
        {
            match self.registry.on_msg(&msg) {
                Some(RegistryChange::Registered(service)) => self.attach_logged(&service.name),
                Some(RegistryChange::Released(name)) => self.detached(&name),
                None => {}
            }
            return;
        }

        if msg.method == METHOD_STATUS {
            match msg.first_arg::<Status>() {
                Ok(status) => self.nav.add_status(status),
                Err(e) => warn!("Bad status message: {}", e),
            }
            return;
        }

        match self.registry.controller_mut(&msg.name) {
            Some(ctrl) if ctrl.is_init_done() => ctrl.on_msg(&msg),
            Some(_) => debug!("Panel {} not bound yet, dropping {}", msg.name, msg.method),
            None => debug!("No panel for {}, dropping {}", msg.name, msg.method),
        }
    }

    fn apply_effects(&mut self, effects: Vec<PanelEffect>) {
        for effect in effects {
            match effect {
                PanelEffect::Subscribe(topic) => self.transport.subscribe(topic),
                PanelEffect::SizesChanged { name, sizing } => {
                    if let Err(e) = self.registry.notify_panel_sizes_changed(&name, sizing) {
                        warn!("Size change for {}: {}", name, e);
                    }
                }
                PanelEffect::PresentFull(name) => self.nav.present_full(name),
            }
        }
    }

    /// Event loop: transport events and load completions, one per turn,
    /// until the transport's event channel closes.
    pub async fn run(&mut self, mut events: UnboundedReceiver<TransportEvent>) {
        if !self.started {
            self.start();
        }
        loop {
            let step = tokio::select! {
                event = events.recv() => match event {
                    Some(event) => Step::Event(event),
                    None => Step::Closed,
                },
                Some(outcome) = self.pending.next(), if !self.pending.is_empty() => {
                    Step::Loaded(outcome)
                }
            };
            match step {
                Step::Event(event) => self.handle_event(event),
                Step::Loaded(outcome) => self.complete_load(outcome),
                Step::Closed => break,
            }
        }
        info!("Session event loop finished");
    }

    fn controller(&mut self, name: &str) -> Result<&mut PanelController, PanelError> {
        self.registry
            .get_service_panel_mut(name)
            .ok_or_else(|| PanelError::NotFound(name.to_string()))?
            .controller_mut()
            .ok_or_else(|| PanelError::NotWired(name.to_string()))
    }

    /// Panel view finished rendering; bind its messages.
    pub fn init_done(&mut self, name: &str) -> Result<(), PanelError> {
        let effect = self.controller(name)?.init_done()?;
        self.apply_effects(effect.into_iter().collect());
        Ok(())
    }

    pub fn set_panel_names(&mut self, name: &str, names: Vec<String>) -> Result<(), PanelError> {
        self.controller(name)?.set_panel_names(names)
    }

    pub fn set_panel_show_names(&mut self, name: &str, show: bool) -> Result<(), PanelError> {
        self.controller(name)?.set_panel_show_names(show)
    }

    pub fn set_panel_sizes(&mut self, name: &str, sizes: Vec<SizeClass>) -> Result<(), PanelError> {
        let effect = self.controller(name)?.set_panel_sizes(sizes)?;
        self.apply_effects(vec![effect]);
        Ok(())
    }

    /// User picked a new size class for a panel.
    pub fn change_size(&mut self, name: &str, size: SizeClass) -> Result<(), PanelError> {
        let effects = self.controller(name)?.change_size(size)?;
        self.apply_effects(effects);
        Ok(())
    }

    pub fn hide(&mut self, name: &str, to_hide: bool) -> Result<(), PanelError> {
        self.controller(name)?.hide(to_hide)
    }

    pub fn hide_all(&mut self) -> VisibilityReport {
        self.nav.hide_all(&mut self.registry)
    }

    pub fn show_all(&mut self) -> VisibilityReport {
        self.nav.show_all(&mut self.registry)
    }

    /// Names of panels matching a search query, in display order.
    pub fn search(&self, query: &str) -> Vec<String> {
        self.nav
            .search(&self.registry, query)
            .into_iter()
            .map(|p| p.name.clone())
            .collect()
    }

    /// Bring a search hit to the front.
    pub fn select(&mut self, name: &str) -> Result<(), PanelError> {
        self.nav.select(&mut self.registry, name)
    }

    pub fn panel_summaries(&self) -> Vec<PanelSummary> {
        self.registry.panel_list().iter().map(|p| p.summary()).collect()
    }

    /// Typed access to a loaded adapter, for user actions.
    pub fn adapter_mut<T: ServiceAdapter>(&mut self, name: &str) -> Option<&mut T> {
        self.registry.controller_mut(name)?.adapter_as_mut::<T>()
    }

    pub fn adapter<T: ServiceAdapter>(&self, name: &str) -> Option<&T> {
        self.registry.panels().get(name)?.controller()?.adapter_as::<T>()
    }

    /// Write the current layout, if a config manager is attached.
    pub fn save_layout(&self) -> Result<(), ConfigError> {
        match self.config_manager.as_ref() {
            Some(manager) => manager.save_layout(&self.registry.layout_snapshot()),
            None => Ok(()),
        }
    }
}
