// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per-service-type panel adapters.
//!
//! An adapter owns the view model of one panel, handles the inbound
//! messages of its service, and turns user actions into outbound commands.
//! Adapters are resolved through a factory table keyed by the lowercased
//! service type.
//!
//! ```text
//! ┌──────────────┐   load(type)   ┌──────────────────────┐
//! │ PanelCtrl    │ ─────────────► │ ModuleLoader         │
//! └──────────────┘                │  (AdapterTable)      │
//!        ▲                        │  "audiofile" ─► fn   │
//!        │ Box<dyn ServiceAdapter>│  fallback?   ─► fn   │
//!        └────────────────────────┴──────────────────────┘
//! ```

pub mod audio_file;
pub mod generic;

pub use audio_file::{AudioFileAdapter, AudioFileInbound, AudioFileState};
pub use generic::GenericAdapter;

use crate::config::ModuleConfig;
use crate::transport::Transport;
use futures::future::{self, BoxFuture, FutureExt};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use svcpanel_ipc::Message;
use tracing::{debug, error, warn};

/// A loaded panel adapter.
pub trait ServiceAdapter: Any + Send {
    /// Name of the service this adapter is bound to.
    fn service_name(&self) -> &str;

    /// Handle an inbound message for this service.
    ///
    /// The default endpoint only logs. Adapters that care about their
    /// service's traffic override it.
    fn on_msg(&mut self, msg: &Message) {
        warn!(
            "Got {} for {} at the default service endpoint",
            msg.method,
            self.service_name()
        );
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Outbound command handle given to each adapter.
#[derive(Clone)]
pub struct CommandSender {
    service: String,
    transport: Arc<dyn Transport>,
}

impl CommandSender {
    pub fn new(service: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            service: service.into(),
            transport,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Send `method(args...)` to the bound service. Failures are logged.
    pub fn send(&self, method: &str, args: Vec<Value>) {
        let msg = Message::new(self.service.clone(), method, args);
        if let Err(e) = self.transport.send(msg) {
            error!("Failed to send {}.{}: {}", self.service, method, e);
        }
    }
}

/// Everything a factory needs to build an adapter.
#[derive(Clone)]
pub struct AdapterContext {
    pub service_name: String,
    pub sender: CommandSender,
}

impl AdapterContext {
    pub fn new(service_name: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        let service_name = service_name.into();
        Self {
            sender: CommandSender::new(service_name.clone(), transport),
            service_name,
        }
    }
}

/// Constructor stored in the factory table.
pub type AdapterFactory = fn(AdapterContext) -> Box<dyn ServiceAdapter>;

/// Result of loading an adapter.
pub type LoadResult = Result<Box<dyn ServiceAdapter>, LoadError>;

/// Error type for adapter loading.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
    /// No adapter registered for this type.
    #[error("no panel module for type '{0}'")]
    ModuleNotFound(String),

    /// The module exists but could not be built.
    #[error("panel module '{module}' failed to load: {reason}")]
    Failed { module: String, reason: String },
}

/// Source of panel adapters.
///
/// Loading may suspend; the session keeps handling events meanwhile.
pub trait ModuleLoader: Send + Sync {
    fn load(&self, panel_type: &str, ctx: AdapterContext) -> BoxFuture<'static, LoadResult>;
}

/// Static factory table mapping panel types to adapter constructors.
#[derive(Clone, Default)]
pub struct AdapterTable {
    factories: HashMap<String, AdapterFactory>,
    aliases: HashMap<String, String>,
    fallback: Option<AdapterFactory>,
}

impl AdapterTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with every adapter shipped in this crate.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        table.register("audiofile", AudioFileAdapter::factory);
        table
    }

    /// Built-in table adjusted by the `[modules]` config section.
    pub fn from_config(config: &ModuleConfig) -> Self {
        let mut table = Self::builtin();
        for (from, to) in &config.aliases {
            table.alias(from, to);
        }
        if config.generic_fallback {
            table.set_fallback(Some(GenericAdapter::factory));
        }
        table
    }

    /// Register a constructor for a panel type. Keys are lowercased.
    pub fn register(&mut self, panel_type: &str, factory: AdapterFactory) {
        let key = panel_type.to_lowercase();
        if self.factories.insert(key.clone(), factory).is_some() {
            debug!("Replaced panel module for {}", key);
        }
    }

    /// Route one panel type to another type's constructor.
    pub fn alias(&mut self, from: &str, to: &str) {
        self.aliases.insert(from.to_lowercase(), to.to_lowercase());
    }

    /// Constructor used for types with no entry.
    pub fn set_fallback(&mut self, fallback: Option<AdapterFactory>) {
        self.fallback = fallback;
    }

    pub fn resolve(&self, panel_type: &str) -> Option<AdapterFactory> {
        let key = panel_type.to_lowercase();
        let key = self.aliases.get(&key).unwrap_or(&key);
        self.factories.get(key).copied().or(self.fallback)
    }

    /// Registered panel types, sorted.
    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }
}

impl ModuleLoader for AdapterTable {
    fn load(&self, panel_type: &str, ctx: AdapterContext) -> BoxFuture<'static, LoadResult> {
        let result = match self.resolve(panel_type) {
            Some(factory) => {
                debug!("Loading panel module {} for {}", panel_type, ctx.service_name);
                Ok(factory(ctx))
            }
            None => Err(LoadError::ModuleNotFound(panel_type.to_string())),
        };
        future::ready(result).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LocalBus;

    fn ctx(name: &str) -> AdapterContext {
        let (bus, _rx) = LocalBus::new("runtime");
        AdapterContext::new(name, Arc::new(bus))
    }

    #[test]
    fn test_builtin_has_audiofile() {
        let table = AdapterTable::builtin();
        assert!(table.resolve("audiofile").is_some());
        assert!(table.resolve("AudioFile").is_some());
        assert!(table.resolve("unknownthing").is_none());
        assert_eq!(table.types(), vec!["audiofile".to_string()]);
    }

    #[test]
    fn test_alias_and_fallback() {
        let config = ModuleConfig {
            generic_fallback: true,
            aliases: [("mp3player".to_string(), "audiofile".to_string())]
                .into_iter()
                .collect(),
        };
        let table = AdapterTable::from_config(&config);

        let factory = table.resolve("mp3player").unwrap();
        let adapter = factory(ctx("jukebox"));
        assert!(adapter.as_any().downcast_ref::<AudioFileAdapter>().is_some());

        let factory = table.resolve("led").unwrap();
        let adapter = factory(ctx("led1"));
        assert!(adapter.as_any().downcast_ref::<GenericAdapter>().is_some());
    }

    #[tokio::test]
    async fn test_load_unknown_type() {
        let table = AdapterTable::builtin();
        let result = table.load("unknownthing", ctx("x")).await;
        assert!(matches!(result, Err(LoadError::ModuleNotFound(t)) if t == "unknownthing"));
    }

    #[tokio::test]
    async fn test_load_known_type() {
        let table = AdapterTable::builtin();
        let adapter = table.load("audiofile", ctx("player")).await.unwrap();
        assert_eq!(adapter.service_name(), "player");
    }

    #[test]
    fn test_command_sender_targets_service() {
        let (bus, _rx) = LocalBus::new("runtime");
        let sender = CommandSender::new("player", Arc::new(bus.clone()));
        sender.send("stop", vec![]);
        let sent = bus.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].name, "player");
        assert_eq!(sent[0].method, "stop");
    }
}
