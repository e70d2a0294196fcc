// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Client side of the service bus.
//!
//! The panel core only needs a service directory, topic subscriptions and
//! a fire-and-forget `send`. Inbound traffic arrives as [`TransportEvent`]s
//! on an unbounded channel that the session drains.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use svcpanel_ipc::{Message, RegistryChange, ServiceDescriptor};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

/// Events delivered by a transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Connection to the backend established.
    Opened,
    /// Connection to the backend lost.
    Closed,
    /// A message on a subscribed topic.
    Message(Message),
}

/// What a subscriber is interested in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Every message concerning the named service.
    Service(String),
    /// Every message with this method, whatever the service.
    Method(String),
}

impl Topic {
    pub fn service(name: impl Into<String>) -> Self {
        Self::Service(name.into())
    }

    pub fn method(method: impl Into<String>) -> Self {
        Self::Method(method.into())
    }

    fn matches(&self, msg: &Message) -> bool {
        match self {
            Self::Service(name) => *name == msg.name,
            Self::Method(method) => *method == msg.method,
        }
    }
}

/// The messaging and service-directory layer the panel core depends on.
pub trait Transport: Send + Sync {
    /// Name of the runtime service that announces directory changes.
    fn runtime_name(&self) -> String;

    fn is_connected(&self) -> bool;

    /// Look up one service in the directory.
    fn service(&self, name: &str) -> Option<ServiceDescriptor>;

    /// Snapshot of the directory, in registration order.
    fn registry(&self) -> Vec<ServiceDescriptor>;

    fn subscribe(&self, topic: Topic);

    fn unsubscribe(&self, topic: &Topic);

    /// Fire-and-forget delivery to the backend.
    fn send(&self, msg: Message) -> Result<(), TransportError>;
}

/// Errors that can occur when talking to the bus.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Not connected to the backend")]
    NotConnected,
    #[error("Transport channel closed")]
    Closed,
}

#[derive(Default)]
struct BusInner {
    runtime_name: String,
    connected: bool,
    directory: Vec<ServiceDescriptor>,
    subscriptions: HashSet<Topic>,
    sent: Vec<Message>,
    event_tx: Option<UnboundedSender<TransportEvent>>,
}

impl BusInner {
    fn is_subscribed(&self, msg: &Message) -> bool {
        self.subscriptions.iter().any(|topic| topic.matches(msg))
    }

    fn emit(&self, event: TransportEvent) {
        if let Some(tx) = self.event_tx.as_ref() {
            if tx.send(event).is_err() {
                debug!("Event receiver dropped");
            }
        }
    }
}

/// In-process bus used by the headless shell and by tests.
///
/// It keeps its own service directory, delivers only subscribed messages,
/// and records outbound commands so they can be inspected.
#[derive(Clone)]
pub struct LocalBus {
    inner: Arc<Mutex<BusInner>>,
}

impl LocalBus {
    /// Create a connected bus and the receiver for its events.
    pub fn new(runtime_name: impl Into<String>) -> (Self, UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = unbounded_channel();
        let inner = BusInner {
            runtime_name: runtime_name.into(),
            connected: true,
            event_tx: Some(tx),
            ..Default::default()
        };
        (
            Self {
                inner: Arc::new(Mutex::new(inner)),
            },
            rx,
        )
    }

    /// Add a service to the directory without announcing it.
    pub fn seed(&self, service: ServiceDescriptor) {
        let mut inner = self.inner.lock();
        inner.directory.retain(|s| s.name != service.name);
        inner.directory.push(service);
    }

    /// Add a service and announce it on the runtime topic.
    pub fn register_service(&self, service: ServiceDescriptor) {
        let runtime = self.runtime_name();
        let data = vec![serde_json::json!({
            "name": service.name,
            "simpleName": service.simple_name,
        })];
        self.deliver(Message::new(runtime, svcpanel_ipc::METHOD_REGISTERED, data));
    }

    /// Remove a service and announce its release.
    pub fn release_service(&self, name: &str) {
        let runtime = self.runtime_name();
        let data = vec![serde_json::json!({ "name": name })];
        self.deliver(Message::new(runtime, svcpanel_ipc::METHOD_RELEASED, data));
    }

    /// Feed one inbound message through the bus.
    ///
    /// Directory changes on the runtime topic update the directory before
    /// subscribers see them.
    pub fn deliver(&self, msg: Message) {
        let mut inner = self.inner.lock();
        if msg.name == inner.runtime_name {
            match RegistryChange::from_message(&msg) {
                Ok(Some(RegistryChange::Registered(service))) => {
                    inner.directory.retain(|s| s.name != service.name);
                    inner.directory.push(service);
                }
                Ok(Some(RegistryChange::Released(name))) => {
                    inner.directory.retain(|s| s.name != name);
                }
                Ok(None) => {}
                Err(e) => warn!("Bad directory message: {}", e),
            }
        }

        if !inner.connected {
            debug!("Dropping {}.{} while disconnected", msg.name, msg.method);
            return;
        }
        if inner.is_subscribed(&msg) {
            inner.emit(TransportEvent::Message(msg));
        } else {
            debug!("No subscriber for {}.{}", msg.name, msg.method);
        }
    }

    /// Simulate the connection coming up.
    pub fn open(&self) {
        let mut inner = self.inner.lock();
        inner.connected = true;
        inner.emit(TransportEvent::Opened);
        info!("Bus connection opened");
    }

    /// Simulate the connection dropping. Subscriptions do not survive it.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.connected = false;
        inner.subscriptions.clear();
        inner.emit(TransportEvent::Closed);
        info!("Bus connection closed");
    }

    /// Drop the event sender so the session loop ends.
    pub fn shutdown(&self) {
        self.inner.lock().event_tx = None;
    }

    /// Outbound commands sent so far.
    pub fn sent(&self) -> Vec<Message> {
        self.inner.lock().sent.clone()
    }

    pub fn is_subscribed(&self, topic: &Topic) -> bool {
        self.inner.lock().subscriptions.contains(topic)
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.lock().subscriptions.len()
    }
}

impl Transport for LocalBus {
    fn runtime_name(&self) -> String {
        self.inner.lock().runtime_name.clone()
    }

    fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }

    fn service(&self, name: &str) -> Option<ServiceDescriptor> {
        self.inner
            .lock()
            .directory
            .iter()
            .find(|s| s.name == name)
            .cloned()
    }

    fn registry(&self) -> Vec<ServiceDescriptor> {
        self.inner.lock().directory.clone()
    }

    fn subscribe(&self, topic: Topic) {
        debug!("Subscribing to {:?}", topic);
        self.inner.lock().subscriptions.insert(topic);
    }

    fn unsubscribe(&self, topic: &Topic) {
        debug!("Unsubscribing from {:?}", topic);
        self.inner.lock().subscriptions.remove(topic);
    }

    fn send(&self, msg: Message) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        if !inner.connected {
            return Err(TransportError::NotConnected);
        }
        debug!("Sending {}.{}", msg.name, msg.method);
        inner.sent.push(msg);
        Ok(())
    }
}

/// Read a directory snapshot from JSON, either a list of descriptors or a
/// map from name to descriptor.
pub fn parse_snapshot(json: &str) -> Result<Vec<ServiceDescriptor>, serde_json::Error> {
    if let Ok(list) = serde_json::from_str::<Vec<ServiceDescriptor>>(json) {
        return Ok(list);
    }

    #[derive(serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Entry {
        #[serde(default)]
        simple_name: String,
    }

    let map: HashMap<String, Entry> = serde_json::from_str(json)?;
    let mut services: Vec<ServiceDescriptor> = map
        .into_iter()
        .map(|(name, entry)| ServiceDescriptor::new(name, entry.simple_name))
        .collect();
    services.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(services)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unsubscribed_messages_are_dropped() {
        let (bus, mut rx) = LocalBus::new("runtime");
        bus.deliver(Message::new("svc1", "onState", vec![]));
        assert!(rx.try_recv().is_err());

        bus.subscribe(Topic::service("svc1"));
        bus.deliver(Message::new("svc1", "onState", vec![]));
        assert!(matches!(rx.try_recv(), Ok(TransportEvent::Message(_))));
    }

    #[test]
    fn test_method_topic() {
        let (bus, mut rx) = LocalBus::new("runtime");
        bus.subscribe(Topic::method("onStatus"));
        bus.deliver(Message::new("anything", "onStatus", vec![json!({})]));
        assert!(matches!(rx.try_recv(), Ok(TransportEvent::Message(_))));
    }

    #[test]
    fn test_directory_tracks_changes() {
        let (bus, _rx) = LocalBus::new("runtime");
        bus.register_service(ServiceDescriptor::new("svc1", "AudioFile"));
        bus.register_service(ServiceDescriptor::new("svc2", "Led"));
        assert_eq!(bus.registry().len(), 2);
        assert_eq!(bus.service("svc2").unwrap().simple_name, "Led");

        bus.release_service("svc2");
        assert!(bus.service("svc2").is_none());
        assert_eq!(bus.registry().len(), 1);
    }

    #[test]
    fn test_register_announces_descriptor() {
        let (bus, mut rx) = LocalBus::new("runtime");
        bus.subscribe(Topic::service("runtime"));
        bus.register_service(ServiceDescriptor::new("svc1", "AudioFile"));

        let Ok(TransportEvent::Message(msg)) = rx.try_recv() else {
            panic!("registration was not announced");
        };
        assert_eq!(msg.method, "onRegistered");
        assert_eq!(msg.data, vec![json!({"name": "svc1", "simpleName": "AudioFile"})]);
        assert_eq!(
            RegistryChange::from_message(&msg).unwrap(),
            Some(RegistryChange::Registered(ServiceDescriptor::new("svc1", "AudioFile")))
        );
    }

    #[test]
    fn test_send_requires_connection() {
        let (bus, _rx) = LocalBus::new("runtime");
        assert!(bus.send(Message::new("svc1", "stop", vec![])).is_ok());
        bus.close();
        assert!(matches!(
            bus.send(Message::new("svc1", "stop", vec![])),
            Err(TransportError::NotConnected)
        ));
        assert_eq!(bus.sent().len(), 1);
    }

    #[test]
    fn test_close_drops_subscriptions() {
        let (bus, _rx) = LocalBus::new("runtime");
        bus.subscribe(Topic::service("svc1"));
        bus.close();
        assert_eq!(bus.subscription_count(), 0);
    }

    #[test]
    fn test_parse_snapshot_forms() {
        let list = parse_snapshot(r#"[{"name":"svc1","simpleName":"AudioFile"}]"#).unwrap();
        assert_eq!(list[0].name, "svc1");

        let map = parse_snapshot(
            r#"{"svc2":{"simpleName":"Led"},"svc1":{"simpleName":"AudioFile"}}"#,
        )
        .unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[0].name, "svc1");
        assert_eq!(map[1].simple_name, "Led");
    }
}
