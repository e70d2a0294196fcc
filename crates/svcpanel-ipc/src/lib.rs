// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Shared wire types for the svcpanel message bus.
//!
//! This crate defines the messages exchanged between the backend runtime
//! and the panel client. Everything is JSON with camelCase field names.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Method announcing that a new service joined the runtime.
pub const METHOD_REGISTERED: &str = "onRegistered";

/// Method announcing that a service left the runtime.
pub const METHOD_RELEASED: &str = "onReleased";

/// Method carrying a full state snapshot of a service.
pub const METHOD_STATE: &str = "onState";

/// Method carrying a status line for the status log.
pub const METHOD_STATUS: &str = "onStatus";

/// Directory entry for a backend service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
    /// Unique service name.
    pub name: String,
    /// Type tag, e.g. "AudioFile".
    #[serde(default)]
    pub simple_name: String,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>, simple_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            simple_name: simple_name.into(),
        }
    }

    /// Lowercased type tag used to select a panel adapter.
    pub fn panel_type(&self) -> String {
        self.simple_name.to_lowercase()
    }
}

/// A message on the bus, inbound or outbound.
///
/// `name` is the service the message concerns: the target of an outbound
/// command, or the origin of an inbound event.
/// It is required on every message, since inbound traffic is routed to a
/// panel by this name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub name: String,
    pub method: String,
    #[serde(default)]
    pub data: Vec<Value>,
}

impl Message {
    pub fn new(name: impl Into<String>, method: impl Into<String>, data: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            method: method.into(),
            data,
        }
    }

    /// Decode the first positional argument.
    pub fn first_arg<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        let value = self
            .data
            .first()
            .ok_or_else(|| ProtocolError::MissingPayload(self.method.clone()))?;
        serde_json::from_value(value.clone()).map_err(|e| ProtocolError::Malformed {
            method: self.method.clone(),
            reason: e.to_string(),
        })
    }

    /// Parse a single line of JSON.
    pub fn from_json(line: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(line).map_err(|e| ProtocolError::Malformed {
            method: String::new(),
            reason: e.to_string(),
        })
    }
}

/// Payload of `onReleased`. Only the name is required.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReleasedService {
    name: String,
}

/// A change to the runtime's service directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryChange {
    Registered(ServiceDescriptor),
    Released(String),
}

impl RegistryChange {
    /// Interpret a runtime message as a directory change.
    ///
    /// Returns `Ok(None)` for methods that are not directory changes.
    pub fn from_message(msg: &Message) -> Result<Option<Self>, ProtocolError> {
        match msg.method.as_str() {
            METHOD_REGISTERED => Ok(Some(Self::Registered(msg.first_arg()?))),
            METHOD_RELEASED => {
                let released: ReleasedService = msg.first_arg()?;
                Ok(Some(Self::Released(released.name)))
            }
            _ => Ok(None),
        }
    }

    /// Name of the service the change is about.
    pub fn service_name(&self) -> &str {
        match self {
            Self::Registered(service) => &service.name,
            Self::Released(name) => name,
        }
    }
}

/// Severity of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

/// A status line published by a backend service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub level: StatusLevel,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub detail: String,
}

/// Errors decoding bus messages.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProtocolError {
    #[error("message {0} carries no payload")]
    MissingPayload(String),
    #[error("malformed payload for {method}: {reason}")]
    Malformed { method: String, reason: String },
}
