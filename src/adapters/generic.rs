// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Fallback adapter for service types without a dedicated panel.

use super::{AdapterContext, CommandSender, ServiceAdapter};
use serde_json::Value;
use std::any::Any;
use svcpanel_ipc::{Message, METHOD_STATE};
use tracing::debug;

/// Keeps the raw latest state so a plain property view can show it.
pub struct GenericAdapter {
    name: String,
    msg: CommandSender,
    pub state: Option<Value>,
}

impl GenericAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self {
            name: ctx.service_name,
            msg: ctx.sender,
            state: None,
        }
    }

    pub fn factory(ctx: AdapterContext) -> Box<dyn ServiceAdapter> {
        Box::new(Self::new(ctx))
    }

    /// Invoke an arbitrary method on the service.
    pub fn invoke(&self, method: &str, args: Vec<Value>) {
        self.msg.send(method, args);
    }
}

impl ServiceAdapter for GenericAdapter {
    fn service_name(&self) -> &str {
        &self.name
    }

    fn on_msg(&mut self, msg: &Message) {
        if msg.method == METHOD_STATE {
            self.state = msg.data.first().cloned();
        } else {
            debug!("{}: ignoring {}", self.name, msg.method);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
