// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! svcpanel - Headless panel core for dynamically appearing backend services.
//!
//! Services announced on the message bus are mirrored as panels. Each panel
//! gets an adapter picked by service type, and inbound traffic is routed to
//! the adapter of the service it concerns.

pub mod adapters;
pub mod app;
pub mod config;
pub mod controller;
pub mod message;
pub mod registry;
pub mod state;
pub mod transport;

pub use app::Session;
pub use registry::{PanelError, PanelRegistry};
pub use transport::{LocalBus, Transport, TransportEvent};
