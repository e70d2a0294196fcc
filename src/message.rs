// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Effects returned by panel controllers for the session to apply.

use crate::registry::PanelSizing;
use crate::transport::Topic;

/// Side effects requested by a panel controller.
///
/// Controllers never reach into the registry or the transport themselves.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelEffect {
    /// Start receiving messages on a topic.
    Subscribe(Topic),
    /// The panel's size bookkeeping changed; forward to the registry.
    SizesChanged { name: String, sizing: PanelSizing },
    /// Present the panel on the full-screen surface.
    PresentFull(String),
}
