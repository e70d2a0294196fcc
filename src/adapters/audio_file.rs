// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Panel adapter for the AudioFile player service.

use super::{AdapterContext, CommandSender, ServiceAdapter};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::any::Any;
use std::collections::BTreeMap;
use svcpanel_ipc::{Message, ProtocolError, METHOD_STATE};
use tracing::{debug, info, warn};

/// State snapshot pushed by an AudioFile service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFileState {
    /// Playback volume as reported by the service.
    #[serde(default)]
    pub volume: f64,
    /// Name of the active playlist.
    #[serde(default)]
    pub current_playlist: Option<String>,
    /// Playlists by name.
    #[serde(default)]
    pub playlists: BTreeMap<String, Vec<String>>,
    /// File currently playing.
    #[serde(default)]
    pub current_file: Option<String>,
    #[serde(default)]
    pub is_playing: bool,
    /// Fields this adapter does not model, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Inbound messages understood by the AudioFile panel.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioFileInbound {
    /// Full state snapshot.
    State(AudioFileState),
    /// Any method this panel has no handler for.
    Unhandled(String),
}

impl TryFrom<&Message> for AudioFileInbound {
    type Error = ProtocolError;

    fn try_from(msg: &Message) -> Result<Self, Self::Error> {
        match msg.method.as_str() {
            METHOD_STATE => Ok(Self::State(msg.first_arg()?)),
            other => Ok(Self::Unhandled(other.to_string())),
        }
    }
}

/// View model and command surface of an AudioFile panel.
pub struct AudioFileAdapter {
    name: String,
    msg: CommandSender,
    /// Latest server-pushed state, `None` until the first `onState`.
    pub service: Option<AudioFileState>,
    pub playlist_name: Option<String>,
    pub playlist_path: Option<String>,
    pub selected_file: Option<String>,
}

impl AudioFileAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        info!("AudioFile panel for {}", ctx.service_name);
        Self {
            name: ctx.service_name,
            msg: ctx.sender,
            service: None,
            playlist_name: None,
            playlist_path: None,
            selected_file: None,
        }
    }

    /// Table entry.
    pub fn factory(ctx: AdapterContext) -> Box<dyn ServiceAdapter> {
        Box::new(Self::new(ctx))
    }

    /// Replace the view model with a new snapshot.
    pub fn update_state(&mut self, service: AudioFileState) {
        self.service = Some(service);
    }

    /// Volume from the last snapshot.
    pub fn volume(&self) -> Option<f64> {
        self.service.as_ref().map(|s| s.volume)
    }

    pub fn add_playlist(&self) {
        match self.playlist_name.as_deref() {
            Some(name) => self.msg.send("addPlayList", vec![json!(name)]),
            None => warn!("{}: no playlist name to add", self.name),
        }
    }

    pub fn set_playlist(&self) {
        match self.playlist_name.as_deref() {
            Some(name) => self.msg.send("setPlayList", vec![json!(name)]),
            None => warn!("{}: no playlist selected", self.name),
        }
    }

    pub fn play_file(&self) {
        match self.selected_file.as_deref() {
            Some(file) => self.msg.send("playFile", vec![json!(file)]),
            None => warn!("{}: no file selected", self.name),
        }
    }

    pub fn set_volume(&self, volume: f64) {
        self.msg.send("setVolume", vec![json!(volume)]);
    }

    pub fn stop(&self) {
        self.msg.send("stop", Vec::new());
    }
}

impl ServiceAdapter for AudioFileAdapter {
    fn service_name(&self) -> &str {
        &self.name
    }

    fn on_msg(&mut self, msg: &Message) {
        match AudioFileInbound::try_from(msg) {
            Ok(AudioFileInbound::State(state)) => {
                debug!("{}: state update", self.name);
                self.update_state(state);
            }
            Ok(AudioFileInbound::Unhandled(method)) => {
                info!("Unhandled method {} for {}", method, self.name);
            }
            Err(e) => warn!("{}: dropping message: {}", self.name, e),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
