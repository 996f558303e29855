//! Hub state
//!
//! Everything the event loop owns besides its channels: the playlist, the
//! cached downstream state and the auto-advance flag. Methods here build
//! messages but never send them.

use listd_core::{Feature, Message, Request, Response, ServiceState, VERSION};

use crate::playlist::Playlist;

/// Outcome of handling a request or event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Messages for clients, in order
    pub responses: Vec<Message>,
    /// Requests to forward to the playout service, in order
    pub downstream: Vec<Message>,
}

impl Outcome {
    pub fn respond(responses: Vec<Message>) -> Self {
        Self {
            responses,
            downstream: Vec::new(),
        }
    }
}

/// Only the hub loop and its handlers mutate this; everyone else reads.
pub struct HubState {
    pub(crate) playlist: Playlist,
    pub(crate) downstream: ServiceState,
    pub(crate) auto_advance: bool,
    name: String,
}

impl HubState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            playlist: Playlist::new(),
            downstream: ServiceState::new(),
            auto_advance: false,
            name: name.into(),
        }
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    /// Cached state of the playout service
    pub fn downstream(&self) -> &ServiceState {
        &self.downstream
    }

    pub fn auto_advance(&self) -> bool {
        self.auto_advance
    }

    /// Our identifier followed by the playout service's
    pub fn ohai(&self) -> Message {
        Message::response(Response::Ohai).with_arg(format!(
            "{} {}/{}",
            self.name, VERSION, self.downstream.identifier
        ))
    }

    /// Downstream features with file loading masked and playlist support added
    pub fn features(&self) -> Message {
        let mut features = self.downstream.features.clone();
        features.remove(&Feature::FileLoad);
        features.insert(Feature::Playlist);
        features.insert(Feature::PlaylistTextItems);
        features.insert(Feature::PlaylistAutoAdvance);
        features.to_message()
    }

    pub fn auto_advance_message(&self) -> Message {
        let value = if self.auto_advance { "on" } else { "off" };
        Message::response(Response::AutoAdvance).with_arg(value)
    }

    /// Item count followed by one ITEM per entry
    pub fn list(&self) -> Vec<Message> {
        let mut msgs = Vec::with_capacity(self.playlist.len() + 1);
        msgs.push(Message::response(Response::Count).with_arg(self.playlist.len().to_string()));
        for (i, item) in self.playlist.items().iter().enumerate() {
            msgs.push(
                Message::response(Response::Item)
                    .with_arg(i.to_string())
                    .with_arg(item.hash.as_str())
                    .with_arg(item.kind.as_str())
                    .with_arg(item.data.as_str()),
            );
        }
        msgs
    }

    /// State, time (unless ejected), auto-advance, then the full list
    pub fn dump(&self) -> Vec<Message> {
        let mut msgs = vec![self.downstream.state_message()];
        if !self.downstream.is_ejected() {
            msgs.push(self.downstream.time_message());
        }
        msgs.push(self.auto_advance_message());
        msgs.extend(self.list());
        msgs
    }

    /// Everything a newly connected client is sent
    pub fn bootstrap(&self) -> Vec<Message> {
        let mut msgs = vec![self.ohai(), self.features()];
        msgs.extend(self.dump());
        msgs
    }

    /// SELECT describing the current selection (no arguments when cleared)
    pub fn select_message(&self) -> Message {
        match self.playlist.selected() {
            Some((index, item)) => Message::response(Response::Select)
                .with_arg(index.to_string())
                .with_arg(item.hash.as_str()),
            None => Message::response(Response::Select),
        }
    }

    /// LOAD for the selected item, if any
    pub fn load_selected(&self) -> Option<Message> {
        self.playlist
            .selected()
            .map(|(_, item)| Message::request(Request::Load).with_arg(item.data.as_str()))
    }

    /// React to the playout service finishing the loaded item
    ///
    /// With auto-advance on, the selection moves to the next item and is
    /// announced as `SELECT <index> <hash>`, like every other selection
    /// change.
    pub fn on_end(&mut self) -> Outcome {
        if !self.auto_advance || !self.playlist.advance() {
            return Outcome::default();
        }
        Outcome {
            downstream: self.load_selected().into_iter().collect(),
            responses: vec![self.select_message()],
        }
    }
}
