//! Feature negotiation

use std::collections::BTreeSet;
use std::fmt;

use crate::{Message, Response};

/// A capability announced in a `FEATURES` response
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feature {
    FileLoad,
    PlayStop,
    Seek,
    End,
    TimeReport,
    Playlist,
    PlaylistTextItems,
    PlaylistAutoAdvance,
    /// Anything this hub does not interpret, kept so it can be passed on
    Other(String),
}

impl Feature {
    pub fn parse(s: &str) -> Self {
        match s {
            "FileLoad" => Feature::FileLoad,
            "PlayStop" => Feature::PlayStop,
            "Seek" => Feature::Seek,
            "End" => Feature::End,
            "TimeReport" => Feature::TimeReport,
            "Playlist" => Feature::Playlist,
            "PlaylistTextItems" => Feature::PlaylistTextItems,
            "PlaylistAutoAdvance" => Feature::PlaylistAutoAdvance,
            other => Feature::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Feature::FileLoad => "FileLoad",
            Feature::PlayStop => "PlayStop",
            Feature::Seek => "Seek",
            Feature::End => "End",
            Feature::TimeReport => "TimeReport",
            Feature::Playlist => "Playlist",
            Feature::PlaylistTextItems => "PlaylistTextItems",
            Feature::PlaylistAutoAdvance => "PlaylistAutoAdvance",
            Feature::Other(s) => s,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered set of features
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSet {
    features: BTreeSet<Feature>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, feature: Feature) -> bool {
        self.features.insert(feature)
    }

    pub fn remove(&mut self, feature: &Feature) -> bool {
        self.features.remove(feature)
    }

    pub fn contains(&self, feature: &Feature) -> bool {
        self.features.contains(feature)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Render as a `FEATURES` response
    pub fn to_message(&self) -> Message {
        Message::response(Response::Features).with_args(self.iter().map(|f| f.as_str().to_string()))
    }
}

impl<S: AsRef<str>> FromIterator<S> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().map(|s| Feature::parse(s.as_ref())).collect(),
        }
    }
}
