//! Cached state of a playout service
//!
//! The hub keeps one [`ServiceState`] that mirrors what the downstream
//! service has told it. Only the service's own responses move it.

use std::fmt;
use std::time::Duration;

use crate::{Error, FeatureSet, Message, Response, Result, Word};

/// Playback state as reported by `STATE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    Ready,
    Playing,
    Stopped,
    #[default]
    Ejected,
    Quitting,
}

impl PlaybackState {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "Ready" => Ok(PlaybackState::Ready),
            "Playing" => Ok(PlaybackState::Playing),
            "Stopped" => Ok(PlaybackState::Stopped),
            "Ejected" => Ok(PlaybackState::Ejected),
            "Quitting" => Ok(PlaybackState::Quitting),
            other => Err(Error::UnknownState(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Ready => "Ready",
            PlaybackState::Playing => "Playing",
            PlaybackState::Stopped => "Stopped",
            PlaybackState::Ejected => "Ejected",
            PlaybackState::Quitting => "Quitting",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mirror of the downstream service's identity, features, state and position
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceState {
    pub identifier: String,
    pub features: FeatureSet,
    pub state: PlaybackState,
    /// Elapsed time in the loaded item (microsecond precision on the wire)
    pub time: Duration,
}

impl ServiceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a response from the service
    ///
    /// Leaves the state untouched on error.
    pub fn update(&mut self, message: &Message) -> Result<()> {
        let rs = match message.word() {
            Word::Response(rs) => *rs,
            other => return Err(Error::UnexpectedWord(other.to_string())),
        };

        match rs {
            Response::Ohai => {
                let ident = message.arg(0).ok_or_else(|| Error::ArgumentCount {
                    word: rs.as_str().to_string(),
                    expected: 1,
                    actual: 0,
                })?;
                self.identifier = ident.to_string();
            }
            Response::Features => {
                self.features = message.args().iter().collect();
            }
            Response::State => {
                let args = message.expect_args(1)?;
                self.state = PlaybackState::parse(&args[0])?;
            }
            Response::Time => {
                let args = message.expect_args(1)?;
                let micros: u64 = args[0]
                    .parse()
                    .map_err(|_| Error::InvalidTime(args[0].clone()))?;
                self.time = Duration::from_micros(micros);
            }
            Response::End => {}
            _ => return Err(Error::UnexpectedWord(rs.as_str().to_string())),
        }
        Ok(())
    }

    pub fn is_ejected(&self) -> bool {
        self.state == PlaybackState::Ejected
    }

    pub fn state_message(&self) -> Message {
        Message::response(Response::State).with_arg(self.state.as_str())
    }

    pub fn time_message(&self) -> Message {
        Message::response(Response::Time).with_arg(self.time.as_micros().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Feature;

    fn rs(word: Response, args: &[&str]) -> Message {
        Message::response(word).with_args(args.iter().copied())
    }

    #[test]
    fn test_handshake_updates() {
        let mut state = ServiceState::new();
        state.update(&rs(Response::Ohai, &["playd 0.3.0"])).unwrap();
        state
            .update(&rs(Response::Features, &["FileLoad", "PlayStop", "End"]))
            .unwrap();

        assert_eq!(state.identifier, "playd 0.3.0");
        assert!(state.features.contains(&Feature::FileLoad));
        assert!(state.features.contains(&Feature::End));
        assert_eq!(state.features.len(), 3);
    }

    #[test]
    fn test_state_and_time() {
        let mut state = ServiceState::new();
        assert!(state.is_ejected());

        state.update(&rs(Response::State, &["Playing"])).unwrap();
        state.update(&rs(Response::Time, &["1500000"])).unwrap();

        assert_eq!(state.state, PlaybackState::Playing);
        assert_eq!(state.time, Duration::from_millis(1500));
        assert_eq!(state.time_message().args(), &["1500000"]);
        assert_eq!(state.state_message().args(), &["Playing"]);
    }

    #[test]
    fn test_malformed_updates_leave_state_alone() {
        let mut state = ServiceState::new();
        state.update(&rs(Response::State, &["Stopped"])).unwrap();

        assert!(state.update(&rs(Response::State, &["Sideways"])).is_err());
        assert!(state.update(&rs(Response::Time, &["soon"])).is_err());
        assert!(state.update(&rs(Response::Time, &[])).is_err());
        assert!(state.update(&rs(Response::Ohai, &[])).is_err());

        assert_eq!(state.state, PlaybackState::Stopped);
        assert_eq!(state.time, Duration::ZERO);
    }

    #[test]
    fn test_end_is_accepted_and_others_rejected() {
        let mut state = ServiceState::new();
        assert!(state.update(&rs(Response::End, &[])).is_ok());
        assert!(matches!(
            state.update(&rs(Response::Count, &["1"])),
            Err(Error::UnexpectedWord(_))
        ));
        assert!(state.update(&Message::request(crate::Request::Play)).is_err());
    }
}
