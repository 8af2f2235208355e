//! The realtime session host as the agent sees it.

use async_trait::async_trait;
use handoff_types::Participant;

use crate::error::VoiceError;

/// Something that happened in the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ParticipantJoined(Participant),
    ParticipantLeft(Participant),
    /// A finished user utterance, already transcribed.
    SpeechCommitted {
        participant: Participant,
        transcript: String,
    },
    /// The speaker cut off whatever was being said.
    SpeechInterrupted { participant: Participant },
    /// A text chat message.
    Message { participant: Participant, text: String },
}

impl SessionEvent {
    pub fn participant(&self) -> &Participant {
        match self {
            Self::ParticipantJoined(p) | Self::ParticipantLeft(p) => p,
            Self::SpeechCommitted { participant, .. }
            | Self::SpeechInterrupted { participant }
            | Self::Message { participant, .. } => participant,
        }
    }
}

/// Connection to one room.
///
/// Events are consumed one at a time, so the session never handles two
/// callbacks concurrently.
#[async_trait]
pub trait SessionTransport: Send {
    /// Room identifier; `None` when the host has not assigned one.
    fn room_name(&self) -> Option<String>;

    async fn connect(&mut self) -> Result<(), VoiceError>;

    /// Waits until a participant joins. Has no timeout of its own.
    async fn wait_for_participant(&mut self) -> Result<Participant, VoiceError>;

    /// Next event, or `None` once the room is closed.
    async fn next_event(&mut self) -> Option<SessionEvent>;

    /// Speaks `text` into the room.
    async fn publish_reply(&mut self, text: &str) -> Result<(), VoiceError>;
}
