use crate::error::VoiceError;
use crate::transport::{SessionEvent, SessionTransport};
use async_trait::async_trait;
use handoff_types::Participant;
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tracing::info;

/// Replies a [`LocalRoom`] holds before publishing waits for the handle.
pub const DEFAULT_REPLY_CAPACITY: usize = 64;

/// In-process room transport.
///
/// Events are fed in through a [`LocalRoomHandle`] and replies come back out
/// of it, which is how the agent runs without a LiveKit server. Replies are
/// buffered up to a fixed capacity; once full, `publish_reply` waits until
/// the handle drains them.
#[derive(Debug)]
pub struct LocalRoom {
    room_name: Option<String>,
    connected: bool,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    replies_tx: mpsc::Sender<String>,
    /// Events that arrived while waiting for the first participant.
    backlog: VecDeque<SessionEvent>,
}

/// The other side of a [`LocalRoom`]: plays the participants.
#[derive(Debug)]
pub struct LocalRoomHandle {
    events_tx: Option<mpsc::UnboundedSender<SessionEvent>>,
    replies_rx: mpsc::Receiver<String>,
}

impl LocalRoom {
    /// Creates a room and the handle that drives it. `room_name` may be
    /// `None` to model a host that never assigned a name.
    pub fn new(room_name: Option<&str>) -> (Self, LocalRoomHandle) {
        Self::with_reply_capacity(room_name, DEFAULT_REPLY_CAPACITY)
    }

    /// Like [`LocalRoom::new`] with room for `capacity` undrained replies
    /// (at least one).
    pub fn with_reply_capacity(
        room_name: Option<&str>,
        capacity: usize,
    ) -> (Self, LocalRoomHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (replies_tx, replies_rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                room_name: room_name.map(str::to_string),
                connected: false,
                events_rx,
                replies_tx,
                backlog: VecDeque::new(),
            },
            LocalRoomHandle {
                events_tx: Some(events_tx),
                replies_rx,
            },
        )
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

#[async_trait]
impl SessionTransport for LocalRoom {
    fn room_name(&self) -> Option<String> {
        self.room_name.clone()
    }

    async fn connect(&mut self) -> Result<(), VoiceError> {
        info!(room = ?self.room_name, "agent connecting to local room");
        self.connected = true;
        Ok(())
    }

    async fn wait_for_participant(&mut self) -> Result<Participant, VoiceError> {
        if !self.connected {
            return Err(VoiceError::Transport(
                "Agent is not connected to a room".to_string(),
            ));
        }

        loop {
            match self.events_rx.recv().await {
                Some(SessionEvent::ParticipantJoined(participant)) => return Ok(participant),
                Some(other) => self.backlog.push_back(other),
                None => {
                    return Err(VoiceError::Transport(
                        "room closed before a participant joined".to_string(),
                    ))
                }
            }
        }
    }

    async fn next_event(&mut self) -> Option<SessionEvent> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }
        self.events_rx.recv().await
    }

    async fn publish_reply(&mut self, text: &str) -> Result<(), VoiceError> {
        if !self.connected {
            return Err(VoiceError::Transport(
                "Agent is not connected to a room".to_string(),
            ));
        }

        info!(room = ?self.room_name, chars = text.len(), "agent publishing reply");

        self.replies_tx
            .send(text.to_string())
            .await
            .map_err(|_| VoiceError::Transport("room handle dropped".to_string()))
    }
}

impl LocalRoomHandle {
    fn send(&self, event: SessionEvent) {
        // Events after close, or after the room is gone, are dropped.
        if let Some(tx) = &self.events_tx {
            let _ = tx.send(event);
        }
    }

    pub fn join(&self, participant: Participant) {
        self.send(SessionEvent::ParticipantJoined(participant));
    }

    pub fn leave(&self, participant: Participant) {
        self.send(SessionEvent::ParticipantLeft(participant));
    }

    pub fn say(&self, participant: &Participant, transcript: &str) {
        self.send(SessionEvent::SpeechCommitted {
            participant: participant.clone(),
            transcript: transcript.to_string(),
        });
    }

    pub fn interrupt(&self, participant: &Participant) {
        self.send(SessionEvent::SpeechInterrupted {
            participant: participant.clone(),
        });
    }

    pub fn message(&self, participant: &Participant, text: &str) {
        self.send(SessionEvent::Message {
            participant: participant.clone(),
            text: text.to_string(),
        });
    }

    /// Everything the agent has published so far, oldest first.
    pub fn drain_replies(&mut self) -> Vec<String> {
        let mut replies = Vec::new();
        while let Ok(reply) = self.replies_rx.try_recv() {
            replies.push(reply);
        }
        replies
    }

    /// Ends the room: the agent sees `None` once queued events are consumed.
    pub fn close(&mut self) {
        self.events_tx = None;
    }
}
