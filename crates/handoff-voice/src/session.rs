//! One agent session in one room: the active persona, the conversation and
//! the handoff between personas.
//!
//! Events are handled strictly one after another. A handoff requested by a
//! tool is completed before the next event is read, so the silent persona is
//! in place for everything that follows.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::engine::{ChatMessage, EngineRequest, EngineTurn, ReasoningEngine};
use crate::error::VoiceError;
use crate::filter::ParticipantFilter;
use crate::persona::{Persona, PersonaKind, SilentPersona, SpeechAction};
use crate::tools::ToolContext;
use crate::transport::{SessionEvent, SessionTransport};
use handoff_types::{Participant, ParticipantKind};

/// Per-session state shared by the personas. Lives exactly as long as the
/// session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionUserData {
    /// Room this session serves. Escalation is refused without it.
    pub room: Option<String>,
    /// When the silent persona took over.
    pub session_start_time: Option<DateTime<Utc>>,
}

impl SessionUserData {
    pub fn for_room(room: impl Into<String>) -> Self {
        Self {
            room: Some(room.into()),
            session_start_time: None,
        }
    }
}

/// Summary returned when a session ends.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub room: Option<String>,
    pub final_persona: PersonaKind,
    pub replies_published: usize,
    /// Time spent in the silent persona, if the session escalated.
    pub monitored_for: Option<chrono::Duration>,
}

pub struct AgentSession<T> {
    transport: T,
    engine: Arc<dyn ReasoningEngine>,
    filter: ParticipantFilter,
    persona: Persona,
    userdata: SessionUserData,
    conversation: Vec<ChatMessage>,
    max_tool_rounds: usize,
    replies_published: usize,
}

impl<T: SessionTransport> AgentSession<T> {
    pub(crate) fn new(
        transport: T,
        engine: Arc<dyn ReasoningEngine>,
        filter: ParticipantFilter,
        persona: Persona,
        userdata: SessionUserData,
        max_tool_rounds: usize,
    ) -> Self {
        Self {
            transport,
            engine,
            filter,
            persona,
            userdata,
            conversation: Vec::new(),
            max_tool_rounds,
            replies_published: 0,
        }
    }

    pub fn persona_kind(&self) -> PersonaKind {
        self.persona.kind()
    }

    pub fn userdata(&self) -> &SessionUserData {
        &self.userdata
    }

    pub fn conversation(&self) -> &[ChatMessage] {
        &self.conversation
    }

    /// Activates the initial persona.
    ///
    /// # Errors
    ///
    /// Returns `VoiceError::Transport` if the greeting cannot be published.
    pub async fn start(&mut self) -> Result<(), VoiceError> {
        if let Some(greeting) = self.persona.on_enter(&mut self.userdata) {
            self.publish(greeting).await?;
        }
        Ok(())
    }

    /// Handles events until the transport closes, then tears the session
    /// down.
    ///
    /// # Errors
    ///
    /// Returns `VoiceError::Transport` if a reply cannot be published.
    pub async fn run(mut self) -> Result<SessionReport, VoiceError> {
        while let Some(event) = self.transport.next_event().await {
            self.handle_event(event).await?;
        }
        Ok(self.close())
    }

    pub async fn handle_event(&mut self, event: SessionEvent) -> Result<(), VoiceError> {
        match event {
            SessionEvent::ParticipantJoined(participant) => {
                self.log_presence(&participant, "joined");
                Ok(())
            }
            SessionEvent::ParticipantLeft(participant) => {
                self.log_presence(&participant, "left");
                Ok(())
            }
            SessionEvent::SpeechCommitted {
                participant,
                transcript,
            } => self.on_user_input(&participant, transcript).await,
            SessionEvent::Message { participant, text } => {
                self.on_user_input(&participant, text).await
            }
            SessionEvent::SpeechInterrupted { participant } => {
                if self.filter.classify(&participant) != ParticipantKind::Agent {
                    self.persona.on_speech_interrupted(&self.userdata);
                }
                Ok(())
            }
        }
    }

    /// Ends the session, letting the active persona report.
    pub fn close(self) -> SessionReport {
        let monitored_for = self.persona.on_leave(&self.userdata);
        tracing::info!(
            room = ?self.userdata.room,
            persona = %self.persona.kind(),
            replies = self.replies_published,
            "agent session closed"
        );
        SessionReport {
            room: self.userdata.room,
            final_persona: self.persona.kind(),
            replies_published: self.replies_published,
            monitored_for,
        }
    }

    fn log_presence(&self, participant: &Participant, what: &str) {
        match self.filter.classify(participant) {
            ParticipantKind::Supervisor => tracing::info!(
                room = ?self.userdata.room,
                identity = %participant.identity,
                "supervisor {what}"
            ),
            ParticipantKind::User => tracing::info!(
                room = ?self.userdata.room,
                identity = %participant.identity,
                "participant {what}"
            ),
            ParticipantKind::Agent => {}
        }
    }

    async fn on_user_input(
        &mut self,
        participant: &Participant,
        text: String,
    ) -> Result<(), VoiceError> {
        match self.filter.classify(participant) {
            ParticipantKind::Agent => return Ok(()),
            ParticipantKind::Supervisor => {
                tracing::info!(
                    room = ?self.userdata.room,
                    identity = %participant.identity,
                    "supervisor message received: {text}"
                );
                return Ok(());
            }
            ParticipantKind::User => {}
        }

        let action = self.persona.on_speech_committed(&self.userdata, &text);
        self.conversation.push(ChatMessage::user(text));

        match action {
            SpeechAction::Respond => self.respond().await,
            SpeechAction::Observe(_) => Ok(()),
        }
    }

    /// Asks the engine for turns until it replies, a tool hands off, or the
    /// round limit is hit.
    async fn respond(&mut self) -> Result<(), VoiceError> {
        for _ in 0..self.max_tool_rounds {
            let Persona::Interactive(persona) = &self.persona else {
                return Ok(());
            };

            let tools = persona.tools().definitions();
            let request = EngineRequest {
                instructions: persona.instructions(),
                tools: &tools,
                conversation: &self.conversation,
            };

            let turn = match self.engine.next_turn(request).await {
                Ok(turn) => turn,
                Err(e) => {
                    tracing::warn!(room = ?self.userdata.room, "no reply generated: {e}");
                    return Ok(());
                }
            };

            match turn {
                EngineTurn::Reply(text) => return self.publish(text).await,
                EngineTurn::ToolCall(call) => {
                    let ctx = ToolContext {
                        room: self.userdata.room.as_deref(),
                    };
                    let response = persona.tools().invoke(&call, &ctx).await;
                    self.conversation
                        .push(ChatMessage::tool(&call.name, &response.output));

                    if let Some(target) = response.handoff {
                        // The record is already written; the handoff happens
                        // even if the confirmation cannot be spoken.
                        let published = self.publish(response.output).await;
                        self.hand_off(target);
                        return published;
                    }
                }
            }
        }

        tracing::warn!(
            room = ?self.userdata.room,
            rounds = self.max_tool_rounds,
            "tool round limit reached without a reply"
        );
        Ok(())
    }

    /// Replaces the active persona. The old persona is discarded.
    fn hand_off(&mut self, target: PersonaKind) {
        let next = match target {
            PersonaKind::Silent => Persona::Silent(SilentPersona),
            PersonaKind::Interactive => {
                tracing::warn!(
                    room = ?self.userdata.room,
                    "ignoring handoff back to the interactive persona"
                );
                return;
            }
        };

        if self.persona.kind() == next.kind() {
            return;
        }

        tracing::info!(
            room = ?self.userdata.room,
            from = %self.persona.kind(),
            to = %next.kind(),
            "persona handoff"
        );

        self.persona.on_leave(&self.userdata);
        self.persona = next;
        if let Some(text) = self.persona.on_enter(&mut self.userdata) {
            // The silent persona never has anything to say.
            tracing::warn!(room = ?self.userdata.room, "dropping reply from {}: {text}", self.persona.kind());
        }
    }

    async fn publish(&mut self, text: String) -> Result<(), VoiceError> {
        if !self.persona.can_reply() {
            tracing::warn!(room = ?self.userdata.room, "silent persona tried to reply");
            return Ok(());
        }
        self.transport.publish_reply(&text).await?;
        self.conversation.push(ChatMessage::assistant(text));
        self.replies_published += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ToolCall;
    use crate::persona::{InteractivePersona, INTERACTIVE_INSTRUCTIONS};
    use crate::room::{LocalRoom, LocalRoomHandle};
    use crate::tools::{Tool, ToolCatalogue, ToolResponse};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedEngine {
        turns: Mutex<VecDeque<Result<EngineTurn, VoiceError>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedEngine {
        fn new(turns: Vec<Result<EngineTurn, VoiceError>>) -> Arc<Self> {
            Arc::new(Self {
                turns: Mutex::new(turns.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ReasoningEngine for ScriptedEngine {
        async fn next_turn(&self, _request: EngineRequest<'_>) -> Result<EngineTurn, VoiceError> {
            *self.calls.lock().unwrap() += 1;
            self.turns
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(EngineTurn::Reply("fallback".to_string())))
        }
    }

    /// Hands off without touching any store.
    struct HandOffTool;

    #[async_trait]
    impl Tool for HandOffTool {
        fn name(&self) -> &'static str {
            "handOff"
        }
        fn description(&self) -> &'static str {
            "test handoff"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        fn side_effects(&self) -> &'static str {
            "none"
        }
        async fn execute(&self, _: serde_json::Value, _: &ToolContext<'_>) -> ToolResponse {
            ToolResponse::handoff("handing off", PersonaKind::Silent)
        }
    }

    fn session(
        engine: Arc<ScriptedEngine>,
        max_tool_rounds: usize,
    ) -> (AgentSession<LocalRoom>, LocalRoomHandle) {
        let (room, handle) = LocalRoom::new(Some("room-1"));
        let mut tools = ToolCatalogue::new();
        tools.register(HandOffTool);
        let persona = Persona::Interactive(InteractivePersona::new(
            Arc::from(INTERACTIVE_INSTRUCTIONS),
            Arc::from("Hi there"),
            tools,
        ));
        let session = AgentSession::new(
            room,
            engine,
            ParticipantFilter::new("handoff-agent"),
            persona,
            SessionUserData::for_room("room-1"),
            max_tool_rounds,
        );
        (session, handle)
    }

    async fn connected(
        engine: Arc<ScriptedEngine>,
        max_tool_rounds: usize,
    ) -> (AgentSession<LocalRoom>, LocalRoomHandle) {
        let (mut session, handle) = session(engine, max_tool_rounds);
        session.transport.connect().await.unwrap();
        (session, handle)
    }

    fn speech(identity: &str, text: &str) -> SessionEvent {
        SessionEvent::SpeechCommitted {
            participant: Participant::new(identity),
            transcript: text.to_string(),
        }
    }

    #[tokio::test]
    async fn start_publishes_greeting() {
        let (mut session, mut handle) = connected(ScriptedEngine::new(vec![]), 3).await;
        session.start().await.unwrap();

        assert_eq!(handle.drain_replies(), vec!["Hi there".to_string()]);
        assert_eq!(session.conversation(), &[ChatMessage::assistant("Hi there")]);
    }

    #[tokio::test]
    async fn user_speech_gets_a_reply() {
        let engine = ScriptedEngine::new(vec![Ok(EngineTurn::Reply("Sure.".to_string()))]);
        let (mut session, mut handle) = connected(engine, 3).await;

        session.handle_event(speech("caller", "hello")).await.unwrap();

        assert_eq!(handle.drain_replies(), vec!["Sure.".to_string()]);
        assert_eq!(
            session.conversation(),
            &[ChatMessage::user("hello"), ChatMessage::assistant("Sure.")]
        );
    }

    #[tokio::test]
    async fn supervisor_and_agent_speech_is_ignored() {
        let engine = ScriptedEngine::new(vec![]);
        let (mut session, mut handle) = connected(engine.clone(), 3).await;

        session
            .handle_event(speech("maria-supervisor", "I'm here"))
            .await
            .unwrap();
        session
            .handle_event(speech("handoff-agent", "echo"))
            .await
            .unwrap();

        assert_eq!(engine.calls(), 0);
        assert!(handle.drain_replies().is_empty());
        assert!(session.conversation().is_empty());
    }

    #[tokio::test]
    async fn tool_handoff_switches_to_silent() {
        let engine = ScriptedEngine::new(vec![Ok(EngineTurn::ToolCall(ToolCall::new(
            "handOff",
            serde_json::Value::Null,
        )))]);
        let (mut session, mut handle) = connected(engine.clone(), 3).await;

        session.handle_event(speech("caller", "help")).await.unwrap();
        assert_eq!(session.persona_kind(), PersonaKind::Silent);
        assert!(session.userdata().session_start_time.is_some());
        assert_eq!(handle.drain_replies(), vec!["handing off".to_string()]);

        session.handle_event(speech("caller", "hello?")).await.unwrap();
        assert_eq!(engine.calls(), 1);
        assert!(handle.drain_replies().is_empty());

        let report = session.close();
        assert_eq!(report.final_persona, PersonaKind::Silent);
        assert_eq!(report.replies_published, 1);
        assert!(report.monitored_for.is_some());
    }

    #[tokio::test]
    async fn handoff_completes_when_confirmation_cannot_be_published() {
        let engine = ScriptedEngine::new(vec![Ok(EngineTurn::ToolCall(ToolCall::new(
            "handOff",
            serde_json::Value::Null,
        )))]);
        let (mut session, handle) = connected(engine, 3).await;
        drop(handle);

        let result = session.handle_event(speech("caller", "help")).await;

        assert!(matches!(result, Err(VoiceError::Transport(_))));
        assert_eq!(session.persona_kind(), PersonaKind::Silent);
        assert!(session.userdata().session_start_time.is_some());
    }

    #[tokio::test]
    async fn engine_error_produces_no_reply() {
        let engine = ScriptedEngine::new(vec![Err(VoiceError::Engine("offline".to_string()))]);
        let (mut session, mut handle) = connected(engine, 3).await;

        session.handle_event(speech("caller", "hello")).await.unwrap();

        assert!(handle.drain_replies().is_empty());
        assert_eq!(session.persona_kind(), PersonaKind::Interactive);
    }

    #[tokio::test]
    async fn tool_rounds_are_bounded() {
        let unknown = || Ok(EngineTurn::ToolCall(ToolCall::new("nope", serde_json::Value::Null)));
        let engine = ScriptedEngine::new(vec![unknown(), unknown(), unknown(), unknown()]);
        let (mut session, mut handle) = connected(engine.clone(), 2).await;

        session.handle_event(speech("caller", "hello")).await.unwrap();

        assert_eq!(engine.calls(), 2);
        assert!(handle.drain_replies().is_empty());
        let tool_results: Vec<_> = session
            .conversation()
            .iter()
            .filter(|m| m.content == "Unknown tool: nope")
            .collect();
        assert_eq!(tool_results.len(), 2);
    }

    #[tokio::test]
    async fn run_ends_when_room_closes() {
        let engine = ScriptedEngine::new(vec![Ok(EngineTurn::Reply("ok".to_string()))]);
        let (session, mut handle) = connected(engine, 3).await;

        handle.say(&Participant::new("caller"), "hi");
        handle.close();

        let report = session.run().await.unwrap();
        assert_eq!(report.room.as_deref(), Some("room-1"));
        assert_eq!(report.final_persona, PersonaKind::Interactive);
        assert_eq!(report.replies_published, 1);
        assert!(report.monitored_for.is_none());
        assert_eq!(handle.drain_replies(), vec!["ok".to_string()]);
    }
}
