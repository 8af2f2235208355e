//! Process-wide agent worker: prewarmed once, then bootstraps one session
//! per room.

use handoff_escalation::EscalationStore;
use handoff_types::{Participant, ParticipantKind};
use std::sync::Arc;

use crate::config::AgentConfig;
use crate::engine::ReasoningEngine;
use crate::error::VoiceError;
use crate::filter::ParticipantFilter;
use crate::persona::{InteractivePersona, Persona, INTERACTIVE_INSTRUCTIONS};
use crate::session::{AgentSession, SessionReport, SessionUserData};
use crate::tools::{ConnectSupervisorTool, ToolCatalogue};
use crate::transport::SessionTransport;

/// Result of [`Worker::bootstrap`].
pub enum BootstrapOutcome<T> {
    /// A session is running the interactive persona and has greeted.
    Started(AgentSession<T>),
    /// The first participant was a supervisor; no persona was started.
    Declined { participant: Participant },
}

impl<T> std::fmt::Debug for BootstrapOutcome<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started(_) => f.write_str("Started"),
            Self::Declined { participant } => f
                .debug_struct("Declined")
                .field("participant", &participant.identity)
                .finish(),
        }
    }
}

/// Shared state for every session this process hosts.
#[derive(Clone)]
pub struct Worker {
    config: AgentConfig,
    engine: Arc<dyn ReasoningEngine>,
    filter: ParticipantFilter,
    instructions: Arc<str>,
    greeting: Arc<str>,
    tools: ToolCatalogue,
}

impl Worker {
    /// Builds the resources sessions share: the tool catalogue bound to
    /// `store`, the persona instructions and the participant filter.
    ///
    /// # Errors
    ///
    /// Returns `VoiceError::Config` if the agent identity is empty or no
    /// tool rounds are allowed.
    pub fn prewarm(
        config: AgentConfig,
        store: Arc<dyn EscalationStore>,
        engine: Arc<dyn ReasoningEngine>,
    ) -> Result<Self, VoiceError> {
        config.validate()?;

        let mut tools = ToolCatalogue::new();
        tools.register(
            ConnectSupervisorTool::new(store).with_write_timeout(config.store_write_timeout()),
        );

        tracing::info!(
            identity = %config.identity,
            tools = ?tools.names(),
            "agent worker prewarmed"
        );

        Ok(Self {
            filter: ParticipantFilter::new(config.identity.clone()),
            instructions: Arc::from(INTERACTIVE_INSTRUCTIONS),
            greeting: Arc::from(config.greeting.as_str()),
            tools,
            engine,
            config,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolCatalogue {
        &self.tools
    }

    /// Connects, waits for the first human and starts an interactive session
    /// for them.
    ///
    /// # Errors
    ///
    /// Connection and participant-wait failures are returned as is; a wait
    /// longer than the configured limit is `VoiceError::Timeout`.
    pub async fn bootstrap<T: SessionTransport>(
        &self,
        mut transport: T,
    ) -> Result<BootstrapOutcome<T>, VoiceError> {
        transport.connect().await?;
        let room = transport.room_name();

        let participant = match self.config.participant_wait_timeout() {
            Some(limit) => tokio::time::timeout(limit, self.wait_for_human(&mut transport))
                .await
                .map_err(|_| VoiceError::Timeout {
                    waiting_for: "a participant",
                    seconds: limit.as_secs(),
                })??,
            None => self.wait_for_human(&mut transport).await?,
        };

        if self.filter.classify(&participant) == ParticipantKind::Supervisor {
            tracing::info!(
                room = ?room,
                identity = %participant.identity,
                "supervisor joined first; not starting an agent session"
            );
            return Ok(BootstrapOutcome::Declined { participant });
        }

        tracing::info!(
            room = ?room,
            identity = %participant.identity,
            "starting agent session"
        );

        let userdata = SessionUserData {
            room,
            session_start_time: None,
        };
        let persona = Persona::Interactive(InteractivePersona::new(
            Arc::clone(&self.instructions),
            Arc::clone(&self.greeting),
            self.tools.clone(),
        ));

        let mut session = AgentSession::new(
            transport,
            Arc::clone(&self.engine),
            self.filter.clone(),
            persona,
            userdata,
            self.config.max_tool_rounds,
        );
        session.start().await?;

        Ok(BootstrapOutcome::Started(session))
    }

    /// Bootstraps and runs the session until the room closes. Returns `None`
    /// when bootstrap declined.
    pub async fn entry<T: SessionTransport>(
        &self,
        transport: T,
    ) -> Result<Option<SessionReport>, VoiceError> {
        match self.bootstrap(transport).await? {
            BootstrapOutcome::Started(session) => session.run().await.map(Some),
            BootstrapOutcome::Declined { .. } => Ok(None),
        }
    }

    async fn wait_for_human<T: SessionTransport>(
        &self,
        transport: &mut T,
    ) -> Result<Participant, VoiceError> {
        loop {
            let participant = transport.wait_for_participant().await?;
            if self.filter.classify(&participant) != ParticipantKind::Agent {
                return Ok(participant);
            }
            tracing::debug!(identity = %participant.identity, "skipping agent participant");
        }
    }
}
