//! Realtime voice agent with supervisor escalation.
//!
//! A [`Worker`] is prewarmed once per process and bootstraps one
//! [`AgentSession`] per room. The session starts with the interactive
//! persona, which reasons through a [`ReasoningEngine`] and may call the
//! `connectSupervisor` tool. A successful call writes a PENDING escalation
//! record and hands the session to the silent persona, which keeps listening
//! but never answers again. Supervisors join with a `-supervisor` identity
//! (see [`VoiceService::generate_supervisor_token`]) and are never answered
//! by the agent.
//!
//! The realtime host is abstracted behind [`SessionTransport`];
//! [`LocalRoom`] is the in-process implementation.

pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod keywords;
pub mod persona;
pub mod room;
pub mod service;
pub mod session;
pub mod tools;
pub mod transport;
pub mod worker;

pub use config::{AgentConfig, LiveKitConfig};
pub use engine::{ChatMessage, ChatRole, EngineRequest, EngineTurn, ReasoningEngine, ToolCall};
pub use error::VoiceError;
pub use filter::ParticipantFilter;
pub use keywords::KeywordSignals;
pub use persona::{Persona, PersonaKind, SpeechAction};
pub use room::{LocalRoom, LocalRoomHandle, DEFAULT_REPLY_CAPACITY};
pub use service::VoiceService;
pub use session::{AgentSession, SessionReport, SessionUserData};
pub use tools::{
    ConnectSupervisorTool, Tool, ToolCatalogue, ToolContext, ToolDef, ToolResponse,
    CONNECT_SUPERVISOR, SUPERVISOR_CONNECTING, SUPERVISOR_ERROR_PREFIX,
};
pub use transport::{SessionEvent, SessionTransport};
pub use worker::{BootstrapOutcome, Worker};
