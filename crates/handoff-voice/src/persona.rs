//! The two personas an agent session can run and the hooks the session
//! drives them through.
//!
//! A session starts [`Persona::Interactive`] and may hand off once to
//! [`Persona::Silent`]. There is no way back within a session; a fresh
//! session starts interactive again.

use chrono::Utc;
use std::sync::Arc;

use crate::keywords::KeywordSignals;
use crate::session::SessionUserData;
use crate::tools::ToolCatalogue;

/// System instructions of the interactive persona.
pub const INTERACTIVE_INSTRUCTIONS: &str = "\
You are a helpful voice assistant answering callers in real time. Keep replies short and spoken-friendly.

Before you can help, you need the caller's name and a short description of their issue. Ask for whichever is missing.

Call connectSupervisor, passing the name and issue you have collected, when any of these is true:
- the caller asks to speak to a human, a person, a supervisor or a manager;
- you do not know the answer from this conversation, or the request needs an ability you do not have;
- you still lack the caller's name or issue and they keep needing help.

Never invent facts, account details, prices or policies. Not knowing is a reason to connect a supervisor, not to apologize and guess.

After connectSupervisor succeeds, tell the caller a supervisor is on the way and say nothing else.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersonaKind {
    Interactive,
    Silent,
}

impl PersonaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interactive => "interactive",
            Self::Silent => "silent",
        }
    }
}

impl std::fmt::Display for PersonaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the session should treat a committed utterance from a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechAction {
    /// Ask the reasoning engine for the next turn.
    Respond,
    /// Log only; never reply.
    Observe(KeywordSignals),
}

/// Talks to the caller, reasons with the engine and may escalate.
#[derive(Debug, Clone)]
pub struct InteractivePersona {
    instructions: Arc<str>,
    greeting: Arc<str>,
    tools: ToolCatalogue,
}

impl InteractivePersona {
    pub fn new(instructions: Arc<str>, greeting: Arc<str>, tools: ToolCatalogue) -> Self {
        Self {
            instructions,
            greeting,
            tools,
        }
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    pub fn tools(&self) -> &ToolCatalogue {
        &self.tools
    }
}

/// Watches the room after a handoff. Has no tools and never speaks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentPersona;

#[derive(Debug, Clone)]
pub enum Persona {
    Interactive(InteractivePersona),
    Silent(SilentPersona),
}

impl Persona {
    pub fn kind(&self) -> PersonaKind {
        match self {
            Self::Interactive(_) => PersonaKind::Interactive,
            Self::Silent(_) => PersonaKind::Silent,
        }
    }

    pub fn can_reply(&self) -> bool {
        matches!(self, Self::Interactive(_))
    }

    pub fn tools(&self) -> Option<&ToolCatalogue> {
        match self {
            Self::Interactive(persona) => Some(persona.tools()),
            Self::Silent(_) => None,
        }
    }

    /// Runs when the persona becomes active. Returns the reply to publish,
    /// if any.
    pub fn on_enter(&self, data: &mut SessionUserData) -> Option<String> {
        match self {
            Self::Interactive(persona) => {
                tracing::info!(room = ?data.room, "interactive persona active");
                Some(persona.greeting().to_string()).filter(|g| !g.trim().is_empty())
            }
            Self::Silent(_) => {
                data.session_start_time = Some(Utc::now());
                tracing::info!(room = ?data.room, "silent persona monitoring");
                None
            }
        }
    }

    /// Runs when the persona is replaced or the session ends. Returns how
    /// long the room was monitored, for the silent persona.
    pub fn on_leave(&self, data: &SessionUserData) -> Option<chrono::Duration> {
        match self {
            Self::Interactive(_) => {
                tracing::debug!(room = ?data.room, "interactive persona leaving");
                None
            }
            Self::Silent(_) => {
                let started = data.session_start_time?;
                let elapsed = Utc::now() - started;
                tracing::info!(
                    room = ?data.room,
                    monitored_ms = elapsed.num_milliseconds(),
                    "silent monitoring ended"
                );
                Some(elapsed)
            }
        }
    }

    pub fn on_speech_committed(&self, data: &SessionUserData, transcript: &str) -> SpeechAction {
        match self {
            Self::Interactive(_) => SpeechAction::Respond,
            Self::Silent(_) => {
                let signals = KeywordSignals::classify(transcript);
                if signals.any() {
                    tracing::info!(
                        room = ?data.room,
                        help = signals.help,
                        urgency = signals.urgency,
                        human_request = signals.human_request,
                        "monitored speech flagged"
                    );
                } else {
                    tracing::debug!(room = ?data.room, "monitored speech committed");
                }
                SpeechAction::Observe(signals)
            }
        }
    }

    pub fn on_speech_interrupted(&self, data: &SessionUserData) {
        tracing::debug!(
            room = ?data.room,
            persona = %self.kind(),
            "speech interrupted"
        );
    }
}
