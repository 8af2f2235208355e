//! Participant identities as seen by the agent.

use serde::{Deserialize, Serialize};

/// Identity suffix that marks a human supervisor.
///
/// Any client that joins a room on behalf of a supervisor must use an
/// identity ending in this suffix.
pub const SUPERVISOR_IDENTITY_SUFFIX: &str = "-supervisor";

/// How the agent treats a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantKind {
    /// A regular end user the agent serves.
    User,
    /// A human supervisor who has taken over the room.
    Supervisor,
    /// An automated participant, including the agent itself.
    Agent,
}

/// A role asserted by the transport from an authenticated token claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    User,
    Supervisor,
}

/// A participant in a realtime room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Transport-level identity string.
    pub identity: String,
    /// Display name, if the transport supplied one.
    #[serde(default)]
    pub name: Option<String>,
    /// Set by the transport for agent/worker participants.
    #[serde(default)]
    pub is_agent: bool,
    /// Authenticated role claim, when the transport carries one.
    #[serde(default)]
    pub role_claim: Option<ParticipantRole>,
}

impl Participant {
    /// A regular participant with only an identity.
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            name: None,
            is_agent: false,
            role_claim: None,
        }
    }

    /// An agent participant (another worker, or this agent's own echo).
    pub fn agent(identity: impl Into<String>) -> Self {
        Self {
            is_agent: true,
            ..Self::new(identity)
        }
    }

    pub fn with_role_claim(mut self, role: ParticipantRole) -> Self {
        self.role_claim = Some(role);
        self
    }
}

/// Returns `true` if `identity` follows the supervisor naming convention.
pub fn has_supervisor_suffix(identity: &str) -> bool {
    identity.ends_with(SUPERVISOR_IDENTITY_SUFFIX)
}

/// Builds a supervisor identity from a display name.
///
/// Names that already carry the suffix are returned unchanged.
pub fn supervisor_identity(name: &str) -> String {
    if has_supervisor_suffix(name) {
        name.to_string()
    } else {
        format!("{name}{SUPERVISOR_IDENTITY_SUFFIX}")
    }
}
