//! Shared types and constants for the handoff agent.
//!
//! This crate holds the vocabulary every other crate in the workspace agrees
//! on: the escalation lifecycle ([`RequestState`]), the durable record a
//! supervisor-facing system consumes ([`EscalationRecord`]), and the
//! participant classification used to keep the agent from talking over a
//! human supervisor ([`ParticipantKind`], [`ParticipantRole`]).
//!
//! No crate in the workspace depends on anything *except* `handoff-types` for
//! cross-cutting type definitions.

use serde::{Deserialize, Serialize};

mod escalation;
mod participant;

pub use escalation::{EscalationRecord, EscalationUpdate};
pub use participant::{
    has_supervisor_suffix, supervisor_identity, Participant, ParticipantKind, ParticipantRole,
    SUPERVISOR_IDENTITY_SUFFIX,
};

/// Lifecycle of a room's escalation request.
///
/// Stored as `NONE`, `PENDING` or `RESOLVED` in the record store and on the
/// wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestState {
    /// No escalation has been requested.
    #[default]
    None,
    /// The conversation asked for a supervisor and is waiting for one.
    Pending,
    /// A supervisor handled the request.
    Resolved,
}

impl RequestState {
    /// Returns the canonical string label for this state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Pending => "PENDING",
            Self::Resolved => "RESOLVED",
        }
    }
}

impl std::fmt::Display for RequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestState {
    type Err = ParseRequestStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(Self::None),
            "PENDING" => Ok(Self::Pending),
            "RESOLVED" => Ok(Self::Resolved),
            _ => Err(ParseRequestStateError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown request state string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown request state: {0}")]
pub struct ParseRequestStateError(pub String);

/// Trims a free-text value and maps empty strings to `None`.
///
/// Used for every optional string the conversation collects (requestor
/// name, issue summary, supervisor display name).
pub fn normalize_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
