use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::VoiceError;

fn default_token_ttl_seconds() -> u64 {
    3600
}

fn default_agent_identity() -> String {
    "handoff-agent".to_string()
}

fn default_greeting() -> String {
    "How can I help you today?".to_string()
}

fn default_max_tool_rounds() -> usize {
    3
}

/// LiveKit endpoint and API credentials. Missing fields fall back to
/// empty strings, which disables token issuing.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveKitConfig {
    pub url: String,
    pub api_key: String,
    #[serde(skip_serializing)]
    pub api_secret: String,
    /// JWT token TTL in seconds for LiveKit join tokens. Default: 3600 (1 hour).
    #[serde(default = "default_token_ttl_seconds")]
    pub token_ttl_seconds: u64,
}

impl Default for LiveKitConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            token_ttl_seconds: default_token_ttl_seconds(),
        }
    }
}

impl fmt::Debug for LiveKitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveKitConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .finish()
    }
}

impl LiveKitConfig {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            token_ttl_seconds: default_token_ttl_seconds(),
        }
    }
}

/// Behavior of the agent worker inside a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Identity the agent joins rooms with. Events attributed to it are
    /// never answered.
    #[serde(default = "default_agent_identity")]
    pub identity: String,

    /// First thing the interactive persona says when a session starts.
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Upper bound on waiting for a human to join. Unset waits forever.
    #[serde(default)]
    pub participant_wait_timeout_secs: Option<u64>,

    /// Upper bound on the escalation write. Unset waits forever.
    #[serde(default)]
    pub store_write_timeout_secs: Option<u64>,

    /// Tool calls the engine may chain for a single utterance.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            identity: default_agent_identity(),
            greeting: default_greeting(),
            participant_wait_timeout_secs: None,
            store_write_timeout_secs: None,
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

impl AgentConfig {
    /// Rejects settings no session could run with.
    ///
    /// # Errors
    ///
    /// Returns `VoiceError::Config` if the identity is blank or no tool
    /// rounds are allowed.
    pub fn validate(&self) -> Result<(), VoiceError> {
        if self.identity.trim().is_empty() {
            return Err(VoiceError::Config("agent identity must not be empty".to_string()));
        }
        if self.max_tool_rounds == 0 {
            return Err(VoiceError::Config(
                "max_tool_rounds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn participant_wait_timeout(&self) -> Option<Duration> {
        self.participant_wait_timeout_secs.map(Duration::from_secs)
    }

    pub fn store_write_timeout(&self) -> Option<Duration> {
        self.store_write_timeout_secs.map(Duration::from_secs)
    }
}
