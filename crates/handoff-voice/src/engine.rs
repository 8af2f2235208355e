//! Contract with the reasoning engine that turns a conversation into either
//! a spoken reply or a structured tool call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::VoiceError;
use crate::tools::ToolDef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    Assistant,
    User,
    Tool,
}

/// One entry of the conversation the engine reasons over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Tool name for `Tool` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            name: None,
        }
    }

    pub fn tool(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: content.into(),
            name: Some(name.into()),
        }
    }
}

/// A tool call requested by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    /// JSON arguments as produced by the model; may be `null`.
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// What the engine decided to do with the current conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineTurn {
    Reply(String),
    ToolCall(ToolCall),
}

/// Everything the engine gets to decide one turn.
#[derive(Debug, Clone, Copy)]
pub struct EngineRequest<'a> {
    pub instructions: &'a str,
    pub tools: &'a [ToolDef],
    pub conversation: &'a [ChatMessage],
}

/// The language model behind the interactive persona.
///
/// Only the interactive persona ever calls it; the silent persona never asks
/// for a turn.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn next_turn(&self, request: EngineRequest<'_>) -> Result<EngineTurn, VoiceError>;
}
