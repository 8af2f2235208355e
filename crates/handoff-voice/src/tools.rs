//! Tools the interactive persona exposes to the reasoning engine.
//!
//! A tool is a request/response contract: typed arguments in, text out, plus
//! an explicit description of its side effect. Tools never see the session;
//! whatever they need from it arrives in a [`ToolContext`]. A tool that wants
//! the session to change persona says so in its [`ToolResponse`] and the
//! session performs the handoff.
//!
//! The calling contract only carries text back to the model, so failures
//! are reported as text too, never as `Err`.

use async_trait::async_trait;
use handoff_escalation::EscalationStore;
use handoff_types::{normalize_text, EscalationUpdate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::ToolCall;
use crate::persona::PersonaKind;

/// Wire name of the escalation tool.
pub const CONNECT_SUPERVISOR: &str = "connectSupervisor";

/// Every failed escalation result starts with this prefix.
pub const SUPERVISOR_ERROR_PREFIX: &str = "Error connecting to a supervisor";

/// Result text of a successful escalation.
pub const SUPERVISOR_CONNECTING: &str = "Connecting to a supervisor...";

/// Session facts a tool may read.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolContext<'a> {
    pub room: Option<&'a str>,
}

/// What a tool hands back to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResponse {
    /// Text returned to the engine.
    pub output: String,
    /// Persona the session must switch to, if any.
    pub handoff: Option<PersonaKind>,
}

impl ToolResponse {
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            handoff: None,
        }
    }

    pub fn handoff(output: impl Into<String>, target: PersonaKind) -> Self {
        Self {
            output: output.into(),
            handoff: Some(target),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    /// Name used in function calling.
    fn name(&self) -> &'static str;

    /// Description shown to the model; tells it when to call the tool.
    fn description(&self) -> &'static str;

    /// JSON Schema of the arguments object.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Plain statement of what calling the tool changes.
    fn side_effects(&self) -> &'static str;

    async fn execute(&self, arguments: serde_json::Value, ctx: &ToolContext<'_>) -> ToolResponse;
}

/// OpenAI-format function definition for LLM function-calling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// OpenAI-format tool definition (wraps FunctionDef)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDef,
}

/// The tools a persona offers, in registration order.
#[derive(Clone, Default)]
pub struct ToolCatalogue {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolCatalogue {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.push(Arc::new(tool));
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    pub fn definitions(&self) -> Vec<ToolDef> {
        self.tools
            .iter()
            .map(|tool| ToolDef {
                tool_type: "function".to_string(),
                function: FunctionDef {
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    parameters: tool.parameters_schema(),
                },
            })
            .collect()
    }

    /// Runs the named tool. Unknown names produce a text result and no
    /// side effect.
    pub async fn invoke(&self, call: &ToolCall, ctx: &ToolContext<'_>) -> ToolResponse {
        let Some(tool) = self.tools.iter().find(|tool| tool.name() == call.name) else {
            tracing::warn!(tool = %call.name, "engine called an unknown tool");
            return ToolResponse::text(format!("Unknown tool: {}", call.name));
        };

        tracing::info!(tool = tool.name(), room = ?ctx.room, "invoking tool");
        tool.execute(call.arguments.clone(), ctx).await
    }
}

impl std::fmt::Debug for ToolCatalogue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCatalogue")
            .field("tools", &self.names())
            .finish()
    }
}

/// Arguments of [`CONNECT_SUPERVISOR`]. Both are optional free text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectSupervisorArgs {
    pub name: Option<String>,
    pub issue: Option<String>,
}

impl ConnectSupervisorArgs {
    /// Parses model-supplied arguments; `null` means "no arguments".
    pub fn parse(arguments: serde_json::Value) -> Result<Self, serde_json::Error> {
        if arguments.is_null() {
            return Ok(Self::default());
        }
        let raw: Self = serde_json::from_value(arguments)?;
        Ok(Self {
            name: normalize_text(raw.name.as_deref()),
            issue: normalize_text(raw.issue.as_deref()),
        })
    }
}

/// Records a pending escalation for the room and asks for the silent
/// persona.
///
/// The write is awaited before the handoff is requested. If it fails, the
/// response carries only error text and the persona stays interactive.
/// With a write timeout the store enforces the limit itself, so a write that
/// times out leaves no record behind.
pub struct ConnectSupervisorTool {
    store: Arc<dyn EscalationStore>,
    write_timeout: Option<Duration>,
}

impl ConnectSupervisorTool {
    pub fn new(store: Arc<dyn EscalationStore>) -> Self {
        Self {
            store,
            write_timeout: None,
        }
    }

    pub fn with_write_timeout(mut self, limit: Option<Duration>) -> Self {
        self.write_timeout = limit;
        self
    }

    fn failure(reason: impl std::fmt::Display) -> ToolResponse {
        ToolResponse::text(format!("{SUPERVISOR_ERROR_PREFIX}: {reason}"))
    }
}

#[async_trait]
impl Tool for ConnectSupervisorTool {
    fn name(&self) -> &'static str {
        CONNECT_SUPERVISOR
    }

    fn description(&self) -> &'static str {
        "Connect the caller to a human supervisor. Call this whenever you cannot \
         answer from what you know or lack the ability to do what the caller asks, \
         and whenever the caller asks for a human. Pass the caller's name and a \
         short summary of the issue if you have them; call it anyway if you do not."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "The caller's name, if they gave it."
                },
                "issue": {
                    "type": "string",
                    "description": "One sentence describing what the caller needs help with."
                }
            },
            "required": []
        })
    }

    fn side_effects(&self) -> &'static str {
        "Marks the room's escalation record PENDING with the caller's name and issue, \
         then hands the session to a silent monitoring persona that no longer replies."
    }

    async fn execute(&self, arguments: serde_json::Value, ctx: &ToolContext<'_>) -> ToolResponse {
        let Some(room) = ctx.room.filter(|room| !room.trim().is_empty()) else {
            tracing::error!("escalation requested without a room");
            return Self::failure("no room is associated with this session");
        };

        let args = match ConnectSupervisorArgs::parse(arguments) {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!(room, "invalid {CONNECT_SUPERVISOR} arguments: {e}");
                return Self::failure(format!("invalid arguments: {e}"));
            }
        };

        let update = EscalationUpdate::pending(args.name, args.issue);
        let result = match self.write_timeout {
            Some(limit) => self.store.upsert_within(room, update, limit).await,
            None => self.store.upsert(room, update).await,
        };

        match result {
            Ok(record) => {
                tracing::info!(
                    room,
                    requestor = ?record.requestor_name,
                    issue = ?record.issue_summary,
                    "escalation recorded"
                );
                ToolResponse::handoff(SUPERVISOR_CONNECTING, PersonaKind::Silent)
            }
            Err(e) => {
                tracing::error!(room, "failed to record escalation: {e}");
                Self::failure(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_are_trimmed_and_emptied() {
        let args =
            ConnectSupervisorArgs::parse(json!({ "name": "  Ada ", "issue": "   " })).unwrap();
        assert_eq!(args.name.as_deref(), Some("Ada"));
        assert!(args.issue.is_none());
    }

    #[test]
    fn null_and_empty_arguments_mean_absent() {
        assert_eq!(
            ConnectSupervisorArgs::parse(serde_json::Value::Null).unwrap(),
            ConnectSupervisorArgs::default()
        );
        assert_eq!(
            ConnectSupervisorArgs::parse(json!({})).unwrap(),
            ConnectSupervisorArgs::default()
        );
    }

    #[test]
    fn wrong_argument_types_are_rejected() {
        assert!(ConnectSupervisorArgs::parse(json!({ "name": 7 })).is_err());
        assert!(ConnectSupervisorArgs::parse(json!("Ada")).is_err());
    }
}
