//! The durable escalation record shared with the supervisor-facing system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::RequestState;

/// One escalation record per room.
///
/// The room identifier is the key: a second escalation for the same room
/// overwrites the requestor, issue and timestamp of the first instead of
/// creating another record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationRecord {
    /// The realtime room this record belongs to.
    pub room_id: String,
    /// Where the escalation is in its lifecycle.
    pub request_state: RequestState,
    /// Name of the person asking for help, if the conversation collected it.
    pub requestor_name: Option<String>,
    /// Short description of the problem, if the conversation collected it.
    pub issue_summary: Option<String>,
    /// When the room last entered `PENDING`.
    pub requested_at: DateTime<Utc>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
    /// When a supervisor marked the request resolved.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl EscalationRecord {
    /// Returns `true` while the room is waiting for a supervisor.
    pub fn is_pending(&self) -> bool {
        self.request_state == RequestState::Pending
    }
}

/// The fields an escalation write carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationUpdate {
    pub request_state: RequestState,
    pub requestor_name: Option<String>,
    pub issue_summary: Option<String>,
    pub requested_at: DateTime<Utc>,
}

impl EscalationUpdate {
    /// A fresh `PENDING` request stamped with the current time.
    pub fn pending(requestor_name: Option<String>, issue_summary: Option<String>) -> Self {
        Self {
            request_state: RequestState::Pending,
            requestor_name,
            issue_summary,
            requested_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_update_carries_fields() {
        let update = EscalationUpdate::pending(Some("Ada".into()), None);
        assert_eq!(update.request_state, RequestState::Pending);
        assert_eq!(update.requestor_name.as_deref(), Some("Ada"));
        assert!(update.issue_summary.is_none());
    }

    #[test]
    fn record_serializes_with_camel_case_fields() {
        let now = Utc::now();
        let record = EscalationRecord {
            room_id: "room-1".into(),
            request_state: RequestState::Pending,
            requestor_name: None,
            issue_summary: Some("billing".into()),
            requested_at: now,
            updated_at: now,
            resolved_at: None,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["roomId"], "room-1");
        assert_eq!(json["requestState"], "PENDING");
        assert!(json["requestorName"].is_null());
        assert_eq!(json["issueSummary"], "billing");
        assert!(record.is_pending());
    }
}
