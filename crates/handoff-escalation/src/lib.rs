//! Escalation record store.
//!
//! Holds the one durable piece of state this agent produces: a record per
//! realtime room saying whether the conversation asked for a human
//! supervisor. The agent writes it when it escalates; the supervisor-facing
//! API reads, lists and resolves it.
//!
//! | State | Meaning |
//! |-------|---------|
//! | `NONE` | no escalation requested |
//! | `PENDING` | waiting for a supervisor to join |
//! | `RESOLVED` | a supervisor handled the request |
//!
//! # Usage
//!
//! ```rust,ignore
//! use handoff_escalation::{EscalationStore, SqliteEscalationStore};
//! use handoff_types::EscalationUpdate;
//!
//! let store = SqliteEscalationStore::open(pool).await?;
//! store
//!     .upsert("room-42", EscalationUpdate::pending(Some("Ada".into()), None))
//!     .await?;
//! ```

mod backend;
mod error;
mod store;

pub use backend::{EscalationStore, SqliteEscalationStore};
pub use error::EscalationError;
pub use store::{get_record, list_records, resolve_record, upsert_record, upsert_record_within};
