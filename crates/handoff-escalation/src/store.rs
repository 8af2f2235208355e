//! Connection-level persistence for escalation records.
//!
//! All writes go through [`upsert_record`], a single
//! `INSERT ... ON CONFLICT(room_id) DO UPDATE` statement, so a write for a
//! room is atomic and the last writer wins. Timestamps are stored as
//! RFC 3339 text in UTC.

use chrono::{DateTime, SecondsFormat, Utc};
use handoff_types::{EscalationRecord, EscalationUpdate, RequestState};
use rusqlite::{
    params, Connection, ErrorCode, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use std::time::{Duration, Instant};

use crate::error::EscalationError;

const RECORD_COLUMNS: &str =
    "room_id, request_state, requestor_name, issue_summary, requested_at, updated_at, resolved_at";

/// A record as stored, before its text columns are parsed.
struct RecordRow {
    room_id: String,
    request_state: String,
    requestor_name: Option<String>,
    issue_summary: Option<String>,
    requested_at: String,
    updated_at: String,
    resolved_at: Option<String>,
}

impl RecordRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            room_id: row.get(0)?,
            request_state: row.get(1)?,
            requestor_name: row.get(2)?,
            issue_summary: row.get(3)?,
            requested_at: row.get(4)?,
            updated_at: row.get(5)?,
            resolved_at: row.get(6)?,
        })
    }

    fn into_record(self) -> Result<EscalationRecord, EscalationError> {
        let corrupt = |reason: String| EscalationError::Corrupt {
            room_id: self.room_id.clone(),
            reason,
        };

        let request_state = self
            .request_state
            .parse::<RequestState>()
            .map_err(|e| corrupt(e.to_string()))?;
        let requested_at = parse_timestamp(&self.requested_at).map_err(corrupt)?;
        let updated_at = parse_timestamp(&self.updated_at).map_err(corrupt)?;
        let resolved_at = self
            .resolved_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(corrupt)?;

        Ok(EscalationRecord {
            room_id: self.room_id,
            request_state,
            requestor_name: self.requestor_name,
            issue_summary: self.issue_summary,
            requested_at,
            updated_at,
            resolved_at,
        })
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{raw}': {e}"))
}

/// Creates or overwrites the record for `room_id`.
///
/// Re-entering `PENDING` replaces the requestor, issue and `requested_at`
/// of the previous escalation and clears any `resolved_at`.
///
/// # Errors
///
/// Returns `EscalationError::Database` on SQL failure.
pub fn upsert_record(
    conn: &Connection,
    room_id: &str,
    update: &EscalationUpdate,
) -> Result<EscalationRecord, EscalationError> {
    let now = format_timestamp(&Utc::now());
    let sql = format!(
        "INSERT INTO escalation_records
            (room_id, request_state, requestor_name, issue_summary, requested_at, updated_at, resolved_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)
         ON CONFLICT(room_id) DO UPDATE SET
            request_state = excluded.request_state,
            requestor_name = excluded.requestor_name,
            issue_summary = excluded.issue_summary,
            requested_at = excluded.requested_at,
            updated_at = excluded.updated_at,
            resolved_at = NULL
         RETURNING {RECORD_COLUMNS}"
    );

    let row = conn.query_row(
        &sql,
        params![
            room_id,
            update.request_state.as_str(),
            update.requestor_name,
            update.issue_summary,
            format_timestamp(&update.requested_at),
            now,
        ],
        RecordRow::from_row,
    )?;

    row.into_record()
}

/// Like [`upsert_record`], but the write only commits if it finishes within
/// `limit` of `started`.
///
/// Lock waits are capped at the remaining time through the connection's
/// busy timeout, and the write runs in an `IMMEDIATE` transaction that is
/// rolled back if the deadline passes before commit. The connection's
/// previous busy timeout is restored afterwards.
///
/// # Errors
///
/// Returns `EscalationError::Timeout` if the deadline passed; nothing is
/// written in that case.
pub fn upsert_record_within(
    conn: &Connection,
    room_id: &str,
    update: &EscalationUpdate,
    started: Instant,
    limit: Duration,
) -> Result<EscalationRecord, EscalationError> {
    let Some(remaining) = limit.checked_sub(started.elapsed()) else {
        return Err(EscalationError::Timeout {
            seconds: limit.as_secs(),
        });
    };

    let previous: i64 = conn.pragma_query_value(None, "busy_timeout", |row| row.get(0))?;
    conn.busy_timeout(remaining)?;
    let result = commit_before_deadline(conn, room_id, update, started, limit);
    if let Err(e) = conn.busy_timeout(Duration::from_millis(previous.max(0) as u64)) {
        tracing::warn!(error = %e, "failed to restore busy timeout");
    }
    result
}

fn commit_before_deadline(
    conn: &Connection,
    room_id: &str,
    update: &EscalationUpdate,
    started: Instant,
    limit: Duration,
) -> Result<EscalationRecord, EscalationError> {
    let timed_out = |e: rusqlite::Error| match &e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::DatabaseBusy => {
            EscalationError::Timeout {
                seconds: limit.as_secs(),
            }
        }
        _ => EscalationError::Database(e),
    };

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate).map_err(timed_out)?;
    let record = upsert_record(&tx, room_id, update)?;
    if started.elapsed() > limit {
        // Dropping the transaction rolls it back.
        return Err(EscalationError::Timeout {
            seconds: limit.as_secs(),
        });
    }
    tx.commit().map_err(timed_out)?;

    Ok(record)
}

/// Loads the record for `room_id`, if one exists.
///
/// # Errors
///
/// Returns `EscalationError::Database` on SQL failure or
/// `EscalationError::Corrupt` if the stored row cannot be parsed.
pub fn get_record(
    conn: &Connection,
    room_id: &str,
) -> Result<Option<EscalationRecord>, EscalationError> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM escalation_records WHERE room_id = ?1");
    conn.query_row(&sql, params![room_id], RecordRow::from_row)
        .optional()?
        .map(RecordRow::into_record)
        .transpose()
}

/// Marks the record for `room_id` as `RESOLVED`.
///
/// Returns `None` if the room has no record. Resolving an already resolved
/// record refreshes its `resolved_at`.
///
/// # Errors
///
/// Returns `EscalationError::Database` on SQL failure.
pub fn resolve_record(
    conn: &Connection,
    room_id: &str,
) -> Result<Option<EscalationRecord>, EscalationError> {
    let now = format_timestamp(&Utc::now());
    let sql = format!(
        "UPDATE escalation_records
         SET request_state = ?2, resolved_at = ?3, updated_at = ?3
         WHERE room_id = ?1
         RETURNING {RECORD_COLUMNS}"
    );

    conn.query_row(
        &sql,
        params![room_id, RequestState::Resolved.as_str(), now],
        RecordRow::from_row,
    )
    .optional()?
    .map(RecordRow::into_record)
    .transpose()
}

/// Lists records, oldest request first, optionally restricted to one state.
///
/// # Errors
///
/// Returns `EscalationError::Database` on SQL failure.
pub fn list_records(
    conn: &Connection,
    state: Option<RequestState>,
) -> Result<Vec<EscalationRecord>, EscalationError> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM escalation_records
         WHERE ?1 IS NULL OR request_state = ?1
         ORDER BY requested_at ASC, room_id ASC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![state.map(RequestState::as_str)], RecordRow::from_row)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?.into_record()?);
    }

    Ok(records)
}
