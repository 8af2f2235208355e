//! Database layer for the handoff agent.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization
//! and embedded SQL migrations. The escalation record table, the one piece of
//! state shared with the supervisor-facing system, is created through the
//! migrations in this crate.
//!
//! SQL files are compiled into the binary via `include_str!`, so the schema
//! ships with the code that depends on it.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
