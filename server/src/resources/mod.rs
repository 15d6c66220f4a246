//! Per-entity CRUD handlers, all scoped under a proposal.
//!
//! These are thin: validate shape, write through to SQLite via
//! spawn_blocking, return the record. They never touch collaboration
//! state — live edit fan-out happens on the WebSocket path.

pub mod deliverables;
pub mod drawings;
pub mod people;
pub mod pricing;
pub mod proposals;
pub mod schedule;
pub mod scope;

/// Guard for scoped creates: the parent proposal must exist.
pub fn proposal_exists(conn: &rusqlite::Connection, proposal_id: &str) -> bool {
    conn.query_row(
        "SELECT COUNT(*) FROM proposals WHERE id = ?1",
        [proposal_id],
        |row| row.get::<_, i64>(0).map(|c| c > 0),
    )
    .unwrap_or(false)
}
