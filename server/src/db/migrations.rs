use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking — no migration table needed.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        M::up(
            "-- Migration 1: Initial schema

CREATE TABLE users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    role TEXT NOT NULL DEFAULT 'pm',
    password_salt TEXT NOT NULL,
    password_hash TEXT NOT NULL
);

CREATE TABLE proposals (
    id TEXT PRIMARY KEY,
    proposal_number TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    client_name TEXT,
    status TEXT NOT NULL DEFAULT 'draft',
    created_by TEXT REFERENCES users(id),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE wbs_items (
    id TEXT PRIMARY KEY,
    proposal_id TEXT NOT NULL REFERENCES proposals(id) ON DELETE CASCADE,
    wbs_code TEXT NOT NULL,
    description TEXT,
    phase TEXT,
    order_index INTEGER NOT NULL DEFAULT 0,
    updated_by TEXT REFERENCES users(id),
    updated_at TEXT NOT NULL
);

CREATE INDEX idx_wbs_items_proposal ON wbs_items(proposal_id);

CREATE TABLE proposed_people (
    id TEXT PRIMARY KEY,
    proposal_id TEXT NOT NULL REFERENCES proposals(id) ON DELETE CASCADE,
    employee_name TEXT NOT NULL,
    employee_id TEXT,
    job_role TEXT,
    team TEXT,
    role_on_project TEXT,
    hourly_rate REAL,
    years_experience INTEGER,
    cv_path TEXT,
    updated_by TEXT REFERENCES users(id),
    updated_at TEXT NOT NULL
);

CREATE INDEX idx_proposed_people_proposal ON proposed_people(proposal_id);

CREATE TABLE pricing_rows (
    id TEXT PRIMARY KEY,
    proposal_id TEXT NOT NULL REFERENCES proposals(id) ON DELETE CASCADE,
    wbs_id TEXT REFERENCES wbs_items(id) ON DELETE SET NULL,
    person_id TEXT REFERENCES proposed_people(id) ON DELETE SET NULL,
    hourly_rate REAL NOT NULL DEFAULT 0,
    hours_by_phase TEXT NOT NULL DEFAULT '{}',
    updated_by TEXT REFERENCES users(id),
    updated_at TEXT NOT NULL
);

CREATE INDEX idx_pricing_rows_proposal ON pricing_rows(proposal_id);
CREATE INDEX idx_pricing_rows_wbs ON pricing_rows(wbs_id);

CREATE TABLE scope_sections (
    id TEXT PRIMARY KEY,
    proposal_id TEXT NOT NULL REFERENCES proposals(id) ON DELETE CASCADE,
    section_name TEXT NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    order_index INTEGER NOT NULL DEFAULT 0,
    updated_by TEXT REFERENCES users(id),
    updated_at TEXT NOT NULL
);

CREATE INDEX idx_scope_sections_proposal ON scope_sections(proposal_id);

CREATE TABLE schedule_items (
    id TEXT PRIMARY KEY,
    proposal_id TEXT NOT NULL REFERENCES proposals(id) ON DELETE CASCADE,
    wbs_id TEXT REFERENCES wbs_items(id) ON DELETE SET NULL,
    task_name TEXT NOT NULL,
    start_date TEXT,
    end_date TEXT,
    responsible_party TEXT,
    is_milestone INTEGER NOT NULL DEFAULT 0,
    phase TEXT,
    updated_by TEXT REFERENCES users(id),
    updated_at TEXT NOT NULL
);

CREATE INDEX idx_schedule_items_proposal ON schedule_items(proposal_id);

CREATE TABLE deliverables (
    id TEXT PRIMARY KEY,
    proposal_id TEXT NOT NULL REFERENCES proposals(id) ON DELETE CASCADE,
    wbs_id TEXT REFERENCES wbs_items(id) ON DELETE SET NULL,
    deliverable_ref TEXT,
    title TEXT NOT NULL,
    kind TEXT NOT NULL DEFAULT 'other',
    description TEXT,
    due_date TEXT,
    responsible_party TEXT,
    status TEXT NOT NULL DEFAULT 'tbd',
    updated_by TEXT REFERENCES users(id),
    updated_at TEXT NOT NULL
);

CREATE INDEX idx_deliverables_proposal ON deliverables(proposal_id);

CREATE TABLE drawings (
    id TEXT PRIMARY KEY,
    proposal_id TEXT NOT NULL REFERENCES proposals(id) ON DELETE CASCADE,
    wbs_id TEXT REFERENCES wbs_items(id) ON DELETE SET NULL,
    deliverable_id TEXT REFERENCES deliverables(id) ON DELETE SET NULL,
    drawing_number TEXT,
    title TEXT NOT NULL,
    discipline TEXT,
    scale TEXT,
    format TEXT NOT NULL DEFAULT 'pdf',
    due_date TEXT,
    responsible_party TEXT,
    revision TEXT,
    status TEXT NOT NULL DEFAULT 'tbd',
    updated_by TEXT REFERENCES users(id),
    updated_at TEXT NOT NULL
);

CREATE INDEX idx_drawings_proposal ON drawings(proposal_id);
",
        ),
    ])
}
