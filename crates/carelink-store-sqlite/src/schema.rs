//! SQL schema for the Carelink SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Latest position per (subject_key, role). Rows are overwritten in place and
-- never deleted.
CREATE TABLE IF NOT EXISTS positions (
    subject_key TEXT NOT NULL,   -- 'account:<id>' | 'session:<id>'
    role        TEXT NOT NULL,   -- 'client' | 'caregiver'
    latitude    REAL NOT NULL,
    longitude   REAL NOT NULL,
    accuracy    REAL,
    source      TEXT NOT NULL,   -- 'device-report' | 'geocoded-fallback'
    updated_at  TEXT NOT NULL,   -- RFC 3339 UTC, fixed microsecond width
    PRIMARY KEY (subject_key, role)
);

-- Read-only mirrors of external collaborators.
CREATE TABLE IF NOT EXISTS identities (
    session_id TEXT PRIMARY KEY,
    account_id TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS links (
    client_id    TEXT PRIMARY KEY,
    caregiver_id TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS profiles (
    account_id  TEXT PRIMARY KEY,
    postal_code TEXT
);

CREATE INDEX IF NOT EXISTS identities_account_idx ON identities(account_id);

PRAGMA user_version = 1;
";
