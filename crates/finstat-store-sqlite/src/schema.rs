//! SQL schema for the statement store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- AUTOINCREMENT guarantees ids are never reused.
CREATE TABLE IF NOT EXISTS financial_statements (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    company         TEXT    NOT NULL CHECK (length(company) > 0),
    fiscal_year     INTEGER NOT NULL,
    period_end      TEXT,            -- YYYY-MM-DD
    currency        TEXT,
    source_filename TEXT,
    payload         TEXT    NOT NULL CHECK (json_valid(payload)),
    created_at      TEXT    NOT NULL, -- RFC 3339 UTC; server-assigned
    UNIQUE (company, fiscal_year)
);

CREATE INDEX IF NOT EXISTS financial_statements_company_idx
    ON financial_statements(company);
CREATE INDEX IF NOT EXISTS financial_statements_year_idx
    ON financial_statements(fiscal_year);

-- Structural index over payload content. Rows are derived from the payload
-- and fully rewritten whenever it is replaced.
CREATE TABLE IF NOT EXISTS payload_index (
    statement_id INTEGER NOT NULL REFERENCES financial_statements(id),
    path         TEXT    NOT NULL, -- segments joined with U+001F
    kind         TEXT    NOT NULL, -- 'key' | 'null' | 'bool' | 'num' | 'str'
    num          REAL,             -- 'num' value, or 0/1 for 'bool'
    txt          TEXT              -- 'str' value
);

CREATE INDEX IF NOT EXISTS payload_index_num_idx
    ON payload_index(path, kind, num);
CREATE INDEX IF NOT EXISTS payload_index_txt_idx
    ON payload_index(path, kind, txt);
CREATE INDEX IF NOT EXISTS payload_index_statement_idx
    ON payload_index(statement_id);

PRAGMA user_version = 1;
";
