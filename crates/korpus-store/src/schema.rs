//! # Schema and Migrations
//!
//! Versioned migrations keyed on `PRAGMA user_version`. Each migration is
//! one SQL batch applied in a transaction; the base schema is migration 1.

use rusqlite::Connection;

use crate::error::StoreResult;

/// Ordered migrations: `(target user_version, batch)`.
const MIGRATIONS: &[(i64, &str)] = &[(1, SCHEMA_V1)];

const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
  id               INTEGER PRIMARY KEY,
  case_id          TEXT NOT NULL,
  original_name    TEXT NOT NULL,
  mime             TEXT NOT NULL,
  size_bytes       INTEGER NOT NULL,
  sha256_hex       TEXT NOT NULL,
  storage_relpath  TEXT NOT NULL,
  status           TEXT NOT NULL DEFAULT 'queued',
  created_at_utc   TEXT NOT NULL,
  updated_at_utc   TEXT NOT NULL,
  error            TEXT,
  UNIQUE(case_id, sha256_hex)
);

CREATE TABLE IF NOT EXISTS chunks (
  id            TEXT PRIMARY KEY,
  document_id   INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
  ordinal       INTEGER NOT NULL,
  start_offset  INTEGER NOT NULL,
  end_offset    INTEGER NOT NULL,
  word_count    INTEGER NOT NULL,
  text          TEXT NOT NULL,
  UNIQUE(document_id, ordinal)
);

CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);

CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
  text,
  content='chunks',
  content_rowid='rowid'
);

CREATE TABLE IF NOT EXISTS retrieval_runs (
  id             TEXT PRIMARY KEY,
  created_at_utc TEXT NOT NULL,
  query          TEXT NOT NULL,
  top_n          INTEGER NOT NULL,
  filters_json   TEXT,
  use_fts        INTEGER NOT NULL,
  use_vector     INTEGER NOT NULL,
  algo_version   TEXT NOT NULL,
  meta_json      TEXT
);

CREATE TABLE IF NOT EXISTS retrieval_run_hits (
  id               INTEGER PRIMARY KEY,
  run_id           TEXT NOT NULL REFERENCES retrieval_runs(id) ON DELETE CASCADE,
  rank             INTEGER NOT NULL,
  chunk_id         TEXT NOT NULL,
  practice_doc_id  TEXT NOT NULL,
  score            REAL NOT NULL,
  fts_bm25         REAL,
  vector_distance  REAL,
  UNIQUE(run_id, rank)
);

CREATE TABLE IF NOT EXISTS retrieval_run_citations (
  id            INTEGER PRIMARY KEY,
  hit_id        INTEGER NOT NULL REFERENCES retrieval_run_hits(id) ON DELETE CASCADE,
  idx           INTEGER NOT NULL,
  quote         TEXT NOT NULL,
  start_offset  INTEGER NOT NULL,
  end_offset    INTEGER NOT NULL,
  source_url    TEXT,
  UNIQUE(hit_id, idx)
);

CREATE TABLE IF NOT EXISTS audit_log (
  id                INTEGER PRIMARY KEY,
  created_at_utc    TEXT NOT NULL,
  event             TEXT NOT NULL,
  model             TEXT NOT NULL,
  pack_version      TEXT NOT NULL,
  retrieval_run_id  TEXT,
  params_json       TEXT NOT NULL,
  output_json       TEXT NOT NULL,
  output_sha256     TEXT NOT NULL
);
"#;

/// Current schema user_version.
pub fn current_version(conn: &Connection) -> StoreResult<i64> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?)
}

/// Apply all pending migrations. Returns the resulting user_version.
pub fn migrate(conn: &Connection) -> StoreResult<i64> {
    let mut version = current_version(conn)?;
    for (target, batch) in MIGRATIONS {
        if *target <= version {
            continue;
        }
        conn.execute_batch(&format!(
            "BEGIN;\n{batch}\nPRAGMA user_version = {target};\nCOMMIT;"
        ))?;
        version = *target;
    }
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    #[test]
    fn migrate_reaches_latest_and_is_idempotent() {
        let conn = connect_in_memory().unwrap();
        assert_eq!(current_version(&conn).unwrap(), 1);
        assert_eq!(migrate(&conn).unwrap(), 1);
    }

    #[test]
    fn all_tables_exist() {
        let conn = connect_in_memory().unwrap();
        for table in [
            "documents",
            "chunks",
            "chunks_fts",
            "retrieval_runs",
            "retrieval_run_hits",
            "retrieval_run_citations",
            "audit_log",
        ] {
            let found: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE name = ?1;",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert!(found >= 1, "table {table} missing");
        }
    }
}
