//! # Document Rows
//!
//! Relational contract for ingested source documents ("practice docs").
//! The upload pipeline (MIME detection, storage, extraction) lives
//! outside this crate; what it hands over is the metadata row inserted
//! here, deduplicated per case by content hash.

use rusqlite::{params, Connection, OptionalExtension, Row};

use korpus_core::Timestamp;

use crate::error::{StoreError, StoreResult};

/// Processing status of an ingested document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    Queued,
    Processing,
    Processed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "processing" => Self::Processing,
            "processed" => Self::Processed,
            "failed" => Self::Failed,
            _ => Self::Queued,
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ingested document row.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: i64,
    pub case_id: String,
    pub original_name: String,
    pub mime: String,
    pub size_bytes: i64,
    pub sha256_hex: String,
    pub storage_relpath: String,
    pub status: DocumentStatus,
    pub created_at_utc: String,
    pub updated_at_utc: String,
    pub error: Option<String>,
    /// True when the insert hit the `(case_id, sha256_hex)` constraint
    /// and the pre-existing row was returned instead.
    pub deduped: bool,
}

fn record_from_row(row: &Row<'_>, deduped: bool) -> rusqlite::Result<DocumentRecord> {
    Ok(DocumentRecord {
        id: row.get(0)?,
        case_id: row.get(1)?,
        original_name: row.get(2)?,
        mime: row.get(3)?,
        size_bytes: row.get(4)?,
        sha256_hex: row.get(5)?,
        storage_relpath: row.get(6)?,
        status: DocumentStatus::parse(&row.get::<_, String>(7)?),
        created_at_utc: row.get(8)?,
        updated_at_utc: row.get(9)?,
        error: row.get(10)?,
        deduped,
    })
}

const SELECT_COLUMNS: &str = "id, case_id, original_name, mime, size_bytes, sha256_hex, \
     storage_relpath, status, created_at_utc, updated_at_utc, error";

/// Insert a document row, deduplicating on `(case_id, sha256_hex)`.
///
/// On a duplicate, the existing row is returned with `deduped = true`
/// and nothing is written.
pub fn insert_document(
    conn: &Connection,
    case_id: &str,
    original_name: &str,
    mime: &str,
    size_bytes: i64,
    sha256_hex: &str,
    storage_relpath: &str,
) -> StoreResult<DocumentRecord> {
    let now = Timestamp::now().to_canonical_string();
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO documents(
           case_id, original_name, mime, size_bytes, sha256_hex, storage_relpath,
           status, created_at_utc, updated_at_utc
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'queued', ?7, ?7);",
        params![case_id, original_name, mime, size_bytes, sha256_hex, storage_relpath, now],
    )?;

    let row = conn
        .query_row(
            &format!(
                "SELECT {SELECT_COLUMNS} FROM documents WHERE case_id = ?1 AND sha256_hex = ?2;"
            ),
            params![case_id, sha256_hex],
            |row| record_from_row(row, inserted == 0),
        )
        .optional()?;
    row.ok_or_else(|| StoreError::NotFound(format!("document {case_id}/{sha256_hex}")))
}

/// Fetch one document by id.
pub fn get_document(conn: &Connection, document_id: i64) -> StoreResult<DocumentRecord> {
    conn.query_row(
        &format!("SELECT {SELECT_COLUMNS} FROM documents WHERE id = ?1;"),
        params![document_id],
        |row| record_from_row(row, false),
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(format!("document {document_id}")))
}

/// List a case's documents, newest first.
pub fn list_case_documents(conn: &Connection, case_id: &str) -> StoreResult<Vec<DocumentRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM documents WHERE case_id = ?1 ORDER BY id DESC;"
    ))?;
    let rows = stmt
        .query_map(params![case_id], |row| record_from_row(row, false))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Update a document's processing status, refreshing `updated_at_utc`.
pub fn set_document_status(
    conn: &Connection,
    document_id: i64,
    status: DocumentStatus,
    error: Option<&str>,
) -> StoreResult<()> {
    let now = Timestamp::now().to_canonical_string();
    let changed = conn.execute(
        "UPDATE documents SET status = ?1, error = ?2, updated_at_utc = ?3 WHERE id = ?4;",
        params![status.as_str(), error, now, document_id],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound(format!("document {document_id}")));
    }
    Ok(())
}
