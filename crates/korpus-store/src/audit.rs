//! # Audit Log
//!
//! Best-effort append of generation events. An audit failure is logged
//! and swallowed; it never affects the result returned to the caller.

use rusqlite::{params, Connection};
use serde_json::Value;
use tracing::warn;

use korpus_core::{sha256_hex, CanonicalBytes, Timestamp};

/// A generation audit event.
#[derive(Debug, Clone)]
pub struct AuditEvent<'a> {
    pub event: &'a str,
    pub model: &'a str,
    pub pack_version: &'a str,
    pub retrieval_run_id: Option<&'a str>,
    pub params: &'a Value,
    pub output: &'a Value,
}

/// Append an audit row. Returns the row id on success, `None` on any
/// failure (which is logged, never raised).
pub fn try_append(conn: &Connection, event: &AuditEvent<'_>) -> Option<i64> {
    match append(conn, event) {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(error = %e, event = event.event, "audit write failed");
            None
        }
    }
}

fn append(conn: &Connection, event: &AuditEvent<'_>) -> Result<i64, Box<dyn std::error::Error>> {
    let params_canonical = CanonicalBytes::new(event.params)?;
    let output_canonical = CanonicalBytes::new(event.output)?;
    let output_sha256 = sha256_hex(&output_canonical);
    let created_at = Timestamp::now().to_canonical_string();

    conn.execute(
        "INSERT INTO audit_log(
           created_at_utc, event, model, pack_version, retrieval_run_id,
           params_json, output_json, output_sha256
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
        params![
            created_at,
            event.event,
            event.model,
            event.pack_version,
            event.retrieval_run_id,
            String::from_utf8_lossy(params_canonical.as_bytes()).into_owned(),
            String::from_utf8_lossy(output_canonical.as_bytes()).into_owned(),
            output_sha256,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use serde_json::json;

    #[test]
    fn append_writes_canonical_json_and_digest() {
        let conn = connect_in_memory().unwrap();
        let params_value = json!({"temperature": 0.1, "seed": 42});
        let output_value = json!({"insufficient_authority": true, "argument_paths": []});
        let id = try_append(
            &conn,
            &AuditEvent {
                event: "llm_generate_defense",
                model: "/models/assistant.gguf",
                pack_version: "1.1.0",
                retrieval_run_id: Some("run-1"),
                params: &params_value,
                output: &output_value,
            },
        )
        .expect("append should succeed");

        let (output_json, output_sha256): (String, String) = conn
            .query_row(
                "SELECT output_json, output_sha256 FROM audit_log WHERE id = ?1;",
                params![id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(
            output_json,
            r#"{"argument_paths":[],"insufficient_authority":true}"#
        );
        let expected = sha256_hex(&CanonicalBytes::new(&output_value).unwrap());
        assert_eq!(output_sha256, expected);
    }

    #[test]
    fn failure_returns_none_instead_of_raising() {
        let conn = connect_in_memory().unwrap();
        conn.execute_batch("DROP TABLE audit_log;").unwrap();
        let params_value = json!({});
        let output_value = json!({});
        let result = try_append(
            &conn,
            &AuditEvent {
                event: "llm_generate_defense",
                model: "m",
                pack_version: "v",
                retrieval_run_id: None,
                params: &params_value,
                output: &output_value,
            },
        );
        assert!(result.is_none());
    }
}
