//! # Chunk Store
//!
//! Chunks of a document are deleted and re-inserted as one transactional
//! unit when the document is (re)processed, and the FTS5 mirror rows move
//! in the same transaction. `text` is the normalized document text sliced
//! by `[start_offset, end_offset)`; chunks are non-overlapping and
//! ordered by `ordinal` from 0.

use rusqlite::{params, Connection};

use crate::error::StoreResult;

/// One chunk row, as produced by the upstream chunker.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub id: String,
    pub document_id: i64,
    pub ordinal: i64,
    pub start_offset: i64,
    pub end_offset: i64,
    pub word_count: i64,
    pub text: String,
}

/// Replace all chunks of `document_id` with `chunks`, atomically.
///
/// Existing rows (and their FTS mirror entries) are removed first; the
/// new rows and their mirror entries are inserted in order. Either the
/// whole replacement lands or none of it does.
pub fn replace_document_chunks(
    conn: &mut Connection,
    document_id: i64,
    chunks: &[ChunkRecord],
) -> StoreResult<()> {
    let tx = conn.transaction()?;

    // FTS5 external-content delete protocol: the old row content must be
    // replayed to the index before the backing rows go away.
    tx.execute(
        "INSERT INTO chunks_fts(chunks_fts, rowid, text)
         SELECT 'delete', rowid, text FROM chunks WHERE document_id = ?1;",
        params![document_id],
    )?;
    tx.execute("DELETE FROM chunks WHERE document_id = ?1;", params![document_id])?;

    {
        let mut insert_chunk = tx.prepare(
            "INSERT INTO chunks(id, document_id, ordinal, start_offset, end_offset, word_count, text)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        )?;
        let mut insert_fts =
            tx.prepare("INSERT INTO chunks_fts(rowid, text) VALUES (?1, ?2);")?;
        for chunk in chunks {
            insert_chunk.execute(params![
                chunk.id,
                document_id,
                chunk.ordinal,
                chunk.start_offset,
                chunk.end_offset,
                chunk.word_count,
                chunk.text,
            ])?;
            let rowid = tx.last_insert_rowid();
            insert_fts.execute(params![rowid, chunk.text])?;
        }
    }

    tx.commit()?;
    Ok(())
}

/// Load one chunk's text.
pub fn chunk_text(conn: &Connection, chunk_id: &str) -> StoreResult<Option<String>> {
    use rusqlite::OptionalExtension;
    Ok(conn
        .query_row(
            "SELECT text FROM chunks WHERE id = ?1;",
            params![chunk_id],
            |row| row.get(0),
        )
        .optional()?)
}

/// Load text and owning practice doc id for a set of chunks, for
/// citation extraction. Missing ids are absent from the result.
pub fn chunk_texts(
    conn: &Connection,
    chunk_ids: &[String],
) -> StoreResult<std::collections::HashMap<String, (String, String)>> {
    let mut out = std::collections::HashMap::new();
    if chunk_ids.is_empty() {
        return Ok(out);
    }
    let placeholders = vec!["?"; chunk_ids.len()].join(",");
    let sql = format!(
        "SELECT c.id, c.text, CAST(d.id AS TEXT)
         FROM chunks c JOIN documents d ON c.document_id = d.id
         WHERE c.id IN ({placeholders});"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(chunk_ids.iter()), |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;
    for row in rows {
        let (id, text, practice_doc_id) = row?;
        out.insert(id, (text, practice_doc_id));
    }
    Ok(out)
}

/// All chunks in sorted `chunk_id` order, for vector index builds.
pub fn all_chunks_sorted(conn: &Connection) -> StoreResult<Vec<(String, String)>> {
    let mut stmt = conn.prepare("SELECT id, text FROM chunks ORDER BY id ASC;")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::documents::insert_document;

    fn demo_doc(conn: &Connection) -> i64 {
        insert_document(
            conn,
            "case-1",
            "nutartis.txt",
            "text/plain",
            100,
            &"c".repeat(64),
            "cases/c",
        )
        .unwrap()
        .id
    }

    fn chunk(id: &str, document_id: i64, ordinal: i64, text: &str) -> ChunkRecord {
        ChunkRecord {
            id: id.into(),
            document_id,
            ordinal,
            start_offset: 0,
            end_offset: text.len() as i64,
            word_count: text.split_whitespace().count() as i64,
            text: text.into(),
        }
    }

    #[test]
    fn replace_inserts_rows_and_fts_mirror() {
        let mut conn = connect_in_memory().unwrap();
        let doc = demo_doc(&conn);
        replace_document_chunks(
            &mut conn,
            doc,
            &[
                chunk("c1", doc, 0, "PVM deklaracija FR0600 pateikimas"),
                chunk("c2", doc, 1, "darbo užmokestis"),
            ],
        )
        .unwrap();

        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM chunks;", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 2);

        let matched: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM chunks_fts WHERE chunks_fts MATCH 'deklaracija';",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(matched, 1);
    }

    #[test]
    fn reprocessing_replaces_old_rows_and_index_entries() {
        let mut conn = connect_in_memory().unwrap();
        let doc = demo_doc(&conn);
        replace_document_chunks(&mut conn, doc, &[chunk("c1", doc, 0, "senas tekstas")]).unwrap();
        replace_document_chunks(&mut conn, doc, &[chunk("c1", doc, 0, "naujas tekstas")]).unwrap();

        let old_hits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM chunks_fts WHERE chunks_fts MATCH 'senas';",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(old_hits, 0, "stale FTS rows must not survive a replace");

        let new_hits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM chunks_fts WHERE chunks_fts MATCH 'naujas';",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(new_hits, 1);
    }

    #[test]
    fn chunk_texts_maps_ids_to_text_and_doc() {
        let mut conn = connect_in_memory().unwrap();
        let doc = demo_doc(&conn);
        replace_document_chunks(&mut conn, doc, &[chunk("c1", doc, 0, "tekstas vienas")]).unwrap();

        let map = chunk_texts(&conn, &["c1".to_string(), "missing".to_string()]).unwrap();
        assert_eq!(map.len(), 1);
        let (text, practice_doc_id) = &map["c1"];
        assert_eq!(text, "tekstas vienas");
        assert_eq!(practice_doc_id, &doc.to_string());
    }

    #[test]
    fn all_chunks_sorted_is_chunk_id_order() {
        let mut conn = connect_in_memory().unwrap();
        let doc = demo_doc(&conn);
        replace_document_chunks(
            &mut conn,
            doc,
            &[
                chunk("b", doc, 0, "antras"),
                chunk("a", doc, 1, "pirmas"),
                chunk("c", doc, 2, "trečias"),
            ],
        )
        .unwrap();
        let ids: Vec<String> = all_chunks_sorted(&conn)
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
