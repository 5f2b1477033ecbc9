//! End-to-end hybrid retrieval over a seeded store with both signals.

use korpus_retrieval::{
    build_vector_index, HashEmbedder, RetrievalService, VectorBackend, VectorBuildParams,
};
use korpus_store::chunks::{replace_document_chunks, ChunkRecord};
use korpus_store::documents::insert_document;
use korpus_store::{connect_in_memory, FtsFilter};

const DIM: usize = 128;

/// Store with three chunks, vector index built over them, service with
/// both signals configured.
fn service() -> RetrievalService {
    let mut conn = connect_in_memory().unwrap();
    let doc = insert_document(
        &conn,
        "case-1",
        "praktika.txt",
        "text/plain",
        100,
        &"d".repeat(64),
        "cases/d",
    )
    .unwrap()
    .id;

    let mk = |id: &str, ordinal: i64, text: &str| ChunkRecord {
        id: id.into(),
        document_id: doc,
        ordinal,
        start_offset: 0,
        end_offset: text.len() as i64,
        word_count: text.split_whitespace().count() as i64,
        text: text.into(),
    };
    replace_document_chunks(
        &mut conn,
        doc,
        &[
            mk("c1", 0, "PVM deklaracija FR0600 pateikimas"),
            mk("c2", 1, "FR0600 PVM deklaracija terminas"),
            mk("c3", 2, "darbo užmokestis"),
        ],
    )
    .unwrap();

    let index_dir = tempfile::tempdir().unwrap();
    let embedder = HashEmbedder::new(DIM);
    let (index, idmap) =
        build_vector_index(&conn, &embedder, index_dir.path(), &VectorBuildParams::default())
            .unwrap();

    RetrievalService::new(conn).with_vector(VectorBackend {
        index,
        idmap,
        embedder: Box::new(embedder),
    })
}

#[test]
fn hybrid_ranks_matching_chunks_above_unrelated() {
    let svc = service();
    let hits = svc.hybrid("PVM deklaracija FR0600", 10, None, true, true).unwrap();
    assert!(hits.len() >= 2);

    let position = |id: &str| hits.iter().position(|h| h.chunk_id == id);
    let p1 = position("c1").expect("c1 retrieved");
    let p2 = position("c2").expect("c2 retrieved");
    if let Some(p3) = position("c3") {
        assert!(p1 < p3 && p2 < p3, "matching chunks must outrank unrelated");
    }

    for hit in hits.iter().filter(|h| h.chunk_id != "c3") {
        let quote = &hit.citations[0].quote;
        assert!(
            quote.contains("FR0600") || quote.contains("PVM deklaracija"),
            "citation must contain a query term, got {quote:?}"
        );
    }
}

#[test]
fn hybrid_scores_descend_with_deterministic_tie_breaks() {
    let svc = service();
    let hits = svc.hybrid("PVM deklaracija FR0600", 10, None, true, true).unwrap();
    for pair in hits.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            a.score > b.score
                || (a.score == b.score
                    && a.fts_bm25.unwrap_or(1e9) <= b.fts_bm25.unwrap_or(1e9))
        );
    }
}

#[test]
fn citations_are_verbatim_slices_of_chunk_text() {
    let svc = service();
    let hits = svc.hybrid("PVM deklaracija FR0600", 10, None, true, true).unwrap();
    for hit in &hits {
        let text = korpus_store::chunks::chunk_text(svc.conn(), &hit.chunk_id)
            .unwrap()
            .unwrap();
        for citation in &hit.citations {
            assert_eq!(
                citation.quote,
                &text[citation.start as usize..citation.end as usize]
            );
        }
        assert!(!hit.citations.is_empty());
    }
}

#[test]
fn empty_query_returns_empty_not_error() {
    let svc = service();
    assert!(svc.hybrid("", 10, None, true, true).unwrap().is_empty());
    assert!(svc.hybrid("   ", 10, None, true, true).unwrap().is_empty());
    assert!(svc.fts("", 10, None).unwrap().is_empty());
}

#[test]
fn fts_only_and_vector_only_paths_work() {
    let svc = service();
    let fts_only = svc.hybrid("deklaracija", 10, None, true, false).unwrap();
    assert!(!fts_only.is_empty());
    assert!(fts_only.iter().all(|h| h.vector_distance.is_none()));

    let vec_only = svc.hybrid("PVM deklaracija FR0600", 10, None, false, true).unwrap();
    assert!(!vec_only.is_empty());
    assert!(vec_only.iter().all(|h| h.fts_bm25.is_none()));
}

#[test]
fn vector_op_rejects_unsupported_filters() {
    let svc = service();
    let filter = FtsFilter {
        doc_type: Some("text/plain".into()),
        ..Default::default()
    };
    assert!(svc.vector("deklaracija", 5, Some(&filter)).is_err());

    let ok_filter = FtsFilter {
        practice_doc_id: Some("1".into()),
        ..Default::default()
    };
    assert!(svc.vector("deklaracija", 5, Some(&ok_filter)).is_ok());
}

#[test]
fn case_frame_search_prefers_summary_matches() {
    let svc = service();
    let frame: korpus_retrieval::CaseFrame = serde_json::from_value(serde_json::json!({
        "case_id": "case-1",
        "facts": {
            "summary": "PVM deklaracija FR0600",
            "keywords": ["deklaracija"]
        }
    }))
    .unwrap();

    let hits = svc.search_case_frame(&frame, 6, 10, 10, None).unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.chunk_id != "c3"));
    // Deterministic: same frame, same result.
    let again = svc.search_case_frame(&frame, 6, 10, 10, None).unwrap();
    assert_eq!(hits, again);
}

#[test]
fn hybrid_run_persists_and_loads_verbatim() {
    let mut svc = service();
    let (run_id, hits) = svc
        .hybrid_run("PVM deklaracija FR0600", 10, None, true, true)
        .unwrap();
    assert!(!hits.is_empty());

    let run = svc.load_run(&run_id).unwrap();
    assert_eq!(run.query, "PVM deklaracija FR0600");
    assert_eq!(run.algo_version, "hybrid_v1");
    assert!(run.use_fts && run.use_vector);

    let loaded = svc.load_run_hits(&run_id).unwrap();
    assert_eq!(loaded, hits, "load must return the exact ranked sequence");
}

#[test]
fn hybrid_run_with_filters_round_trips_filter_json() {
    let mut svc = service();
    let filter = FtsFilter {
        practice_doc_id: Some("1".into()),
        ..Default::default()
    };
    let (run_id, _hits) = svc
        .hybrid_run("deklaracija", 5, Some(&filter), true, false)
        .unwrap();
    let run = svc.load_run(&run_id).unwrap();
    let filters = run.filters.expect("filters persisted");
    assert_eq!(filters["practice_doc_id"], serde_json::json!("1"));
}
