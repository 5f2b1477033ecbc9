//! # Hybrid Merge, Ranking, and Citation Extraction
//!
//! Merges lexical (BM25) and vector (cosine distance) signals into one
//! ranked list, deduplicated by chunk, and extracts a short verbatim
//! quote with offsets for every surviving hit.
//!
//! Score fusion: `fts_score = 1/(1+bm25)`, `vec_score = 1/(1+distance)`,
//! final `S = 0.6·fts_score + 0.4·vec_score`, a missing signal counting
//! as 0. Ordering: `S` DESC, then bm25 ASC, then chunk_id ASC.

use std::collections::HashMap;

use rusqlite::Connection;

use korpus_store::chunks::chunk_texts;
use korpus_store::{fts_search, Citation, FtsFilter, FtsHit, HybridHit};

use crate::error::RetrievalResult;
use crate::planner::collapse_ws;
use crate::service::{vector_retrieve, VectorBackend, VectorHit};

const FTS_WEIGHT: f64 = 0.6;
const VEC_WEIGHT: f64 = 0.4;
/// Citation window (characters) around the earliest term match.
const MATCH_WINDOW_CHARS: usize = 220;
/// Fallback prefix length (characters) when no term matches.
const FALLBACK_CHARS: usize = 200;
const MAX_QUERY_TERMS: usize = 20;
const MAX_CITATIONS: usize = 2;

/// One merged candidate before citation extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedHit {
    pub chunk_id: String,
    pub practice_doc_id: String,
    pub fts_bm25: Option<f64>,
    pub vector_distance: Option<f64>,
    pub score: f64,
}

/// Dedup by chunk, keep best bm25 and best distance, fuse, rank, cut.
pub fn merge_and_rank(
    fts_hits: &[FtsHit],
    vec_hits: &[VectorHit],
    top_n: usize,
) -> Vec<MergedHit> {
    if top_n == 0 {
        return Vec::new();
    }

    let mut merged: HashMap<String, MergedHit> = HashMap::new();

    for hit in fts_hits {
        let entry = merged
            .entry(hit.chunk_id.clone())
            .or_insert_with(|| MergedHit {
                chunk_id: hit.chunk_id.clone(),
                practice_doc_id: hit.practice_doc_id.clone(),
                fts_bm25: None,
                vector_distance: None,
                score: 0.0,
            });
        entry.fts_bm25 = Some(match entry.fts_bm25 {
            Some(best) => best.min(hit.bm25_score),
            None => hit.bm25_score,
        });
    }

    for hit in vec_hits {
        let entry = merged
            .entry(hit.chunk_id.clone())
            .or_insert_with(|| MergedHit {
                chunk_id: hit.chunk_id.clone(),
                practice_doc_id: hit.practice_doc_id.clone(),
                fts_bm25: None,
                vector_distance: None,
                score: 0.0,
            });
        let distance = f64::from(hit.distance);
        entry.vector_distance = Some(match entry.vector_distance {
            Some(best) => best.min(distance),
            None => distance,
        });
    }

    for entry in merged.values_mut() {
        let fts_score = entry.fts_bm25.map_or(0.0, |bm25| 1.0 / (1.0 + bm25));
        let vec_score = entry
            .vector_distance
            .map_or(0.0, |distance| 1.0 / (1.0 + distance));
        entry.score = FTS_WEIGHT * fts_score + VEC_WEIGHT * vec_score;
    }

    let mut out: Vec<MergedHit> = merged.into_values().collect();
    out.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(
                a.fts_bm25
                    .unwrap_or(1e9)
                    .total_cmp(&b.fts_bm25.unwrap_or(1e9)),
            )
            .then(a.chunk_id.cmp(&b.chunk_id))
    });
    out.truncate(top_n);
    out
}

/// Extract search terms from a raw query: quoted substrings first, then
/// the remaining whitespace-separated tokens, case-insensitively
/// deduplicated in stable order, capped at 20.
pub fn extract_query_terms(query: &str) -> Vec<String> {
    let mut phrases = Vec::new();
    let mut rest = String::new();
    let mut chars = query.chars();
    while let Some(c) = chars.next() {
        if c == '"' {
            let mut phrase = String::new();
            let mut closed = false;
            for inner in chars.by_ref() {
                if inner == '"' {
                    closed = true;
                    break;
                }
                phrase.push(inner);
            }
            if closed {
                phrases.push(phrase);
                rest.push(' ');
            } else {
                // Unbalanced quote: treat the tail as plain tokens.
                rest.push(' ');
                rest.push_str(&phrase);
            }
        } else {
            rest.push(c);
        }
    }

    let mut out = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for term in phrases.iter().map(String::as_str).chain(rest.split_whitespace()) {
        let collapsed = collapse_ws(term);
        if collapsed.is_empty() {
            continue;
        }
        let key = collapsed.to_lowercase();
        if seen.insert(key) {
            out.push(collapsed);
        }
        if out.len() >= MAX_QUERY_TERMS {
            break;
        }
    }
    out
}

/// Extract short citations from chunk text with `[start, end)` byte
/// offsets; the quote is always the verbatim slice `text[start..end]`.
///
/// If any term matches (earliest, case-insensitive), the quote is a
/// ~220-character window centered on the match, expanded outward to
/// whitespace so it starts and ends on word boundaries. Otherwise the
/// first ~200 characters, expanded likewise. Empty text yields the
/// single citation `("", 0, 0)`. At least one citation is always
/// produced.
pub fn extract_citations(
    chunk_text: &str,
    query_terms: &[String],
    source_url: Option<&str>,
    max_citations: usize,
) -> Vec<Citation> {
    let source_url = source_url.map(str::to_string);
    if chunk_text.is_empty() {
        return vec![Citation {
            quote: String::new(),
            start: 0,
            end: 0,
            source_url,
        }];
    }

    let chars: Vec<char> = chunk_text.chars().collect();
    let byte_offsets: Vec<usize> = {
        let mut offsets: Vec<usize> = chunk_text.char_indices().map(|(i, _)| i).collect();
        offsets.push(chunk_text.len());
        offsets
    };

    let (start_char, end_char) = match find_first_match(&chars, query_terms) {
        Some((match_start, match_end)) => {
            let center = (match_start + match_end) / 2;
            let window_start = center.saturating_sub(MATCH_WINDOW_CHARS / 2);
            let window_end = (window_start + MATCH_WINDOW_CHARS).min(chars.len());
            snap_to_word_boundary(&chars, window_start, window_end)
        }
        None => snap_to_word_boundary(&chars, 0, FALLBACK_CHARS.min(chars.len())),
    };

    let start = byte_offsets[start_char];
    let end = byte_offsets[end_char];
    let citations = vec![Citation {
        quote: chunk_text[start..end].to_string(),
        start: start as i64,
        end: end as i64,
        source_url,
    }];
    citations.into_iter().take(max_citations.max(1)).collect()
}

/// Earliest case-insensitive occurrence of any term, as a char span.
fn find_first_match(chars: &[char], terms: &[String]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    for term in terms {
        let term_chars: Vec<char> = term.trim().chars().collect();
        if term_chars.is_empty() {
            continue;
        }
        if let Some(span) = find_ci(chars, &term_chars) {
            if best.map_or(true, |b| span.0 < b.0) {
                best = Some(span);
            }
        }
    }
    best
}

fn find_ci(haystack: &[char], needle: &[char]) -> Option<(usize, usize)> {
    if needle.len() > haystack.len() {
        return None;
    }
    for start in 0..=(haystack.len() - needle.len()) {
        if needle
            .iter()
            .enumerate()
            .all(|(j, &n)| chars_eq_ci(haystack[start + j], n))
        {
            return Some((start, start + needle.len()));
        }
    }
    None
}

fn chars_eq_ci(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Expand both ends outward to whitespace (char positions).
fn snap_to_word_boundary(chars: &[char], start: usize, end: usize) -> (usize, usize) {
    let mut s = start.min(chars.len());
    let mut e = end.min(chars.len());
    while s > 0 && !chars[s - 1].is_whitespace() {
        s -= 1;
    }
    while e < chars.len() && !chars[e].is_whitespace() {
        e += 1;
    }
    (s, e)
}

/// Hybrid retrieval with citations: per-signal overfetch, fusion,
/// dedup, ranking, and per-hit citation extraction.
///
/// The vector signal is optional; without a backend it contributes
/// nothing and the lexical ranking stands alone.
pub fn hybrid_retrieve(
    conn: &Connection,
    backend: Option<&VectorBackend>,
    query: &str,
    top_n: usize,
    filter: Option<&FtsFilter>,
    use_fts: bool,
    use_vector: bool,
) -> RetrievalResult<Vec<HybridHit>> {
    let query = query.trim();
    if query.is_empty() || top_n == 0 {
        return Ok(Vec::new());
    }

    let overfetch = (top_n * 3).max(top_n) as i64;
    let fts_hits = if use_fts {
        fts_search(conn, query, overfetch, filter)?
    } else {
        Vec::new()
    };

    let vec_hits = match (use_vector, backend) {
        (true, Some(backend)) => {
            let practice_doc_id = filter.and_then(|f| f.practice_doc_id.as_deref());
            vector_retrieve(conn, backend, query, overfetch as usize, practice_doc_id)?
        }
        _ => Vec::new(),
    };

    let merged = merge_and_rank(&fts_hits, &vec_hits, top_n);
    let chunk_ids: Vec<String> = merged.iter().map(|m| m.chunk_id.clone()).collect();
    let texts = chunk_texts(conn, &chunk_ids)?;
    let terms = extract_query_terms(query);

    let mut out = Vec::with_capacity(merged.len());
    for m in merged {
        let text = texts.get(&m.chunk_id).map(|(text, _)| text.as_str()).unwrap_or("");
        let citations = extract_citations(text, &terms, None, MAX_CITATIONS);
        out.push(HybridHit {
            chunk_id: m.chunk_id,
            practice_doc_id: m.practice_doc_id,
            score: m.score,
            fts_bm25: m.fts_bm25,
            vector_distance: m.vector_distance,
            citations,
        });
    }
    Ok(out)
}
