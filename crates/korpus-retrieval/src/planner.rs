//! # Query Planner
//!
//! Derives a weighted, ordered list of query atoms from a structured
//! case frame. The planner is pure: the same frame always yields the
//! same atoms in the same order.
//!
//! Atom kinds and how downstream stages use them:
//!
//! - **phrase** atoms (quoted) give BM25 precision,
//! - **norm** atoms (law references) are high-signal lexical anchors,
//! - **keywords** atoms are a broad recall net,
//!
//! and `weight` feeds the score fusion in the plan executor.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Maximum characters of a phrase atom's inner text.
const PHRASE_MAX_CHARS: usize = 160;

/// The facts block of a case frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseFacts {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// A norm (law) reference: either a bare string or a structured entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NormRef {
    Text(String),
    Entry(NormEntry),
}

/// Structured norm entry; `name`/`ref` are accepted as aliases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormEntry {
    #[serde(default, alias = "name")]
    pub title: Option<String>,
    #[serde(default, alias = "ref")]
    pub article: Option<String>,
}

/// A structured case frame, as produced by the case intake flow.
///
/// All fields are optional; missing sources are skipped. `legal_basis`
/// is accepted as an alias for `norms`, and top-level `keywords` as a
/// fallback for `facts.keywords`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseFrame {
    #[serde(default)]
    pub case_id: Option<String>,
    #[serde(default)]
    pub facts: CaseFacts,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub claims: Vec<String>,
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default, alias = "legal_basis")]
    pub norms: Vec<NormRef>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Kind of a query atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtomKind {
    Phrase,
    Keywords,
    Norm,
}

/// One query element sent to the retrieval backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAtom {
    pub text: String,
    pub kind: AtomKind,
    pub weight: f64,
}

/// An ordered, capped list of atoms for one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub case_id: Option<String>,
    pub atoms: Vec<QueryAtom>,
    pub k: usize,
}

/// Build a deterministic query plan from a case frame.
///
/// Priority order (later sources are dropped once `k` atoms exist):
/// 1. `facts.summary` → one quoted phrase atom, weight 1.4
/// 2. each norm → one norm atom, weight 1.3
/// 3. issues/claims/questions → up to two phrase atoms, weight 1.2
/// 4. `facts.keywords` → one keywords atom, weight 1.0
///
/// Duplicates collapse on a case-folded, whitespace-collapsed key.
pub fn build_query_plan(frame: &CaseFrame, k: usize) -> QueryPlan {
    let case_id = frame.case_id.clone();
    if k == 0 {
        return QueryPlan {
            case_id,
            atoms: Vec::new(),
            k,
        };
    }

    let mut atoms: Vec<QueryAtom> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut add_atom = |atoms: &mut Vec<QueryAtom>, text: String, kind: AtomKind, weight: f64| {
        let text = collapse_ws(&text);
        if text.is_empty() {
            return false;
        }
        let key = dedup_key(&text);
        if !seen.insert(key) {
            return false;
        }
        atoms.push(QueryAtom { text, kind, weight });
        true
    };

    // 1) Summary → phrase, weight 1.4.
    if let Some(summary) = &frame.facts.summary {
        let s = truncate_phrase(&collapse_ws(summary), PHRASE_MAX_CHARS);
        if !s.is_empty() {
            add_atom(&mut atoms, quote_phrase(&s), AtomKind::Phrase, 1.4);
        }
    }

    // 2) Norms → norm atoms, weight 1.3.
    for norm in &frame.norms {
        let text = match norm {
            NormRef::Text(s) => standardize_norm(s),
            NormRef::Entry(entry) => {
                let title = entry.title.as_deref().unwrap_or("");
                let article = entry.article.as_deref().unwrap_or("");
                match (title.is_empty(), article.is_empty()) {
                    (false, false) => standardize_norm(&format!("{title} {article}")),
                    (false, true) => standardize_norm(title),
                    (true, false) => standardize_norm(article),
                    (true, true) => continue,
                }
            }
        };
        if !text.is_empty() {
            add_atom(&mut atoms, text, AtomKind::Norm, 1.3);
        }
    }

    // 3) Claims / issues / questions → up to two phrase atoms, weight 1.2.
    let mut taken = 0;
    for source in [&frame.claims, &frame.issues, &frame.questions] {
        for s in source {
            if taken >= 2 {
                break;
            }
            let t = truncate_phrase(&collapse_ws(s), PHRASE_MAX_CHARS);
            if t.is_empty() {
                continue;
            }
            if add_atom(&mut atoms, quote_phrase(&t), AtomKind::Phrase, 1.2) {
                taken += 1;
            }
        }
    }

    // 4) Keywords → one keywords atom, weight 1.0.
    let keywords = if frame.facts.keywords.is_empty() {
        &frame.keywords
    } else {
        &frame.facts.keywords
    };
    let joined = keywords
        .iter()
        .map(|s| collapse_ws(s))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if !joined.is_empty() {
        add_atom(&mut atoms, joined, AtomKind::Keywords, 1.0);
    }

    atoms.truncate(k);
    QueryPlan { case_id, atoms, k }
}

/// Collapse runs of whitespace to single spaces and trim.
pub fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Dedup key: outer quotes stripped, whitespace collapsed, case folded.
fn dedup_key(text: &str) -> String {
    let t = text.trim();
    let inner = if t.len() >= 2 && t.starts_with('"') && t.ends_with('"') {
        &t[1..t.len() - 1]
    } else {
        t
    };
    collapse_ws(inner).to_lowercase()
}

/// Quote a phrase for FTS, avoiding embedded double quotes.
fn quote_phrase(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "'"))
}

/// Truncate to at most `max_chars` characters, preferring a word
/// boundary.
fn truncate_phrase(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_chars).collect();
    if let Some(last_space) = cut.rfind(' ') {
        let at_boundary = cut[..last_space].trim_end();
        if !at_boundary.is_empty() {
            return at_boundary.to_string();
        }
    }
    cut.trim_end().to_string()
}

/// Standardize a norm reference: collapse whitespace, remove whitespace
/// around dots (`"6. 248"` → `"6.248"`), and keep `str.` readable by
/// spacing it off a preceding digit (`"1str."` → `"1 str."`).
fn standardize_norm(s: &str) -> String {
    let mut out = collapse_ws(s);
    while out.contains(" .") {
        out = out.replace(" .", ".");
    }
    while out.contains(". ") {
        out = out.replace(". ", ".");
    }
    out = space_digit_str(&out);
    collapse_ws(&out)
}

/// Insert a space between an ASCII digit and an immediately following
/// `str.` (case-insensitive).
fn space_digit_str(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len() + 4);
    let mut i = 0;
    while i < s.len() {
        if i + 4 <= s.len()
            && bytes[i..i + 4].eq_ignore_ascii_case(b"str.")
            && i > 0
            && bytes[i - 1].is_ascii_digit()
        {
            out.push(' ');
            out.push_str(&s[i..i + 4]);
            i += 4;
            continue;
        }
        let ch = match s[i..].chars().next() {
            Some(c) => c,
            None => break,
        };
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}
