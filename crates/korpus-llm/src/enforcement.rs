//! # "No Citation → No Claim" Enforcement
//!
//! Path-level enforcement: a path with too few supporting citations
//! loses all its claims and is dropped, with a missing-info notice per
//! drop. If too little grounded content remains, the result is marked
//! `insufficient_authority`. Deterministic and non-mutating on its
//! input.

use crate::schema::DefenseDirections;

const DEFAULT_INSUFFICIENT_MSG: &str = "Insufficient grounded content: removed claims without \
     citations; provide more sources or refine query.";

/// Minimum grounded content required for a result to stand on its own.
#[derive(Debug, Clone, Copy)]
pub struct EnforcementLimits {
    pub min_paths: usize,
    pub min_total_claims: usize,
    pub min_citations_per_path: usize,
}

impl Default for EnforcementLimits {
    fn default() -> Self {
        Self {
            min_paths: 1,
            min_total_claims: 1,
            min_citations_per_path: 1,
        }
    }
}

/// Apply the enforcement pass, returning a new value.
pub fn enforce_no_citation_no_claim(
    response: &DefenseDirections,
    limits: EnforcementLimits,
) -> DefenseDirections {
    let mut out = response.clone();
    let mut missing_info = out.missing_info.clone();
    let mut kept_paths = Vec::with_capacity(out.argument_paths.len());

    for mut path in out.argument_paths.drain(..) {
        if path.supporting_citations.len() < limits.min_citations_per_path {
            missing_info.push(format!(
                "Removed claims in path '{}' because no supporting citations were provided.",
                path.title
            ));
            path.claims.clear();
        }
        if !path.claims.is_empty() {
            kept_paths.push(path);
        }
    }

    out.argument_paths = kept_paths;
    out.missing_info = missing_info;

    let paths_left = out.argument_paths.len();
    let claims_left: usize = out.argument_paths.iter().map(|p| p.claims.len()).sum();
    if paths_left < limits.min_paths || claims_left < limits.min_total_claims {
        out.insufficient_authority = true;
        if !out.missing_info.iter().any(|m| m == DEFAULT_INSUFFICIENT_MSG) {
            out.missing_info.push(DEFAULT_INSUFFICIENT_MSG.to_string());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ArgumentPath, CitationRef};

    fn path(title: &str, claims: &[&str], citations: usize) -> ArgumentPath {
        ArgumentPath {
            title: title.into(),
            claims: claims.iter().map(|s| s.to_string()).collect(),
            supporting_citations: (0..citations)
                .map(|i| CitationRef::from_quote(format!("citata {i}")))
                .collect(),
        }
    }

    fn response(paths: Vec<ArgumentPath>) -> DefenseDirections {
        DefenseDirections {
            argument_paths: paths,
            counterarguments: vec![],
            risks: vec![],
            missing_info: vec![],
            insufficient_authority: false,
        }
    }

    #[test]
    fn grounded_paths_pass_through() {
        let input = response(vec![path("Pagrįsta linija", &["teiginys"], 1)]);
        let out = enforce_no_citation_no_claim(&input, EnforcementLimits::default());
        assert_eq!(out.argument_paths.len(), 1);
        assert!(!out.insufficient_authority);
        assert!(out.missing_info.is_empty());
    }

    #[test]
    fn ungrounded_path_is_dropped_with_notice() {
        let input = response(vec![
            path("Pagrįsta", &["teiginys"], 1),
            path("Nepagrįsta", &["kitas teiginys"], 0),
        ]);
        let out = enforce_no_citation_no_claim(&input, EnforcementLimits::default());
        assert_eq!(out.argument_paths.len(), 1);
        assert_eq!(out.argument_paths[0].title, "Pagrįsta");
        assert!(out.missing_info.iter().any(|m| m.contains("Nepagrįsta")));
        assert!(!out.insufficient_authority);
    }

    #[test]
    fn every_retained_path_has_enough_citations() {
        let input = response(vec![
            path("A linija", &["x"], 0),
            path("B linija", &["y"], 2),
            path("C linija", &["z"], 1),
        ]);
        let out = enforce_no_citation_no_claim(&input, EnforcementLimits::default());
        assert!(out
            .argument_paths
            .iter()
            .all(|p| p.supporting_citations.len() >= 1));
    }

    #[test]
    fn nothing_left_sets_insufficient_authority() {
        let input = response(vec![path("Vienintelė", &["teiginys"], 0)]);
        let out = enforce_no_citation_no_claim(&input, EnforcementLimits::default());
        assert!(out.argument_paths.is_empty());
        assert!(out.insufficient_authority);
        assert!(out
            .missing_info
            .iter()
            .any(|m| m.contains("Insufficient grounded content")));
    }

    #[test]
    fn insufficient_notice_is_not_duplicated() {
        let mut input = response(vec![]);
        input.missing_info.push(DEFAULT_INSUFFICIENT_MSG.to_string());
        let out = enforce_no_citation_no_claim(&input, EnforcementLimits::default());
        let count = out
            .missing_info
            .iter()
            .filter(|m| *m == DEFAULT_INSUFFICIENT_MSG)
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn enforcement_does_not_mutate_input() {
        let input = response(vec![path("Linija", &["teiginys"], 0)]);
        let before = input.clone();
        let _ = enforce_no_citation_no_claim(&input, EnforcementLimits::default());
        assert_eq!(input, before);
    }

    #[test]
    fn higher_citation_threshold_prunes_weakly_grounded_paths() {
        let input = response(vec![path("Linija", &["teiginys"], 1)]);
        let limits = EnforcementLimits {
            min_citations_per_path: 2,
            ..Default::default()
        };
        let out = enforce_no_citation_no_claim(&input, limits);
        assert!(out.argument_paths.is_empty());
        assert!(out.insufficient_authority);
    }
}
