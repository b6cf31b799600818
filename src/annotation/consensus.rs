// flatsift: Filters for EMBL and GenBank flat files, and alignment hit annotation.
//
// Copyright 2025 Maxime Déraspe [maximilien1er@gmail.com].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//
use crate::annotation::Feature;
use crate::annotation::GENE_NAME;
use crate::annotation::PROTEIN_NAME;

use indexmap::IndexMap;

/// Remove a ` {...}` evidence annotation from a protein name
///
/// UniProt names carry evidence codes such as
/// `Elongation factor Tu {ECO:0000256|HAMAP-Rule:MF_00118}`. Everything from
/// the first ` {` to the last `}` is removed.
///
pub fn strip_annotation(
    name: &str,
) -> String {
    let mut from = 0;
    while let Some(offset) = name[from..].find(" {") {
        let open = from + offset;
        if let Some(close) = name.rfind('}') {
            if close >= open + 3 {
                return format!("{}{}", &name[..open], &name[(close + 1)..])
            }
        }
        from = open + 1;
    }
    name.to_string()
}

/// Most frequent name, the first one seen wins ties.
pub fn most_frequent(
    names: &[String],
) -> Option<&str> {
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    names.iter().for_each(|name| *counts.entry(name.as_str()).or_insert(0) += 1);

    let mut best: Option<(&str, usize)> = None;
    for (name, count) in counts {
        match best {
            Some((_, best_count)) if count <= best_count => (),
            _ => best = Some((name, count)),
        }
    }
    best.map(|(name, _)| name)
}

/// Reduce a group of hits on the same coordinates to one feature
///
/// If any protein name occurs more than once in the group, the most
/// frequent protein and gene names are used. Otherwise the names of the
/// first hit are kept as they are. The returned feature is the first hit
/// with the chosen names and the best identity of the group as
/// [pid](Feature::pid).
///
/// Returns None for an empty group.
///
pub fn build_consensus(
    group: Vec<Feature>,
) -> Option<Feature> {
    let protein_names: Vec<String> = group.iter()
        .map(|hit| strip_annotation(hit.get(PROTEIN_NAME).unwrap_or("")))
        .collect();
    let gene_names: Vec<String> = group.iter()
        .filter_map(|hit| hit.get(GENE_NAME).map(|name| name.to_string()))
        .collect();
    let best_pid = group.iter().fold(0.0_f64, |best, hit| best.max(hit.percent_identity));

    let mut iter = group.into_iter();
    let mut first = iter.next()?;

    let n_distinct = protein_names.iter().collect::<std::collections::HashSet<_>>().len();
    let (protein_name, gene_name) = if n_distinct < protein_names.len() {
        let protein_name = most_frequent(&protein_names).unwrap_or_default().to_string();
        let gene_name = most_frequent(&gene_names).or(first.get(GENE_NAME)).unwrap_or_default().to_string();
        (protein_name, gene_name)
    } else {
        (first.get(PROTEIN_NAME).unwrap_or_default().to_string(), first.get(GENE_NAME).unwrap_or_default().to_string())
    };

    first.fields.insert(PROTEIN_NAME.to_string(), protein_name);
    first.fields.insert(GENE_NAME.to_string(), gene_name);
    first.pid = best_pid;

    Some(first)
}

// Tests
#[cfg(test)]
mod tests {

    fn named(
        protein_name: &str,
        gene_name: &str,
        identity: f64,
    ) -> crate::annotation::Feature {
        let mut hit = crate::annotation::tests::feature(100, 200, 50.0);
        hit.fields.insert("ProteinName".to_string(), protein_name.to_string());
        hit.fields.insert("GeneName".to_string(), gene_name.to_string());
        hit.percent_identity = identity;
        hit.pid = identity;
        hit
    }

    #[test]
    fn strip_annotation_evidence() {
        use super::strip_annotation;

        assert_eq!(strip_annotation("Elongation factor Tu {ECO:0000256|HAMAP-Rule:MF_00118}"), "Elongation factor Tu");
        assert_eq!(strip_annotation("Protein A {ECO:1} extra {ECO:2}"), "Protein A");
        assert_eq!(strip_annotation("Protein {}"), "Protein {}");
        assert_eq!(strip_annotation("Protein{ECO:1}"), "Protein{ECO:1}");
        assert_eq!(strip_annotation("Protein A"), "Protein A");
    }

    #[test]
    fn most_frequent_first_wins_ties() {
        use super::most_frequent;

        let names: Vec<String> = vec!["B".to_string(), "A".to_string(), "A".to_string(), "B".to_string()];
        assert_eq!(most_frequent(&names), Some("B"));

        let names: Vec<String> = vec!["A".to_string(), "B".to_string(), "A".to_string()];
        assert_eq!(most_frequent(&names), Some("A"));

        assert_eq!(most_frequent(&[]), None);
    }

    #[test]
    fn consensus_identical_names() {
        use super::build_consensus;

        let group = vec![named("ABC", "abc", 91.0), named("ABC", "abc", 93.0)];
        let got = build_consensus(group).unwrap();

        assert_eq!(got.get("ProteinName"), Some("ABC"));
        assert_eq!(got.get("GeneName"), Some("abc"));
        assert_eq!(got.pid, 93.0);
        assert_eq!(got.percent_identity, 91.0);
    }

    #[test]
    fn consensus_majority() {
        use super::build_consensus;

        let group = vec![named("B", "genB", 95.0), named("A", "genA", 92.0), named("A", "genA", 99.0)];
        let got = build_consensus(group).unwrap();

        assert_eq!(got.get("ProteinName"), Some("A"));
        assert_eq!(got.get("GeneName"), Some("genA"));
        assert_eq!(got.pid, 99.0);
        assert_eq!(got.subject_id, "P100");
    }

    #[test]
    fn consensus_ignores_evidence_codes() {
        use super::build_consensus;

        let group = vec![named("X {ECO:1}", "x", 95.0), named("Y", "y", 95.0), named("X {ECO:2}", "x", 95.0)];
        let got = build_consensus(group).unwrap();

        assert_eq!(got.get("ProteinName"), Some("X"));
    }

    #[test]
    fn no_consensus_keeps_first_hit() {
        use super::build_consensus;

        let group = vec![named("A {ECO:1}", "genA", 95.0), named("B", "genB", 97.0), named("C", "genC", 90.0)];
        let got = build_consensus(group).unwrap();

        assert_eq!(got.get("ProteinName"), Some("A {ECO:1}"));
        assert_eq!(got.get("GeneName"), Some("genA"));
        assert_eq!(got.pid, 97.0);
    }

    #[test]
    fn consensus_of_empty_group() {
        use super::build_consensus;

        assert!(build_consensus(Vec::new()).is_none());
    }
}
