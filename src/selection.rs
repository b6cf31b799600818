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

//! Rules deciding which records a [Scanner](crate::scanner::Scanner) returns.

use crate::Format;
use crate::scanner::LineTag;
use crate::scanner::RecordState;

use std::collections::HashSet;

/// Record selection strategy.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Records whose lineage contains the taxon.
    Taxon(String),
    /// Records whose lineage contains any taxon in the set, labelled with
    /// the last matching taxon.
    TaxonSet(HashSet<String>),
    /// Every named record, converted to FASTA.
    Fasta,
    /// Records whose primary or secondary identifiers are in the set.
    Ids(HashSet<String>),
}

impl Selection {
    /// Whether records flagged as fragments are dropped.
    pub fn excludes_fragments(
        &self,
    ) -> bool {
        !matches!(self, Selection::Ids(_))
    }

    /// Update the record `state` after reading a line classified as `tag`.
    pub fn observe(
        &self,
        format: Format,
        tag: &LineTag,
        state: &mut RecordState,
    ) {
        match (self, tag) {
            (Selection::Taxon(taxon), LineTag::Organism(text)) => {
                if lineage_contains(text, taxon) {
                    state.keep = true;
                }
            },
            (Selection::TaxonSet(taxa), LineTag::Organism(text)) => {
                for token in lineage_tokens(text) {
                    if let Some(taxon) = taxa.get(token) {
                        state.keep = true;
                        state.taxon = Some(taxon.clone());
                    }
                }
            },
            (Selection::Fasta, tag) => {
                if let Some(name) = format.entry_name(tag) {
                    state.keep = true;
                    state.name = Some(name.to_string());
                }
            },
            (Selection::Ids(ids), LineTag::Identifier(id)) => {
                if ids.contains(*id) {
                    state.keep = true;
                }
            },
            (Selection::Ids(ids), LineTag::CrossReference(line)) => {
                if cross_reference_tokens(line).any(|token| ids.contains(token)) {
                    state.keep = true;
                }
            },
            _ => (),
        }
    }
}

/// Check if `taxon` appears in `text` directly followed by `.` or `;`.
///
/// The terminator prevents a genus from matching a longer name that starts
/// with it, eg. `Escherichia` does not match `Escherichiabacter;`.
///
pub fn lineage_contains(
    text: &str,
    taxon: &str,
) -> bool {
    ['.', ';'].iter().any(|terminator| {
        let mut anchored = String::with_capacity(taxon.len() + 1);
        anchored.push_str(taxon);
        anchored.push(*terminator);
        text.contains(&anchored)
    })
}

/// Taxon names in a lineage line, trimmed of whitespace and periods.
pub fn lineage_tokens(
    text: &str,
) -> impl Iterator<Item = &str> {
    text.split(';').map(|token| token.trim().trim_matches('.'))
}

/// Identifiers on a cross-reference line, split on whitespace and `;`.
pub fn cross_reference_tokens(
    line: &str,
) -> impl Iterator<Item = &str> {
    line.split(|x: char| x.is_whitespace() || x == ';').filter(|token| !token.is_empty())
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn lineage_contains_anchored() {
        use super::lineage_contains;

        assert!(lineage_contains("Bacteria; Enterobacteriaceae; Escherichia.\n", "Escherichia"));
        assert!(lineage_contains("Enterobacteriaceae; Escherichia; unclassified.\n", "Escherichia"));
        assert!(!lineage_contains("Enterobacteriaceae; Escherichiabacter.\n", "Escherichia"));
        assert!(!lineage_contains("Enterobacteriaceae; Escherichiabacter; Escherichia coli\n", "Escherichia"));
        assert!(lineage_contains("Escherichiabacter; Escherichia.\n", "Escherichia"));
    }

    #[test]
    fn lineage_contains_self_overlapping_name() {
        use super::lineage_contains;

        assert!(lineage_contains("Bacteria; aaa.\n", "aa"));
        assert!(lineage_contains("Bacteria; abab;\n", "ab"));
        assert!(!lineage_contains("Bacteria; aaab.\n", "aa"));
    }

    #[test]
    fn lineage_tokens_trimmed() {
        use super::lineage_tokens;

        let got: Vec<&str> = lineage_tokens(" Bacteria; Pseudomonadota;\n").collect();
        assert_eq!(got, vec!["Bacteria", "Pseudomonadota", ""]);

        let got: Vec<&str> = lineage_tokens("Enterobacteriaceae; Escherichia.\n").collect();
        assert_eq!(got, vec!["Enterobacteriaceae", "Escherichia"]);
    }

    #[test]
    fn cross_reference_tokens_split() {
        use super::cross_reference_tokens;

        let got: Vec<&str> = cross_reference_tokens("DR   EMBL; X57346; CAA40621.1; -; mRNA.\n").collect();
        let expected = vec!["DR", "EMBL", "X57346", "CAA40621.1", "-", "mRNA."];

        assert_eq!(got, expected);
    }

    #[test]
    fn observe_keep_is_never_cleared() {
        use super::Selection;
        use crate::Format;
        use crate::scanner::LineTag;
        use crate::scanner::RecordState;

        let selection = Selection::Taxon("Escherichia".to_string());
        let mut state = RecordState::default();

        selection.observe(Format::Embl, &LineTag::Organism("Enterobacteriaceae; Escherichia.\n"), &mut state);
        selection.observe(Format::Embl, &LineTag::Organism("Salmonella.\n"), &mut state);

        assert!(state.keep);
        assert!(state.is_selected());
    }

    #[test]
    fn ids_never_exclude_fragments() {
        use super::Selection;
        use std::collections::HashSet;

        assert!(!Selection::Ids(HashSet::new()).excludes_fragments());
        assert!(Selection::Fasta.excludes_fragments());
        assert!(Selection::Taxon("Escherichia".to_string()).excludes_fragments());
        assert!(Selection::TaxonSet(HashSet::new()).excludes_fragments());
    }
}
