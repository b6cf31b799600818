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
use crate::scanner::LineTag;
use crate::scanner::Section;
use crate::scanner::second_token;

pub const FRAGMENT_MARKER: &str = "Flags: Fragment;";

/// Classify a line from an EMBL (or UniProtKB .dat) entry
///
/// The line type is given by the two letter code in columns 1-2. Lines
/// following an `SQ` line are residue lines until the next terminator.
///
pub fn classify_embl<'a>(
    line: &'a str,
    section: &mut Section,
) -> LineTag<'a> {
    if line.starts_with("//") {
        return LineTag::Terminator
    }

    match line.get(0..2) {
        Some("ID") => LineTag::Identifier(second_token(line)),
        Some("DR") => LineTag::CrossReference(line),
        Some("OC") => LineTag::Organism(line.get(5..).unwrap_or("")),
        Some("DE") if line.contains(FRAGMENT_MARKER) => LineTag::Fragment,
        Some("SQ") => {
            *section = Section::Sequence;
            LineTag::SequenceStart
        },
        _ if *section == Section::Sequence => LineTag::Residues(line),
        _ => LineTag::Other,
    }
}

/// Append the residues on an EMBL sequence line to `seq`
///
/// Whitespace is removed. ENA style lines end with a running position
/// count, which is not part of the sequence and is skipped.
///
pub fn append_embl_residues(
    line: &str,
    seq: &mut String,
) {
    line.split_whitespace()
        .filter(|token| !token.bytes().all(|x| x.is_ascii_digit()))
        .for_each(|token| seq.push_str(token));
}
