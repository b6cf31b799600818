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

const CONTINUATION: &str = "            ";

/// Classify a line from a GenBank entry
///
/// GenBank keywords are column aligned. The lineage under `  ORGANISM`
/// continues for as long as the first 12 columns are blank; the ORGANISM
/// line itself holds the species name and is not part of the lineage.
///
/// GenBank has no fragment flag so [LineTag::Fragment] is never returned.
///
pub fn classify_gbk<'a>(
    line: &'a str,
    section: &mut Section,
) -> LineTag<'a> {
    if line.starts_with("//") {
        return LineTag::Terminator
    }

    if *section == Section::Organism {
        if line.starts_with(CONTINUATION) {
            return LineTag::Organism(&line[CONTINUATION.len()..])
        }
        *section = Section::Header;
    }

    if line.starts_with("  ORGANISM") {
        *section = Section::Organism;
        LineTag::Other
    } else if line.starts_with("ACCESSION") {
        LineTag::Identifier(second_token(line))
    } else if line.starts_with("VERSION") {
        LineTag::CrossReference(line)
    } else if line.starts_with("ORIGIN") {
        *section = Section::Sequence;
        LineTag::SequenceStart
    } else if *section == Section::Sequence {
        LineTag::Residues(line)
    } else {
        LineTag::Other
    }
}

/// Append the residues on a GenBank ORIGIN line to `seq`
///
/// The first token is the position of the first residue and is skipped.
///
pub fn append_gbk_residues(
    line: &str,
    seq: &mut String,
) {
    line.split_whitespace().skip(1).for_each(|token| seq.push_str(token));
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn classify_gbk_organism_section() {
        use super::classify_gbk;
        use crate::scanner::LineTag;
        use crate::scanner::Section;

        let mut section = Section::Header;

        assert_eq!(classify_gbk("  ORGANISM  Escherichia coli str. K-12 substr. MG1655\n", &mut section), LineTag::Other);
        assert_eq!(section, Section::Organism);
        assert_eq!(classify_gbk("            Bacteria; Proteobacteria; Gammaproteobacteria;\n", &mut section), LineTag::Organism("Bacteria; Proteobacteria; Gammaproteobacteria;\n"));
        assert_eq!(classify_gbk("            Enterobacteriaceae; Escherichia.\n", &mut section), LineTag::Organism("Enterobacteriaceae; Escherichia.\n"));
        assert_eq!(classify_gbk("REFERENCE   1  (bases 1 to 4641652)\n", &mut section), LineTag::Other);
        assert_eq!(section, Section::Header);
        assert_eq!(classify_gbk("            Escherichia.\n", &mut section), LineTag::Other);
    }

    #[test]
    fn classify_gbk_identifiers() {
        use super::classify_gbk;
        use crate::scanner::LineTag;
        use crate::scanner::Section;

        let mut section = Section::Header;

        assert_eq!(classify_gbk("ACCESSION   NC_000913\n", &mut section), LineTag::Identifier("NC_000913"));
        assert_eq!(classify_gbk("VERSION     NC_000913.3\n", &mut section), LineTag::CrossReference("VERSION     NC_000913.3\n"));
        assert_eq!(classify_gbk("DEFINITION  Escherichia coli str. K-12 substr. MG1655, complete genome.\n", &mut section), LineTag::Other);
        assert_eq!(classify_gbk("DEFINITION  Escherichia coli partial gene. Flags: Fragment;\n", &mut section), LineTag::Other);
    }

    #[test]
    fn classify_gbk_origin() {
        use super::classify_gbk;
        use crate::scanner::LineTag;
        use crate::scanner::Section;

        let mut section = Section::Header;

        assert_eq!(classify_gbk("ORIGIN      \n", &mut section), LineTag::SequenceStart);
        assert_eq!(classify_gbk("        1 agcttttcat tctgactgca\n", &mut section), LineTag::Residues("        1 agcttttcat tctgactgca\n"));
        assert_eq!(classify_gbk("//\n", &mut section), LineTag::Terminator);
    }

    #[test]
    fn append_gbk_residues_skips_position() {
        use super::append_gbk_residues;

        let mut seq = String::new();
        append_gbk_residues("        1 AGCT\n", &mut seq);
        append_gbk_residues("        5 TTGA\n", &mut seq);

        assert_eq!(seq, "AGCTTTGA");
    }
}
