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

//! flatsift is a library and a set of command-line clients for:
//!
//!   - Selecting records from EMBL (UniProtKB .dat) and GenBank flat files by
//!     taxon, by identifier list, or converting them to FASTA.
//!   - Splitting flat files into one file per taxon.
//!   - Merging protein alignment hits from a [kAAmer](https://github.com/zorino/kaamer)
//!     search into a GFF3 genome annotation.
//!
//! All inputs may be gzip compressed.
//!
//! ## Usage
//!
//! ### Command line
//!
//! The following binaries are provided:
//!   - `embl-filter` filter an EMBL flat file.
//!   - `gbk-filter` filter a GenBank flat file.
//!   - `genome-annotation` build a GFF3 annotation from kAAmer results.
//!
//! The filters share the same subcommands:
//!   - `taxon <name> <input>` print records whose lineage contains `name`.
//!   - `taxon_file <list> <input>` append records to `<taxon>.dat` for every
//!     taxon in `list`.
//!   - `fasta <input>` print every record as FASTA.
//!   - `ids <list> <input>` print records with an identifier in `list`.
//!
//! EMBL records flagged as fragments are skipped by all filters except
//! `ids`.
//!
//! ### Rust API
//!
//! The API provides functions for operating on structs that implement
//! [BufRead] and/or [Write]. These process an entire stream.
//!
//! For use cases requiring access to a single record at a time, the following
//! structs are provided:
//!
//!   - [LineSource](input::LineSource): reads lines from a [BufRead], optionally copying them to a side [Write].
//!   - [Scanner](scanner::Scanner): takes a [LineSource](input::LineSource) and returns the records accepted by a [Selection](selection::Selection).
//!   - [HitReader](annotation::HitReader): takes a [LineSource](input::LineSource) containing kAAmer results and returns the hits that pass the thresholds.
//!   - [ConsecutiveGroups](annotation::ConsecutiveGroups): groups hits on the same coordinates.
//!
//! See documentation for the appropriate functions or structs for usage examples.
//!

use annotation::AnnotationConfig;
use annotation::gff::GenomeRecord;
use annotation::gff::format_gff_file;
use annotation::merge_hits;
use input::LineSource;
use output::TaxonFiles;
use output::write_records;
use output::write_records_by_taxon;
use scanner::Scanner;
use selection::Selection;

use std::io::BufRead;
use std::io::Write;
use std::path::Path;

pub mod annotation;
pub mod cli;
pub mod input;
pub mod output;
pub mod scanner;
pub mod selection;

type E = Box<dyn std::error::Error>;

/// Supported flat file formats.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Embl,
    Gbk,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "embl" => Ok(Format::Embl),
            "gbk" | "genbank" => Ok(Format::Gbk),
            _ => Err(format!("'{}' is not a valid Format", s)),
        }
    }
}

/// Filter flat file records from [BufRead] to [Write].
///
/// Writes the records accepted by `selection` in input order and returns
/// their count.
///
/// ## Usage
///
/// ```rust
/// use flatsift::filter_from_read_to_write;
/// use flatsift::Format;
/// use flatsift::selection::Selection;
/// use std::io::Cursor;
///
/// // Mock UniProtKB entries
/// let mut input_bytes: Vec<u8> = Vec::new();
/// input_bytes.append(&mut b"ID   EFTU_ECOLI              Reviewed;         394 AA.\n".to_vec());
/// input_bytes.append(&mut b"OC   Bacteria; Pseudomonadota; Gammaproteobacteria; Enterobacterales;\n".to_vec());
/// input_bytes.append(&mut b"OC   Enterobacteriaceae; Escherichia.\n".to_vec());
/// input_bytes.append(&mut b"SQ   SEQUENCE   8 AA;  925 MW;  6C1A5D9E3F0B2C47 CRC64;\n".to_vec());
/// input_bytes.append(&mut b"     MSKEKFER TKPHVNVG\n".to_vec());
/// input_bytes.append(&mut b"//\n".to_vec());
/// input_bytes.append(&mut b"ID   EFTU_BACSU              Reviewed;         396 AA.\n".to_vec());
/// input_bytes.append(&mut b"DE   Flags: Fragment;\n".to_vec());
/// input_bytes.append(&mut b"SQ   SEQUENCE   4 AA;  470 MW;  1A2B3C4D5E6F7A8B CRC64;\n".to_vec());
/// input_bytes.append(&mut b"     MAKE\n".to_vec());
/// input_bytes.append(&mut b"//\n".to_vec());
///
/// // Convert to fasta, the fragment is skipped
/// let mut output: Vec<u8> = Vec::new();
/// let n = filter_from_read_to_write(Format::Embl, &Selection::Fasta, Cursor::new(input_bytes), &mut output).unwrap();
///
/// assert_eq!(n, 1);
/// assert_eq!(output, b">EFTU_ECOLI\nMSKEKFERTKPHVNVG\n".to_vec());
/// ```
///
pub fn filter_from_read_to_write<R: BufRead, W: Write>(
    format: Format,
    selection: &Selection,
    conn_in: R,
    conn_out: &mut W,
) -> Result<usize, E> {
    let scanner = Scanner::new(LineSource::new(conn_in), format, selection);
    write_records(scanner, conn_out)
}

/// Append flat file records from [BufRead] to one file per taxon.
///
/// Records accepted by a [TaxonSet](Selection::TaxonSet) are appended to
/// `<out_dir>/<taxon>.dat`. Returns the taxa that had at least one record.
///
/// ## Usage
///
/// ```rust
/// use flatsift::split_from_read_by_taxon;
/// use flatsift::Format;
/// use flatsift::selection::Selection;
/// use std::collections::HashSet;
/// use std::io::Cursor;
///
/// let mut input_bytes: Vec<u8> = Vec::new();
/// input_bytes.append(&mut b"ID   P1\n".to_vec());
/// input_bytes.append(&mut b"OC   Bacteria; Enterobacterales; Salmonella.\n".to_vec());
/// input_bytes.append(&mut b"//\n".to_vec());
///
/// let taxa: HashSet<String> = HashSet::from(["Escherichia".to_string(), "Salmonella".to_string()]);
/// let out_dir = std::env::temp_dir().join(format!("flatsift-doc-{}", std::process::id()));
/// std::fs::create_dir_all(&out_dir).unwrap();
///
/// let written = split_from_read_by_taxon(Format::Embl, &Selection::TaxonSet(taxa), Cursor::new(input_bytes), &out_dir).unwrap();
///
/// assert_eq!(written, vec!["Salmonella".to_string()]);
/// assert!(out_dir.join("Salmonella.dat").exists());
/// assert!(!out_dir.join("Escherichia.dat").exists());
///
/// std::fs::remove_dir_all(&out_dir).unwrap();
/// ```
///
pub fn split_from_read_by_taxon<R: BufRead>(
    format: Format,
    selection: &Selection,
    conn_in: R,
    out_dir: &Path,
) -> Result<Vec<String>, E> {
    let mut scanner = Scanner::new(LineSource::new(conn_in), format, selection);
    let mut files = TaxonFiles::new(out_dir);
    let n_written = write_records_by_taxon(&mut scanner, &mut files)?;
    let taxa = files.finish()?;
    log::info!("wrote {} records to {} taxon files", n_written, taxa.len());
    Ok(taxa)
}

/// Merge kAAmer results from a [LineSource] into GFF3 written to [Write].
///
/// Hits are filtered and merged according to `config`. If `genome` is not
/// empty its sequences are included in the output. Returns the number of
/// features written.
///
/// ## Usage
///
/// ```rust
/// use flatsift::annotate_from_read_to_write;
/// use flatsift::annotation::AnnotationConfig;
/// use flatsift::input::LineSource;
/// use std::io::Cursor;
///
/// let mut input_bytes: Vec<u8> = Vec::new();
/// input_bytes.append(&mut b"QueryId\tSubjectId\t%Identity\tQStart\tQEnd\tBitscore\tProteinName\tGeneName\n".to_vec());
/// input_bytes.append(&mut b"contig_1\tP0A6N1\t99.5\t337\t1521\t780\tElongation factor Tu {ECO:0000256|HAMAP-Rule:MF_00118}\ttufA\n".to_vec());
/// input_bytes.append(&mut b"contig_1\tP0CE48\t98.0\t337\t1521\t772\tElongation factor Tu {ECO:0000256|HAMAP-Rule:MF_00118}\ttufB\n".to_vec());
///
/// let mut output: Vec<u8> = Vec::new();
/// let lines = LineSource::new(Cursor::new(input_bytes));
/// let n = annotate_from_read_to_write(&AnnotationConfig::default(), &[], lines, &mut output).unwrap();
///
/// let mut expected: Vec<u8> = Vec::new();
/// expected.append(&mut b"##gff-version 3\n".to_vec());
/// expected.append(&mut b"contig_1\t.\tCDS\t337\t1521\t.\t+\t.\tID=P0A6N1;product=Elongation factor Tu;gene=tufA\n".to_vec());
///
/// assert_eq!(n, 1);
/// assert_eq!(output, expected);
/// ```
///
pub fn annotate_from_read_to_write<R: BufRead, W: Write>(
    config: &AnnotationConfig,
    genome: &[GenomeRecord],
    lines: LineSource<R>,
    conn_out: &mut W,
) -> Result<usize, E> {
    let features = merge_hits(lines, config)?;
    format_gff_file(&features, genome, config, conn_out)?;
    Ok(features.len())
}
