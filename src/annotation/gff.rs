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

//! GFF3 output for [Feature] records.
//!
//! Features are written as `CDS` lines with the subject protein as the `ID`
//! attribute. If the genome sequence is available it is written after the
//! features in a `##FASTA` section, and each sequence gets a
//! `##sequence-region` pragma.
//!

use crate::annotation::AnnotationConfig;
use crate::annotation::Feature;

use std::io::Write;
use std::path::Path;

type E = Box<dyn std::error::Error>;

const FASTA_LINE_WIDTH: usize = 60;

/// A genome sequence the features were called on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenomeRecord {
    pub id: String,
    pub seq: Vec<u8>,
}

/// Read the genome sequences from a fasta file
///
/// The record id is the first word of the header line.
///
pub fn read_genome(
    path: &Path,
) -> Result<Vec<GenomeRecord>, E> {
    let mut reader = needletail::parse_fastx_file(path)?;
    let mut records: Vec<GenomeRecord> = Vec::new();
    while let Some(record) = reader.next() {
        let record = record?;
        let header = String::from_utf8_lossy(record.id()).to_string();
        let id = header.split_whitespace().next().unwrap_or("").to_string();
        records.push(GenomeRecord{ id, seq: record.seq().to_vec() });
    }
    log::info!("read {} genome sequences from {}", records.len(), path.display());
    Ok(records)
}

/// Write the GFF3 version line and a sequence-region pragma per sequence.
pub fn format_gff_header<W: Write>(
    genome: &[GenomeRecord],
    conn: &mut W,
) -> Result<(), E> {
    conn.write_all(b"##gff-version 3\n")?;
    for record in genome {
        writeln!(conn, "##sequence-region {} 1 {}", record.id, record.seq.len())?;
    }
    Ok(())
}

/// Format the attributes column for `feature`
///
/// Always contains `ID`, with `product` and `gene` added when the
/// configured columns have a value.
///
pub fn format_attributes(
    feature: &Feature,
    config: &AnnotationConfig,
) -> String {
    let mut attributes: String = String::new();
    attributes += "ID=";
    attributes += &feature.subject_id;

    if let Some(product) = feature.get(&config.product_column).filter(|value| !value.is_empty()) {
        attributes += ";product=";
        attributes += product;
    }
    if let Some(gene) = feature.get(&config.gene_column).filter(|value| !value.is_empty()) {
        attributes += ";gene=";
        attributes += gene;
    }

    attributes
}

/// Format a single feature as a GFF3 CDS line.
pub fn format_gff_line<W: Write>(
    feature: &Feature,
    config: &AnnotationConfig,
    conn: &mut W,
) -> Result<(), E> {
    let separator: char = '\t';
    let (start, end) = feature.span();
    let strand = if feature.is_reverse() { '-' } else { '+' };

    let mut formatted: String = String::new();
    formatted += &feature.query_id;
    formatted.push(separator);
    formatted += ".";
    formatted.push(separator);
    formatted += "CDS";
    formatted.push(separator);
    formatted += &start.to_string();
    formatted.push(separator);
    formatted += &end.to_string();
    formatted.push(separator);
    formatted += ".";
    formatted.push(separator);
    formatted.push(strand);
    formatted.push(separator);
    formatted += ".";
    formatted.push(separator);
    formatted += &format_attributes(feature, config);
    formatted += "\n";

    conn.write_all(formatted.as_bytes())?;
    Ok(())
}

/// Write the `##FASTA` section with the genome sequences.
pub fn format_fasta_section<W: Write>(
    genome: &[GenomeRecord],
    conn: &mut W,
) -> Result<(), E> {
    if genome.is_empty() {
        return Ok(())
    }
    conn.write_all(b"##FASTA\n")?;
    for record in genome {
        writeln!(conn, ">{}", record.id)?;
        for chunk in record.seq.chunks(FASTA_LINE_WIDTH) {
            conn.write_all(chunk)?;
            conn.write_all(b"\n")?;
        }
    }
    Ok(())
}

/// Warn about features that fall outside the genome sequences.
pub fn check_regions(
    features: &[Feature],
    genome: &[GenomeRecord],
) -> usize {
    let mut n_outside = 0;
    for feature in features {
        let (_, end) = feature.span();
        match genome.iter().find(|record| record.id == feature.query_id) {
            Some(record) if end as usize <= record.seq.len() => (),
            Some(record) => {
                log::warn!("{} ends at {} past the end of {} ({} bp)", feature.subject_id, end, record.id, record.seq.len());
                n_outside += 1;
            },
            None => {
                log::warn!("{} is on {} which is not in the genome sequence", feature.subject_id, feature.query_id);
                n_outside += 1;
            },
        }
    }
    n_outside
}

/// Write `features` as a complete GFF3 file
///
/// `genome` may be empty, in which case only the version line and the
/// features are written.
///
pub fn format_gff_file<W: Write>(
    features: &[Feature],
    genome: &[GenomeRecord],
    config: &AnnotationConfig,
    conn: &mut W,
) -> Result<(), E> {
    format_gff_header(genome, conn)?;
    if !genome.is_empty() {
        check_regions(features, genome);
    }
    for feature in features {
        format_gff_line(feature, config, conn)?;
    }
    format_fasta_section(genome, conn)?;
    conn.flush()?;
    Ok(())
}
