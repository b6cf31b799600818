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

//! Record scanner over EMBL and GenBank flat files.
//!
//! A [Scanner] reads lines from a [LineSource], splits them into records at
//! each `//` terminator line, and returns the records accepted by a
//! [Selection]. Each line is classified once into a [LineTag] by the format
//! specific classifier in [embl] or [gbk].
//!
//! A trailing record that is not closed by a terminator is never returned.
//!
//! ## Usage
//!
//! ```rust
//! use flatsift::Format;
//! use flatsift::input::LineSource;
//! use flatsift::scanner::Scanner;
//! use flatsift::selection::Selection;
//! use std::io::Cursor;
//!
//! let mut data: Vec<u8> = Vec::new();
//! data.append(&mut b"ID   P1\n".to_vec());
//! data.append(&mut b"OC   Bacteria; Enterobacterales; Escherichia.\n".to_vec());
//! data.append(&mut b"//\n".to_vec());
//! data.append(&mut b"ID   P2\n".to_vec());
//! data.append(&mut b"OC   Bacteria; Enterobacterales; Salmonella.\n".to_vec());
//! data.append(&mut b"//\n".to_vec());
//!
//! let selection = Selection::Taxon("Escherichia".to_string());
//! let lines = LineSource::new(Cursor::new(data));
//! let mut scanner = Scanner::new(lines, Format::Embl, &selection);
//!
//! let record = scanner.next().unwrap().unwrap();
//! assert_eq!(record.text, "ID   P1\nOC   Bacteria; Enterobacterales; Escherichia.\n//\n");
//! assert!(scanner.next().is_none());
//! assert_eq!(scanner.records_scanned(), 2);
//! ```
//!

// Format specific implementations
pub mod embl;
pub mod gbk;

use crate::Format;
use crate::input::LineSource;
use crate::selection::Selection;

use embl::append_embl_residues;
use embl::classify_embl;
use gbk::append_gbk_residues;
use gbk::classify_gbk;

use std::io::BufRead;

type E = Box<dyn std::error::Error>;

/// Part of the record the scanner is currently inside.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Section {
    #[default]
    Header,
    Organism,
    Sequence,
}

/// Meaning of a single line, as far as the filters are concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineTag<'a> {
    /// `//` record terminator.
    Terminator,
    /// Primary identifier token (EMBL `ID`, GenBank `ACCESSION`).
    Identifier(&'a str),
    /// Line listing secondary identifiers (EMBL `DR`, GenBank `VERSION`).
    CrossReference(&'a str),
    /// Taxonomic lineage text.
    Organism(&'a str),
    /// Description line carrying the fragment flag.
    Fragment,
    /// Start of the sequence data (EMBL `SQ`, GenBank `ORIGIN`).
    SequenceStart,
    /// Line of sequence data.
    Residues(&'a str),
    Other,
}

/// Second whitespace separated token on `line` with any trailing `;` removed.
pub fn second_token(
    line: &str,
) -> &str {
    line.split_whitespace().nth(1).unwrap_or("").trim_end_matches(';')
}

impl Format {
    pub fn classify<'a>(
        &self,
        line: &'a str,
        section: &mut Section,
    ) -> LineTag<'a> {
        match self {
            Format::Embl => classify_embl(line, section),
            Format::Gbk => classify_gbk(line, section),
        }
    }

    pub fn append_residues(
        &self,
        line: &str,
        seq: &mut String,
    ) {
        match self {
            Format::Embl => append_embl_residues(line, seq),
            Format::Gbk => append_gbk_residues(line, seq),
        }
    }

    /// Name used for the entry in FASTA output, if `tag` carries it.
    ///
    /// EMBL entries are named by the `ID` line and GenBank entries by the
    /// accession.version on the `VERSION` line.
    ///
    pub fn entry_name<'a>(
        &self,
        tag: &LineTag<'a>,
    ) -> Option<&'a str> {
        match (self, tag) {
            (Format::Embl, LineTag::Identifier(id)) => Some(id),
            (Format::Gbk, LineTag::CrossReference(line)) => Some(second_token(line)),
            _ => None,
        }
    }
}

/// Values accumulated while inside one record.
///
/// Reset at every terminator line. `keep` and `skip` are only ever set,
/// never cleared, before the reset.
///
#[derive(Debug, Clone, Default)]
pub struct RecordState {
    pub entry: String,
    pub keep: bool,
    pub skip: bool,
    pub taxon: Option<String>,
    pub name: Option<String>,
    pub residues: String,
    pub section: Section,
}

impl RecordState {
    pub fn is_selected(
        &self,
    ) -> bool {
        self.keep && !self.skip
    }

    fn is_empty(
        &self,
    ) -> bool {
        self.entry.trim().is_empty() && self.name.is_none() && self.residues.is_empty()
    }
}

/// A record accepted by a [Selection].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    /// Text to output: the raw entry including its terminator line, or a
    /// FASTA record in fasta mode.
    pub text: String,
    /// Taxon that selected the record in taxon-set mode.
    pub taxon: Option<String>,
}

pub struct Scanner<'a, R: BufRead> {
    lines: LineSource<R>,
    pub format: Format,
    selection: &'a Selection,

    state: RecordState,
    n_records: usize,
    n_selected: usize,
    finished: bool,
}

impl<'a, R: BufRead> Scanner<'a, R> {
    pub fn new(
        lines: LineSource<R>,
        format: Format,
        selection: &'a Selection,
    ) -> Self {
        Scanner{
            lines, format, selection,
            state: RecordState::default(),
            n_records: 0, n_selected: 0, finished: false,
        }
    }
}

impl<R: BufRead> Scanner<'_, R> {
    /// Number of terminator lines seen so far.
    pub fn records_scanned(
        &self,
    ) -> usize {
        self.n_records
    }

    /// Number of records returned so far.
    pub fn records_selected(
        &self,
    ) -> usize {
        self.n_selected
    }

    fn process_line(
        &mut self,
        line: &str,
    ) -> Option<Record> {
        let tag = self.format.classify(line, &mut self.state.section);

        if tag == LineTag::Terminator {
            return self.close_record(line)
        }

        let fasta = *self.selection == Selection::Fasta;
        if !fasta {
            self.state.entry.push_str(line);
        }

        match tag {
            LineTag::Fragment if self.selection.excludes_fragments() => self.state.skip = true,
            LineTag::Residues(text) if fasta => self.format.append_residues(text, &mut self.state.residues),
            _ => (),
        }

        self.selection.observe(self.format, &tag, &mut self.state);
        None
    }

    fn close_record(
        &mut self,
        terminator: &str,
    ) -> Option<Record> {
        let state = std::mem::take(&mut self.state);
        self.n_records += 1;

        if *self.selection == Selection::Fasta && state.name.is_none() && !state.residues.is_empty() {
            log::warn!("skipping unnamed sequence in record {}", self.n_records);
        }

        if !state.is_selected() {
            return None
        }

        let text = match self.selection {
            Selection::Fasta => {
                format!(">{}\n{}\n", state.name.unwrap_or_default(), state.residues)
            },
            _ => {
                let mut text = state.entry;
                text.push_str(terminator);
                if !terminator.ends_with('\n') {
                    text.push('\n');
                }
                text
            },
        };

        self.n_selected += 1;
        Some(Record{ text, taxon: state.taxon })
    }

    fn finish(
        &mut self,
    ) {
        if !self.finished {
            self.finished = true;
            if !self.state.is_empty() {
                log::warn!("discarding unterminated record at end of input (line {})", self.lines.lines_read());
            }
            log::info!("scanned {} records, selected {}", self.n_records, self.n_selected);
        }
    }
}

impl<R: BufRead> Iterator for Scanner<'_, R> {
    type Item = Result<Record, E>;

    fn next(
        &mut self,
    ) -> Option<Result<Record, E>> {
        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => return Some(Err(Box::new(e))),
                None => {
                    self.finish();
                    return None
                },
            };
            if let Some(record) = self.process_line(&line) {
                return Some(Ok(record))
            }
        }
    }
}
