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

//! Destinations for selected records.

use crate::scanner::Record;

use std::collections::BTreeSet;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use indexmap::IndexMap;

type E = Box<dyn std::error::Error>;

/// Suffix of the per-taxon output files.
pub const TAXON_FILE_SUFFIX: &str = ".dat";

/// Write records to `conn` in input order
///
/// Returns the number of records written.
///
pub fn write_records<W: Write, I: Iterator<Item = Result<Record, E>>>(
    records: I,
    conn: &mut W,
) -> Result<usize, E> {
    let mut n_written = 0;
    for record in records {
        conn.write_all(record?.text.as_bytes())?;
        n_written += 1;
    }
    conn.flush()?;
    Ok(n_written)
}

/// Default limit on simultaneously open taxon files.
pub const MAX_OPEN_TAXON_FILES: usize = 256;

/// Per-taxon append files
///
/// Each taxon gets a file named `<taxon>.dat` in the output directory. The
/// file is opened in append mode the first time a record for the taxon
/// arrives and stays open until [finish](TaxonFiles::finish), or until the
/// number of open files reaches the limit. The file that has been open the
/// longest is then flushed and closed, and reopened in append mode if the
/// taxon comes up again.
///
/// Other processes appending to the same files at the same time may
/// interleave records.
///
pub struct TaxonFiles {
    dir: PathBuf,
    max_open: usize,
    handles: IndexMap<String, BufWriter<File>>,
    written: BTreeSet<String>,
}

impl TaxonFiles {
    pub fn new(
        dir: &Path,
    ) -> Self {
        TaxonFiles::with_max_open(dir, MAX_OPEN_TAXON_FILES)
    }

    /// Keep at most `max_open` files open at once (at least one).
    pub fn with_max_open(
        dir: &Path,
        max_open: usize,
    ) -> Self {
        TaxonFiles{
            dir: dir.to_path_buf(),
            max_open: max_open.max(1),
            handles: IndexMap::new(),
            written: BTreeSet::new(),
        }
    }

    pub fn path_for(
        &self,
        taxon: &str,
    ) -> PathBuf {
        self.dir.join(format!("{}{}", taxon, TAXON_FILE_SUFFIX))
    }

    /// Number of files currently open.
    pub fn open_files(
        &self,
    ) -> usize {
        self.handles.len()
    }

    pub fn write_record(
        &mut self,
        taxon: &str,
        text: &str,
    ) -> Result<(), E> {
        if !self.handles.contains_key(taxon) {
            if self.handles.len() >= self.max_open {
                if let Some((closed, mut conn)) = self.handles.shift_remove_index(0) {
                    conn.flush()?;
                    log::debug!("closed {} to stay under {} open files", self.path_for(&closed).display(), self.max_open);
                }
            }
            let path = self.path_for(taxon);
            if self.written.insert(taxon.to_string()) {
                log::info!("appending {} records to {}", taxon, path.display());
            }
            let f = OpenOptions::new().create(true).append(true).open(&path)?;
            self.handles.insert(taxon.to_string(), BufWriter::new(f));
        }
        if let Some(conn) = self.handles.get_mut(taxon) {
            conn.write_all(text.as_bytes())?;
        }
        Ok(())
    }

    /// Flush and close all files, returning the taxa that were written.
    pub fn finish(
        self,
    ) -> Result<Vec<String>, E> {
        for (_, mut conn) in self.handles {
            conn.flush()?;
        }
        Ok(self.written.into_iter().collect())
    }
}

/// Append records to the file of the taxon that selected them
///
/// Records without a taxon are ignored. Returns the number of records
/// written.
///
pub fn write_records_by_taxon<I: Iterator<Item = Result<Record, E>>>(
    records: I,
    files: &mut TaxonFiles,
) -> Result<usize, E> {
    let mut n_written = 0;
    for record in records {
        let record = record?;
        if let Some(taxon) = record.taxon.as_ref() {
            files.write_record(taxon, &record.text)?;
            n_written += 1;
        }
    }
    Ok(n_written)
}
