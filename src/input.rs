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

//! Line sources over plain or gzip compressed input.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use flate2::read::MultiGzDecoder;

type E = Box<dyn std::error::Error>;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Clone)]
pub struct MissingInput {
    pub path: PathBuf,
}

impl std::fmt::Display for MissingInput {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "no such file: {}", self.path.display())
    }
}

impl std::error::Error for MissingInput {}

/// Open `path` for buffered reading.
///
/// The file is decompressed on the fly if its name ends in `.gz` or if it
/// starts with the gzip magic bytes. Concatenated gzip members are read as
/// one stream.
///
pub fn open_input(
    path: &Path,
) -> Result<Box<dyn BufRead>, E> {
    if !path.exists() {
        return Err(Box::new(MissingInput{ path: path.to_path_buf() }))
    }

    let mut reader = BufReader::new(File::open(path)?);
    let gz_suffix = path.extension().is_some_and(|ext| ext == "gz");
    let gz_magic = reader.fill_buf()?.starts_with(&GZIP_MAGIC);

    if gz_suffix || gz_magic {
        log::debug!("reading {} as gzip", path.display());
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

/// Read a newline-delimited list of names into a set.
///
/// Surrounding whitespace is trimmed and blank lines are ignored.
///
pub fn read_list(
    path: &Path,
) -> Result<HashSet<String>, E> {
    if !path.exists() {
        return Err(Box::new(MissingInput{ path: path.to_path_buf() }))
    }
    let reader = BufReader::new(File::open(path)?);
    read_list_from(reader)
}

pub fn read_list_from<R: Read>(
    conn: R,
) -> Result<HashSet<String>, E> {
    let reader = BufReader::new(conn);
    let mut names: HashSet<String> = HashSet::new();
    for line in reader.lines() {
        let line = line?;
        let name = line.trim();
        if !name.is_empty() {
            names.insert(name.to_string());
        }
    }
    Ok(names)
}

/// Sequential lines from a [BufRead].
///
/// Lines are returned with their terminators. If a side writer is attached
/// with [with_tee](LineSource::with_tee), every line is also copied to it
/// unchanged before being returned.
///
pub struct LineSource<R: BufRead> {
    reader: R,
    tee: Option<Box<dyn Write>>,
    n_lines: usize,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(
        reader: R,
    ) -> Self {
        LineSource{ reader, tee: None, n_lines: 0 }
    }

    pub fn with_tee(
        reader: R,
        side: Box<dyn Write>,
    ) -> Self {
        LineSource{ reader, tee: Some(side), n_lines: 0 }
    }

    /// Number of lines returned so far.
    pub fn lines_read(
        &self,
    ) -> usize {
        self.n_lines
    }

    fn read_next(
        &mut self,
    ) -> std::io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            if let Some(side) = self.tee.as_mut() {
                side.flush()?;
            }
            return Ok(None)
        }
        if let Some(side) = self.tee.as_mut() {
            side.write_all(line.as_bytes())?;
        }
        self.n_lines += 1;
        Ok(Some(line))
    }
}

impl<R: BufRead> Iterator for LineSource<R> {
    type Item = std::io::Result<String>;

    fn next(
        &mut self,
    ) -> Option<std::io::Result<String>> {
        self.read_next().transpose()
    }
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn line_source_keeps_terminators() {
        use super::LineSource;
        use std::io::Cursor;

        let data: Vec<u8> = b"ID   A\r\nOC   B;\n//".to_vec();
        let source = LineSource::new(Cursor::new(data));

        let got: Vec<String> = source.map(|line| line.unwrap()).collect();
        let expected = vec!["ID   A\r\n".to_string(), "OC   B;\n".to_string(), "//".to_string()];

        assert_eq!(got, expected);
    }

    #[test]
    fn line_source_tee_is_byte_exact() {
        use super::LineSource;
        use std::cell::RefCell;
        use std::io::Cursor;
        use std::io::Write;
        use std::rc::Rc;

        #[derive(Clone, Default)]
        struct Shared(Rc<RefCell<Vec<u8>>>);
        impl Write for Shared {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> { self.0.borrow_mut().write(buf) }
            fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
        }

        let data: Vec<u8> = b"QueryId\tQStart\r\nq1\t100\n\nq2\t7".to_vec();
        let side = Shared::default();
        let mut source = LineSource::with_tee(Cursor::new(data.clone()), Box::new(side.clone()));

        let first = source.next().unwrap().unwrap();
        assert_eq!(first, "QueryId\tQStart\r\n");
        assert_eq!(side.0.borrow().as_slice(), b"QueryId\tQStart\r\n");

        for line in source.by_ref() {
            line.unwrap();
        }

        assert_eq!(source.lines_read(), 4);
        assert_eq!(*side.0.borrow(), data);
    }

    #[test]
    fn read_list_skips_blank_lines() {
        use super::read_list_from;
        use std::collections::HashSet;

        let data: &[u8] = b"  Escherichia \n\nSalmonella\n   \n";
        let got = read_list_from(data).unwrap();
        let expected: HashSet<String> = HashSet::from(["Escherichia".to_string(), "Salmonella".to_string()]);

        assert_eq!(got, expected);
    }

    #[test]
    fn open_input_missing_file() {
        use super::open_input;
        use super::MissingInput;
        use std::path::Path;

        let got = open_input(Path::new("/nonexistent/input.embl"));
        let err = got.err().unwrap();

        assert!(err.downcast_ref::<MissingInput>().is_some());
    }

    #[test]
    fn open_input_gzip_by_suffix_and_magic() {
        use super::open_input;
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Read;
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let contents = b"ID   P1\n//\n";

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(contents).unwrap();
        let compressed = encoder.finish().unwrap();

        let with_suffix = dir.path().join("entries.dat.gz");
        let without_suffix = dir.path().join("entries.dat");
        std::fs::write(&with_suffix, &compressed).unwrap();
        std::fs::write(&without_suffix, &compressed).unwrap();

        for path in [with_suffix, without_suffix] {
            let mut got = String::new();
            open_input(&path).unwrap().read_to_string(&mut got).unwrap();
            assert_eq!(got.as_bytes(), contents);
        }
    }

    #[test]
    fn open_input_plain() {
        use super::open_input;
        use std::io::Read;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entries.gbk");
        std::fs::write(&path, b"LOCUS       X\n//\n").unwrap();

        let mut got = String::new();
        open_input(&path).unwrap().read_to_string(&mut got).unwrap();

        assert_eq!(got, "LOCUS       X\n//\n");
    }
}
