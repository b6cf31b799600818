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

//! Merge protein alignment hits into genome features.
//!
//! The input is the tab-separated output of a kAAmer search with a header
//! line. Hits are read with a [HitReader], filtered by identity and length,
//! grouped by [ConsecutiveGroups] on their query coordinates, reduced to one
//! consensus [Feature] per group by [build_consensus], sorted by start, and
//! finally passed through [resolve_overlaps].
//!

pub mod consensus;
pub mod gff;
pub mod resolve;

pub use consensus::build_consensus;
pub use resolve::resolve_overlaps;

use crate::input::LineSource;

use std::io::BufRead;

use indexmap::IndexMap;

type E = Box<dyn std::error::Error>;

pub const QUERY_ID: &str = "QueryId";
pub const SUBJECT_ID: &str = "SubjectId";
pub const QUERY_START: &str = "QStart";
pub const QUERY_END: &str = "QEnd";
pub const BITSCORE: &str = "Bitscore";
pub const PROTEIN_NAME: &str = "ProteinName";
pub const GENE_NAME: &str = "GeneName";

/// Identity columns in order of preference. Alignment output has
/// `%Identity`, k-mer match output only `%KMatchIdentity`.
pub const IDENTITY_COLUMNS: [&str; 2] = ["%Identity", "%KMatchIdentity"];

#[derive(Debug, Clone)]
pub struct MissingColumn {
    pub name: String,
}

impl std::fmt::Display for MissingColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "missing column in results header: {}", self.name)
    }
}

impl std::error::Error for MissingColumn {}

#[derive(Debug, Clone)]
pub struct InvalidField {
    pub column: String,
    pub value: String,
    pub line: usize,
}

impl std::fmt::Display for InvalidField {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "invalid value '{}' in column {} on line {}", self.value, self.column, self.line)
    }
}

impl std::error::Error for InvalidField {}

/// Thresholds and output columns for building the annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationConfig {
    /// Minimum percent identity of a hit.
    pub min_identity: f64,
    /// Minimum length of a hit in amino acids.
    pub min_length: f64,
    /// Column reported as the `product` attribute.
    pub product_column: String,
    /// Column reported as the `gene` attribute.
    pub gene_column: String,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        AnnotationConfig{
            min_identity: 90.0,
            min_length: 60.0,
            product_column: PROTEIN_NAME.to_string(),
            gene_column: GENE_NAME.to_string(),
        }
    }
}

/// An alignment hit, or the consensus of a group of hits.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub query_id: String,
    pub subject_id: String,
    /// Start of the hit on the query, greater than `query_end` on the reverse strand.
    pub query_start: i64,
    pub query_end: i64,
    pub percent_identity: f64,
    pub bitscore: Option<f64>,
    /// Best identity in the consensus group.
    pub pid: f64,
    /// All columns of the input row.
    pub fields: IndexMap<String, String>,
}

impl Feature {
    /// Build a feature from a row of `values` under `header`.
    ///
    /// Values missing from the end of a short row are left out of
    /// [fields](Feature::fields).
    ///
    pub fn from_row(
        header: &[String],
        values: &[&str],
        identity_column: &str,
        line: usize,
    ) -> Result<Self, E> {
        let fields: IndexMap<String, String> = header.iter().zip(values.iter())
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect();

        let text = |column: &str| -> Result<String, E> {
            match fields.get(column) {
                Some(value) => Ok(value.clone()),
                None => Err(Box::new(InvalidField{ column: column.to_string(), value: String::new(), line })),
            }
        };
        let invalid = |column: &str, value: &str| -> E {
            Box::new(InvalidField{ column: column.to_string(), value: value.to_string(), line })
        };

        let start = text(QUERY_START)?;
        let end = text(QUERY_END)?;
        let identity = text(identity_column)?;

        let query_start = start.trim().parse::<i64>().map_err(|_| invalid(QUERY_START, &start))?;
        let query_end = end.trim().parse::<i64>().map_err(|_| invalid(QUERY_END, &end))?;
        let percent_identity = identity.trim().parse::<f64>().map_err(|_| invalid(identity_column, &identity))?;
        let bitscore = match fields.get(BITSCORE) {
            Some(value) => Some(value.trim().parse::<f64>().map_err(|_| invalid(BITSCORE, value))?),
            None => None,
        };

        Ok(Feature{
            query_id: text(QUERY_ID)?,
            subject_id: text(SUBJECT_ID)?,
            query_start, query_end,
            percent_identity, bitscore,
            pid: percent_identity,
            fields,
        })
    }

    pub fn get(
        &self,
        column: &str,
    ) -> Option<&str> {
        self.fields.get(column).map(|value| value.as_str())
    }

    /// Leftmost query coordinate.
    pub fn absolute_start(
        &self,
    ) -> i64 {
        self.query_start.min(self.query_end)
    }

    /// Query coordinates as (start, end) with start <= end.
    pub fn span(
        &self,
    ) -> (i64, i64) {
        (self.query_start.min(self.query_end), self.query_start.max(self.query_end))
    }

    pub fn is_reverse(
        &self,
    ) -> bool {
        self.query_start > self.query_end
    }

    /// Hit length in amino acids.
    pub fn alignment_length_aa(
        &self,
    ) -> f64 {
        (self.query_end - self.query_start).abs() as f64 / 3.0
    }

    /// Score used to pick between overlapping features.
    ///
    /// The bitscore when the results have one, otherwise the best identity.
    ///
    pub fn score(
        &self,
    ) -> f64 {
        self.bitscore.unwrap_or(self.pid)
    }

    /// Query coordinates exactly as written in the input.
    pub fn location_key(
        &self,
    ) -> (&str, &str) {
        (self.get(QUERY_START).unwrap_or(""), self.get(QUERY_END).unwrap_or(""))
    }
}

/// Reads hits that pass the identity and length thresholds.
pub struct HitReader<R: BufRead> {
    lines: LineSource<R>,
    header: Vec<String>,
    identity_column: String,
    min_identity: f64,
    min_length: f64,

    n_rows: usize,
    n_kept: usize,
}

impl<R: BufRead> HitReader<R> {
    /// Consume the header line from `lines` and check the required columns.
    pub fn new(
        mut lines: LineSource<R>,
        config: &AnnotationConfig,
    ) -> Result<Self, E> {
        let header: Vec<String> = match lines.next() {
            Some(line) => split_row(&line?).iter().map(|name| name.to_string()).collect(),
            None => Vec::new(),
        };

        let has = |name: &str| header.iter().any(|column| column == name);

        let identity_column = if header.is_empty() {
            IDENTITY_COLUMNS[0].to_string()
        } else {
            let found = IDENTITY_COLUMNS.iter().find(|&&name| has(name));
            match found {
                Some(name) => name.to_string(),
                None => return Err(Box::new(MissingColumn{ name: IDENTITY_COLUMNS.join(" or ") })),
            }
        };

        if !header.is_empty() {
            for name in [QUERY_ID, SUBJECT_ID, QUERY_START, QUERY_END] {
                if !has(name) {
                    return Err(Box::new(MissingColumn{ name: name.to_string() }))
                }
            }
        }
        log::debug!("results header: {:?}, identity column {}", header, identity_column);

        Ok(HitReader{
            lines, header, identity_column,
            min_identity: config.min_identity,
            min_length: config.min_length,
            n_rows: 0, n_kept: 0,
        })
    }

    pub fn header(
        &self,
    ) -> &[String] {
        &self.header
    }

    pub fn identity_column(
        &self,
    ) -> &str {
        &self.identity_column
    }

    fn passes(
        &self,
        feature: &Feature,
    ) -> bool {
        feature.alignment_length_aa() >= self.min_length && feature.percent_identity >= self.min_identity
    }
}

impl<R: BufRead> Iterator for HitReader<R> {
    type Item = Result<Feature, E>;

    fn next(
        &mut self,
    ) -> Option<Result<Feature, E>> {
        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => return Some(Err(Box::new(e))),
                None => {
                    log::info!("read {} hits, {} passed the identity and length thresholds", self.n_rows, self.n_kept);
                    return None
                },
            };
            if line.trim().is_empty() {
                continue;
            }

            self.n_rows += 1;
            let values = split_row(&line);
            let feature = match Feature::from_row(&self.header, &values, &self.identity_column, self.lines.lines_read()) {
                Ok(feature) => feature,
                Err(e) => return Some(Err(e)),
            };

            if self.passes(&feature) {
                self.n_kept += 1;
                return Some(Ok(feature))
            }
        }
    }
}

/// Split a tab-separated line. Trailing whitespace is removed from the last field.
pub fn split_row(
    line: &str,
) -> Vec<&str> {
    let mut values: Vec<&str> = line.split('\t').collect();
    if let Some(last) = values.last_mut() {
        *last = last.trim();
    }
    values
}

/// Groups of consecutive features sharing the same query coordinates
///
/// Features with the same coordinates that are not adjacent in the input
/// end up in separate groups.
///
pub struct ConsecutiveGroups<I: Iterator<Item = Result<Feature, E>>> {
    features: I,
    pending: Option<Feature>,
}

impl<I: Iterator<Item = Result<Feature, E>>> ConsecutiveGroups<I> {
    pub fn new(
        features: I,
    ) -> Self {
        ConsecutiveGroups{ features, pending: None }
    }
}

impl<I: Iterator<Item = Result<Feature, E>>> Iterator for ConsecutiveGroups<I> {
    type Item = Result<Vec<Feature>, E>;

    fn next(
        &mut self,
    ) -> Option<Result<Vec<Feature>, E>> {
        let first = match self.pending.take() {
            Some(feature) => feature,
            None => match self.features.next()? {
                Ok(feature) => feature,
                Err(e) => return Some(Err(e)),
            },
        };

        let mut group: Vec<Feature> = vec![first];
        loop {
            match self.features.next() {
                Some(Ok(feature)) => {
                    if feature.location_key() == group[0].location_key() {
                        group.push(feature);
                    } else {
                        self.pending = Some(feature);
                        return Some(Ok(group))
                    }
                },
                Some(Err(e)) => return Some(Err(e)),
                None => return Some(Ok(group)),
            }
        }
    }
}

/// Run the full merge on tab-separated results in `lines`
///
/// Returns the resolved features sorted by their leftmost coordinate.
///
pub fn merge_hits<R: BufRead>(
    lines: LineSource<R>,
    config: &AnnotationConfig,
) -> Result<Vec<Feature>, E> {
    let reader = HitReader::new(lines, config)?;

    let mut features: Vec<Feature> = Vec::new();
    for group in ConsecutiveGroups::new(reader) {
        if let Some(feature) = build_consensus(group?) {
            features.push(feature);
        }
    }
    log::info!("built {} consensus features", features.len());

    features.sort_by_key(|feature| feature.absolute_start());
    let resolved = resolve_overlaps(features);
    log::info!("kept {} features after overlap resolution", resolved.len());

    Ok(resolved)
}

// Tests
#[cfg(test)]
mod tests {

    pub(crate) fn feature(
        start: i64,
        end: i64,
        bitscore: f64,
    ) -> super::Feature {
        use super::Feature;
        use indexmap::IndexMap;

        let mut fields: IndexMap<String, String> = IndexMap::new();
        fields.insert("QueryId".to_string(), "contig_1".to_string());
        fields.insert("SubjectId".to_string(), format!("P{}", start));
        fields.insert("QStart".to_string(), start.to_string());
        fields.insert("QEnd".to_string(), end.to_string());

        Feature{
            query_id: "contig_1".to_string(),
            subject_id: format!("P{}", start),
            query_start: start,
            query_end: end,
            percent_identity: 95.0,
            bitscore: Some(bitscore),
            pid: 95.0,
            fields,
        }
    }

    const HEADER: &str = "QueryId\tSubjectId\t%Identity\tAlnLength\tMismatches\tGapOpen\tQStart\tQEnd\tSStart\tSEnd\tEvalue\tBitscore\tProteinName\tGeneName\n";

    #[test]
    fn hit_reader_filters_rows() {
        use super::AnnotationConfig;
        use super::HitReader;
        use crate::input::LineSource;
        use std::io::Cursor;

        let mut data: Vec<u8> = HEADER.as_bytes().to_vec();
        // kept
        data.append(&mut b"contig_1\tP1\t95.0\t100\t5\t0\t1\t300\t1\t100\t1e-50\t200\tProtein A\tgenA\n".to_vec());
        // identity too low
        data.append(&mut b"contig_1\tP2\t80.0\t100\t20\t0\t1\t300\t1\t100\t1e-40\t150\tProtein B\tgenB\n".to_vec());
        // too short
        data.append(&mut b"contig_1\tP3\t99.0\t30\t0\t0\t400\t490\t1\t30\t1e-10\t60\tProtein C\tgenC\n".to_vec());
        // reverse strand, kept
        data.append(&mut b"contig_1\tP4\t91.5\t100\t8\t0\t900\t601\t1\t100\t1e-45\t180\tProtein D\t\n".to_vec());
        data.append(&mut b"\n".to_vec());

        let reader = HitReader::new(LineSource::new(Cursor::new(data)), &AnnotationConfig::default()).unwrap();
        assert_eq!(reader.identity_column(), "%Identity");

        let got: Vec<String> = reader.map(|hit| hit.unwrap().subject_id).collect();

        assert_eq!(got, vec!["P1".to_string(), "P4".to_string()]);
    }

    #[test]
    fn hit_reader_kmatch_identity() {
        use super::AnnotationConfig;
        use super::HitReader;
        use crate::input::LineSource;
        use std::io::Cursor;

        let mut data: Vec<u8> = b"QueryId\tSubjectId\t%KMatchIdentity\tQueryKLength\tKMatch\tGapOpen\tQStart\tQEnd\tSStart\tSEnd\r\n".to_vec();
        data.append(&mut b"contig_1\tP1\t97.3\t100\t97\t0\t10\t309\t1\t100\r\n".to_vec());

        let mut reader = HitReader::new(LineSource::new(Cursor::new(data)), &AnnotationConfig::default()).unwrap();
        assert_eq!(reader.identity_column(), "%KMatchIdentity");
        assert_eq!(reader.header().last().unwrap(), "SEnd");

        let got = reader.next().unwrap().unwrap();

        assert_eq!(got.percent_identity, 97.3);
        assert_eq!(got.bitscore, None);
        assert_eq!(got.score(), 97.3);
        assert_eq!(got.get("SEnd"), Some("100"));
    }

    #[test]
    fn hit_reader_missing_identity_column() {
        use super::AnnotationConfig;
        use super::HitReader;
        use super::MissingColumn;
        use crate::input::LineSource;
        use std::io::Cursor;

        let data: Vec<u8> = b"QueryId\tSubjectId\tQStart\tQEnd\n".to_vec();
        let got = HitReader::new(LineSource::new(Cursor::new(data)), &AnnotationConfig::default());

        let err = got.err().unwrap();
        assert!(err.downcast_ref::<MissingColumn>().is_some());
    }

    #[test]
    fn hit_reader_invalid_coordinate() {
        use super::AnnotationConfig;
        use super::HitReader;
        use super::InvalidField;
        use crate::input::LineSource;
        use std::io::Cursor;

        let mut data: Vec<u8> = HEADER.as_bytes().to_vec();
        data.append(&mut b"contig_1\tP1\t95.0\t100\t5\t0\tstart\t300\t1\t100\t1e-50\t200\tProtein A\tgenA\n".to_vec());

        let mut reader = HitReader::new(LineSource::new(Cursor::new(data)), &AnnotationConfig::default()).unwrap();
        let err = reader.next().unwrap().err().unwrap();
        let err = err.downcast_ref::<InvalidField>().unwrap();

        assert_eq!(err.column, "QStart");
        assert_eq!(err.value, "start");
        assert_eq!(err.line, 2);
    }

    #[test]
    fn consecutive_groups_are_not_global() {
        use super::ConsecutiveGroups;

        let hits = vec![
            Ok(feature(100, 200, 1.0)),
            Ok(feature(100, 200, 2.0)),
            Ok(feature(300, 500, 3.0)),
            Ok(feature(100, 200, 4.0)),
        ];

        let got: Vec<Vec<f64>> = ConsecutiveGroups::new(hits.into_iter())
            .map(|group| group.unwrap().iter().map(|hit| hit.bitscore.unwrap()).collect())
            .collect();

        assert_eq!(got, vec![vec![1.0, 2.0], vec![3.0], vec![4.0]]);
    }

    #[test]
    fn feature_geometry() {
        let forward = feature(100, 400, 1.0);
        let reverse = feature(400, 100, 1.0);

        assert_eq!(forward.span(), (100, 400));
        assert_eq!(reverse.span(), (100, 400));
        assert_eq!(reverse.absolute_start(), 100);
        assert!(reverse.is_reverse());
        assert!(!forward.is_reverse());
        assert_eq!(forward.alignment_length_aa(), 100.0);
    }

    #[test]
    fn merge_hits_end_to_end() {
        use super::AnnotationConfig;
        use super::merge_hits;
        use crate::input::LineSource;
        use std::io::Cursor;

        let mut data: Vec<u8> = HEADER.as_bytes().to_vec();
        data.append(&mut b"contig_1\tP3\t92.0\t100\t8\t0\t1000\t1300\t1\t100\t1e-50\t150\tProtein C\tgenC\n".to_vec());
        data.append(&mut b"contig_1\tP1\t95.0\t100\t5\t0\t1\t300\t1\t100\t1e-50\t200\tProtein A {ECO:0000256}\tgenA\n".to_vec());
        data.append(&mut b"contig_1\tP2\t98.0\t100\t2\t0\t1\t300\t1\t100\t1e-50\t190\tProtein A\tgenA\n".to_vec());
        // contained in P1's span, lower bitscore
        data.append(&mut b"contig_1\tP4\t99.0\t70\t1\t0\t30\t240\t1\t70\t1e-30\t120\tProtein D\tgenD\n".to_vec());
        // last group, closed by the end of input
        data.append(&mut b"contig_1\tP5\t93.0\t100\t7\t0\t2000\t1701\t1\t100\t1e-50\t170\tProtein E\tgenE\n".to_vec());

        let got = merge_hits(LineSource::new(Cursor::new(data)), &AnnotationConfig::default()).unwrap();

        let ids: Vec<&str> = got.iter().map(|feature| feature.subject_id.as_str()).collect();
        assert_eq!(ids, vec!["P1", "P3", "P5"]);

        assert_eq!(got[0].get("ProteinName"), Some("Protein A"));
        assert_eq!(got[0].pid, 98.0);
    }

    #[test]
    fn merge_hits_empty_input() {
        use super::AnnotationConfig;
        use super::merge_hits;
        use crate::input::LineSource;
        use std::io::Cursor;

        let got = merge_hits(LineSource::new(Cursor::new(Vec::new())), &AnnotationConfig::default()).unwrap();

        assert!(got.is_empty());
    }
}
