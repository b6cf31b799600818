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

/// Longest overlap allowed between two kept features, in nucleotides.
pub const MAX_OVERLAP: i64 = 60;

/// Remove overlapping features
///
/// `features` must be sorted by [absolute_start](Feature::absolute_start).
/// Each feature is compared with the last kept one, ending at `l_end`:
///
///   - Ends before `l_end`: replaces the last kept feature if it has a
///     higher [score](Feature::score), otherwise dropped.
///   - Starts before and ends exactly at `l_end`: dropped.
///   - Starts before and ends after `l_end`: kept if the overlap is shorter
///     than [MAX_OVERLAP], otherwise dropped.
///   - Starts at or after `l_end`: kept.
///
pub fn resolve_overlaps(
    features: Vec<Feature>,
) -> Vec<Feature> {
    let mut kept: Vec<Feature> = Vec::with_capacity(features.len());

    for feature in features {
        let Some(last) = kept.last_mut() else {
            kept.push(feature);
            continue;
        };

        let (q_start, q_end) = feature.span();
        let (_, l_end) = last.span();

        if q_start >= l_end {
            kept.push(feature);
        } else if q_end < l_end {
            if feature.score() > last.score() {
                log::debug!("{} replaces {} at {}..{}", feature.subject_id, last.subject_id, q_start, q_end);
                *last = feature;
            }
        } else if q_end == l_end {
            log::debug!("dropping {} at {}..{}, ends with {}", feature.subject_id, q_start, q_end, last.subject_id);
        } else if l_end - q_start < MAX_OVERLAP {
            kept.push(feature);
        } else {
            log::debug!("dropping {} at {}..{}, overlaps previous by {}", feature.subject_id, q_start, q_end, l_end - q_start);
        }
    }

    kept
}
