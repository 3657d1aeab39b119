//! Tag derivation from extracted metadata.

use std::collections::BTreeSet;

use crate::models::{Field, MetadataRecord};
use crate::munge::munge_tag;

/// Fields whose values become tags, in evaluation order.
pub const TAG_SOURCES: &[Field] = &[
    Field::Source,
    Field::Contributor,
    Field::Creator,
    Field::Publisher,
    Field::ScanResolution,
    Field::ScanColorDepth,
    Field::ScanDevice,
];

/// Builds the normalized tag set for a record.
///
/// Absent values and values that munge to nothing are skipped. Source codes
/// such as `NEAT#12-3` are split into words before munging.
pub fn build_tags(record: &MetadataRecord) -> BTreeSet<String> {
    TAG_SOURCES
        .iter()
        .filter_map(|&field| {
            let value = record.get(field)?;
            let candidate = if field == Field::Source {
                value.replace(['#', '-'], " ")
            } else {
                value.to_string()
            };
            munge_tag(&candidate)
        })
        .collect()
}
