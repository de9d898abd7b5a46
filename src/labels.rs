//! Classification label persistence.
//!
//! Labels are opaque strings a human operator attaches to frame ids. They
//! are persisted as a two-column CSV (`image_id,classification`), the format
//! the classification frontend produces and consumes. Pure transformation —
//! no state machine here.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::StillcutError;

/// One (frame id, label) pair.
///
/// The CSV column names are part of the on-disk format and predate this
/// crate, hence the serde renames.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelEntry {
    /// Id of the labelled frame.
    #[serde(rename = "image_id")]
    pub frame_id: String,
    /// Operator-supplied classification. Opaque to this crate.
    #[serde(rename = "classification")]
    pub label: String,
}

/// Serialize labels to CSV, header included.
///
/// # Errors
///
/// [`StillcutError::Csv`] on serialization failure, [`StillcutError::Io`]
/// when flushing the underlying writer fails.
pub fn write_labels<W: Write>(writer: W, labels: &[LabelEntry]) -> Result<(), StillcutError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for entry in labels {
        csv_writer.serialize(entry)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Read labels back from CSV produced by [`write_labels`] (or any file with
/// the same header).
///
/// Rows with missing columns surface as errors; an empty file with just the
/// header yields an empty vec.
pub fn read_labels<R: Read>(reader: R) -> Result<Vec<LabelEntry>, StillcutError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut labels = Vec::new();
    for row in csv_reader.deserialize() {
        labels.push(row?);
    }
    Ok(labels)
}
