//! Label CSV round-trip tests.

use std::collections::HashSet;

use stillcut::{LabelEntry, read_labels, write_labels};

fn entry(frame_id: &str, label: &str) -> LabelEntry {
    LabelEntry {
        frame_id: frame_id.to_string(),
        label: label.to_string(),
    }
}

#[test]
fn round_trip_preserves_the_exact_set() {
    let labels = vec![
        entry("0d9a1c2e", "yes"),
        entry("4f5e6d7c", "no"),
        entry("8b9a0c1d", "yes"),
    ];

    let mut buffer = Vec::new();
    write_labels(&mut buffer, &labels).expect("write failed");
    let read_back = read_labels(buffer.as_slice()).expect("read failed");

    // Order-independent comparison.
    let written: HashSet<_> = labels.into_iter().collect();
    let read: HashSet<_> = read_back.into_iter().collect();
    assert_eq!(written, read);
}

#[test]
fn writes_the_expected_header_and_columns() {
    let mut buffer = Vec::new();
    write_labels(&mut buffer, &[entry("frame-1", "no")]).expect("write failed");

    let text = String::from_utf8(buffer).expect("CSV is not UTF-8");
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("image_id,classification"));
    assert_eq!(lines.next(), Some("frame-1,no"));
}

#[test]
fn empty_label_list_round_trips() {
    let mut buffer = Vec::new();
    write_labels(&mut buffer, &[]).expect("write failed");
    let read_back = read_labels(buffer.as_slice()).expect("read failed");
    assert!(read_back.is_empty());
}

#[test]
fn labels_with_commas_survive_quoting() {
    let labels = vec![entry("frame-2", "unsure, ask Dr. Lee")];

    let mut buffer = Vec::new();
    write_labels(&mut buffer, &labels).expect("write failed");
    let read_back = read_labels(buffer.as_slice()).expect("read failed");

    assert_eq!(read_back, labels);
}

#[test]
fn reading_garbage_is_an_error() {
    // A row with only one column cannot deserialize into a LabelEntry.
    let data = b"image_id,classification\nonly-one-column\n";
    assert!(read_labels(&data[..]).is_err());
}
