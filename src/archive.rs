//! On-demand zip assembly of selected frames.
//!
//! [`ArchiveBuilder`] takes an ordered list of [`ArchiveItem`]s — locator,
//! display name, optional group — fetches each asset through the
//! [`ObjectStore`](crate::ObjectStore), and writes the successes into a
//! deflate-compressed zip. A single unreachable item never aborts the
//! build: every item's outcome lands in an [`ArchiveManifest`] returned
//! alongside the bytes, so a caller handing out a partial archive can
//! surface what is missing instead of hiding it behind an HTTP 200.
//!
//! Entry paths are `<group>/<display name>` when a group is present, else
//! just `<display name>`, with path separators and other disallowed
//! characters stripped from both components.

use std::io::{Cursor, Write};

use serde::{Deserialize, Serialize};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::{error::StillcutError, naming::sanitize_component, store::ObjectStore};

/// One requested archive member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveItem {
    /// Where the asset's bytes live (local path or remote URL).
    pub locator: String,
    /// File name inside the archive, pre-sanitization.
    pub display_name: String,
    /// Optional folder to group the entry under (typically the source
    /// video's name).
    #[serde(default)]
    pub group_name: Option<String>,
}

/// Outcome of one item in the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// Fetched and written into the archive at `archived_path`.
    Archived {
        /// Sanitized path of the entry inside the archive.
        archived_path: String,
    },
    /// Could not be fetched; excluded from the archive.
    Failed {
        /// Why the fetch failed.
        reason: String,
    },
}

/// Per-item ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// The locator that was requested.
    pub locator: String,
    /// The requested (pre-sanitization) display name.
    pub display_name: String,
    /// What happened to the item.
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

/// Success/failure ledger for one archive build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    /// One entry per requested item, in request order.
    pub entries: Vec<ManifestEntry>,
}

impl ArchiveManifest {
    /// Number of items written into the archive.
    pub fn archived(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.outcome, ItemOutcome::Archived { .. }))
            .count()
    }

    /// Number of items that failed to fetch.
    pub fn failed(&self) -> usize {
        self.entries.len() - self.archived()
    }
}

/// A finished archive: the zip bytes plus the build ledger.
#[derive(Debug)]
pub struct BuiltArchive {
    /// The complete zip file.
    pub bytes: Vec<u8>,
    /// Per-item outcomes.
    pub manifest: ArchiveManifest,
}

/// Assembles zip archives of frame assets.
pub struct ArchiveBuilder<'a> {
    store: &'a ObjectStore,
}

impl<'a> ArchiveBuilder<'a> {
    /// Create a builder that resolves locators through `store`.
    pub fn new(store: &'a ObjectStore) -> Self {
        Self { store }
    }

    /// Fetch every item and build the archive.
    ///
    /// Items are fetched one at a time and written entry-by-entry, so peak
    /// memory is bounded by the largest single item plus the compressed
    /// output. Fetch failures are recorded in the manifest and skipped; the
    /// archive is always produced, and an empty item list yields a
    /// well-formed empty archive.
    ///
    /// # Errors
    ///
    /// Only structural failures of the zip writer itself surface as
    /// errors. Per-item fetch failures do not.
    pub async fn build(&self, items: &[ArchiveItem]) -> Result<BuiltArchive, StillcutError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut manifest = ArchiveManifest::default();

        for item in items {
            let outcome = match self.store.fetch(&item.locator).await {
                Ok(bytes) => {
                    let archived_path = entry_path(item);
                    writer.start_file(&*archived_path, options)?;
                    writer.write_all(&bytes)?;
                    ItemOutcome::Archived { archived_path }
                }
                Err(error) => {
                    log::warn!(
                        "Archive item {:?} skipped: {error}",
                        item.display_name,
                    );
                    ItemOutcome::Failed {
                        reason: error.to_string(),
                    }
                }
            };

            manifest.entries.push(ManifestEntry {
                locator: item.locator.clone(),
                display_name: item.display_name.clone(),
                outcome,
            });
        }

        let cursor = writer.finish()?;

        log::info!(
            "Built archive: {} archived, {} failed, {} bytes",
            manifest.archived(),
            manifest.failed(),
            cursor.get_ref().len(),
        );

        Ok(BuiltArchive {
            bytes: cursor.into_inner(),
            manifest,
        })
    }
}

/// Compute the sanitized in-archive path for an item.
fn entry_path(item: &ArchiveItem) -> String {
    let file_name = sanitize_component(&item.display_name);
    match item
        .group_name
        .as_deref()
        .filter(|group| !group.is_empty())
    {
        Some(group) => format!("{}/{file_name}", sanitize_component(group)),
        None => file_name,
    }
}
