//! Schema discovery: union the paths of a file population into one table.
//!
//! Each file is flattened independently (and in parallel) into a [`FileScan`].
//! The scans are then merged strictly in file-name order by a single
//! [`SchemaBuilder`], which owns the [`TagAllocator`] for the build. Because
//! both the per-file walk and the merge order are fixed, the same population
//! always yields the same path-to-tag assignment.

use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::core::path::{is_events_path, is_fastq_path, is_signal_path, SchemaPath};
use crate::core::tree::Fast5File;
use crate::core::types::{Kind, OriginalType};
use crate::core::value::Value;
use crate::schema::table::{MappingEntry, SchemaError, SchemaTable};
use crate::schema::tag::TagAllocator;
use crate::utils::validation::normalize_read_path;

#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoveryOptions {
    /// Leave the raw signal and the Events derived from it out of the table
    pub skip_signal: bool,
}

/// One mapped node of a file, with its path already normalized
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedEntry<'a> {
    pub path: SchemaPath,
    pub original: OriginalType,
    pub value: &'a Value,
}

/// The flattened, filtered view of one file
#[derive(Debug, Clone)]
pub struct FileScan<'a> {
    pub file_name: String,
    /// Identifier stripped from `read_<id>` path segments
    pub read_id: Option<String>,
    pub entries: Vec<ScannedEntry<'a>>,
}

/// Whether a path never enters the mapping table
///
/// The embedded FASTQ text travels as the record's sequence, so its column is
/// never mapped; attributes on the FASTQ dataset are.
#[must_use]
pub fn is_excluded(path: &SchemaPath, options: &DiscoveryOptions) -> bool {
    if path.kind == Kind::Column && is_fastq_path(&path.node) {
        return true;
    }
    options.skip_signal && (is_signal_path(&path.node) || is_events_path(&path.node))
}

/// Flatten one file in canonical order, normalizing read ids and dropping
/// excluded paths.
#[must_use]
pub fn scan_file<'a>(file: &'a Fast5File, options: &DiscoveryOptions) -> FileScan<'a> {
    let mut read_id = None;
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for entry in file.entries() {
        let (node, id) = normalize_read_path(&entry.path.node);
        if read_id.is_none() {
            read_id = id;
        }
        let path = SchemaPath {
            node,
            ..entry.path
        };
        if is_excluded(&path, options) || !seen.insert(path.clone()) {
            continue;
        }
        entries.push(ScannedEntry {
            path,
            original: entry.dtype,
            value: entry.value,
        });
    }

    FileScan {
        file_name: file.name.clone(),
        read_id,
        entries,
    }
}

#[derive(Debug)]
struct PathStats {
    original: OriginalType,
    /// Files that carry this path
    files: usize,
    /// Attribute values by their text form, with the first decoded instance
    values: HashMap<String, (usize, Value)>,
}

impl PathStats {
    /// The value held by strictly more than half of the files with this path
    fn common_value(&self) -> Option<Value> {
        self.values
            .values()
            .find(|(count, _)| count * 2 > self.files)
            .map(|(_, value)| value.clone())
    }
}

/// Sequential merge of file scans into a [`SchemaTable`]
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    allocator: TagAllocator,
    order: Vec<SchemaPath>,
    stats: HashMap<SchemaPath, PathStats>,
    files: usize,
}

impl SchemaBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of scans merged so far
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files
    }

    /// Number of distinct paths seen so far
    #[must_use]
    pub fn path_count(&self) -> usize {
        self.order.len()
    }

    /// Merge one file's scan. Callers must add scans in a fixed order.
    pub fn add_scan(&mut self, scan: &FileScan<'_>) {
        self.files += 1;
        for entry in &scan.entries {
            let stats = match self.stats.get_mut(&entry.path) {
                Some(stats) => stats,
                None => {
                    self.order.push(entry.path.clone());
                    self.stats
                        .entry(entry.path.clone())
                        .or_insert_with(|| PathStats {
                            original: entry.original,
                            files: 0,
                            values: HashMap::new(),
                        })
                }
            };
            stats.files += 1;

            if entry.path.kind == Kind::Attribute && entry.value.matches(&stats.original) {
                stats
                    .values
                    .entry(entry.value.to_text())
                    .or_insert_with(|| (0, entry.value.clone()))
                    .0 += 1;
            }
        }
        debug!(
            "Merged {} ({} entries, {} paths total)",
            scan.file_name,
            scan.entries.len(),
            self.order.len()
        );
    }

    /// Assign tags in first-seen order and freeze the table.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::TagSpaceExhausted` naming the first path that
    /// could not get a tag.
    pub fn build(mut self) -> Result<SchemaTable, SchemaError> {
        self.allocator.reset();
        let mut entries = Vec::with_capacity(self.order.len());

        for path in self.order {
            let Some(stats) = self.stats.remove(&path) else {
                continue;
            };
            let tag = self
                .allocator
                .next_tag()
                .map_err(|_| SchemaError::TagSpaceExhausted { path: path.clone() })?;
            let common_value = match path.kind {
                Kind::Attribute => stats.common_value(),
                Kind::Column => None,
            };
            entries.push(MappingEntry {
                path,
                original: stats.original,
                tag,
                common_value,
            });
        }

        let with_common = entries.iter().filter(|e| e.common_value.is_some()).count();
        info!(
            "Schema built from {} files: {} entries, {} with a common value",
            self.files,
            entries.len(),
            with_common
        );
        SchemaTable::new(entries)
    }
}

/// Discover the schema of an in-memory population.
///
/// Files are scanned in parallel and merged by file name, so the caller's
/// ordering of `files` has no effect on the result.
///
/// # Errors
///
/// Returns `SchemaError::TagSpaceExhausted` if the population has more
/// distinct paths than there are tags.
pub fn discover(files: &[Fast5File], options: &DiscoveryOptions) -> Result<SchemaTable, SchemaError> {
    let mut scans: Vec<FileScan<'_>> = files
        .par_iter()
        .map(|file| scan_file(file, options))
        .collect();
    scans.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    let mut builder = SchemaBuilder::new();
    for scan in &scans {
        builder.add_scan(scan);
    }
    builder.build()
}
