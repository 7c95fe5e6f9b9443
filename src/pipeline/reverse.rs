//! CRAM archive to a directory of Fast5 files.
//!
//! The table is parsed once; records are then decoded and written in parallel,
//! a chunk at a time. A record that cannot be decoded is skipped and reported
//! without stopping the rest of the restore.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::codec::decoder::{DecodedRead, Decoder};
use crate::io::archive::{ArchiveReader, StoredRead};
use crate::io::fast5::Fast5Writer;
use crate::pipeline::{ConvertError, DEFAULT_CHUNK_SIZE};

#[derive(Debug, Clone)]
pub struct ReverseOptions {
    pub input_file: PathBuf,
    pub output_dir: PathBuf,
    /// Records held in memory at once
    pub chunk_size: usize,
}

impl ReverseOptions {
    pub fn new(input_file: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_file: input_file.into(),
            output_dir: output_dir.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// A record that produced no file
#[derive(Debug, Clone, Serialize)]
pub struct SkippedRecord {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReverseSummary {
    pub records: usize,
    pub restored: usize,
    /// Records dropped by the decoder, e.g. for a stale tag
    pub skipped: Vec<SkippedRecord>,
    /// Decoded records whose file could not be written
    pub failed: Vec<SkippedRecord>,
    /// Values restored with a different type than recorded
    pub advisories: usize,
    pub output_dir: PathBuf,
}

impl ReverseSummary {
    /// Every record produced a file
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }
}

/// Make `name` unique among the files of this run
fn unique_name(name: &str, index: usize, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map_or_else(|| name.to_string(), |s| s.to_string_lossy().into_owned());
    let renamed = match path.extension() {
        Some(ext) => format!("{stem}_{index}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{index}"),
    };
    warn!("Record {index}: {name} already restored, writing {renamed}");
    used.insert(renamed.clone());
    renamed
}

struct Chunk<'a> {
    decoder: &'a Decoder<'a>,
    output_dir: &'a Path,
    used: HashSet<String>,
}

impl Chunk<'_> {
    fn process<W: Fast5Writer + ?Sized>(
        &mut self,
        writer: &W,
        first: usize,
        reads: &[StoredRead],
        summary: &mut ReverseSummary,
    ) {
        let decoder = self.decoder;
        let decoded: Vec<_> = reads
            .par_iter()
            .enumerate()
            .map(|(offset, read)| decoder.decode(read, first + offset))
            .collect();

        let mut ready: Vec<(usize, DecodedRead)> = Vec::with_capacity(decoded.len());
        for (offset, result) in decoded.into_iter().enumerate() {
            let index = first + offset;
            match result {
                Ok(mut read) => {
                    read.file.name = unique_name(&read.file.name, index, &mut self.used);
                    summary.advisories += read.advisories.len();
                    ready.push((index, read));
                }
                Err(e) => {
                    warn!("Skipping record: {e}");
                    summary.skipped.push(SkippedRecord {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let output_dir = self.output_dir;
        let written: Vec<_> = ready
            .par_iter()
            .map(|(index, read)| {
                let path = output_dir.join(&read.file.name);
                (*index, writer.write(&path, &read.file))
            })
            .collect();

        for (index, result) in written {
            match result {
                Ok(()) => summary.restored += 1,
                Err(e) => {
                    warn!("Record {index}: {e}");
                    summary.failed.push(SkippedRecord {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}

/// Restore every record of an archive into `output_dir`.
///
/// # Errors
///
/// Returns `ConvertError` if the archive cannot be opened, has no usable
/// mapping table, or is truncated. Per-record failures are reported in the
/// summary instead.
pub fn reverse_convert<W: Fast5Writer + ?Sized>(
    writer: &W,
    options: &ReverseOptions,
) -> Result<ReverseSummary, ConvertError> {
    let mut reader = ArchiveReader::open(&options.input_file)?;
    std::fs::create_dir_all(&options.output_dir).map_err(|source| ConvertError::Io {
        path: options.output_dir.clone(),
        source,
    })?;

    let table = reader.table().clone();
    let decoder = Decoder::new(&table);
    let mut chunk = Chunk {
        decoder: &decoder,
        output_dir: &options.output_dir,
        used: HashSet::new(),
    };
    let mut summary = ReverseSummary {
        output_dir: options.output_dir.clone(),
        ..ReverseSummary::default()
    };

    let chunk_size = options.chunk_size.max(1);
    let mut records = reader.records();
    loop {
        let reads = records
            .by_ref()
            .take(chunk_size)
            .collect::<Result<Vec<_>, _>>()?;
        if reads.is_empty() {
            break;
        }
        chunk.process(writer, summary.records, &reads, &mut summary);
        summary.records += reads.len();
        if reads.len() < chunk_size {
            break;
        }
    }

    info!(
        "Restored {} of {} records into {} ({} skipped, {} failed)",
        summary.restored,
        summary.records,
        options.output_dir.display(),
        summary.skipped.len(),
        summary.failed.len()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_name() {
        let mut used = HashSet::new();
        assert_eq!(unique_name("read_1.fast5", 0, &mut used), "read_1.fast5");
        assert_eq!(unique_name("read_1.fast5", 4, &mut used), "read_1_4.fast5");
        assert_eq!(unique_name("read_2.fast5", 5, &mut used), "read_2.fast5");
    }
}
