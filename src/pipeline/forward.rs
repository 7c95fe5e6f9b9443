//! Fast5 directory to CRAM archive.
//!
//! Two passes over the input: the first builds the mapping table, the second
//! encodes and appends records. Files are loaded a chunk at a time, processed
//! in parallel and handed to the single sequential consumer in name order.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::codec::encoder::{Encoder, ReadRecord};
use crate::io::archive::ArchiveWriter;
use crate::io::fast5::{list_fast5_files, Fast5Reader};
use crate::io::fastq::read_fastq_for;
use crate::pipeline::{ConvertError, DEFAULT_CHUNK_SIZE};
use crate::schema::discovery::{scan_file, DiscoveryOptions, FileScan, SchemaBuilder};
use crate::schema::table::SchemaTable;

#[derive(Debug, Clone)]
pub struct ForwardOptions {
    pub input_dir: PathBuf,
    pub output_file: PathBuf,
    /// Directory of `<stem>.fastq` files paired with the inputs
    pub fastq_dir: Option<PathBuf>,
    pub skip_signal: bool,
    /// Files held in memory at once
    pub chunk_size: usize,
}

impl ForwardOptions {
    pub fn new(input_dir: impl Into<PathBuf>, output_file: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_file: output_file.into(),
            fastq_dir: None,
            skip_signal: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    fn discovery(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            skip_signal: self.skip_signal,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ForwardSummary {
    pub files: usize,
    pub records: usize,
    pub mapping_entries: usize,
    pub common_values: usize,
    /// Records that carry basecalls
    pub with_sequence: usize,
    pub output: PathBuf,
    pub archive_bytes: u64,
}

/// Build the mapping table for every `.fast5` file in `files`.
///
/// # Errors
///
/// Returns `ConvertError::Schema` on tag exhaustion, or the reader's error for
/// the first file that cannot be read.
pub fn discover_files<R: Fast5Reader + ?Sized>(
    reader: &R,
    files: &[PathBuf],
    options: DiscoveryOptions,
    chunk_size: usize,
) -> Result<SchemaTable, ConvertError> {
    let mut builder = SchemaBuilder::new();

    for chunk in files.chunks(chunk_size.max(1)) {
        let loaded = chunk
            .par_iter()
            .map(|path| reader.read(path))
            .collect::<Result<Vec<_>, _>>()?;
        let scans: Vec<FileScan<'_>> = loaded
            .par_iter()
            .map(|file| scan_file(file, &options))
            .collect();
        for scan in &scans {
            builder.add_scan(scan);
        }
    }

    debug!(
        "Discovered {} paths in {} files",
        builder.path_count(),
        builder.file_count()
    );
    Ok(builder.build()?)
}

fn encode_file<R: Fast5Reader + ?Sized>(
    reader: &R,
    encoder: &Encoder<'_>,
    path: &Path,
    fastq_dir: Option<&Path>,
) -> Result<ReadRecord, ConvertError> {
    let file = reader.read(path)?;
    let fastq = match fastq_dir {
        Some(dir) => read_fastq_for(dir, path)?,
        None => None,
    };
    Ok(encoder.encode(&file, fastq)?)
}

/// Convert a directory of Fast5 files into one archive.
///
/// Nothing is written at `output_file` unless the whole run succeeds.
///
/// # Errors
///
/// Returns `ConvertError` for an empty input directory, tag exhaustion, any
/// unreadable input, or an archive write failure.
pub fn forward_convert<R: Fast5Reader + ?Sized>(
    reader: &R,
    options: &ForwardOptions,
) -> Result<ForwardSummary, ConvertError> {
    let files = list_fast5_files(&options.input_dir)?;
    info!(
        "Found {} Fast5 files in {}",
        files.len(),
        options.input_dir.display()
    );

    let discovery = options.discovery();
    let table = discover_files(reader, &files, discovery, options.chunk_size)?;
    let encoder = Encoder::new(&table, discovery);

    let mut writer = ArchiveWriter::create(&options.output_file, &table)?;
    let mut with_sequence = 0;

    for chunk in files.chunks(options.chunk_size.max(1)) {
        let records = chunk
            .par_iter()
            .map(|path| encode_file(reader, &encoder, path, options.fastq_dir.as_deref()))
            .collect::<Result<Vec<_>, _>>()?;
        for record in &records {
            if record.sequence.is_some() {
                with_sequence += 1;
            }
            writer.write(record)?;
        }
    }

    let records = writer.finish()?;
    let archive_bytes = std::fs::metadata(&options.output_file)
        .map(|m| m.len())
        .map_err(|source| ConvertError::Io {
            path: options.output_file.clone(),
            source,
        })?;

    Ok(ForwardSummary {
        files: files.len(),
        records,
        mapping_entries: table.len(),
        common_values: table
            .entries()
            .iter()
            .filter(|e| e.common_value.is_some())
            .count(),
        with_sequence,
        output: options.output_file.clone(),
        archive_bytes,
    })
}
