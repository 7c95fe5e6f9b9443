//! CRAM archive access using noodles.
//!
//! The mapping table travels as `@CO` lines of the SAM header. Each read is an
//! unmapped record: the FASTQ basecalls (if any) fill the name, sequence and
//! quality fields and every mapped value is an aux field.
//!
//! Archives are written to a temporary file beside the destination and only
//! renamed into place by [`ArchiveWriter::finish`], so a failed or interrupted
//! run never leaves a partial archive behind.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use bstr::{BString, ByteSlice};
use noodles::cram;
use noodles::sam::{
    self,
    alignment::{
        io::Write as _,
        record::Flags,
        record_buf::{data::field::Value as AuxValue, QualityScores, Sequence},
        RecordBuf,
    },
};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

use crate::codec::encoder::ReadRecord;
use crate::schema::table::{SchemaError, SchemaTable};
use crate::schema::tag::Tag;

/// FASTQ quality characters are Phred scores offset by this value
const PHRED_OFFSET: u8 = 33;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid archive {path}: {message}")]
    Format { path: PathBuf, message: String },

    #[error("Quality string of {name} has a character below '!'")]
    InvalidQuality { name: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// One record as read back from an archive
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoredRead {
    pub name: Option<String>,
    pub sequence: Vec<u8>,
    /// Phred+33 text, as in FASTQ
    pub quality: Vec<u8>,
    /// Every aux field, reserved tags included, in record order
    pub fields: Vec<(Tag, AuxValue)>,
}

impl StoredRead {
    #[must_use]
    pub fn from_record(record: &RecordBuf) -> Self {
        Self {
            name: record.name().map(|n| n.to_str_lossy().into_owned()),
            sequence: record.sequence().as_ref().to_vec(),
            quality: record
                .quality_scores()
                .as_ref()
                .iter()
                .map(|&q| q.saturating_add(PHRED_OFFSET))
                .collect(),
            fields: record
                .data()
                .iter()
                .map(|(tag, value)| (Tag::from(tag), value.clone()))
                .collect(),
        }
    }
}

/// Build the unmapped record for one encoded read
///
/// # Errors
///
/// Returns `ArchiveError::InvalidQuality` if a quality character is not
/// printable Phred+33.
pub fn to_record_buf(read: &ReadRecord) -> Result<RecordBuf, ArchiveError> {
    let mut record = RecordBuf::default();
    *record.flags_mut() = Flags::UNMAPPED;

    let name = match &read.sequence {
        Some(fastq) if !fastq.name.is_empty() => fastq.name.clone(),
        _ => Path::new(&read.file_name)
            .file_stem()
            .map_or_else(|| read.file_name.clone(), |s| s.to_string_lossy().into_owned()),
    };
    *record.name_mut() = Some(BString::from(name.as_str()));

    if let Some(fastq) = &read.sequence {
        let quality = fastq
            .quality
            .iter()
            .map(|&c| c.checked_sub(PHRED_OFFSET))
            .collect::<Option<Vec<u8>>>()
            .ok_or(ArchiveError::InvalidQuality { name })?;
        *record.sequence_mut() = Sequence::from(fastq.sequence.clone());
        *record.quality_scores_mut() = QualityScores::from(quality);
    }

    *record.data_mut() = read
        .aux_fields()
        .into_iter()
        .map(|(tag, value)| (tag.into(), value))
        .collect();

    Ok(record)
}

/// SAM header carrying the mapping table as comments
#[must_use]
pub fn build_header(table: &SchemaTable) -> sam::Header {
    table
        .to_header_lines()
        .into_iter()
        .fold(
            sam::Header::builder().set_header(Default::default()),
            |builder, line| builder.add_comment(line),
        )
        .build()
}

/// Appends records to a new archive; see the module docs for atomicity
pub struct ArchiveWriter {
    writer: cram::io::Writer<File>,
    header: sam::Header,
    temp: NamedTempFile,
    destination: PathBuf,
    records: usize,
}

impl ArchiveWriter {
    /// Start an archive at `destination` and commit the header.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::Io` if the temporary file cannot be created or
    /// the header cannot be written.
    pub fn create(destination: &Path, table: &SchemaTable) -> Result<Self, ArchiveError> {
        let io_error = |source| ArchiveError::Io {
            path: destination.to_path_buf(),
            source,
        };

        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp = tempfile::Builder::new()
            .prefix(".fast5cram-")
            .suffix(".cram.tmp")
            .tempfile_in(dir)
            .map_err(io_error)?;
        let file = temp.as_file().try_clone().map_err(io_error)?;

        let header = build_header(table);
        let mut writer = cram::io::writer::Builder::default().build_from_writer(file);
        writer.write_alignment_header(&header).map_err(io_error)?;
        debug!(
            "Wrote archive header with {} mapping entries to {}",
            table.len(),
            temp.path().display()
        );

        Ok(Self {
            writer,
            header,
            temp,
            destination: destination.to_path_buf(),
            records: 0,
        })
    }

    /// Append one record
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::Io` if the record cannot be written.
    pub fn write(&mut self, read: &ReadRecord) -> Result<(), ArchiveError> {
        let record = to_record_buf(read)?;
        self.writer
            .write_alignment_record(&self.header, &record)
            .map_err(|source| ArchiveError::Io {
                path: self.destination.clone(),
                source,
            })?;
        self.records += 1;
        Ok(())
    }

    #[must_use]
    pub fn records_written(&self) -> usize {
        self.records
    }

    /// Flush the last container and move the archive into place.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::Io` if flushing or the final rename fails; the
    /// temporary file is removed in that case.
    pub fn finish(mut self) -> Result<usize, ArchiveError> {
        let destination = self.destination.clone();
        let io_error = |source| ArchiveError::Io {
            path: destination.clone(),
            source,
        };

        self.writer.finish(&self.header).map_err(io_error)?;
        drop(self.writer);
        self.temp.as_file().sync_all().map_err(io_error)?;
        self.temp
            .persist(&self.destination)
            .map_err(|e| io_error(e.error))?;

        info!(
            "Wrote {} records to {}",
            self.records,
            self.destination.display()
        );
        Ok(self.records)
    }
}

/// Reads the mapping table and then the records of an archive
pub struct ArchiveReader {
    reader: cram::io::Reader<File>,
    header: sam::Header,
    table: SchemaTable,
    path: PathBuf,
}

impl ArchiveReader {
    /// Open an archive and recover its mapping table.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::Io` or `ArchiveError::Format` if the file is not
    /// a readable CRAM file, and `ArchiveError::Schema` if the header has no
    /// mapping table or a corrupt one.
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let mut reader = File::open(path)
            .map(cram::io::Reader::new)
            .map_err(|source| ArchiveError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let format_error = |e: io::Error| ArchiveError::Format {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        reader.read_file_definition().map_err(format_error)?;
        let header = reader.read_file_header().map_err(format_error)?;

        let comments = header
            .comments()
            .iter()
            .map(|c| c.to_str_lossy().into_owned());
        let table = SchemaTable::from_header_lines(comments)?;
        debug!(
            "Read mapping table with {} entries from {}",
            table.len(),
            path.display()
        );

        Ok(Self {
            reader,
            header,
            table,
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn table(&self) -> &SchemaTable {
        &self.table
    }

    #[must_use]
    pub fn into_table(self) -> SchemaTable {
        self.table
    }

    /// Iterate over the stored records in archive order
    ///
    /// The iterator is fused: once the last record has been returned it keeps
    /// returning `None` instead of reading past the end of the stream.
    pub fn records(&mut self) -> impl Iterator<Item = Result<StoredRead, ArchiveError>> + '_ {
        let header = &self.header;
        let path = &self.path;
        self.reader.records(header).fuse().map(move |result| {
            let format_error = |e: io::Error| ArchiveError::Format {
                path: path.clone(),
                message: e.to_string(),
            };
            let record = result.map_err(format_error)?;
            let record = RecordBuf::try_from_alignment_record(header, &record).map_err(format_error)?;
            Ok(StoredRead::from_record(&record))
        })
    }
}
