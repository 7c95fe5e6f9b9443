//! Forward encoding: one Fast5 file to one archive record.

use bstr::BString;
use noodles::sam::alignment::record_buf::data::field::Value as AuxValue;
use thiserror::Error;
use tracing::debug;

use crate::codec::aux::{to_aux, AuxError};
use crate::core::path::{is_fastq_path, SchemaPath};
use crate::core::tree::Fast5File;
use crate::core::types::{Kind, OriginalType};
use crate::core::value::Value;
use crate::io::fastq::{parse_fastq_text, FastqError, FastqRead};
use crate::schema::discovery::{scan_file, DiscoveryOptions};
use crate::schema::table::SchemaTable;
use crate::schema::tag::{
    Tag, FASTQ_DESCRIPTION_TAG, FASTQ_PATH_TAG, FASTQ_TEXT_TAG, FILENAME_TAG, READ_ID_TAG,
};
use crate::utils::validation::escape;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("{file}: path {path} is not in the mapping table")]
    UnknownPath { file: String, path: SchemaPath },

    #[error("{file}: value at {path} does not match mapped type {expected}")]
    TypeMismatch {
        file: String,
        path: SchemaPath,
        expected: OriginalType,
    },

    #[error("{file}: cannot encode {path}: {source}")]
    Aux {
        file: String,
        path: SchemaPath,
        #[source]
        source: AuxError,
    },

    #[error("{file}: embedded FASTQ: {source}")]
    Fastq {
        file: String,
        #[source]
        source: FastqError,
    },
}

/// One encoded read, ready to be appended to the archive
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRecord {
    pub file_name: String,
    pub read_id: Option<String>,
    /// Path of the embedded FASTQ dataset, when the file had one
    pub fastq_path: Option<String>,
    /// Embedded FASTQ text that `sequence` does not reproduce, kept verbatim
    pub fastq_text: Option<String>,
    pub sequence: Option<FastqRead>,
    /// Mapped tags in table order
    pub fields: Vec<(Tag, AuxValue)>,
}

impl ReadRecord {
    #[must_use]
    pub fn field(&self, tag: Tag) -> Option<&AuxValue> {
        self.fields
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, value)| value)
    }

    /// All aux fields to write, reserved tags first
    #[must_use]
    pub fn aux_fields(&self) -> Vec<(Tag, AuxValue)> {
        let mut fields = Vec::with_capacity(self.fields.len() + 5);
        if let Some(id) = &self.read_id {
            fields.push((READ_ID_TAG, AuxValue::String(BString::from(id.as_str()))));
        }
        fields.push((
            FILENAME_TAG,
            AuxValue::String(BString::from(self.file_name.as_str())),
        ));
        if let Some(path) = &self.fastq_path {
            fields.push((FASTQ_PATH_TAG, AuxValue::String(BString::from(path.as_str()))));
        }
        if let Some(read) = self.sequence.as_ref().filter(|r| !r.description.is_empty()) {
            fields.push((
                FASTQ_DESCRIPTION_TAG,
                AuxValue::String(BString::from(read.description.as_str())),
            ));
        }
        if let Some(text) = &self.fastq_text {
            fields.push((
                FASTQ_TEXT_TAG,
                AuxValue::String(BString::from(escape(text, &[]))),
            ));
        }
        fields.extend(self.fields.iter().cloned());
        fields
    }
}

/// Resolves files against a frozen [`SchemaTable`]
#[derive(Debug, Clone, Copy)]
pub struct Encoder<'a> {
    table: &'a SchemaTable,
    options: DiscoveryOptions,
}

impl<'a> Encoder<'a> {
    /// The options must be the ones the table was discovered with
    #[must_use]
    pub fn new(table: &'a SchemaTable, options: DiscoveryOptions) -> Self {
        Self { table, options }
    }

    /// Encode one file.
    ///
    /// Attribute values equal to their entry's common value are left out;
    /// columns are always written. A supplied FASTQ read takes precedence over
    /// basecalls embedded in the file.
    ///
    /// # Errors
    ///
    /// Returns `EncodeError::UnknownPath` if the file has a path the table
    /// lacks, or a type error if a value does not fit its mapped type.
    pub fn encode(
        &self,
        file: &Fast5File,
        fastq: Option<FastqRead>,
    ) -> Result<ReadRecord, EncodeError> {
        let scan = scan_file(file, &self.options);
        let mut fields = Vec::with_capacity(scan.entries.len());
        let mut omitted = 0usize;

        for entry in &scan.entries {
            let mapping = self
                .table
                .get(&entry.path)
                .ok_or_else(|| EncodeError::UnknownPath {
                    file: file.name.clone(),
                    path: entry.path.clone(),
                })?;

            if !entry.value.matches(&mapping.original) {
                return Err(EncodeError::TypeMismatch {
                    file: file.name.clone(),
                    path: entry.path.clone(),
                    expected: mapping.original,
                });
            }

            // same equality discovery tallies by, so -0.0 is not 0.0
            if mapping.kind() == Kind::Attribute
                && mapping
                    .common_value
                    .as_ref()
                    .is_some_and(|common| common.to_text() == entry.value.to_text())
            {
                omitted += 1;
                continue;
            }

            let aux = to_aux(entry.value, &mapping.original).map_err(|source| EncodeError::Aux {
                file: file.name.clone(),
                path: entry.path.clone(),
                source,
            })?;
            fields.push((mapping.tag, aux));
        }

        let (fastq_path, embedded_text, embedded) = embedded_fastq(file)?;
        let sequence = fastq.or(embedded);
        let fastq_text = embedded_text
            .filter(|text| sequence.as_ref().map(FastqRead::to_text).as_ref() != Some(text));

        debug!(
            "Encoded {}: {} tags, {} common values omitted",
            file.name,
            fields.len(),
            omitted
        );

        Ok(ReadRecord {
            file_name: file.name.clone(),
            read_id: scan.read_id,
            fastq_path,
            fastq_text,
            sequence,
            fields,
        })
    }
}

type EmbeddedFastq = (Option<String>, Option<String>, Option<FastqRead>);

/// Find the basecaller's FASTQ dataset: its path, raw text and parsed read
fn embedded_fastq(file: &Fast5File) -> Result<EmbeddedFastq, EncodeError> {
    let found = file
        .entries()
        .into_iter()
        .find(|e| e.path.kind == Kind::Column && is_fastq_path(&e.path.node));
    let Some(entry) = found else {
        return Ok((None, None, None));
    };

    let (text, read) = match entry.value {
        Value::Str(text) => {
            let read = parse_fastq_text(text, &entry.path.node).map_err(|source| {
                EncodeError::Fastq {
                    file: file.name.clone(),
                    source,
                }
            })?;
            (Some(text.clone()), read)
        }
        _ => (None, None),
    };
    Ok((Some(entry.path.node), text, read))
}
