//! Reverse decoding: one archive record back to a Fast5 tree.

use bstr::ByteSlice;
use noodles::sam::alignment::record_buf::data::field::Value as AuxValue;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};

use crate::codec::aux::{from_aux, AuxError};
use crate::core::path::{is_fastq_path, SchemaPath, SIMPLE_COLUMN};
use crate::core::tree::{Attribute, Column, Fast5File};
use crate::core::types::{ElementType, Kind, OriginalType};
use crate::core::value::Value;
use crate::io::archive::StoredRead;
use crate::io::fastq::FastqRead;
use crate::schema::table::{MappingEntry, SchemaTable};
use crate::schema::tag::{
    Tag, FASTQ_DESCRIPTION_TAG, FASTQ_PATH_TAG, FASTQ_TEXT_TAG, FILENAME_TAG, READ_ID_TAG,
};
use crate::utils::validation::{restore_read_path, unescape, validate_filename};

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Record {record}: tag {tag} is not in the mapping table")]
    StaleTagReference { record: usize, tag: Tag },

    #[error("Record {record}: tag {tag} ({path}): {source}")]
    InvalidPayload {
        record: usize,
        tag: Tag,
        path: SchemaPath,
        #[source]
        source: AuxError,
    },

    #[error("Record {record}: reserved tag {tag} must hold a string")]
    InvalidReservedField { record: usize, tag: Tag },
}

impl DecodeError {
    /// Index of the record that failed
    #[must_use]
    pub fn record(&self) -> usize {
        match self {
            Self::StaleTagReference { record, .. }
            | Self::InvalidPayload { record, .. }
            | Self::InvalidReservedField { record, .. } => *record,
        }
    }
}

/// Non-fatal findings while rebuilding a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Advisory {
    /// The value was restored, but not with its exact original type
    TypeMismatchObserved {
        path: String,
        original: String,
        written: String,
    },
}

impl std::fmt::Display for Advisory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TypeMismatchObserved {
                path,
                original,
                written,
            } => write!(f, "{path}: stored as {original}, restored as {written}"),
        }
    }
}

/// Type a value is written back with when its original cannot be reproduced
///
/// Fixed-length strings are restored as variable-length strings: their
/// padding and termination are not kept in the archive.
#[must_use]
pub fn restored_type(original: &OriginalType) -> OriginalType {
    let element = match original.element {
        ElementType::FixedAscii(_) => ElementType::VarAscii,
        ElementType::FixedUnicode(_) => ElementType::VarUnicode,
        other => other,
    };
    OriginalType { element, ..*original }
}

/// One rebuilt file plus anything that could not be reproduced exactly
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRead {
    pub file: Fast5File,
    pub advisories: Vec<Advisory>,
}

/// Rebuilds files from archive records against a read-only [`SchemaTable`]
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    table: &'a SchemaTable,
    datasets: HashSet<&'a str>,
}

impl<'a> Decoder<'a> {
    #[must_use]
    pub fn new(table: &'a SchemaTable) -> Self {
        Self {
            table,
            datasets: table.dataset_paths(),
        }
    }

    /// Rebuild the file for record number `index`.
    ///
    /// Attributes the record lacks fall back to their common value; columns
    /// have no fallback and are simply absent.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::StaleTagReference` if the record carries a tag
    /// the table does not know, or `DecodeError::InvalidPayload` if a value
    /// cannot be read as its mapped type. Either way only this record is lost.
    pub fn decode(&self, read: &StoredRead, index: usize) -> Result<DecodedRead, DecodeError> {
        let mut payloads: HashMap<Tag, &AuxValue> = HashMap::with_capacity(read.fields.len());
        let mut reserved: HashMap<Tag, String> = HashMap::new();

        for (tag, value) in &read.fields {
            if tag.is_reserved() {
                let text = match value {
                    AuxValue::String(s) => s.to_str_lossy().into_owned(),
                    _ => {
                        return Err(DecodeError::InvalidReservedField {
                            record: index,
                            tag: *tag,
                        })
                    }
                };
                reserved.insert(*tag, text);
            } else if self.table.get_by_tag(*tag).is_some() {
                payloads.insert(*tag, value);
            } else {
                return Err(DecodeError::StaleTagReference {
                    record: index,
                    tag: *tag,
                });
            }
        }

        let read_id = reserved.get(&READ_ID_TAG).map(String::as_str);
        let mut file = Fast5File::new(file_name(reserved.get(&FILENAME_TAG), index));
        let mut advisories = Vec::new();

        for entry in self.table.entries() {
            let value = match (payloads.get(&entry.tag), entry.kind()) {
                (Some(aux), _) => {
                    from_aux(aux, &entry.original).map_err(|source| DecodeError::InvalidPayload {
                        record: index,
                        tag: entry.tag,
                        path: entry.path.clone(),
                        source,
                    })?
                }
                (None, Kind::Attribute) => match &entry.common_value {
                    Some(value) => value.clone(),
                    None => continue,
                },
                (None, Kind::Column) => continue,
            };

            let node = restore_read_path(&entry.path.node, read_id);
            let dtype = restored_type(&entry.original);
            if dtype != entry.original {
                let advisory = Advisory::TypeMismatchObserved {
                    path: SchemaPath {
                        node: node.clone(),
                        ..entry.path.clone()
                    }
                    .full(),
                    original: entry.original.to_string(),
                    written: dtype.to_string(),
                };
                warn!("{}: {advisory}", file.name);
                advisories.push(advisory);
            }
            self.place(&mut file, entry, &node, dtype, value);
        }

        if let Some(path) = reserved.get(&FASTQ_PATH_TAG) {
            let text = match reserved.get(&FASTQ_TEXT_TAG) {
                Some(escaped) => unescape(escaped).ok_or(DecodeError::InvalidReservedField {
                    record: index,
                    tag: FASTQ_TEXT_TAG,
                })?,
                None => FastqRead {
                    name: read.name.clone().unwrap_or_default(),
                    description: reserved
                        .get(&FASTQ_DESCRIPTION_TAG)
                        .cloned()
                        .unwrap_or_default(),
                    sequence: read.sequence.clone(),
                    quality: read.quality.clone(),
                }
                .to_text(),
            };
            let dataset = file.ensure_dataset(path);
            dataset.columns.insert(
                0,
                Column::new(
                    SIMPLE_COLUMN,
                    OriginalType::scalar(ElementType::VarAscii),
                    Value::Str(text),
                ),
            );
        }

        debug!(
            "Decoded record {index} as {} ({} tags)",
            file.name,
            read.fields.len()
        );
        Ok(DecodedRead { file, advisories })
    }

    fn place(
        &self,
        file: &mut Fast5File,
        entry: &MappingEntry,
        node: &str,
        dtype: OriginalType,
        value: Value,
    ) {
        match entry.kind() {
            Kind::Column => {
                file.ensure_dataset(node)
                    .columns
                    .push(Column::new(entry.path.name.clone(), dtype, value));
            }
            Kind::Attribute => {
                let attribute = Attribute::new(entry.path.name.clone(), dtype, value);
                let on_dataset = self.datasets.contains(entry.path.node.as_str())
                    || is_fastq_path(&entry.path.node);
                if on_dataset {
                    file.ensure_dataset(node).attributes.push(attribute);
                } else {
                    file.ensure_group(node).attributes.push(attribute);
                }
            }
        }
    }
}

/// Output name from the stored filename, or a numbered fallback
fn file_name(stored: Option<&String>, index: usize) -> String {
    match stored.map(|name| validate_filename(name)) {
        Some(Ok(name)) => name,
        Some(Err(e)) => {
            warn!("Record {index}: unusable stored filename: {e}");
            format!("read_{index}.fast5")
        }
        None => format!("read_{index}.fast5"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tree::{Dataset, Group};
    use crate::schema::tag::FIRST_TAG;
    use bstr::BString;
    use noodles::sam::alignment::record_buf::data::field::value::Array;

    fn entry(path: SchemaPath, code: &str, tag: &str, common: Option<Value>) -> MappingEntry {
        MappingEntry {
            path,
            original: code.parse().unwrap(),
            tag: tag.parse().unwrap(),
            common_value: common,
        }
    }

    fn table() -> SchemaTable {
        SchemaTable::new(vec![
            entry(
                SchemaPath::attribute("/cal", "genome_name"),
                "vS",
                "a0",
                Some(Value::Str("Lambda_3.6kb".into())),
            ),
            entry(
                SchemaPath::attribute("/Raw/Reads/Read_XXX", "read_number"),
                "u4",
                "a1",
                None,
            ),
            entry(
                SchemaPath::column("/Raw/Reads/Read_XXX/Signal", SIMPLE_COLUMN),
                "i2[]",
                "a2",
                None,
            ),
            entry(
                SchemaPath::attribute("/Raw/Reads/Read_XXX/Signal", "units"),
                "S2",
                "a3",
                None,
            ),
        ])
        .unwrap()
    }

    fn stored(fields: Vec<(Tag, AuxValue)>) -> StoredRead {
        StoredRead {
            name: Some("read_5".into()),
            sequence: Vec::new(),
            quality: Vec::new(),
            fields,
        }
    }

    fn text(s: &str) -> AuxValue {
        AuxValue::String(BString::from(s))
    }

    #[test]
    fn test_common_value_fallback() {
        let table = table();
        let decoded = Decoder::new(&table)
            .decode(&stored(vec![(FILENAME_TAG, text("read_5.fast5"))]), 0)
            .unwrap();

        assert_eq!(decoded.file.name, "read_5.fast5");
        assert_eq!(
            decoded.file.attribute("/cal", "genome_name").unwrap().value,
            Value::Str("Lambda_3.6kb".into())
        );
        // no tag, no common value
        assert!(decoded.file.group("/Raw").is_none());
    }

    #[test]
    fn test_record_value_overrides_common_value() {
        let table = table();
        let decoded = Decoder::new(&table)
            .decode(&stored(vec![(FIRST_TAG, text("Other"))]), 1)
            .unwrap();
        assert_eq!(
            decoded.file.attribute("/cal", "genome_name").unwrap().value,
            Value::Str("Other".into())
        );
        assert_eq!(decoded.file.name, "read_1.fast5");
    }

    #[test]
    fn test_read_id_restored_and_dataset_rebuilt() {
        let table = table();
        let fields = vec![
            (READ_ID_TAG, text("5")),
            ("a1".parse().unwrap(), AuxValue::UInt32(5)),
            ("a2".parse().unwrap(), AuxValue::Array(Array::Int16(vec![1, 2]))),
            ("a3".parse().unwrap(), text("pA")),
        ];
        let decoded = Decoder::new(&table).decode(&stored(fields), 0).unwrap();

        let read_group: &Group = decoded.file.group("/Raw/Reads/Read_5").unwrap();
        assert_eq!(read_group.attributes[0].value, Value::UInt(5));

        let signal: &Dataset = decoded.file.dataset("/Raw/Reads/Read_5/Signal").unwrap();
        assert_eq!(signal.columns[0].values, Value::IntArray(vec![1, 2]));
        assert_eq!(signal.attributes[0].name, "units");
    }

    #[test]
    fn test_fixed_string_raises_advisory() {
        let table = table();
        let fields = vec![("a3".parse().unwrap(), text("pA"))];
        let decoded = Decoder::new(&table).decode(&stored(fields), 0).unwrap();

        assert_eq!(
            decoded.advisories,
            vec![Advisory::TypeMismatchObserved {
                path: "/Raw/Reads/Read_XXX/Signal/units".into(),
                original: "S2".into(),
                written: "vS".into(),
            }]
        );
        let units = decoded
            .file
            .attribute("/Raw/Reads/Read_XXX/Signal", "units")
            .unwrap();
        assert_eq!(units.dtype, "vS".parse().unwrap());
    }

    #[test]
    fn test_stale_tag_reference() {
        let table = table();
        let read = stored(vec![("zz".parse().unwrap(), text("x"))]);
        let result = Decoder::new(&table).decode(&read, 4);
        match result {
            Err(DecodeError::StaleTagReference { record, tag }) => {
                assert_eq!(record, 4);
                assert_eq!(tag.to_string(), "zz");
            }
            other => panic!("expected StaleTagReference, got {other:?}"),
        }
    }

    #[test]
    fn test_embedded_fastq_restored() {
        let table = table();
        let mut read = stored(vec![
            (
                FASTQ_PATH_TAG,
                text("/Analyses/Basecall_1D_000/BaseCalled_template/Fastq"),
            ),
            (FASTQ_DESCRIPTION_TAG, text("runid=abc")),
        ]);
        read.sequence = b"ACGT".to_vec();
        read.quality = b"!!##".to_vec();

        let decoded = Decoder::new(&table).decode(&read, 0).unwrap();
        let fastq = decoded
            .file
            .dataset("/Analyses/Basecall_1D_000/BaseCalled_template/Fastq")
            .unwrap();
        assert_eq!(
            fastq.columns[0].values,
            Value::Str("@read_5 runid=abc\nACGT\n+\n!!##\n".into())
        );
    }

    #[test]
    fn test_kept_fastq_text_wins_over_sequence() {
        let node = "/Analyses/Basecall_1D_000/BaseCalled_template/Fastq";
        let table = SchemaTable::new(vec![entry(
            SchemaPath::attribute(node, "basecaller"),
            "vS",
            "a0",
            None,
        )])
        .unwrap();
        let mut read = stored(vec![
            (FASTQ_PATH_TAG, text(node)),
            (FASTQ_TEXT_TAG, text("@orig\\nAC\\n+\\n##\\n")),
            ("a0".parse().unwrap(), text("guppy")),
        ]);
        read.sequence = b"GGGG".to_vec();
        read.quality = b"IIII".to_vec();

        let decoded = Decoder::new(&table).decode(&read, 0).unwrap();
        let fastq = decoded.file.dataset(node).unwrap();
        assert_eq!(fastq.columns.len(), 1);
        assert_eq!(
            fastq.columns[0].values,
            Value::Str("@orig\nAC\n+\n##\n".into())
        );
        assert_eq!(fastq.attributes[0].name, "basecaller");
        assert!(decoded.file.group(node).is_none());
    }

    #[test]
    fn test_unsafe_filename_falls_back() {
        let table = table();
        let decoded = Decoder::new(&table)
            .decode(&stored(vec![(FILENAME_TAG, text("../../etc/passwd"))]), 3)
            .unwrap();
        assert_eq!(decoded.file.name, "read_3.fast5");
    }
}
