use serde::Serialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::core::path::SchemaPath;
use crate::core::types::{Kind, OriginalType};
use crate::core::value::Value;
use crate::schema::tag::{Tag, TagError};
use crate::utils::validation::{compute_signature, escape, unescape};

/// Version written into the mapping marker line
pub const MAPPING_VERSION: &str = "v1";

/// Prefix of the marker comment that precedes the mapping entries
pub const MAPPING_MARKER: &str = "FAST5-MAPPING:";

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Tag space exhausted while assigning a tag to {path}")]
    TagSpaceExhausted { path: SchemaPath },

    #[error("Mapping table not found in archive header")]
    MappingHeaderMissing,

    #[error("Mapping table in archive header is corrupt: {0}")]
    MappingHeaderCorrupt(String),

    #[error(transparent)]
    Tag(#[from] TagError),
}

/// One row of the mapping table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingEntry {
    pub path: SchemaPath,
    pub original: OriginalType,
    pub tag: Tag,
    /// Majority value, only ever set for attributes
    pub common_value: Option<Value>,
}

impl MappingEntry {
    #[must_use]
    pub fn kind(&self) -> Kind {
        self.path.kind
    }

    /// Serialize as `ATR:'<path>':<type> TG:<tag>[ CV:<value>]`
    #[must_use]
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "{}:'{}':{} TG:{}",
            self.path.kind,
            escape(&self.path.full(), &['\'']),
            self.original,
            self.tag
        );
        if let Some(value) = &self.common_value {
            line.push_str(" CV:");
            line.push_str(&value.to_text());
        }
        line
    }

    /// Parse one entry line
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::MappingHeaderCorrupt` naming the offending line.
    pub fn from_line(line: &str) -> Result<Self, SchemaError> {
        let corrupt = |reason: &str| {
            SchemaError::MappingHeaderCorrupt(format!("{reason} in entry \"{line}\""))
        };

        let (kind, rest) = if let Some(rest) = line.strip_prefix("ATR:'") {
            (Kind::Attribute, rest)
        } else if let Some(rest) = line.strip_prefix("COL:'") {
            (Kind::Column, rest)
        } else {
            return Err(corrupt("unknown entry kind"));
        };

        let end = find_closing_quote(rest).ok_or_else(|| corrupt("unterminated path"))?;
        let full = unescape(&rest[..end]).ok_or_else(|| corrupt("bad escape in path"))?;
        let path = SchemaPath::from_full(&full, kind).ok_or_else(|| corrupt("invalid path"))?;

        let rest = rest[end + 1..]
            .strip_prefix(':')
            .ok_or_else(|| corrupt("missing type code"))?;
        let (type_code, rest) = rest
            .split_once(" TG:")
            .ok_or_else(|| corrupt("missing tag"))?;
        let original: OriginalType = type_code
            .parse()
            .map_err(|_| corrupt("invalid type code"))?;

        let (tag_text, common_text) = match rest.split_once(" CV:") {
            Some((tag, value)) => (tag, Some(value)),
            None => (rest, None),
        };
        let tag: Tag = tag_text.parse().map_err(|_| corrupt("invalid tag"))?;

        let common_value = match common_text {
            Some(_) if kind == Kind::Column => {
                return Err(corrupt("common value on a column"));
            }
            Some(text) => Some(
                Value::from_text(text, &original).map_err(|_| corrupt("invalid common value"))?,
            ),
            None => None,
        };

        Ok(Self {
            path,
            original,
            tag,
            common_value,
        })
    }
}

/// Position of the first unescaped `'`
fn find_closing_quote(s: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '\'' => return Some(i),
            _ => {}
        }
    }
    None
}

/// The mapping table: built once per forward run, read once per reverse run,
/// read-only in between.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaTable {
    entries: Vec<MappingEntry>,
    #[serde(skip)]
    by_path: HashMap<SchemaPath, usize>,
    #[serde(skip)]
    by_tag: HashMap<Tag, usize>,
}

impl SchemaTable {
    /// Build a table from entries in tag order
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::MappingHeaderCorrupt` on a duplicate path or tag.
    pub fn new(entries: Vec<MappingEntry>) -> Result<Self, SchemaError> {
        let mut by_path = HashMap::with_capacity(entries.len());
        let mut by_tag = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            if entry.tag.is_reserved() || by_tag.insert(entry.tag, index).is_some() {
                return Err(SchemaError::MappingHeaderCorrupt(format!(
                    "tag {} assigned twice",
                    entry.tag
                )));
            }
            if by_path.insert(entry.path.clone(), index).is_some() {
                return Err(SchemaError::MappingHeaderCorrupt(format!(
                    "path {} mapped twice",
                    entry.path
                )));
            }
        }
        Ok(Self {
            entries,
            by_path,
            by_tag,
        })
    }

    #[must_use]
    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, path: &SchemaPath) -> Option<&MappingEntry> {
        self.by_path.get(path).map(|&i| &self.entries[i])
    }

    #[must_use]
    pub fn get_by_tag(&self, tag: Tag) -> Option<&MappingEntry> {
        self.by_tag.get(&tag).map(|&i| &self.entries[i])
    }

    /// Nodes that own at least one column; everything else is a group
    #[must_use]
    pub fn dataset_paths(&self) -> HashSet<&str> {
        self.entries
            .iter()
            .filter(|e| e.kind() == Kind::Column)
            .map(|e| e.path.node.as_str())
            .collect()
    }

    /// Header comment lines: the marker followed by one line per entry
    #[must_use]
    pub fn to_header_lines(&self) -> Vec<String> {
        let lines: Vec<String> = self.entries.iter().map(MappingEntry::to_line).collect();
        let marker = format!(
            "{MAPPING_MARKER}{MAPPING_VERSION} N:{} M5:{}",
            lines.len(),
            compute_signature(&lines)
        );
        std::iter::once(marker).chain(lines).collect()
    }

    /// Recover the table from header comment lines.
    ///
    /// Comments before the marker are ignored; the `N` lines after it must be
    /// entries whose checksum matches the marker.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::MappingHeaderMissing` if no marker is present, or
    /// `SchemaError::MappingHeaderCorrupt` if the marker or any entry is invalid.
    pub fn from_header_lines<I, S>(lines: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut lines = lines.into_iter();
        let marker = lines
            .by_ref()
            .find(|line| line.as_ref().starts_with(MAPPING_MARKER))
            .ok_or(SchemaError::MappingHeaderMissing)?;
        let (count, signature) = parse_marker(marker.as_ref())?;

        let entry_lines: Vec<String> = lines
            .take(count)
            .map(|line| line.as_ref().to_string())
            .collect();
        if entry_lines.len() != count {
            return Err(SchemaError::MappingHeaderCorrupt(format!(
                "expected {count} entries, found {}",
                entry_lines.len()
            )));
        }
        if compute_signature(&entry_lines) != signature {
            return Err(SchemaError::MappingHeaderCorrupt(
                "checksum mismatch".to_string(),
            ));
        }

        let entries = entry_lines
            .iter()
            .map(|line| MappingEntry::from_line(line))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(entries)
    }
}

fn parse_marker(marker: &str) -> Result<(usize, String), SchemaError> {
    let corrupt = || SchemaError::MappingHeaderCorrupt(format!("invalid marker \"{marker}\""));

    let body = &marker[MAPPING_MARKER.len()..];
    let mut fields = body.split(' ');
    let version = fields.next().ok_or_else(corrupt)?;
    if version != MAPPING_VERSION {
        return Err(SchemaError::MappingHeaderCorrupt(format!(
            "unsupported mapping version '{version}'"
        )));
    }

    let mut count = None;
    let mut signature = None;
    for field in fields {
        match field.split_once(':') {
            Some(("N", n)) => count = n.parse().ok(),
            Some(("M5", m5)) => signature = Some(m5.to_string()),
            _ => {}
        }
    }

    Ok((count.ok_or_else(corrupt)?, signature.ok_or_else(corrupt)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ElementType;

    fn entry(path: SchemaPath, code: &str, tag: &str, cv: Option<Value>) -> MappingEntry {
        MappingEntry {
            path,
            original: code.parse().unwrap(),
            tag: tag.parse().unwrap(),
            common_value: cv,
        }
    }

    fn sample_table() -> SchemaTable {
        SchemaTable::new(vec![
            entry(
                SchemaPath::attribute("/UniqueGlobalKey/context_tags", "sample_frequency"),
                "vS",
                "a0",
                Some(Value::Str("4000".into())),
            ),
            entry(
                SchemaPath::attribute("/cal", "genome_name"),
                "S12",
                "a1",
                Some(Value::Str("Lambda_3.6kb".into())),
            ),
            entry(
                SchemaPath::column("/Raw/Reads/Read_XXX/Signal", "noname"),
                "i2[]",
                "a2",
                None,
            ),
            entry(
                SchemaPath::attribute("/Raw/Reads/Read_XXX", "start_time"),
                "u8",
                "a3",
                None,
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_entry_line_format() {
        let table = sample_table();
        assert_eq!(
            table.entries()[1].to_line(),
            "ATR:'/cal/genome_name':S12 TG:a1 CV:Lambda_3.6kb"
        );
        assert_eq!(
            table.entries()[2].to_line(),
            "COL:'/Raw/Reads/Read_XXX/Signal/noname':i2[] TG:a2"
        );
    }

    #[test]
    fn test_header_round_trip() {
        let table = sample_table();
        let lines = table.to_header_lines();
        assert!(lines[0].starts_with("FAST5-MAPPING:v1 N:4 M5:"));

        let parsed = SchemaTable::from_header_lines(&lines).unwrap();
        assert_eq!(parsed.entries(), table.entries());
        assert_eq!(
            parsed.get_by_tag("a3".parse().unwrap()).unwrap().path.name,
            "start_time"
        );
    }

    #[test]
    fn test_header_ignores_other_comments() {
        let mut lines = vec!["converted by someone".to_string()];
        lines.extend(sample_table().to_header_lines());
        assert_eq!(SchemaTable::from_header_lines(&lines).unwrap().len(), 4);
    }

    #[test]
    fn test_header_missing() {
        let lines = vec!["just a comment".to_string()];
        assert!(matches!(
            SchemaTable::from_header_lines(&lines),
            Err(SchemaError::MappingHeaderMissing)
        ));
    }

    #[test]
    fn test_header_truncated() {
        let mut lines = sample_table().to_header_lines();
        lines.pop();
        assert!(matches!(
            SchemaTable::from_header_lines(&lines),
            Err(SchemaError::MappingHeaderCorrupt(_))
        ));
    }

    #[test]
    fn test_header_tampered() {
        let mut lines = sample_table().to_header_lines();
        lines[2] = lines[2].replace("Lambda", "Gamma");
        assert!(matches!(
            SchemaTable::from_header_lines(&lines),
            Err(SchemaError::MappingHeaderCorrupt(_))
        ));
    }

    #[test]
    fn test_header_unknown_version() {
        let mut lines = sample_table().to_header_lines();
        lines[0] = lines[0].replace("v1", "v9");
        assert!(matches!(
            SchemaTable::from_header_lines(&lines),
            Err(SchemaError::MappingHeaderCorrupt(_))
        ));
    }

    #[test]
    fn test_entry_with_quote_and_line_break() {
        let e = entry(
            SchemaPath::attribute("/it's", "note"),
            "vU",
            "b7",
            Some(Value::Str("first\nsecond".into())),
        );
        let line = e.to_line();
        assert!(!line.contains('\n'));
        assert_eq!(MappingEntry::from_line(&line).unwrap(), e);
    }

    #[test]
    fn test_entry_rejects_column_common_value() {
        assert!(MappingEntry::from_line("COL:'/a/noname':i4[] TG:a0 CV:1").is_err());
        assert!(MappingEntry::from_line("XYZ:'/a/b':i4 TG:a0").is_err());
        assert!(MappingEntry::from_line("ATR:'/a/b':i4 TG:0a").is_err());
    }

    #[test]
    fn test_duplicate_tag_rejected() {
        let entries = vec![
            entry(SchemaPath::attribute("/", "a"), "i4", "a0", None),
            entry(SchemaPath::attribute("/", "b"), "i4", "a0", None),
        ];
        assert!(SchemaTable::new(entries).is_err());
    }

    #[test]
    fn test_dataset_paths() {
        let table = sample_table();
        let datasets = table.dataset_paths();
        assert!(datasets.contains("/Raw/Reads/Read_XXX/Signal"));
        assert!(!datasets.contains("/cal"));
        assert_eq!(
            table.entries()[3].original.element,
            ElementType::UInt(8)
        );
    }
}
