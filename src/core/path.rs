use serde::{Deserialize, Serialize};

use crate::core::types::Kind;

/// Column name used for datasets that are not compound
pub const SIMPLE_COLUMN: &str = "noname";

/// Identifier of a mapped HDF5 node: the owning group or dataset path plus
/// the attribute or column name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaPath {
    /// Slash-separated group or dataset path, `/` for the root group
    pub node: String,
    /// Attribute name (ATR) or column name (COL)
    pub name: String,
    pub kind: Kind,
}

impl SchemaPath {
    pub fn attribute(node: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            name: name.into(),
            kind: Kind::Attribute,
        }
    }

    pub fn column(dataset: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            node: dataset.into(),
            name: name.into(),
            kind: Kind::Column,
        }
    }

    /// Full textual path, e.g. `/UniqueGlobalKey/context_tags/sample_frequency`
    #[must_use]
    pub fn full(&self) -> String {
        join_path(&self.node, &self.name)
    }

    /// Split a full textual path at its last `/`
    #[must_use]
    pub fn from_full(full: &str, kind: Kind) -> Option<Self> {
        let (node, name) = full.rsplit_once('/')?;
        if name.is_empty() {
            return None;
        }
        let node = if node.is_empty() { "/" } else { node };
        Some(Self {
            node: node.to_string(),
            name: name.to_string(),
            kind,
        })
    }
}

impl std::fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:'{}'", self.kind, self.full())
    }
}

/// Join a parent node path and a child name
#[must_use]
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Path of the raw signal dataset, e.g. `/Raw/Reads/Read_XXX/Signal`
#[must_use]
pub fn is_signal_path(node: &str) -> bool {
    node.contains("/Raw") && node.ends_with("/Signal")
}

/// Path of an Events dataset derived from the raw signal
#[must_use]
pub fn is_events_path(node: &str) -> bool {
    node.ends_with("/Events")
}

/// Path of the basecaller's embedded FASTQ dataset
#[must_use]
pub fn is_fastq_path(node: &str) -> bool {
    node.ends_with("BaseCalled_template/Fastq")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_path_round_trip() {
        let path = SchemaPath::attribute("/UniqueGlobalKey/tracking_id", "run_id");
        assert_eq!(path.full(), "/UniqueGlobalKey/tracking_id/run_id");
        assert_eq!(
            SchemaPath::from_full(&path.full(), Kind::Attribute).unwrap(),
            path
        );
    }

    #[test]
    fn test_root_attribute() {
        let path = SchemaPath::attribute("/", "file_version");
        assert_eq!(path.full(), "/file_version");
        let parsed = SchemaPath::from_full("/file_version", Kind::Attribute).unwrap();
        assert_eq!(parsed.node, "/");
        assert_eq!(parsed.name, "file_version");
    }

    #[test]
    fn test_from_full_rejects_bad_paths() {
        assert!(SchemaPath::from_full("no_slash", Kind::Column).is_none());
        assert!(SchemaPath::from_full("/trailing/", Kind::Column).is_none());
    }

    #[test]
    fn test_signal_and_events_paths() {
        assert!(is_signal_path("/Raw/Reads/Read_XXX/Signal"));
        assert!(!is_signal_path("/Analyses/Signal"));
        assert!(is_events_path(
            "/Analyses/EventDetection_000/Reads/Read_XXX/Events"
        ));
        assert!(is_fastq_path(
            "/Analyses/Basecall_1D_000/BaseCalled_template/Fastq"
        ));
    }
}
