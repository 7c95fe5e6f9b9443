//! In-memory Fast5 tree.
//!
//! The HDF5 backend loads a file into a [`Fast5File`] and the decoder builds
//! one from archive tags. Schema discovery and encoding never look at the
//! nesting directly: they consume the flat, canonically ordered
//! [`Entry`] sequence produced by [`Fast5File::entries`].

use serde::{Deserialize, Serialize};

use crate::core::path::{join_path, SchemaPath};
use crate::core::types::OriginalType;
use crate::core::value::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub dtype: OriginalType,
    pub value: Value,
}

impl Attribute {
    pub fn new(name: impl Into<String>, dtype: OriginalType, value: Value) -> Self {
        Self {
            name: name.into(),
            dtype,
            value,
        }
    }
}

/// One column of a dataset; a scalar type means a scalar dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub dtype: OriginalType,
    pub values: Value,
}

impl Column {
    pub fn new(name: impl Into<String>, dtype: OriginalType, values: Value) -> Self {
        Self {
            name: name.into(),
            dtype,
            values,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub attributes: Vec<Attribute>,
    /// Compound fields in declaration order, or a single
    /// [`SIMPLE_COLUMN`](crate::core::path::SIMPLE_COLUMN)
    pub columns: Vec<Column>,
}

impl Dataset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// A dataset is compound unless it holds exactly the simple column
    #[must_use]
    pub fn is_compound(&self) -> bool {
        !(self.columns.len() == 1 && self.columns[0].name == crate::core::path::SIMPLE_COLUMN)
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub groups: Vec<Group>,
    pub datasets: Vec<Dataset>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    #[must_use]
    pub fn with_group(mut self, group: Group) -> Self {
        self.groups.push(group);
        self
    }

    #[must_use]
    pub fn with_dataset(mut self, dataset: Dataset) -> Self {
        self.datasets.push(dataset);
        self
    }
}

/// One flattened (path, type, value) triple
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<'a> {
    pub path: SchemaPath,
    pub dtype: OriginalType,
    pub value: &'a Value,
}

enum Child<'a> {
    Group(&'a Group),
    Dataset(&'a Dataset),
}

impl Child<'_> {
    fn name(&self) -> &str {
        match self {
            Self::Group(g) => &g.name,
            Self::Dataset(d) => &d.name,
        }
    }
}

/// One single-read Fast5 file
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Fast5File {
    /// Base filename, e.g. `read_17.fast5`
    pub name: String,
    pub root: Group,
}

impl Fast5File {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: Group::new(""),
        }
    }

    #[must_use]
    pub fn with_root(mut self, root: Group) -> Self {
        self.root = root;
        self
    }

    /// Flatten the tree in canonical order.
    ///
    /// Depth first from the root. Within a group: its attributes by name, then
    /// its child groups and datasets together by name. Within a dataset: its
    /// columns in declaration order, then its attributes by name.
    #[must_use]
    pub fn entries(&self) -> Vec<Entry<'_>> {
        let mut entries = Vec::new();
        walk_group(&self.root, "/", &mut entries);
        entries
    }

    /// Find a group by its absolute path
    #[must_use]
    pub fn group(&self, path: &str) -> Option<&Group> {
        let mut group = &self.root;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            group = group.groups.iter().find(|g| g.name == segment)?;
        }
        Some(group)
    }

    /// Find a dataset by its absolute path
    #[must_use]
    pub fn dataset(&self, path: &str) -> Option<&Dataset> {
        let (parent, name) = split_parent(path)?;
        self.group(parent)?.datasets.iter().find(|d| d.name == name)
    }

    /// Find an attribute on a group or dataset
    #[must_use]
    pub fn attribute(&self, node: &str, name: &str) -> Option<&Attribute> {
        let attributes = match self.group(node) {
            Some(group) => &group.attributes,
            None => &self.dataset(node)?.attributes,
        };
        attributes.iter().find(|a| a.name == name)
    }

    /// Get or create the group at `path`, creating intermediate groups
    pub fn ensure_group(&mut self, path: &str) -> &mut Group {
        let mut group = &mut self.root;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let index = match group.groups.iter().position(|g| g.name == segment) {
                Some(index) => index,
                None => {
                    group.groups.push(Group::new(segment));
                    group.groups.len() - 1
                }
            };
            group = &mut group.groups[index];
        }
        group
    }

    /// Get or create the dataset at `path`, creating its parent groups
    pub fn ensure_dataset(&mut self, path: &str) -> &mut Dataset {
        let (parent, name) = split_parent(path).unwrap_or(("/", path));
        let group = self.ensure_group(parent);
        let index = match group.datasets.iter().position(|d| d.name == name) {
            Some(index) => index,
            None => {
                group.datasets.push(Dataset::new(name));
                group.datasets.len() - 1
            }
        };
        &mut group.datasets[index]
    }
}

fn split_parent(path: &str) -> Option<(&str, &str)> {
    let (parent, name) = path.rsplit_once('/')?;
    Some((if parent.is_empty() { "/" } else { parent }, name))
}

fn sorted_attributes(attributes: &[Attribute]) -> Vec<&Attribute> {
    let mut sorted: Vec<&Attribute> = attributes.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    sorted
}

fn walk_group<'a>(group: &'a Group, path: &str, entries: &mut Vec<Entry<'a>>) {
    for attribute in sorted_attributes(&group.attributes) {
        entries.push(Entry {
            path: SchemaPath::attribute(path, &attribute.name),
            dtype: attribute.dtype,
            value: &attribute.value,
        });
    }

    let mut children: Vec<Child<'a>> = group
        .groups
        .iter()
        .map(Child::Group)
        .chain(group.datasets.iter().map(Child::Dataset))
        .collect();
    children.sort_by(|a, b| a.name().cmp(b.name()));

    for child in children {
        let child_path = join_path(path, child.name());
        match child {
            Child::Group(g) => walk_group(g, &child_path, entries),
            Child::Dataset(d) => walk_dataset(d, &child_path, entries),
        }
    }
}

fn walk_dataset<'a>(dataset: &'a Dataset, path: &str, entries: &mut Vec<Entry<'a>>) {
    for column in &dataset.columns {
        entries.push(Entry {
            path: SchemaPath::column(path, &column.name),
            dtype: column.dtype,
            value: &column.values,
        });
    }
    for attribute in sorted_attributes(&dataset.attributes) {
        entries.push(Entry {
            path: SchemaPath::attribute(path, &attribute.name),
            dtype: attribute.dtype,
            value: &attribute.value,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::path::SIMPLE_COLUMN;
    use crate::core::types::{ElementType, Kind};

    fn sample() -> Fast5File {
        let i4 = OriginalType::scalar(ElementType::Int(4));
        let signal = Dataset::new("Signal").with_column(Column::new(
            SIMPLE_COLUMN,
            OriginalType::array(ElementType::Int(2)),
            Value::IntArray(vec![1, 2, 3]),
        ));
        let root = Group::new("")
            .with_attribute(Attribute::new("file_version", i4, Value::Int(1)))
            .with_group(
                Group::new("Raw").with_group(
                    Group::new("Reads").with_group(
                        Group::new("Read_7")
                            .with_attribute(Attribute::new("start_time", i4, Value::Int(10)))
                            .with_dataset(signal),
                    ),
                ),
            )
            .with_group(Group::new("Analyses").with_attribute(Attribute::new(
                "a",
                i4,
                Value::Int(0),
            )));
        Fast5File::new("read_7.fast5").with_root(root)
    }

    #[test]
    fn test_entries_canonical_order() {
        let file = sample();
        let paths: Vec<String> = file.entries().iter().map(|e| e.path.full()).collect();
        assert_eq!(
            paths,
            vec![
                "/file_version",
                "/Analyses/a",
                "/Raw/Reads/Read_7/start_time",
                "/Raw/Reads/Read_7/Signal/noname",
            ]
        );
        assert_eq!(file.entries()[3].path.kind, Kind::Column);
    }

    #[test]
    fn test_entries_ignore_insertion_order() {
        let i4 = OriginalType::scalar(ElementType::Int(4));
        let a = Group::new("")
            .with_attribute(Attribute::new("b", i4, Value::Int(2)))
            .with_attribute(Attribute::new("a", i4, Value::Int(1)));
        let b = Group::new("")
            .with_attribute(Attribute::new("a", i4, Value::Int(1)))
            .with_attribute(Attribute::new("b", i4, Value::Int(2)));
        let fa = Fast5File::new("x").with_root(a);
        let fb = Fast5File::new("x").with_root(b);
        assert_eq!(fa.entries(), fb.entries());
    }

    #[test]
    fn test_lookup_helpers() {
        let file = sample();
        assert!(file.group("/Raw/Reads").is_some());
        assert!(file.dataset("/Raw/Reads/Read_7/Signal").is_some());
        assert_eq!(
            file.attribute("/Raw/Reads/Read_7", "start_time").unwrap().value,
            Value::Int(10)
        );
        assert_eq!(
            file.attribute("/", "file_version").unwrap().value,
            Value::Int(1)
        );
        assert!(!file
            .dataset("/Raw/Reads/Read_7/Signal")
            .unwrap()
            .is_compound());
    }

    #[test]
    fn test_ensure_creates_intermediate_nodes() {
        let mut file = Fast5File::new("x");
        file.ensure_dataset("/A/B/Events").columns.push(Column::new(
            "start",
            OriginalType::array(ElementType::UInt(8)),
            Value::UIntArray(vec![5]),
        ));
        file.ensure_group("/A/B").attributes.push(Attribute::new(
            "k",
            OriginalType::scalar(ElementType::VarAscii),
            Value::Str("v".into()),
        ));
        assert_eq!(file.root.groups.len(), 1);
        assert_eq!(file.group("/A/B").unwrap().datasets.len(), 1);
        assert!(file.dataset("/A/B/Events").unwrap().is_compound());
    }
}
