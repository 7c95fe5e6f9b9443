//! Fast5 file access.
//!
//! The conversion pipeline only sees the [`Fast5Reader`] and [`Fast5Writer`]
//! traits. The HDF5-backed implementation needs the system HDF5 library and is
//! compiled with the `hdf5` feature; without it [`system_backend`] reports the
//! missing support instead of failing to link.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::tree::Fast5File;

/// Extension of the files picked up from an input directory
pub const FAST5_EXTENSION: &str = "fast5";

#[derive(Error, Debug)]
pub enum Fast5Error {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HDF5 error on {path}: {message}")]
    Hdf5 { path: PathBuf, message: String },

    #[error("Cannot write {path}: value of {node} does not fit its type: {message}")]
    Value {
        path: PathBuf,
        node: String,
        message: String,
    },

    #[error("No .fast5 files found in {0}")]
    NoFiles(PathBuf),

    #[error("{0}")]
    Unsupported(String),
}

/// Loads one Fast5 file into memory
pub trait Fast5Reader: Sync {
    /// # Errors
    ///
    /// Returns `Fast5Error` if the file cannot be opened or parsed.
    fn read(&self, path: &Path) -> Result<Fast5File, Fast5Error>;
}

/// Writes one in-memory Fast5 tree to disk
pub trait Fast5Writer: Sync {
    /// # Errors
    ///
    /// Returns `Fast5Error` if the file cannot be created or a value cannot be
    /// stored with its type.
    fn write(&self, path: &Path, file: &Fast5File) -> Result<(), Fast5Error>;
}

/// Both directions of one storage implementation
pub trait Fast5Backend: Fast5Reader + Fast5Writer {}

impl<T: Fast5Reader + Fast5Writer> Fast5Backend for T {}

/// Check if the path has the Fast5 extension
#[must_use]
pub fn is_fast5_file(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case(FAST5_EXTENSION))
}

/// List the `.fast5` files directly inside `dir`, sorted by name.
///
/// # Errors
///
/// Returns `Fast5Error::Io` if the directory cannot be read, or
/// `Fast5Error::NoFiles` if it holds no Fast5 files.
pub fn list_fast5_files(dir: &Path) -> Result<Vec<PathBuf>, Fast5Error> {
    let io_error = |source| Fast5Error::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_file() && is_fast5_file(&path) {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(Fast5Error::NoFiles(dir.to_path_buf()));
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// The HDF5 backend when compiled in
///
/// # Errors
///
/// Returns `Fast5Error::Unsupported` if the crate was built without the
/// `hdf5` feature.
#[cfg(feature = "hdf5")]
pub fn system_backend() -> Result<Box<dyn Fast5Backend>, Fast5Error> {
    Ok(Box::new(hdf5_backend::Hdf5Backend))
}

/// The HDF5 backend when compiled in
///
/// # Errors
///
/// Returns `Fast5Error::Unsupported` if the crate was built without the
/// `hdf5` feature.
#[cfg(not(feature = "hdf5"))]
pub fn system_backend() -> Result<Box<dyn Fast5Backend>, Fast5Error> {
    Err(Fast5Error::Unsupported(
        "fast5cram was built without HDF5 support; rebuild with `--features hdf5`".to_string(),
    ))
}

#[cfg(feature = "hdf5")]
pub use hdf5_backend::Hdf5Backend;

#[cfg(feature = "hdf5")]
mod hdf5_backend {
    use std::path::Path;
    use std::str::FromStr;
    use std::sync::{Mutex, PoisonError};

    use hdf5::types::{
        CompoundField, CompoundType, FixedAscii, FixedUnicode, FloatSize, H5Type, IntSize,
        TypeDescriptor, VarLenAscii, VarLenUnicode,
    };
    use hdf5::{Container, Datatype, Location};
    use hdf5_sys::h5d::{H5Dread, H5Dwrite};
    use hdf5_sys::h5p::H5P_DEFAULT;
    use hdf5_sys::h5s::H5S_ALL;
    use tracing::{debug, warn};

    use super::{Fast5Error, Fast5Reader, Fast5Writer};
    use crate::core::path::{join_path, SIMPLE_COLUMN};
    use crate::core::tree::{Attribute, Column, Dataset, Fast5File, Group};
    use crate::core::types::{ElementType, OriginalType};
    use crate::core::value::Value;
    use crate::io::compound::{element_width, RowLayout};

    /// Widest fixed-length string read back without truncation
    const MAX_FIXED_STRING: usize = 4096;

    /// Compound transfers call the C library directly and skip the `hdf5`
    /// crate's locking; every read and write holds this lock instead.
    static HDF5_LOCK: Mutex<()> = Mutex::new(());

    /// Reads and writes single-read Fast5 files with the `hdf5` crate
    #[derive(Debug, Clone, Copy, Default)]
    pub struct Hdf5Backend;

    fn hdf5_error(path: &Path) -> impl Fn(hdf5::Error) -> Fast5Error + '_ {
        move |e| Fast5Error::Hdf5 {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    }

    fn base_name(full: &str) -> String {
        full.rsplit('/').next().unwrap_or(full).to_string()
    }

    fn int_bytes(size: IntSize) -> u8 {
        match size {
            IntSize::U1 => 1,
            IntSize::U2 => 2,
            IntSize::U4 => 4,
            IntSize::U8 => 8,
        }
    }

    fn int_size(bytes: u8) -> IntSize {
        match bytes {
            1 => IntSize::U1,
            2 => IntSize::U2,
            4 => IntSize::U4,
            _ => IntSize::U8,
        }
    }

    fn element_of(descriptor: &TypeDescriptor) -> Option<ElementType> {
        #[allow(unreachable_patterns)]
        let element = match descriptor {
            TypeDescriptor::Integer(size) => ElementType::Int(int_bytes(*size)),
            TypeDescriptor::Unsigned(size) => ElementType::UInt(int_bytes(*size)),
            TypeDescriptor::Float(FloatSize::U8) => ElementType::Float(8),
            TypeDescriptor::Float(FloatSize::U4) => ElementType::Float(4),
            TypeDescriptor::Float(_) => ElementType::Float(2),
            TypeDescriptor::Boolean => ElementType::Bool,
            TypeDescriptor::FixedAscii(n) => ElementType::FixedAscii(*n),
            TypeDescriptor::FixedUnicode(n) => ElementType::FixedUnicode(*n),
            TypeDescriptor::VarLenAscii => ElementType::VarAscii,
            TypeDescriptor::VarLenUnicode => ElementType::VarUnicode,
            _ => return None,
        };
        Some(element)
    }

    fn descriptor_of(element: ElementType) -> TypeDescriptor {
        match element {
            ElementType::Int(n) => TypeDescriptor::Integer(int_size(n)),
            ElementType::UInt(n) => TypeDescriptor::Unsigned(int_size(n)),
            ElementType::Float(8) => TypeDescriptor::Float(FloatSize::U8),
            ElementType::Float(_) => TypeDescriptor::Float(FloatSize::U4),
            ElementType::Bool => TypeDescriptor::Boolean,
            ElementType::FixedAscii(n) => TypeDescriptor::FixedAscii(n),
            ElementType::FixedUnicode(n) => TypeDescriptor::FixedUnicode(n),
            ElementType::VarAscii => TypeDescriptor::VarLenAscii,
            ElementType::VarUnicode => TypeDescriptor::VarLenUnicode,
        }
    }

    /// Compound type matching the packed rows of `layout`
    fn packed(layout: &RowLayout) -> CompoundType {
        let fields = layout
            .fields()
            .iter()
            .enumerate()
            .map(|(index, field)| CompoundField {
                name: field.name.clone(),
                ty: descriptor_of(field.element),
                offset: field.offset,
                index,
            })
            .collect();
        CompoundType {
            fields,
            size: layout.size(),
        }
    }

    fn items<T: H5Type>(container: &Container, array: bool) -> hdf5::Result<Vec<T>> {
        if array {
            container.read_raw::<T>()
        } else {
            Ok(vec![container.read_scalar::<T>()?])
        }
    }

    fn shaped<T>(
        mut items: Vec<T>,
        array: bool,
        scalar: fn(T) -> Value,
        vector: fn(Vec<T>) -> Value,
    ) -> Option<Value> {
        if array {
            Some(vector(items))
        } else {
            items.pop().map(scalar)
        }
    }

    /// Read an attribute or simple dataset; `None` for types not mapped
    fn read_value(
        container: &Container,
        node: &str,
    ) -> hdf5::Result<Option<(OriginalType, Value)>> {
        let array = match container.ndim() {
            0 => false,
            1 => true,
            n => {
                warn!("Skipping {node}: {n}-dimensional data is not supported");
                return Ok(None);
            }
        };
        let descriptor = container.dtype()?.to_descriptor()?;

        let (element, value) = match descriptor {
            TypeDescriptor::Integer(size) => (
                ElementType::Int(int_bytes(size)),
                shaped(items::<i64>(container, array)?, array, Value::Int, Value::IntArray),
            ),
            TypeDescriptor::Unsigned(size) => (
                ElementType::UInt(int_bytes(size)),
                shaped(items::<u64>(container, array)?, array, Value::UInt, Value::UIntArray),
            ),
            TypeDescriptor::Float(size) => {
                #[allow(unreachable_patterns)]
                let bytes = match size {
                    FloatSize::U4 => 4,
                    FloatSize::U8 => 8,
                    _ => 2,
                };
                (
                    ElementType::Float(bytes),
                    shaped(items::<f64>(container, array)?, array, Value::Float, Value::FloatArray),
                )
            }
            TypeDescriptor::Boolean => (
                ElementType::Bool,
                shaped(items::<bool>(container, array)?, array, Value::Bool, Value::BoolArray),
            ),
            TypeDescriptor::FixedAscii(n) => {
                let strings = items::<FixedAscii<MAX_FIXED_STRING>>(container, array)?
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect();
                (ElementType::FixedAscii(n), shaped(strings, array, Value::Str, Value::StrArray))
            }
            TypeDescriptor::FixedUnicode(n) => {
                let strings = items::<FixedUnicode<MAX_FIXED_STRING>>(container, array)?
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect();
                (ElementType::FixedUnicode(n), shaped(strings, array, Value::Str, Value::StrArray))
            }
            TypeDescriptor::VarLenAscii => {
                let strings = items::<VarLenAscii>(container, array)?
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect();
                (ElementType::VarAscii, shaped(strings, array, Value::Str, Value::StrArray))
            }
            TypeDescriptor::VarLenUnicode => {
                let strings = items::<VarLenUnicode>(container, array)?
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect();
                (ElementType::VarUnicode, shaped(strings, array, Value::Str, Value::StrArray))
            }
            other => {
                warn!("Skipping {node}: unsupported HDF5 type {other:?}");
                return Ok(None);
            }
        };

        let original = if array {
            OriginalType::array(element)
        } else {
            OriginalType::scalar(element)
        };
        Ok(value.map(|v| (original, v)))
    }

    /// Read the supported fields of a compound dataset, one column each
    fn read_compound(
        dataset: &hdf5::Dataset,
        compound: &CompoundType,
        node: &str,
    ) -> hdf5::Result<Option<Vec<Column>>> {
        let array = match dataset.ndim() {
            0 => false,
            1 => true,
            n => {
                warn!("Skipping {node}: {n}-dimensional data is not supported");
                return Ok(None);
            }
        };

        let mut members: Vec<&CompoundField> = compound.fields.iter().collect();
        members.sort_by_key(|field| field.index);
        let mut fields = Vec::new();
        for member in members {
            match element_of(&member.ty).filter(|e| element_width(*e).is_some_and(|w| w > 0)) {
                Some(element) => fields.push((member.name.clone(), element)),
                None => warn!(
                    "Skipping field {} of {node}: unsupported HDF5 type {:?}",
                    member.name, member.ty
                ),
            }
        }
        if fields.is_empty() {
            warn!("Skipping {node}: no supported compound fields");
            return Ok(None);
        }

        let layout = RowLayout::new(fields).map_err(|e| hdf5::Error::from(e.to_string()))?;
        let memtype = Datatype::from_descriptor(&TypeDescriptor::Compound(packed(&layout)))?;
        let rows = dataset.size();
        let mut bytes = vec![0u8; rows * layout.size()];
        // SAFETY: `bytes` holds `rows` elements of `memtype`, whose size is the
        // packed row size.
        let status = unsafe {
            H5Dread(
                dataset.id(),
                memtype.id(),
                H5S_ALL,
                H5S_ALL,
                H5P_DEFAULT,
                bytes.as_mut_ptr().cast(),
            )
        };
        if status < 0 {
            return Err(format!("reading compound dataset {node} failed").into());
        }
        layout
            .decode(&bytes, rows, array)
            .map(Some)
            .map_err(|e| hdf5::Error::from(e.to_string()))
    }

    fn read_attributes(location: &Location, node: &str) -> hdf5::Result<Vec<Attribute>> {
        let mut attributes = Vec::new();
        for name in location.attr_names()? {
            let attr = location.attr(&name)?;
            let full = join_path(node, &name);
            if let Some((dtype, value)) = read_value(&attr, &full)? {
                attributes.push(Attribute::new(name, dtype, value));
            }
        }
        Ok(attributes)
    }

    fn read_group(group: &hdf5::Group, name: String, node: &str) -> hdf5::Result<Group> {
        let mut out = Group::new(name);
        out.attributes = read_attributes(group, node)?;

        for child in group.groups()? {
            let child_name = base_name(&child.name());
            let child_node = join_path(node, &child_name);
            out.groups.push(read_group(&child, child_name, &child_node)?);
        }

        for dataset in group.datasets()? {
            let dataset_name = base_name(&dataset.name());
            let dataset_node = join_path(node, &dataset_name);
            let columns = match dataset.dtype()?.to_descriptor()? {
                TypeDescriptor::Compound(compound) => {
                    read_compound(&dataset, &compound, &dataset_node)?
                }
                _ => read_value(&dataset, &dataset_node)?
                    .map(|(dtype, values)| vec![Column::new(SIMPLE_COLUMN, dtype, values)]),
            };
            let Some(columns) = columns else {
                continue;
            };
            out.datasets.push(Dataset {
                name: dataset_name,
                attributes: read_attributes(&dataset, &dataset_node)?,
                columns,
            });
        }
        Ok(out)
    }

    /// Values converted to the exact HDF5 element type they are stored as
    enum Buffer {
        I8(Vec<i8>),
        I16(Vec<i16>),
        I32(Vec<i32>),
        I64(Vec<i64>),
        U8(Vec<u8>),
        U16(Vec<u16>),
        U32(Vec<u32>),
        U64(Vec<u64>),
        F32(Vec<f32>),
        F64(Vec<f64>),
        Bool(Vec<bool>),
        Ascii(Vec<VarLenAscii>),
        Unicode(Vec<VarLenUnicode>),
    }

    macro_rules! with_buffer {
        ($buffer:expr, $data:ident => $body:expr) => {
            match $buffer {
                Buffer::I8($data) => $body,
                Buffer::I16($data) => $body,
                Buffer::I32($data) => $body,
                Buffer::I64($data) => $body,
                Buffer::U8($data) => $body,
                Buffer::U16($data) => $body,
                Buffer::U32($data) => $body,
                Buffer::U64($data) => $body,
                Buffer::F32($data) => $body,
                Buffer::F64($data) => $body,
                Buffer::Bool($data) => $body,
                Buffer::Ascii($data) => $body,
                Buffer::Unicode($data) => $body,
            }
        };
    }

    fn narrow<T: TryFrom<i64>>(items: Vec<i64>) -> Result<Vec<T>, String> {
        items
            .into_iter()
            .map(|v| T::try_from(v).map_err(|_| format!("{v} out of range")))
            .collect()
    }

    fn narrow_unsigned<T: TryFrom<u64>>(items: Vec<u64>) -> Result<Vec<T>, String> {
        items
            .into_iter()
            .map(|v| T::try_from(v).map_err(|_| format!("{v} out of range")))
            .collect()
    }

    fn to_buffer(value: &Value, element: ElementType) -> Result<Buffer, String> {
        let buffer = match (value, element) {
            (Value::Int(v), ElementType::Int(n)) => int_buffer(vec![*v], n)?,
            (Value::IntArray(v), ElementType::Int(n)) => int_buffer(v.clone(), n)?,
            (Value::UInt(v), ElementType::UInt(n)) => uint_buffer(vec![*v], n)?,
            (Value::UIntArray(v), ElementType::UInt(n)) => uint_buffer(v.clone(), n)?,
            #[allow(clippy::cast_possible_truncation)]
            (Value::Float(v), ElementType::Float(n)) if n < 8 => Buffer::F32(vec![*v as f32]),
            #[allow(clippy::cast_possible_truncation)]
            (Value::FloatArray(v), ElementType::Float(n)) if n < 8 => {
                Buffer::F32(v.iter().map(|&f| f as f32).collect())
            }
            (Value::Float(v), ElementType::Float(_)) => Buffer::F64(vec![*v]),
            (Value::FloatArray(v), ElementType::Float(_)) => Buffer::F64(v.clone()),
            (Value::Bool(v), ElementType::Bool) => Buffer::Bool(vec![*v]),
            (Value::BoolArray(v), ElementType::Bool) => Buffer::Bool(v.clone()),
            (Value::Str(s), e) if e.is_string() => string_buffer(std::slice::from_ref(s), e)?,
            (Value::StrArray(v), e) if e.is_string() => string_buffer(v, e)?,
            _ => return Err(format!("value does not match element type {element}")),
        };
        Ok(buffer)
    }

    fn int_buffer(items: Vec<i64>, bytes: u8) -> Result<Buffer, String> {
        Ok(match bytes {
            1 => Buffer::I8(narrow(items)?),
            2 => Buffer::I16(narrow(items)?),
            4 => Buffer::I32(narrow(items)?),
            _ => Buffer::I64(items),
        })
    }

    fn uint_buffer(items: Vec<u64>, bytes: u8) -> Result<Buffer, String> {
        Ok(match bytes {
            1 => Buffer::U8(narrow_unsigned(items)?),
            2 => Buffer::U16(narrow_unsigned(items)?),
            4 => Buffer::U32(narrow_unsigned(items)?),
            _ => Buffer::U64(items),
        })
    }

    fn string_buffer(items: &[String], element: ElementType) -> Result<Buffer, String> {
        let unicode = matches!(
            element,
            ElementType::FixedUnicode(_) | ElementType::VarUnicode
        );
        let ascii = (!unicode)
            .then(|| {
                items
                    .iter()
                    .map(|s| VarLenAscii::from_ascii(s))
                    .collect::<Result<Vec<_>, _>>()
                    .ok()
            })
            .flatten();
        match ascii {
            Some(ascii) => Ok(Buffer::Ascii(ascii)),
            None => items
                .iter()
                .map(|s| VarLenUnicode::from_str(s))
                .collect::<Result<Vec<_>, _>>()
                .map(Buffer::Unicode)
                .map_err(|e| format!("invalid string: {e}")),
        }
    }

    fn write_attribute_data<T: H5Type>(
        location: &Location,
        name: &str,
        data: &[T],
        array: bool,
    ) -> hdf5::Result<()> {
        if array {
            let attr = location.new_attr::<T>().shape((data.len(),)).create(name)?;
            attr.write_raw(data)?;
        } else if let Some(value) = data.first() {
            location.new_attr::<T>().create(name)?.write_scalar(value)?;
        }
        Ok(())
    }

    fn write_dataset_data<T: H5Type>(
        group: &hdf5::Group,
        name: &str,
        data: &[T],
        array: bool,
    ) -> hdf5::Result<hdf5::Dataset> {
        if array {
            let dataset = group.new_dataset::<T>().shape(data.len()).create(name)?;
            dataset.write_raw(data)?;
            Ok(dataset)
        } else {
            let dataset = group.new_dataset::<T>().shape(()).create(name)?;
            if let Some(value) = data.first() {
                dataset.write_scalar(value)?;
            }
            Ok(dataset)
        }
    }

    struct TreeWriter<'a> {
        path: &'a Path,
    }

    impl TreeWriter<'_> {
        fn value_error(&self, node: &str, message: String) -> Fast5Error {
            Fast5Error::Value {
                path: self.path.to_path_buf(),
                node: node.to_string(),
                message,
            }
        }

        fn attributes(
            &self,
            location: &Location,
            node: &str,
            attributes: &[Attribute],
        ) -> Result<(), Fast5Error> {
            for attribute in attributes {
                let full = join_path(node, &attribute.name);
                let buffer = to_buffer(&attribute.value, attribute.dtype.element)
                    .map_err(|m| self.value_error(&full, m))?;
                let array = attribute.dtype.array;
                with_buffer!(buffer, data => write_attribute_data(location, &attribute.name, &data, array))
                    .map_err(hdf5_error(self.path))?;
            }
            Ok(())
        }

        fn compound(
            &self,
            target: &hdf5::Group,
            node: &str,
            dataset: &Dataset,
        ) -> Result<hdf5::Dataset, Fast5Error> {
            let layout = RowLayout::for_columns(&dataset.columns)
                .map_err(|e| self.value_error(node, e.to_string()))?;
            let bytes = layout
                .encode(&dataset.columns)
                .map_err(|e| self.value_error(node, e.to_string()))?;
            let descriptor = TypeDescriptor::Compound(packed(&layout));
            let memtype = Datatype::from_descriptor(&descriptor).map_err(hdf5_error(self.path))?;

            let builder = target.new_dataset_builder().empty_as(&descriptor);
            let created = if dataset.columns[0].dtype.array {
                builder
                    .shape(dataset.columns[0].values.len())
                    .create(dataset.name.as_str())
            } else {
                builder.shape(()).create(dataset.name.as_str())
            };
            let created = created.map_err(hdf5_error(self.path))?;
            if bytes.is_empty() {
                return Ok(created);
            }

            // SAFETY: `bytes` holds whole packed rows of `memtype`, one per
            // element of the dataset's dataspace.
            let status = unsafe {
                H5Dwrite(
                    created.id(),
                    memtype.id(),
                    H5S_ALL,
                    H5S_ALL,
                    H5P_DEFAULT,
                    bytes.as_ptr().cast(),
                )
            };
            if status < 0 {
                return Err(Fast5Error::Hdf5 {
                    path: self.path.to_path_buf(),
                    message: format!("writing compound dataset {node} failed"),
                });
            }
            Ok(created)
        }

        fn group(&self, target: &hdf5::Group, node: &str, group: &Group) -> Result<(), Fast5Error> {
            self.attributes(target, node, &group.attributes)?;

            for child in &group.groups {
                let child_node = join_path(node, &child.name);
                let created = target
                    .create_group(&child.name)
                    .map_err(hdf5_error(self.path))?;
                self.group(&created, &child_node, child)?;
            }

            for dataset in &group.datasets {
                let dataset_node = join_path(node, &dataset.name);
                if dataset.columns.is_empty() {
                    warn!(
                        "{}: skipping dataset {dataset_node} without columns",
                        self.path.display()
                    );
                    continue;
                }
                let created = if dataset.is_compound() {
                    self.compound(target, &dataset_node, dataset)?
                } else {
                    let column = &dataset.columns[0];
                    let buffer = to_buffer(&column.values, column.dtype.element)
                        .map_err(|m| self.value_error(&dataset_node, m))?;
                    let array = column.dtype.array;
                    with_buffer!(buffer, data => write_dataset_data(target, &dataset.name, &data, array))
                        .map_err(hdf5_error(self.path))?
                };
                self.attributes(&created, &dataset_node, &dataset.attributes)?;
            }
            Ok(())
        }
    }

    impl Fast5Reader for Hdf5Backend {
        fn read(&self, path: &Path) -> Result<Fast5File, Fast5Error> {
            let _guard = HDF5_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
            let file = hdf5::File::open(path).map_err(hdf5_error(path))?;
            let root = read_group(&file, String::new(), "/").map_err(hdf5_error(path))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            debug!("Read {}", path.display());
            Ok(Fast5File::new(name).with_root(root))
        }
    }

    impl Fast5Writer for Hdf5Backend {
        fn write(&self, path: &Path, file: &Fast5File) -> Result<(), Fast5Error> {
            let _guard = HDF5_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
            let result = hdf5::File::create(path)
                .map_err(hdf5_error(path))
                .and_then(|out| TreeWriter { path }.group(&out, "/", &file.root));
            if result.is_err() {
                let _ = std::fs::remove_file(path);
            }
            result
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_only_fast5_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["read_2.fast5", "read_1.fast5", "notes.txt", "read_3.FAST5"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let names: Vec<String> = list_fast5_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["read_1.fast5", "read_2.fast5", "read_3.FAST5"]);
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            list_fast5_files(dir.path()),
            Err(Fast5Error::NoFiles(_))
        ));
    }

    #[cfg(not(feature = "hdf5"))]
    #[test]
    fn test_backend_requires_feature() {
        assert!(matches!(
            system_backend(),
            Err(Fast5Error::Unsupported(_))
        ));
    }
}
