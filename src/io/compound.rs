//! Packed row layout of compound datasets.
//!
//! A compound dataset is read and written as one byte buffer of fixed-size
//! rows. Fields sit back to back in declaration order, native endian, with no
//! padding. Variable-length strings have no place in such a row: on write they
//! are widened to a fixed string as long as the longest item.

use thiserror::Error;

use crate::core::tree::Column;
use crate::core::types::{ElementType, OriginalType};
use crate::core::value::Value;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CompoundError {
    #[error("Field {0} has no fixed size")]
    Unsized(String),

    #[error("Field {field}: {message}")]
    Field { field: String, message: String },

    #[error("Field {field} holds {found} rows, expected {expected}")]
    RowCount {
        field: String,
        expected: usize,
        found: usize,
    },

    #[error("Buffer of {len} bytes does not hold {rows} rows of {size} bytes")]
    Buffer { len: usize, rows: usize, size: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayout {
    pub name: String,
    /// Element type as laid out in the row
    pub element: ElementType,
    pub offset: usize,
    pub width: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowLayout {
    fields: Vec<FieldLayout>,
    size: usize,
}

/// Bytes one element takes in a packed row. Half floats are held as `f32`.
#[must_use]
pub fn element_width(element: ElementType) -> Option<usize> {
    match element {
        ElementType::Int(n) | ElementType::UInt(n) => Some(usize::from(n)),
        ElementType::Float(8) => Some(8),
        ElementType::Float(_) => Some(4),
        ElementType::Bool => Some(1),
        ElementType::FixedAscii(n) | ElementType::FixedUnicode(n) => Some(n),
        ElementType::VarAscii | ElementType::VarUnicode => None,
    }
}

impl RowLayout {
    /// Lay out `fields` back to back.
    ///
    /// # Errors
    ///
    /// Returns `CompoundError::Unsized` for variable-length or zero-width
    /// fields.
    pub fn new<I>(fields: I) -> Result<Self, CompoundError>
    where
        I: IntoIterator<Item = (String, ElementType)>,
    {
        let mut size = 0;
        let mut laid = Vec::new();
        for (name, element) in fields {
            let width = match element_width(element) {
                Some(w) if w > 0 => w,
                _ => return Err(CompoundError::Unsized(name)),
            };
            laid.push(FieldLayout {
                name,
                element,
                offset: size,
                width,
            });
            size += width;
        }
        Ok(Self { fields: laid, size })
    }

    /// Layout for writing `columns`, with variable-length strings widened to
    /// their longest item.
    ///
    /// # Errors
    ///
    /// Returns `CompoundError::Unsized` if a field cannot be given a width.
    pub fn for_columns(columns: &[Column]) -> Result<Self, CompoundError> {
        Self::new(columns.iter().map(|column| {
            let widest = || strings(&column.values).iter().map(String::len).max().unwrap_or(0).max(1);
            let element = match column.dtype.element {
                ElementType::VarAscii => ElementType::FixedAscii(widest()),
                ElementType::VarUnicode => ElementType::FixedUnicode(widest()),
                other => other,
            };
            (column.name.clone(), element)
        }))
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldLayout] {
        &self.fields
    }

    /// Bytes per row
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Pack `columns` (one per field, in field order) into rows.
    ///
    /// # Errors
    ///
    /// Returns `CompoundError` if the columns disagree on their row count or a
    /// value does not fit its field.
    pub fn encode(&self, columns: &[Column]) -> Result<Vec<u8>, CompoundError> {
        let rows = columns.first().map_or(0, |c| c.values.len());
        if columns.len() != self.fields.len() {
            return Err(CompoundError::RowCount {
                field: "<fields>".to_string(),
                expected: self.fields.len(),
                found: columns.len(),
            });
        }

        let mut out = vec![0u8; rows * self.size];
        for (field, column) in self.fields.iter().zip(columns) {
            if column.values.len() != rows {
                return Err(CompoundError::RowCount {
                    field: field.name.clone(),
                    expected: rows,
                    found: column.values.len(),
                });
            }
            let packed = pack(&column.values, field).map_err(|message| CompoundError::Field {
                field: field.name.clone(),
                message,
            })?;
            for (row, cell) in packed.chunks_exact(field.width).enumerate() {
                let start = row * self.size + field.offset;
                out[start..start + field.width].copy_from_slice(cell);
            }
        }
        Ok(out)
    }

    /// Split packed rows into one column per field. A scalar dataset holds
    /// exactly one row.
    ///
    /// # Errors
    ///
    /// Returns `CompoundError::Buffer` if `bytes` is not `rows` whole rows.
    pub fn decode(&self, bytes: &[u8], rows: usize, array: bool) -> Result<Vec<Column>, CompoundError> {
        if bytes.len() != rows * self.size || (!array && rows != 1) {
            return Err(CompoundError::Buffer {
                len: bytes.len(),
                rows,
                size: self.size,
            });
        }

        let columns = self
            .fields
            .iter()
            .map(|field| {
                let cells = bytes
                    .chunks_exact(self.size)
                    .map(|row| &row[field.offset..field.offset + field.width]);
                let dtype = if array {
                    OriginalType::array(field.element)
                } else {
                    OriginalType::scalar(field.element)
                };
                Column::new(field.name.clone(), dtype, unpack(cells, field.element, array))
            })
            .collect();
        Ok(columns)
    }
}

fn strings(values: &Value) -> &[String] {
    match values {
        Value::Str(s) => std::slice::from_ref(s),
        Value::StrArray(v) => v,
        _ => &[],
    }
}

fn push_int(out: &mut Vec<u8>, v: i64, bytes: usize) -> Result<(), String> {
    let range = || format!("{v} out of range for i{bytes}");
    match bytes {
        1 => out.extend(i8::try_from(v).map_err(|_| range())?.to_ne_bytes()),
        2 => out.extend(i16::try_from(v).map_err(|_| range())?.to_ne_bytes()),
        4 => out.extend(i32::try_from(v).map_err(|_| range())?.to_ne_bytes()),
        _ => out.extend(v.to_ne_bytes()),
    }
    Ok(())
}

fn push_uint(out: &mut Vec<u8>, v: u64, bytes: usize) -> Result<(), String> {
    let range = || format!("{v} out of range for u{bytes}");
    match bytes {
        1 => out.extend(u8::try_from(v).map_err(|_| range())?.to_ne_bytes()),
        2 => out.extend(u16::try_from(v).map_err(|_| range())?.to_ne_bytes()),
        4 => out.extend(u32::try_from(v).map_err(|_| range())?.to_ne_bytes()),
        _ => out.extend(v.to_ne_bytes()),
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn push_float(out: &mut Vec<u8>, v: f64, bytes: usize) {
    if bytes == 8 {
        out.extend(v.to_ne_bytes());
    } else {
        out.extend((v as f32).to_ne_bytes());
    }
}

fn push_str(out: &mut Vec<u8>, s: &str, width: usize) -> Result<(), String> {
    if s.len() > width {
        return Err(format!("'{s}' is longer than {width} bytes"));
    }
    out.extend(s.as_bytes());
    out.resize(out.len() + width - s.len(), 0);
    Ok(())
}

fn pack(values: &Value, field: &FieldLayout) -> Result<Vec<u8>, String> {
    let width = field.width;
    let mut out = Vec::with_capacity(values.len() * width);
    match (values, field.element) {
        (Value::Int(v), ElementType::Int(_)) => push_int(&mut out, *v, width)?,
        (Value::IntArray(v), ElementType::Int(_)) => {
            for &x in v {
                push_int(&mut out, x, width)?;
            }
        }
        (Value::UInt(v), ElementType::UInt(_)) => push_uint(&mut out, *v, width)?,
        (Value::UIntArray(v), ElementType::UInt(_)) => {
            for &x in v {
                push_uint(&mut out, x, width)?;
            }
        }
        (Value::Float(v), ElementType::Float(_)) => push_float(&mut out, *v, width),
        (Value::FloatArray(v), ElementType::Float(_)) => {
            for &x in v {
                push_float(&mut out, x, width);
            }
        }
        (Value::Bool(v), ElementType::Bool) => out.push(u8::from(*v)),
        (Value::BoolArray(v), ElementType::Bool) => out.extend(v.iter().map(|&b| u8::from(b))),
        (Value::Str(_) | Value::StrArray(_), e) if e.is_string() => {
            for s in strings(values) {
                push_str(&mut out, s, width)?;
            }
        }
        (_, element) => return Err(format!("value does not match element type {element}")),
    }
    Ok(out)
}

fn cell<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

fn shaped<T>(mut items: Vec<T>, array: bool, scalar: fn(T) -> Value, vector: fn(Vec<T>) -> Value) -> Value {
    match (array, items.pop()) {
        (false, Some(item)) => scalar(item),
        (_, last) => {
            items.extend(last);
            vector(items)
        }
    }
}

fn unpack<'a>(cells: impl Iterator<Item = &'a [u8]>, element: ElementType, array: bool) -> Value {
    match element {
        ElementType::Int(n) => {
            let items = cells
                .map(|c| match n {
                    1 => i64::from(i8::from_ne_bytes(cell(c))),
                    2 => i64::from(i16::from_ne_bytes(cell(c))),
                    4 => i64::from(i32::from_ne_bytes(cell(c))),
                    _ => i64::from_ne_bytes(cell(c)),
                })
                .collect();
            shaped(items, array, Value::Int, Value::IntArray)
        }
        ElementType::UInt(n) => {
            let items = cells
                .map(|c| match n {
                    1 => u64::from(c[0]),
                    2 => u64::from(u16::from_ne_bytes(cell(c))),
                    4 => u64::from(u32::from_ne_bytes(cell(c))),
                    _ => u64::from_ne_bytes(cell(c)),
                })
                .collect();
            shaped(items, array, Value::UInt, Value::UIntArray)
        }
        ElementType::Float(8) => {
            let items = cells.map(|c| f64::from_ne_bytes(cell(c))).collect();
            shaped(items, array, Value::Float, Value::FloatArray)
        }
        ElementType::Float(_) => {
            let items = cells.map(|c| f64::from(f32::from_ne_bytes(cell(c)))).collect();
            shaped(items, array, Value::Float, Value::FloatArray)
        }
        ElementType::Bool => {
            let items = cells.map(|c| c[0] != 0).collect();
            shaped(items, array, Value::Bool, Value::BoolArray)
        }
        ElementType::FixedAscii(_)
        | ElementType::FixedUnicode(_)
        | ElementType::VarAscii
        | ElementType::VarUnicode => {
            let items = cells
                .map(|c| {
                    let end = c.iter().position(|&b| b == 0).unwrap_or(c.len());
                    String::from_utf8_lossy(&c[..end]).into_owned()
                })
                .collect();
            shaped(items, array, Value::Str, Value::StrArray)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events() -> Vec<Column> {
        vec![
            Column::new(
                "start",
                OriginalType::array(ElementType::UInt(8)),
                Value::UIntArray(vec![10, 20, 35]),
            ),
            Column::new(
                "mean",
                OriginalType::array(ElementType::Float(4)),
                Value::FloatArray(vec![81.5, -3.25, 0.0]),
            ),
        ]
    }

    #[test]
    fn test_fields_packed_in_order() {
        let layout = RowLayout::new([
            ("a".to_string(), ElementType::Int(4)),
            ("b".to_string(), ElementType::Float(8)),
            ("c".to_string(), ElementType::Bool),
            ("d".to_string(), ElementType::Float(2)),
        ])
        .unwrap();
        let offsets: Vec<usize> = layout.fields().iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 4, 12, 13]);
        assert_eq!(layout.size(), 17);
    }

    #[test]
    fn test_events_rows() {
        let columns = events();
        let layout = RowLayout::for_columns(&columns).unwrap();
        assert_eq!(layout.size(), 12);

        let bytes = layout.encode(&columns).unwrap();
        assert_eq!(bytes.len(), 36);
        assert_eq!(&bytes[12..20], &20u64.to_ne_bytes());
        assert_eq!(&bytes[20..24], &(-3.25f32).to_ne_bytes());

        assert_eq!(layout.decode(&bytes, 3, true).unwrap(), columns);
    }

    #[test]
    fn test_variable_strings_widened() {
        let columns = vec![Column::new(
            "state",
            OriginalType::array(ElementType::VarAscii),
            Value::StrArray(vec!["ab".into(), "".into(), "abcd".into()]),
        )];
        let layout = RowLayout::for_columns(&columns).unwrap();
        assert_eq!(layout.fields()[0].element, ElementType::FixedAscii(4));

        let bytes = layout.encode(&columns).unwrap();
        assert_eq!(&bytes[..4], b"ab\0\0");
        let back = layout.decode(&bytes, 3, true).unwrap();
        assert_eq!(back[0].values, columns[0].values);
        assert_eq!(back[0].dtype, OriginalType::array(ElementType::FixedAscii(4)));
    }

    #[test]
    fn test_scalar_compound() {
        let columns = vec![
            Column::new("x", OriginalType::scalar(ElementType::Int(2)), Value::Int(-7)),
            Column::new("ok", OriginalType::scalar(ElementType::Bool), Value::Bool(true)),
        ];
        let layout = RowLayout::for_columns(&columns).unwrap();
        let bytes = layout.encode(&columns).unwrap();
        assert_eq!(layout.decode(&bytes, 1, false).unwrap(), columns);
    }

    #[test]
    fn test_value_out_of_range() {
        let columns = vec![Column::new(
            "x",
            OriginalType::array(ElementType::Int(1)),
            Value::IntArray(vec![1, 300]),
        )];
        let layout = RowLayout::for_columns(&columns).unwrap();
        assert!(matches!(
            layout.encode(&columns),
            Err(CompoundError::Field { field, .. }) if field == "x"
        ));
    }

    #[test]
    fn test_ragged_columns_rejected() {
        let mut columns = events();
        columns[1].values = Value::FloatArray(vec![1.0]);
        let layout = RowLayout::for_columns(&columns).unwrap();
        assert!(matches!(
            layout.encode(&columns),
            Err(CompoundError::RowCount { expected: 3, found: 1, .. })
        ));
    }

    #[test]
    fn test_variable_field_has_no_layout() {
        assert_eq!(
            RowLayout::new([("s".to_string(), ElementType::VarUnicode)]),
            Err(CompoundError::Unsized("s".to_string()))
        );
    }

    #[test]
    fn test_short_buffer_rejected() {
        let layout = RowLayout::for_columns(&events()).unwrap();
        assert!(matches!(
            layout.decode(&[0u8; 20], 2, true),
            Err(CompoundError::Buffer { len: 20, .. })
        ));
    }
}
