//! Conversion between [`Value`]s and CRAM aux field values.
//!
//! | Original type | Aux type |
//! |---------------|----------|
//! | `i1` `i2` `i4` | `c` `s` `i` |
//! | `u1` `u2` `u4` | `C` `S` `I` |
//! | `f2` `f4` | `f` |
//! | `b1` | `C` (0 or 1) |
//! | arrays of the above | `B` with the same subtype |
//! | `i8` `u8` `f8`, strings, and arrays of them | `Z` holding the value's text form |
//!
//! 64-bit numbers do not fit any aux integer or float type, so they travel as
//! text, which round-trips exactly.

use bstr::{BString, ByteSlice};
use noodles::sam::alignment::record_buf::data::field::value::Array;
use noodles::sam::alignment::record_buf::data::field::Value as AuxValue;
use thiserror::Error;

use crate::core::types::{ElementType, OriginalType};
use crate::core::value::Value;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuxError {
    #[error("Value {value} is out of range for {original}")]
    OutOfRange { value: String, original: OriginalType },

    #[error("Value does not match type {original}")]
    TypeMismatch { original: OriginalType },

    #[error("Aux payload cannot be read as {original}: {reason}")]
    InvalidPayload {
        original: OriginalType,
        reason: String,
    },
}

fn narrow<T, U>(values: &[T], original: &OriginalType) -> Result<Vec<U>, AuxError>
where
    T: Copy + ToString,
    U: TryFrom<T>,
{
    values
        .iter()
        .map(|&v| {
            U::try_from(v).map_err(|_| AuxError::OutOfRange {
                value: v.to_string(),
                original: *original,
            })
        })
        .collect()
}

fn narrow_one<T, U>(value: T, original: &OriginalType) -> Result<U, AuxError>
where
    T: Copy + ToString,
    U: TryFrom<T>,
{
    U::try_from(value).map_err(|_| AuxError::OutOfRange {
        value: value.to_string(),
        original: *original,
    })
}

/// Whether values of this type are carried as `Z` text
fn is_text_carried(element: ElementType) -> bool {
    matches!(
        element,
        ElementType::Int(8) | ElementType::UInt(8) | ElementType::Float(8)
    ) || element.is_string()
}

/// Encode a value as an aux field value.
///
/// # Errors
///
/// Returns `AuxError::TypeMismatch` if the value's shape or family does not
/// agree with `original`, or `AuxError::OutOfRange` if an integer does not
/// fit its declared width.
pub fn to_aux(value: &Value, original: &OriginalType) -> Result<AuxValue, AuxError> {
    if !value.matches(original) {
        return Err(AuxError::TypeMismatch {
            original: *original,
        });
    }
    if is_text_carried(original.element) {
        return Ok(AuxValue::String(BString::from(value.to_text())));
    }

    use ElementType as E;
    let aux = match (value, original.element) {
        (Value::Int(v), E::Int(1)) => AuxValue::Int8(narrow_one(*v, original)?),
        (Value::Int(v), E::Int(2)) => AuxValue::Int16(narrow_one(*v, original)?),
        (Value::Int(v), _) => AuxValue::Int32(narrow_one(*v, original)?),
        (Value::UInt(v), E::UInt(1)) => AuxValue::UInt8(narrow_one(*v, original)?),
        (Value::UInt(v), E::UInt(2)) => AuxValue::UInt16(narrow_one(*v, original)?),
        (Value::UInt(v), _) => AuxValue::UInt32(narrow_one(*v, original)?),
        #[allow(clippy::cast_possible_truncation)] // f2 and f4 values fit in f32
        (Value::Float(v), _) => AuxValue::Float(*v as f32),
        (Value::Bool(v), _) => AuxValue::UInt8(u8::from(*v)),

        (Value::IntArray(v), E::Int(1)) => AuxValue::Array(Array::Int8(narrow(v, original)?)),
        (Value::IntArray(v), E::Int(2)) => AuxValue::Array(Array::Int16(narrow(v, original)?)),
        (Value::IntArray(v), _) => AuxValue::Array(Array::Int32(narrow(v, original)?)),
        (Value::UIntArray(v), E::UInt(1)) => AuxValue::Array(Array::UInt8(narrow(v, original)?)),
        (Value::UIntArray(v), E::UInt(2)) => {
            AuxValue::Array(Array::UInt16(narrow(v, original)?))
        }
        (Value::UIntArray(v), _) => AuxValue::Array(Array::UInt32(narrow(v, original)?)),
        #[allow(clippy::cast_possible_truncation)]
        (Value::FloatArray(v), _) => {
            AuxValue::Array(Array::Float(v.iter().map(|&f| f as f32).collect()))
        }
        (Value::BoolArray(v), _) => {
            AuxValue::Array(Array::UInt8(v.iter().map(|&b| u8::from(b)).collect()))
        }

        (Value::Str(_) | Value::StrArray(_), _) => {
            return Err(AuxError::TypeMismatch {
                original: *original,
            })
        }
    };
    Ok(aux)
}

fn aux_integer(aux: &AuxValue) -> Option<i64> {
    match aux {
        AuxValue::Int8(n) => Some(i64::from(*n)),
        AuxValue::UInt8(n) => Some(i64::from(*n)),
        AuxValue::Int16(n) => Some(i64::from(*n)),
        AuxValue::UInt16(n) => Some(i64::from(*n)),
        AuxValue::Int32(n) => Some(i64::from(*n)),
        AuxValue::UInt32(n) => Some(i64::from(*n)),
        _ => None,
    }
}

fn array_integers(array: &Array) -> Option<Vec<i64>> {
    match array {
        Array::Int8(v) => Some(v.iter().map(|&n| i64::from(n)).collect()),
        Array::UInt8(v) => Some(v.iter().map(|&n| i64::from(n)).collect()),
        Array::Int16(v) => Some(v.iter().map(|&n| i64::from(n)).collect()),
        Array::UInt16(v) => Some(v.iter().map(|&n| i64::from(n)).collect()),
        Array::Int32(v) => Some(v.iter().map(|&n| i64::from(n)).collect()),
        Array::UInt32(v) => Some(v.iter().map(|&n| i64::from(n)).collect()),
        Array::Float(_) => None,
    }
}

fn to_bool(n: i64) -> Option<bool> {
    match n {
        0 => Some(false),
        1 => Some(true),
        _ => None,
    }
}

/// Decode an aux field value back into a value of `original`'s type.
///
/// Integer payloads are accepted at any aux width as long as the number fits
/// the declared type.
///
/// # Errors
///
/// Returns `AuxError::InvalidPayload` if the payload cannot represent a value
/// of `original`.
pub fn from_aux(aux: &AuxValue, original: &OriginalType) -> Result<Value, AuxError> {
    let invalid = |reason: &str| AuxError::InvalidPayload {
        original: *original,
        reason: reason.to_string(),
    };

    if let AuxValue::String(text) = aux {
        let text = text.to_str().map_err(|_| invalid("text is not UTF-8"))?;
        return Value::from_text(text, original).map_err(|e| invalid(&e.to_string()));
    }

    use ElementType as E;
    let value = match (original.array, original.element, aux) {
        (false, E::Int(_), aux) => aux_integer(aux).map(Value::Int),
        (false, E::UInt(_), aux) => aux_integer(aux)
            .and_then(|n| u64::try_from(n).ok())
            .map(Value::UInt),
        (false, E::Bool, aux) => aux_integer(aux).and_then(to_bool).map(Value::Bool),
        (false, E::Float(_), AuxValue::Float(f)) => Some(Value::Float(f64::from(*f))),

        (true, E::Float(_), AuxValue::Array(Array::Float(v))) => {
            Some(Value::FloatArray(v.iter().map(|&f| f64::from(f)).collect()))
        }
        (true, E::Int(_), AuxValue::Array(array)) => array_integers(array).map(Value::IntArray),
        (true, E::UInt(_), AuxValue::Array(array)) => array_integers(array)
            .and_then(|v| v.into_iter().map(|n| u64::try_from(n).ok()).collect())
            .map(Value::UIntArray),
        (true, E::Bool, AuxValue::Array(array)) => array_integers(array)
            .and_then(|v| v.into_iter().map(to_bool).collect())
            .map(Value::BoolArray),
        _ => None,
    };

    value.ok_or_else(|| invalid("unexpected aux type"))
}
