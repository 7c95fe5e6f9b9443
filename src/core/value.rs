use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{ElementType, OriginalType};
use crate::utils::validation::{escape, join_escaped, split_escaped, unescape};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Value '{text}' does not match type {original}")]
pub struct InvalidValue {
    pub text: String,
    pub original: OriginalType,
}

/// A decoded attribute value or dataset column
///
/// Integers are widened to 64 bits and floats to `f64`; the declared width
/// lives in the matching [`OriginalType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Str(String),
    IntArray(Vec<i64>),
    UIntArray(Vec<u64>),
    FloatArray(Vec<f64>),
    BoolArray(Vec<bool>),
    StrArray(Vec<String>),
}

impl Value {
    /// Number of items: 1 for scalars, the length for arrays
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int(_) | Self::UInt(_) | Self::Float(_) | Self::Bool(_) | Self::Str(_) => 1,
            Self::IntArray(v) => v.len(),
            Self::UIntArray(v) => v.len(),
            Self::FloatArray(v) => v.len(),
            Self::BoolArray(v) => v.len(),
            Self::StrArray(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that the value's shape and family agree with `original`
    #[must_use]
    pub fn matches(&self, original: &OriginalType) -> bool {
        use ElementType as E;

        match (self, original.array, original.element) {
            (Self::Int(_), false, E::Int(_))
            | (Self::UInt(_), false, E::UInt(_))
            | (Self::Float(_), false, E::Float(_))
            | (Self::Bool(_), false, E::Bool)
            | (Self::IntArray(_), true, E::Int(_))
            | (Self::UIntArray(_), true, E::UInt(_))
            | (Self::FloatArray(_), true, E::Float(_))
            | (Self::BoolArray(_), true, E::Bool) => true,
            (Self::Str(_), false, e) | (Self::StrArray(_), true, e) => e.is_string(),
            _ => false,
        }
    }

    /// Canonical text form, used for common-value tallies and `CV:` fields.
    ///
    /// Floats use the shortest representation that parses back to the same
    /// value; strings are escaped so the text never contains a line break.
    #[must_use]
    pub fn to_text(&self) -> String {
        fn join<T: ToString>(items: &[T]) -> String {
            items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",")
        }

        match self {
            Self::Int(v) => v.to_string(),
            Self::UInt(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Bool(v) => u8::from(*v).to_string(),
            Self::Str(s) => escape(s, &[]),
            Self::IntArray(v) => join(v),
            Self::UIntArray(v) => join(v),
            Self::FloatArray(v) => join(v),
            Self::BoolArray(v) => v
                .iter()
                .map(|b| u8::from(*b).to_string())
                .collect::<Vec<_>>()
                .join(","),
            Self::StrArray(v) => join_escaped(v),
        }
    }

    /// Parse the canonical text form for the given type
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` if the text cannot be read as `original`.
    pub fn from_text(text: &str, original: &OriginalType) -> Result<Self, InvalidValue> {
        let invalid = || InvalidValue {
            text: text.to_string(),
            original: *original,
        };

        fn items<T: std::str::FromStr>(text: &str) -> Option<Vec<T>> {
            if text.is_empty() {
                return Some(Vec::new());
            }
            text.split(',').map(|s| s.parse().ok()).collect()
        }

        fn parse_bool(s: &str) -> Option<bool> {
            match s {
                "0" => Some(false),
                "1" => Some(true),
                _ => None,
            }
        }

        use ElementType as E;
        let value = match (original.array, original.element) {
            (false, E::Int(_)) => text.parse().ok().map(Self::Int),
            (false, E::UInt(_)) => text.parse().ok().map(Self::UInt),
            (false, E::Float(_)) => text.parse().ok().map(Self::Float),
            (false, E::Bool) => parse_bool(text).map(Self::Bool),
            (false, _) => unescape(text).map(Self::Str),
            (true, E::Int(_)) => items(text).map(Self::IntArray),
            (true, E::UInt(_)) => items(text).map(Self::UIntArray),
            (true, E::Float(_)) => items(text).map(Self::FloatArray),
            (true, E::Bool) => {
                if text.is_empty() {
                    Some(Self::BoolArray(Vec::new()))
                } else {
                    text.split(',')
                        .map(parse_bool)
                        .collect::<Option<Vec<_>>>()
                        .map(Self::BoolArray)
                }
            }
            (true, _) => split_escaped(text).map(Self::StrArray),
        };

        value.ok_or_else(invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(code: &str) -> OriginalType {
        code.parse().unwrap()
    }

    #[test]
    fn test_text_form_scalars() {
        assert_eq!(Value::Int(-3).to_text(), "-3");
        assert_eq!(Value::Bool(true).to_text(), "1");
        assert_eq!(Value::Str("Lambda_3.6kb".into()).to_text(), "Lambda_3.6kb");

        assert_eq!(Value::from_text("-3", &ty("i4")).unwrap(), Value::Int(-3));
        assert_eq!(Value::from_text("0", &ty("b1")).unwrap(), Value::Bool(false));
        assert_eq!(
            Value::from_text("4000.5", &ty("f8")).unwrap(),
            Value::Float(4000.5)
        );
    }

    #[test]
    fn test_float_text_is_exact() {
        let v = Value::Float(0.1 + 0.2);
        let back = Value::from_text(&v.to_text(), &ty("f8")).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_string_with_line_break() {
        let v = Value::Str("line one\nline two".into());
        let text = v.to_text();
        assert!(!text.contains('\n'));
        assert_eq!(Value::from_text(&text, &ty("vS")).unwrap(), v);
    }

    #[test]
    fn test_text_form_arrays() {
        let v = Value::IntArray(vec![1, -2, 3]);
        assert_eq!(v.to_text(), "1,-2,3");
        assert_eq!(Value::from_text("1,-2,3", &ty("i2[]")).unwrap(), v);
        assert_eq!(
            Value::from_text("", &ty("u1[]")).unwrap(),
            Value::UIntArray(Vec::new())
        );
        let s = Value::StrArray(vec!["a,b".into(), "c".into()]);
        assert_eq!(Value::from_text(&s.to_text(), &ty("S3[]")).unwrap(), s);
    }

    #[test]
    fn test_from_text_rejects_mismatch() {
        assert!(Value::from_text("abc", &ty("i4")).is_err());
        assert!(Value::from_text("-1", &ty("u2")).is_err());
        assert!(Value::from_text("2", &ty("b1")).is_err());
    }

    #[test]
    fn test_matches_type() {
        assert!(Value::Int(1).matches(&ty("i8")));
        assert!(!Value::Int(1).matches(&ty("i8[]")));
        assert!(Value::Str("x".into()).matches(&ty("S1")));
        assert!(!Value::Str("x".into()).matches(&ty("f4")));
        assert!(Value::FloatArray(vec![]).matches(&ty("f4[]")));
    }
}
