use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid type code: '{0}'")]
pub struct InvalidTypeCode(pub String);

/// Whether a mapped path names an attribute or a dataset column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    /// Group- or dataset-level attribute
    Attribute,
    /// One column of a dataset (simple datasets have a single column)
    Column,
}

impl Kind {
    /// Prefix used for this kind in the mapping table grammar
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Attribute => "ATR",
            Self::Column => "COL",
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Element datatype of an HDF5 attribute or dataset column
///
/// Widths are in bytes. Fixed-length strings keep their declared length; the
/// padding/termination mode of the source type is not recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    Int(u8),
    UInt(u8),
    Float(u8),
    Bool,
    FixedAscii(usize),
    FixedUnicode(usize),
    VarAscii,
    VarUnicode,
}

impl ElementType {
    #[must_use]
    pub fn is_string(self) -> bool {
        matches!(
            self,
            Self::FixedAscii(_) | Self::FixedUnicode(_) | Self::VarAscii | Self::VarUnicode
        )
    }

    /// Fixed-length strings cannot be rebuilt with their exact padding mode
    #[must_use]
    pub fn is_fixed_string(self) -> bool {
        matches!(self, Self::FixedAscii(_) | Self::FixedUnicode(_))
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(w) => write!(f, "i{w}"),
            Self::UInt(w) => write!(f, "u{w}"),
            Self::Float(w) => write!(f, "f{w}"),
            Self::Bool => write!(f, "b1"),
            Self::FixedAscii(n) => write!(f, "S{n}"),
            Self::FixedUnicode(n) => write!(f, "U{n}"),
            Self::VarAscii => write!(f, "vS"),
            Self::VarUnicode => write!(f, "vU"),
        }
    }
}

impl FromStr for ElementType {
    type Err = InvalidTypeCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidTypeCode(s.to_string());

        match s {
            "b1" => return Ok(Self::Bool),
            "vS" => return Ok(Self::VarAscii),
            "vU" => return Ok(Self::VarUnicode),
            _ => {}
        }

        let mut chars = s.chars();
        let prefix = chars.next().ok_or_else(invalid)?;
        let size: usize = chars.as_str().parse().map_err(|_| invalid())?;

        match prefix {
            'i' | 'u' => {
                let width = u8::try_from(size).map_err(|_| invalid())?;
                if !matches!(width, 1 | 2 | 4 | 8) {
                    return Err(invalid());
                }
                Ok(if prefix == 'i' {
                    Self::Int(width)
                } else {
                    Self::UInt(width)
                })
            }
            'f' => match size {
                2 | 4 | 8 => Ok(Self::Float(size as u8)),
                _ => Err(invalid()),
            },
            'S' => Ok(Self::FixedAscii(size)),
            'U' => Ok(Self::FixedUnicode(size)),
            _ => Err(invalid()),
        }
    }
}

/// Source datatype descriptor stored verbatim in the mapping table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OriginalType {
    pub element: ElementType,
    /// One-dimensional array rather than a scalar
    pub array: bool,
}

impl OriginalType {
    #[must_use]
    pub fn scalar(element: ElementType) -> Self {
        Self {
            element,
            array: false,
        }
    }

    #[must_use]
    pub fn array(element: ElementType) -> Self {
        Self {
            element,
            array: true,
        }
    }
}

impl std::fmt::Display for OriginalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.array {
            write!(f, "{}[]", self.element)
        } else {
            write!(f, "{}", self.element)
        }
    }
}

impl FromStr for OriginalType {
    type Err = InvalidTypeCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (code, array) = match s.strip_suffix("[]") {
            Some(code) => (code, true),
            None => (s, false),
        };
        let element = code
            .parse()
            .map_err(|_| InvalidTypeCode(s.to_string()))?;
        Ok(Self { element, array })
    }
}
