//! Core data types for the Fast5 to CRAM mapping.
//!
//! This module provides the fundamental types used throughout the library:
//!
//! - [`OriginalType`], [`ElementType`]: the HDF5 type vocabulary stored in the mapping table
//! - [`Kind`]: attribute (ATR) or dataset column (COL)
//! - [`Value`]: a decoded attribute or column value and its canonical text form
//! - [`SchemaPath`]: the identifier of a mapped attribute or column
//! - [`Fast5File`]: the in-memory tree of one Fast5 file
//!
//! ## Type codes
//!
//! | Code | HDF5 type |
//! |------|-----------|
//! | `i1` `i2` `i4` `i8` | signed integer of that many bytes |
//! | `u1` `u2` `u4` `u8` | unsigned integer |
//! | `f2` `f4` `f8` | floating point |
//! | `b1` | boolean |
//! | `S<n>` `U<n>` | fixed-length ASCII / UTF-8 string of `n` bytes |
//! | `vS` `vU` | variable-length ASCII / UTF-8 string |
//!
//! A `[]` suffix marks a one-dimensional array.

pub mod path;
pub mod tree;
pub mod types;
pub mod value;

pub use path::SchemaPath;
pub use tree::{Attribute, Column, Dataset, Entry, Fast5File, Group};
pub use types::{ElementType, Kind, OriginalType};
pub use value::Value;
