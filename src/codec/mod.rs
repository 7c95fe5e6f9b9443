//! Record encoding and decoding against a [`SchemaTable`](crate::schema::SchemaTable).
//!
//! - [`encoder`]: Fast5 tree to archive record, omitting common values
//! - [`decoder`]: archive record to Fast5 tree, falling back to common values
//! - [`aux`]: value conversion to and from aux fields

pub mod aux;
pub mod decoder;
pub mod encoder;

pub use decoder::{Advisory, DecodeError, DecodedRead, Decoder};
pub use encoder::{EncodeError, Encoder, ReadRecord};
