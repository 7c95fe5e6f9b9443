//! Whole-run conversions in both directions.

pub mod forward;
pub mod reverse;

use std::path::PathBuf;

use thiserror::Error;

use crate::codec::encoder::EncodeError;
use crate::io::archive::ArchiveError;
use crate::io::fast5::Fast5Error;
use crate::io::fastq::FastqError;
use crate::schema::table::SchemaError;

pub use forward::{forward_convert, ForwardOptions, ForwardSummary};
pub use reverse::{reverse_convert, ReverseOptions, ReverseSummary};

/// Files or records held in memory at once by default
pub const DEFAULT_CHUNK_SIZE: usize = 256;

/// Fatal errors of a conversion run
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error(transparent)]
    Fast5(#[from] Fast5Error),

    #[error(transparent)]
    Fastq(#[from] FastqError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
