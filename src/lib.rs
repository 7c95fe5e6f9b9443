//! # fast5cram
//!
//! Lossless conversion between directories of Oxford Nanopore Fast5 files and
//! a single CRAM archive.
//!
//! A Fast5 file is an HDF5 container holding one read: a tree of groups with
//! attributes, the raw signal, and optionally basecalls in FASTQ form. Archiving
//! thousands of them as separate files is wasteful; most attribute values are
//! identical across a run.
//!
//! `fast5cram` scans the whole run first and maps every attribute and dataset
//! column it finds to a two-character aux tag. Each file then becomes one
//! unmapped CRAM record, and the mapping table travels in the CRAM header so
//! that the archive alone can restore every file.
//!
//! ## Features
//!
//! - **Header-side common values**: an attribute value held by more than half
//!   of the files is stored once in the header and omitted from those records
//! - **Basecalls as sequence**: the FASTQ basecalls become the record's bases
//!   and qualities, or are paired from a directory of `<stem>.fastq` files
//! - **Signal skipping**: raw signal and event tables can be left out
//! - **All-or-nothing archives**: nothing appears at the output path unless the
//!   whole forward run succeeds
//! - **Self-describing**: the mapping table is checksummed and versioned
//!
//! ## Example
//!
//! ```rust,no_run
//! use fast5cram::io::fast5::system_backend;
//! use fast5cram::pipeline::{forward_convert, reverse_convert, ForwardOptions, ReverseOptions};
//!
//! let backend = system_backend()?;
//!
//! let summary = forward_convert(backend.as_ref(), &ForwardOptions::new("fast5_pass", "run.cram"))?;
//! println!("{} records, {} mapped paths", summary.records, summary.mapping_entries);
//!
//! let restored = reverse_convert(backend.as_ref(), &ReverseOptions::new("run.cram", "restored"))?;
//! assert!(restored.is_complete());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Fast5 tree model, value types and schema paths
//! - [`schema`]: Tag allocation, the mapping table and schema discovery
//! - [`codec`]: Fast5 file to CRAM record and back
//! - [`io`]: Fast5, FASTQ and CRAM archive access
//! - [`pipeline`]: Whole-run conversions in both directions
//! - [`cli`]: Command-line interface implementation

pub mod cli;
pub mod codec;
pub mod core;
pub mod io;
pub mod pipeline;
pub mod schema;
pub mod utils;

// Re-export commonly used types for convenience
pub use codec::{Decoder, Encoder};
pub use core::tree::Fast5File;
pub use core::types::*;
pub use core::value::Value;
pub use pipeline::{forward_convert, reverse_convert, ForwardOptions, ReverseOptions};
pub use schema::{SchemaTable, Tag, TagAllocator};
