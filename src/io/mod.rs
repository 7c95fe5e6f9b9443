//! External collaborators: the CRAM archive, FASTQ files and Fast5 files.

pub mod archive;
pub mod compound;
pub mod fast5;
pub mod fastq;

pub use archive::{ArchiveError, ArchiveReader, ArchiveWriter, StoredRead};
pub use compound::{CompoundError, RowLayout};
pub use fast5::{list_fast5_files, system_backend, Fast5Backend, Fast5Error, Fast5Reader, Fast5Writer};
pub use fastq::{FastqError, FastqRead};
