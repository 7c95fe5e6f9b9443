//! Mapping between Fast5 node paths and two-character aux tags.
//!
//! - [`tag`]: the ordered tag alphabet and its allocator
//! - [`table`]: the mapping table and its header-comment grammar
//! - [`discovery`]: building a table from a population of files
//!
//! ## Header grammar
//!
//! ```text
//! FAST5-MAPPING:v1 N:2 M5:<md5 of the entry lines>
//! ATR:'/UniqueGlobalKey/context_tags/sample_frequency':vS TG:a0 CV:4000
//! COL:'/Raw/Reads/Read_XXX/Signal/noname':i2[] TG:a1
//! ```

pub mod discovery;
pub mod table;
pub mod tag;

pub use discovery::{discover, DiscoveryOptions, FileScan, SchemaBuilder};
pub use table::{MappingEntry, SchemaError, SchemaTable};
pub use tag::{Tag, TagAllocator, TagError};
