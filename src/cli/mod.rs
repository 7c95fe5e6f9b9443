//! Command-line interface for fast5cram.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **forward-convert**: Pack a directory of Fast5 files into one CRAM archive
//! - **reverse-convert**: Restore the Fast5 files held in a CRAM archive
//!
//! ## Usage
//!
//! ```text
//! # Archive a run, pairing each read with <stem>.fastq from a basecall directory
//! fast5cram forward-convert -i fast5_pass/ -o run.cram -f fastq_pass/
//!
//! # Archive metadata and basecalls only, leaving out the raw signal
//! fast5cram forward-convert -i fast5_pass/ -o run.cram --skipsignal
//!
//! # Restore into a directory, with a JSON summary for scripting
//! fast5cram --format json reverse-convert -i run.cram -o restored/
//! ```

use clap::{Parser, Subcommand};

pub mod forward;
pub mod reverse;

#[derive(Parser)]
#[command(name = "fast5cram")]
#[command(author = "Fulcrum Genomics")]
#[command(version)]
#[command(about = "Convert Oxford Nanopore Fast5 files to a CRAM archive and back")]
#[command(
    long_about = "fast5cram packs a directory of single-read Fast5 files into one CRAM file.\n\nEvery HDF5 attribute and dataset column is mapped to a two-character aux tag; the mapping table is stored in the CRAM header, so the archive alone is enough to restore the original files:\n- Values shared by most files are stored once in the header\n- Basecalls become the record's sequence and qualities\n- The raw signal can be left out with --skipsignal"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Summary output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Worker threads (defaults to all cores)
    #[arg(short, long, global = true)]
    pub threads: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a directory of Fast5 files into one CRAM archive
    ForwardConvert(forward::ForwardArgs),

    /// Restore Fast5 files from a CRAM archive
    ReverseConvert(reverse::ReverseArgs),
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
