use std::path::PathBuf;

use clap::Args;

use crate::cli::OutputFormat;
use crate::io::fast5::{system_backend, Fast5Reader};
use crate::pipeline::forward::{forward_convert, ForwardOptions, ForwardSummary};

#[derive(Args)]
pub struct ForwardArgs {
    /// Directory of single-read .fast5 files
    #[arg(short, long = "inputdir", value_name = "INPUTDIR")]
    pub input_dir: PathBuf,

    /// CRAM archive to create
    #[arg(short, long = "outputfile", value_name = "OUTPUTFILE")]
    pub output_file: PathBuf,

    /// Directory of <stem>.fastq files paired with the inputs by name
    #[arg(short, long = "fastqdir", value_name = "FASTQDIR")]
    pub fastq_dir: Option<PathBuf>,

    /// Leave the raw signal and derived Events out of the archive
    #[arg(short, long = "skipsignal")]
    pub skip_signal: bool,
}

impl ForwardArgs {
    fn options(&self) -> ForwardOptions {
        ForwardOptions {
            fastq_dir: self.fastq_dir.clone(),
            skip_signal: self.skip_signal,
            ..ForwardOptions::new(&self.input_dir, &self.output_file)
        }
    }
}

/// Execute forward-convert subcommand
///
/// # Errors
///
/// Returns an error if the input directory has no Fast5 files, any input
/// cannot be read, the tag space is exhausted, or the archive cannot be written.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: ForwardArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let backend = system_backend()?;
    run_with(&args, backend.as_ref(), format, verbose)
}

/// Execute forward-convert against a given Fast5 reader
///
/// # Errors
///
/// See [`run`].
pub fn run_with<R: Fast5Reader + ?Sized>(
    args: &ForwardArgs,
    reader: &R,
    format: OutputFormat,
    verbose: bool,
) -> anyhow::Result<()> {
    if let Some(dir) = &args.fastq_dir {
        if !dir.is_dir() {
            anyhow::bail!("FASTQ directory {} does not exist", dir.display());
        }
    }
    if verbose {
        eprintln!(
            "Converting {} -> {}{}",
            args.input_dir.display(),
            args.output_file.display(),
            if args.skip_signal { " (skipping signal)" } else { "" }
        );
    }

    let summary = forward_convert(reader, &args.options())?;

    match format {
        OutputFormat::Text => print_text_summary(&summary),
        OutputFormat::Json => print_json_summary(&summary)?,
    }
    Ok(())
}

fn print_text_summary(summary: &ForwardSummary) {
    println!("Forward Conversion");
    println!("{}", "=".repeat(60));
    println!("  Input files: {}", summary.files);
    println!("  Records written: {}", summary.records);
    println!("  With basecalls: {}", summary.with_sequence);
    println!(
        "  Mapping entries: {} ({} with a common value)",
        summary.mapping_entries, summary.common_values
    );
    println!(
        "  Archive: {} ({} bytes)",
        summary.output.display(),
        summary.archive_bytes
    );
}

fn print_json_summary(summary: &ForwardSummary) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}
