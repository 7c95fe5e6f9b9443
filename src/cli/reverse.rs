use std::path::PathBuf;

use clap::Args;

use crate::cli::OutputFormat;
use crate::io::fast5::{system_backend, Fast5Writer};
use crate::pipeline::reverse::{reverse_convert, ReverseOptions, ReverseSummary};

#[derive(Args)]
pub struct ReverseArgs {
    /// CRAM archive written by forward-convert
    #[arg(short, long = "inputfile", value_name = "INPUTFILE")]
    pub input_file: PathBuf,

    /// Directory to restore into
    #[arg(short, long = "outputdir", value_name = "OUTPUTDIR", default_value = ".")]
    pub output_dir: PathBuf,
}

/// Execute reverse-convert subcommand
///
/// # Errors
///
/// Returns an error if the archive cannot be read or has no valid mapping
/// table, or if any decoded file could not be written.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: ReverseArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let backend = system_backend()?;
    run_with(&args, backend.as_ref(), format, verbose)
}

/// Execute reverse-convert against a given Fast5 writer
///
/// # Errors
///
/// See [`run`].
pub fn run_with<W: Fast5Writer + ?Sized>(
    args: &ReverseArgs,
    writer: &W,
    format: OutputFormat,
    verbose: bool,
) -> anyhow::Result<()> {
    if verbose {
        eprintln!(
            "Restoring {} -> {}",
            args.input_file.display(),
            args.output_dir.display()
        );
    }

    let summary = reverse_convert(
        writer,
        &ReverseOptions::new(&args.input_file, &args.output_dir),
    )?;

    match format {
        OutputFormat::Text => print_text_summary(&summary),
        OutputFormat::Json => print_json_summary(&summary)?,
    }

    if !summary.failed.is_empty() {
        anyhow::bail!(
            "{} of {} records could not be written",
            summary.failed.len(),
            summary.records
        );
    }
    Ok(())
}

fn print_text_summary(summary: &ReverseSummary) {
    println!("Reverse Conversion");
    println!("{}", "=".repeat(60));
    println!("  Records read: {}", summary.records);
    println!("  Files restored: {}", summary.restored);
    println!("  Output directory: {}", summary.output_dir.display());

    if summary.advisories > 0 {
        println!(
            "  Type advisories: {} (fixed-length strings restored as variable-length)",
            summary.advisories
        );
    }

    if !summary.skipped.is_empty() {
        println!("\nSkipped records ({}):", summary.skipped.len());
        for skipped in &summary.skipped {
            println!("  #{}: {}", skipped.index, skipped.reason);
        }
    }

    if !summary.failed.is_empty() {
        println!("\nFailed writes ({}):", summary.failed.len());
        for failed in &summary.failed {
            println!("  #{}: {}", failed.index, failed.reason);
        }
    }
}

fn print_json_summary(summary: &ReverseSummary) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}
