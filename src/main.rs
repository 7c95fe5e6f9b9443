use clap::Parser;
use tracing_subscriber::EnvFilter;

use fast5cram::cli;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity flag
    let filter = if cli.verbose {
        EnvFilter::new("fast5cram=debug,info")
    } else {
        EnvFilter::new("fast5cram=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }

    match cli.command {
        cli::Commands::ForwardConvert(args) => {
            cli::forward::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::ReverseConvert(args) => {
            cli::reverse::run(args, cli.format, cli.verbose)?;
        }
    }

    Ok(())
}
