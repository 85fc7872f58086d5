use anyhow::Result;
use clap::Parser;
use dynmock::cli::{self, Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::List => cli::list_tests(),
        Commands::Run(args) => {
            if !cli::run_tests(&args)? {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
