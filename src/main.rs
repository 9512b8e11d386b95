//! NoTrack - Tracker and Malware Block Lists for dnsmasq

use clap::Parser;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use notrack::cli::{Cli, Commands};
use notrack::error::exit_code_for;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .without_time()
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Unable to initialize logging: {}", e);
    }

    let result = match cli.command {
        Commands::Update { force } => notrack::commands::update::run(force, &cli.config).await,
        Commands::Test => notrack::commands::test::run(&cli.config),
        Commands::Count => notrack::commands::count::run(&cli.config),
        Commands::Stats => notrack::commands::stats::run(&cli.config),
        Commands::Version => {
            println!("notrack {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}
