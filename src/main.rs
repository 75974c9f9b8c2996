//! rdsvalidator - validate RDS snapshots by restoring them

use clap::Parser;
use rds_validator::cli::Cli;
use rds_validator::domain::UsageError;
use rds_validator::domain::exit::{EXIT_FAILURE, EXIT_USAGE};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            if e.downcast_ref::<UsageError>().is_some() {
                eprintln!("Run with --help for usage.");
                EXIT_USAGE
            } else {
                EXIT_FAILURE
            }
        }
    };
    std::process::exit(code);
}
