//! ems-reconcile entry point: CLI wiring, logging, and artifact output.

use std::process;

use tracing::info;
use tracing_subscriber::EnvFilter;

use ems_reconcile::cli::parse_args;
use ems_reconcile::config::ReconcileConfig;
use ems_reconcile::runner::{run, write_outputs};

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn main() {
    let cli = parse_args();
    init_tracing(cli.verbose);

    let mut config = match cli.config.as_deref() {
        Some(path) => match ReconcileConfig::from_toml_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        },
        None => ReconcileConfig::default(),
    };
    cli.apply(&mut config);

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    info!(data_path = %cli.data_path.display(), "starting reconciliation");
    let output = match run(&cli.data_path, &config) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    println!("{}", output.report);

    if let Err(e) = write_outputs(&output, &config) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
