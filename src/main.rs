use clap::Parser;
use tracing_subscriber::EnvFilter;

use release_helper::cli::{orchestration, Cli};
use release_helper::error::ReleaseError;
use release_helper::ui;

/// Exit code for rejected input (bad version, selector or trigger inputs)
const EXIT_VALIDATION: i32 = 2;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = std::env::var("RELEASE_HELPER_LOG")
        .ok()
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match orchestration::run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            ui::display_error(&format!("{:#}", e));
            let validation = e
                .downcast_ref::<ReleaseError>()
                .is_some_and(ReleaseError::is_validation);
            std::process::exit(if validation { EXIT_VALIDATION } else { 1 });
        }
    }
}
