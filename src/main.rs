// src/main.rs

use std::process::ExitCode;

use gitwatch::{cli, logging, run};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("gitwatch: {err:#}");
        return ExitCode::from(2);
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "gitwatch stopped");
            eprintln!("gitwatch error: {err:?}");
            ExitCode::FAILURE
        }
    }
}
