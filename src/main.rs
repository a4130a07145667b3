// src/main.rs

use std::process::ExitCode;

use rundag::{cli, logging, run};

// Returning from `main` shuts the runtime down, which kills the children of
// any aborted task workers.
#[tokio::main]
async fn main() -> ExitCode {
    match run_main().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("rundag error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
