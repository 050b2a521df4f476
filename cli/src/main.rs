use std::process::ExitCode;

use clap::Parser;
use fowsync_cli::{Cli, init_tracing, pause_for_operator, run};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            pause_for_operator();
            ExitCode::FAILURE
        }
    }
}
