mod cli;
mod framex;
mod logging;
mod model;
mod orchestrator;
mod session;
mod storage;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_tui = args.is_tui();

    match cli::run(args).await {
        Ok(()) => {
            // The stdin reader thread may still be blocked on a read; exit explicitly.
            if !is_tui {
                std::process::exit(0);
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}
