use callcenter_sim::cli::Args;
use callcenter_sim::commands;
use clap::Parser;
use std::process;

fn main() {
    let args = Args::parse();

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        // Blocking steps cannot be cancelled; Ctrl-C ends the process
        tokio::select! {
            result = commands::run(args) => result,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nReceived CTRL+C, shutting down...");
                Err(anyhow::anyhow!("Interrupted by user; rerun with --resume to continue ingestion"))
            }
        }
    });

    match result {
        Ok(_summary) => process::exit(0),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}
