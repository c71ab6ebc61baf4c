// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Blocktree Node
//!
//! Entry point for the `blocktree-node` binary: a thin CLI over the
//! layered store. Parses arguments, initializes logging, runs exactly one
//! store operation against the configured data directory, prints the JSON
//! result on stdout, and exits with a code describing what (if anything)
//! went wrong:
//!
//! `0` success · `1` validation · `2` signature/key · `3` serialization ·
//! `4` I/O.

mod cli;
mod commands;
mod logging;

use clap::Parser;

use cli::NodeCli;
use logging::LogFormat;

#[tokio::main]
async fn main() {
    let args = NodeCli::parse();

    logging::init_logging(&args.log_level, LogFormat::from_str_lossy(&args.log_format));

    match commands::execute(args).await {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => {
                eprintln!("error: cannot render result: {err}");
                std::process::exit(4);
            }
        },
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.exit_code());
        }
    }
}
