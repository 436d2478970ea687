//! Seccomp policy controller CLI - validate and inspect policy documents

mod cli;
mod commands;
mod logging;

use clap::Parser;
use cli::{Cli, Commands};
use commands::{check_requirements, compile_file, validate_file};
use console::style;

fn main() {
    let cli = Cli::parse();

    logging::init_logger(cli.verbose);

    let result = match cli.command {
        Commands::Validate { file } => validate_file(&file).map(|()| "ok".to_string()),
        Commands::Compile { file, json } => compile_file(&file, json),
        Commands::Check => Ok(check_requirements()),
    };

    match result {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e.chain());
            std::process::exit(1);
        }
    }
}
