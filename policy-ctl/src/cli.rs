use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "policy-ctl")]
#[command(version, about = "Validate and inspect seccomp policy documents", long_about = None)]
#[command(after_help = "EXAMPLES:
    # Check that a policy builds on this kernel
    policy-ctl validate profile.json

    # Show the rules a policy compiles to
    policy-ctl compile profile.json
    policy-ctl compile --json profile.json

    # Report seccomp support
    policy-ctl check
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that a policy document builds
    Validate {
        /// Policy document (JSON)
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Build a policy and print the resulting filter
    Compile {
        /// Policy document (JSON)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print the filter as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check seccomp support on this kernel
    Check,
}
