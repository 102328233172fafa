use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "plugflow")]
#[command(about = "Evaluate and inspect plugflow graph descriptions")]
pub struct Cli {
    /// Log at debug level regardless of RUST_LOG
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use this configuration file instead of the per-user one
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pull a plug's value and print it with its hash
    Eval {
        /// Graph description (.json, or .bin for the binary form)
        file: PathBuf,
        /// Dot separated plug path, e.g. `loop.out`
        plug: String,
        /// Context variable, `key=value`. Repeatable.
        #[arg(short, long = "context", value_name = "KEY=VALUE")]
        context: Vec<String>,
    },
    /// Print a plug's hash without computing anything
    Hash {
        file: PathBuf,
        plug: String,
        #[arg(short, long = "context", value_name = "KEY=VALUE")]
        context: Vec<String>,
    },
    /// Show what an input affects and everything a change to it dirties
    Dirty { file: PathBuf, plug: String },
    /// Print the ownership tree with plug metadata
    Tree { file: PathBuf },
    /// Write the increment loop demo description
    Demo {
        /// Output path. Stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, default_value_t = 4)]
        iterations: i64,
    },
    /// Show the configuration in use
    Config {
        /// Write the default configuration file if none exists
        #[arg(long)]
        init: bool,
    },
}
