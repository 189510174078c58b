//! Command-line interface for Patter
//!
//! Handles argument parsing and logging configuration.

use clap::{Parser, Subcommand};
use log::LevelFilter;

/// Patter - Voice recorder for Linux
#[derive(Parser, Debug)]
#[command(name = "patter")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Increase logging verbosity
    /// -v = info, -vv = debug, -vvv = trace (includes PipeWire deps)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record from the default microphone until Enter is pressed
    Record {
        /// File name for the recording (the .wav extension is added if absent);
        /// generated from the current time when omitted
        name: Option<String>,
    },
    /// List recordings, newest first
    List,
    /// Play a recording to completion
    Play {
        /// File name of the recording to play
        name: String,
    },
}

impl Args {
    /// Get the log level filter based on verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else {
            match self.verbose {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }
}

/// Initialize the logging system based on CLI arguments
pub fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();

    // Base level for all modules - keep at warn to suppress noisy deps
    builder.filter_level(LevelFilter::Warn);

    // Set patter modules to requested verbosity level
    builder.filter_module("patter", args.log_level());

    // PipeWire binding internals only at -vvv (very verbose)
    if args.verbose >= 3 {
        builder.filter_module("pipewire", args.log_level());
        builder.filter_module("libspa", args.log_level());
    }

    builder.format_timestamp_millis().init();
}
