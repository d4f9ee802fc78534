//! Command-line argument definitions for the Canopy CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. Arguments control input/output paths, configuration file
//! selection, template search paths and logging verbosity.

use clap::Parser;

/// Command-line arguments for the Canopy scene tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input scene document
    #[arg(help = "Path to the input file")]
    pub input: String,

    /// Path to the output summary file
    #[arg(short, long, default_value = "out.txt")]
    pub output: String,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Extra directories searched for external templates
    #[arg(short = 'I', long = "search-path")]
    pub search_paths: Vec<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
