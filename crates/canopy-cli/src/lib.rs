//! CLI logic for the Canopy scene tool.
//!
//! This module contains the core CLI logic: read a scene document, build it,
//! load its external templates from disk and write a summary of the result.

pub mod error_adapter;

mod args;
mod config;

pub use args::Args;

use std::{fs, path::PathBuf};

use log::{info, warn};

use canopy::{CanopyError, SceneBuilder, loader::FileFetcher};

use error_adapter::warning_reportables;

/// Run the Canopy CLI application
///
/// This function builds the input document, completes every template load
/// it queues from the local file system and writes the scene summary to the
/// output file. Build warnings are logged; they do not fail the run.
///
/// # Arguments
///
/// * `args` - Command-line arguments
///
/// # Errors
///
/// Returns `CanopyError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Parsing errors in the input document
pub fn run(args: &Args) -> Result<(), CanopyError> {
    info!(
        input_path = args.input,
        output_path = args.output;
        "Processing scene"
    );

    // Load configuration
    let app_config = config::load_config(args.config.as_ref())?;

    // Read input file
    let source = fs::read_to_string(&args.input)?;

    // Build the scene; relative template URLs resolve next to the input
    let builder = SceneBuilder::new(app_config);
    let mut document = builder.load(&source, &args.input)?;

    let mut search_paths = builder.config().loader().search_paths().to_vec();
    search_paths.extend(args.search_paths.iter().map(PathBuf::from));
    let loaded = document.run_loads(&FileFetcher::new(search_paths));
    info!(loaded; "Template loads finished");

    report_warnings(document.warnings(), &source);

    // Write output file
    fs::write(&args.output, document.summary().to_string())?;

    info!(output_file = args.output; "Summary written successfully");

    Ok(())
}

fn report_warnings(warnings: &[canopy::Diagnostic], source: &str) {
    let reporter = miette::GraphicalReportHandler::new();
    for reportable in warning_reportables(warnings, source) {
        let mut writer = String::new();
        match reporter.render_report(&mut writer, &reportable) {
            Ok(()) => warn!("{writer}"),
            Err(_) => warn!("{reportable}"),
        }
    }
}
