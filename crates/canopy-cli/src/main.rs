//! Canopy CLI entry point.

use std::{process, str::FromStr};

use clap::Parser;
use log::{LevelFilter, debug, error, info};
use miette::GraphicalReportHandler;

use canopy_cli::{Args, error_adapter::to_reportables};

/// Parse the `--log-level` value, falling back to `warn`.
fn log_level(text: &str) -> LevelFilter {
    LevelFilter::from_str(text).unwrap_or_else(|_| {
        eprintln!("Unknown log level `{text}`, using `warn`");
        LevelFilter::Warn
    })
}

fn main() {
    miette::set_panic_hook();

    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level(&args.log_level))
        .init();
    debug!(args:?; "Parsed arguments");
    info!(input = args.input.as_str(), output = args.output.as_str(); "Building scene");

    let Err(err) = canopy_cli::run(&args) else {
        info!(output = args.output.as_str(); "Scene summary written");
        return;
    };

    let reporter = GraphicalReportHandler::new();
    let reportables = to_reportables(&err);
    for reportable in &reportables {
        let mut rendered = String::new();
        match reporter.render_report(&mut rendered, reportable) {
            Ok(()) => error!("{rendered}"),
            Err(_) => error!(err:%; "Scene build failed"),
        }
    }
    error!(input = args.input.as_str(), errors = reportables.len(); "Scene was not built");
    process::exit(1);
}
