use log::{debug, info};

use clap::Parser;
use snafu::ErrorCompat;
use std::error::Error;
use std::path::{Path, PathBuf};

mod args;
mod tgi;

use crate::tgi::{default_output_paths, run_conversion, OutputPaths, TgiResult};

fn output_paths(args: &args::Args) -> TgiResult<OutputPaths> {
    let out_dir = PathBuf::from(args.out_dir.clone().unwrap_or_else(|| ".".to_string()));
    let defaults = default_output_paths(Path::new(&args.input), &out_dir)?;
    Ok(OutputPaths {
        table: args.out.clone().map(PathBuf::from).unwrap_or(defaults.table),
        jsonl: args.jsonl.clone().map(PathBuf::from).unwrap_or(defaults.jsonl),
    })
}

fn run(args: &args::Args) -> TgiResult<()> {
    let outputs = output_paths(args)?;
    debug!("outputs: {:?}", outputs);
    let reference = args.reference.as_ref().map(PathBuf::from);
    let records = run_conversion(Path::new(&args.input), &outputs, reference.as_deref())?;
    info!("{} records written", records.len());
    println!("Generated tabular file: {}", outputs.table.display());
    println!("Generated JSONL file: {}", outputs.jsonl.display());
    Ok(())
}

fn main() {
    let args = args::Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    debug!("args: {:?}", args);

    if let Err(e) = run(&args) {
        eprintln!("An error occurred: {}", e);
        let mut source = e.source();
        while let Some(s) = source {
            eprintln!("  caused by: {}", s);
            source = s.source();
        }
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
