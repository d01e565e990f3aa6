
//! Main entry point for the kpresence application.
//!
//! This file handles command-line parsing, logging setup, input validation, and
//! dispatches to the two subcommands: `sketch`, which builds per-sample presence
//! sketches from FASTA/Q read files, and `compare`, which merges sketches into a
//! cross-sample presence table of recurring k-mers.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use itertools::Itertools;
use log::info;

use crate::cli::{Cli, Commands, CompareArgs, SketchArgs};
use crate::compare::compare_to_file;
use crate::hashing::HashSeeds;
use crate::io_utils::{
    check_files_exist, check_unique_names, expand_glob, name_by_filename, parse_sample_table,
    single_file_per_sample,
};
use crate::logging::setup_logger;
use crate::sample_sketch::sketch_samples;
use crate::sketch_params::SketchParams;

mod cli;
pub mod canonical;
pub mod compare;
pub mod diff_codec;
pub mod hashing;
pub mod io_utils;
pub mod logging;
pub mod presence_sketch;
pub mod progress;
pub mod sample_sketch;
pub mod sketch_params;
pub mod sketch_store;

/// Common initialization required by all commands.
fn init(out_dir: &Path, threads: usize) -> Result<()> {
    std::fs::create_dir_all(out_dir)?;
    setup_logger(out_dir)?;

    const VERSION: &str = env!("CARGO_PKG_VERSION");
    info!("{} v{}", env!("CARGO_PKG_NAME"), VERSION);
    info!("{}", env::args().join(" "));

    info!("Using {} threads.", threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()?;

    Ok(())
}

fn run_sketch(args: SketchArgs) -> Result<()> {
    init(&args.out_dir, args.threads)?;

    // determine if input is a single sample glob or a sample table
    let samples: Vec<(String, Vec<PathBuf>)> = if let Some(sample_table) = &args.sample_table {
        info!("Using sample table: {}", sample_table.display());
        parse_sample_table(sample_table)?
    } else if let (Some(input_glob), Some(sample_name)) = (&args.input_glob, &args.sample_name) {
        info!("Using read files matching: {}", input_glob);
        vec![(sample_name.clone(), expand_glob(input_glob)?)]
    } else {
        return Err(anyhow::anyhow!("No input specified. Use --input-glob with --sample-name, or --sample-table."));
    };
    check_unique_names(samples.iter().map(|(name, _)| name.as_str()))?;

    if !args.skip_file_check {
        info!("Verifying all read files exist.");
        check_files_exist(samples.iter().flat_map(|(_, paths)| paths))?;
    }

    let seeds = HashSeeds {
        subsample: args.subsample_seed,
        fingerprint: args.fingerprint_seed,
    };
    let sketch_params = SketchParams::new(args.kmer_length, args.ratio, args.max_reads, seeds);
    info!(
        "Sketching {} samples (k = {}, ratio = {}, max reads per file = {}).",
        samples.len(),
        sketch_params.k(),
        sketch_params.ratio(),
        sketch_params.max_reads()
    );

    let sketch_files = sketch_samples(&samples, &sketch_params, &args.out_dir)?;
    info!("Wrote {} sketch files to {}.", sketch_files.len(), args.out_dir.display());

    Ok(())
}

fn run_compare(args: CompareArgs) -> Result<()> {
    init(&args.out_dir, args.threads)?;

    let samples: Vec<(String, PathBuf)> = if let Some(sample_table) = &args.sample_table {
        info!("Using sample table: {}", sample_table.display());
        let samples = single_file_per_sample(parse_sample_table(sample_table)?)?;
        check_unique_names(samples.iter().map(|(name, _)| name.as_str()))?;
        samples
    } else if let Some(input_glob) = &args.input_glob {
        info!("Using sketch files matching: {}", input_glob);
        name_by_filename(&expand_glob(input_glob)?)?
    } else {
        return Err(anyhow::anyhow!("No input specified. Use --input-glob or --sample-table."));
    };
    check_files_exist(samples.iter().map(|(_, path)| path))?;

    info!("Comparing {} sketches (min count = {}).", samples.len(), args.min_count);
    let table = compare_to_file(&samples, args.min_count, args.threads, &args.out_dir)?;
    info!(
        "Reported {} fingerprints across {} samples.",
        table.len(),
        table.names().len()
    );

    Ok(())
}

fn main() -> Result<()> {
    let start = Instant::now();

    let args = Cli::parse();
    match args.command {
        Commands::Sketch(sketch_args) => run_sketch(sketch_args)?,
        Commands::Compare(compare_args) => run_compare(compare_args)?,
    }

    info!("Elapsed time (sec): {:.2}", start.elapsed().as_secs_f32());
    info!("Done.");

    Ok(())
}
