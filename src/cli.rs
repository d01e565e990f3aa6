
//! Command-line interface definition for the kpresence application.
//!
//! This file defines the `Cli` struct and its `sketch` and `compare` subcommands using
//! the `clap` crate. Sketching takes reads either as a glob forming one named sample or
//! as a TSV table of samples; comparison takes sketch files either as a glob or as a
//! TSV table assigning sample names. Custom value parsers validate k-mer length,
//! subsampling ratio, minimum sample count, and thread count. The CLI output is styled
//! using the `anstyle` crate.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::hashing::HashSeeds;
use crate::sketch_params::{DEFAULT_K, DEFAULT_MAX_READS, DEFAULT_RATIO};

const DEFAULT_MIN_COUNT: u16 = 6;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(styles=get_styles())]
#[command(disable_help_subcommand = true)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sketch k-mers seen at least twice in each sample
    Sketch(SketchArgs),

    /// Build a presence table of k-mers recurring across sample sketches
    Compare(CompareArgs),
}

#[derive(Args)]
pub struct SketchArgs {
    /// Glob of read files forming a single sample (e.g. 'reads/S1_*.fq.gz')
    #[arg(short = 'i', long, help_heading = "Inputs", group = "input", requires = "sample_name")]
    pub input_glob: Option<String>,

    /// Name of the sample given by --input-glob
    #[arg(short = 'n', long, help_heading = "Inputs", conflicts_with = "sample_table")]
    pub sample_name: Option<String>,

    /// TSV file indicating read files of each sample (sample_name, path to FASTA/Q file)
    #[arg(short = 'g', long, help_heading = "Inputs", group = "input", value_parser = clap::value_parser!(PathBuf))]
    pub sample_table: Option<PathBuf>,

    /// Output directory
    #[arg(short = 'o', long, help_heading = "Output", value_parser = clap::value_parser!(PathBuf))]
    pub out_dir: PathBuf,

    /// Length of k-mers to use
    #[arg(short, long, help_heading = "Sketching parameters", default_value_t = DEFAULT_K, value_parser = validate_kmer_length)]
    pub kmer_length: u8,

    /// Subsampling ratio (e.g. 32 will keep ~1/32 of distinct k-mers; 1 keeps all)
    #[arg(short, long, help_heading = "Sketching parameters", default_value_t = DEFAULT_RATIO, value_parser = validate_ratio)]
    pub ratio: u64,

    /// Maximum reads to process from each read file (0 for no limit)
    #[arg(short, long, help_heading = "Sketching parameters", default_value_t = DEFAULT_MAX_READS)]
    pub max_reads: u64,

    /// Seed of the subsampling hash function
    #[arg(long, help_heading = "Sketching parameters", default_value_t = HashSeeds::default().subsample)]
    pub subsample_seed: u64,

    /// Seed of the fingerprint hash function
    #[arg(long, help_heading = "Sketching parameters", default_value_t = HashSeeds::default().fingerprint)]
    pub fingerprint_seed: u64,

    /// Number of samples to sketch in parallel (each needs ~1 GB)
    #[arg(short, long, default_value_t = 1, value_parser = validate_threads)]
    pub threads: usize,

    /// Skip verification that read files exist
    #[arg(long, default_value_t = false)]
    pub skip_file_check: bool,
}

#[derive(Args)]
pub struct CompareArgs {
    /// Glob of sketch files; samples are named after the files (e.g. 'sketches/*.kmers')
    #[arg(short = 'i', long, help_heading = "Inputs", group = "input")]
    pub input_glob: Option<String>,

    /// TSV file indicating the sketch file of each sample (sample_name, path to sketch file)
    #[arg(short = 'g', long, help_heading = "Inputs", group = "input", value_parser = clap::value_parser!(PathBuf))]
    pub sample_table: Option<PathBuf>,

    /// Output directory
    #[arg(short = 'o', long, help_heading = "Output", value_parser = clap::value_parser!(PathBuf))]
    pub out_dir: PathBuf,

    /// Minimum number of samples a k-mer must occur in to be reported
    #[arg(short = 'c', long, help_heading = "Comparison parameters", default_value_t = DEFAULT_MIN_COUNT, value_parser = validate_min_count)]
    pub min_count: u16,

    /// Number of threads used to read sketch files
    #[arg(short, long, default_value_t = 1, value_parser = validate_threads)]
    pub threads: usize,
}

fn validate_kmer_length(k: &str) -> Result<u8, String> {
    let k: u8 = k
        .parse()
        .map_err(|_| format!("`{k}` isn't a valid k-mer length"))?;

    if !(1..=32).contains(&k) {
        return Err("k-mer length must be in the range [1, 32]".to_string());
    }

    Ok(k)
}

fn validate_ratio(ratio: &str) -> Result<u64, String> {
    let ratio: u64 = ratio
        .parse()
        .map_err(|_| format!("`{ratio}` isn't a valid subsampling ratio"))?;

    if ratio == 0 {
        return Err("Subsampling ratio must be at least 1".to_string());
    }

    Ok(ratio)
}

fn validate_min_count(min_count: &str) -> Result<u16, String> {
    let min_count: u16 = min_count
        .parse()
        .map_err(|_| format!("`{min_count}` isn't a valid sample count"))?;

    if min_count < 2 {
        return Err("Minimum sample count must be at least 2".to_string());
    }

    Ok(min_count)
}

fn validate_threads(threads: &str) -> Result<usize, String> {
    let threads: usize = threads
        .parse()
        .map_err(|_| format!("`{threads}` isn't a valid value"))?;

    if !(1..=1024).contains(&threads) {
        return Err("Threads  must be in the range [1, 1024]".to_string());
    }

    Ok(threads)
}

fn get_styles() -> clap::builder::Styles {
    clap::builder::Styles::styled()
        .usage(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))),
        )
        .header(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))),
        )
        .literal(
            anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
        )
        .invalid(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
        )
        .error(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
        )
        .valid(
            anstyle::Style::new()
                .bold()
                .underline()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
        )
        .placeholder(
            anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))),
        )
}
