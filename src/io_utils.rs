use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rustc_hash::{FxHashMap, FxHashSet};

const KNOWN_EXTENSIONS: [&str; 6] = [".fq", ".fastq", ".fna", ".fa", ".fasta", ".kmers"];

/// Extracts sample identifier from a given file path by removing common file extensions.
pub fn sample_id_from_filename(path: &Path) -> Result<String> {
    let Some(file_name) = path.file_name() else {
        bail!("Path {} has no file name", path.display());
    };
    let mut sample_id = file_name.to_string_lossy().to_string();

    if let Some(stripped) = sample_id.strip_suffix(".gz") {
        sample_id = stripped.to_string();
    }

    if let Some(ext) = KNOWN_EXTENSIONS.iter().find(|ext| sample_id.ends_with(*ext)) {
        sample_id.truncate(sample_id.len() - ext.len());
    }

    Ok(sample_id)
}

/// Expand a glob pattern into a sorted list of files.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in glob::glob(pattern).context(format!("Invalid glob pattern: {pattern}"))? {
        paths.push(entry?);
    }
    paths.sort();

    if paths.is_empty() {
        bail!("No files match {pattern}");
    }

    Ok(paths)
}

/// Parse a TSV file of sample names and file paths (sample_name, path).
///
/// Samples are returned in order of first appearance. A sample may span several lines.
pub fn parse_sample_table(file_path: &Path) -> Result<Vec<(String, Vec<PathBuf>)>> {
    let file = File::open(file_path)
        .context(format!("Failed to open sample table {}", file_path.display()))?;
    let reader = BufReader::new(file);

    let mut samples: Vec<(String, Vec<PathBuf>)> = Vec::new();
    let mut sample_idx: FxHashMap<String, usize> = FxHashMap::default();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;

        // skip comment lines starting with #
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.trim().split('\t').collect();
        if fields.len() != 2 {
            bail!(
                "Invalid TSV format on line {}: each line must have exactly 2 columns (sample_name, path)",
                line_num + 1
            );
        }

        let name = fields[0].to_string();
        let path = PathBuf::from(fields[1]);

        let idx = *sample_idx.entry(name.clone()).or_insert_with(|| {
            samples.push((name, Vec::new()));
            samples.len() - 1
        });
        samples[idx].1.push(path);
    }

    if samples.is_empty() {
        bail!("Sample table {} lists no samples", file_path.display());
    }

    Ok(samples)
}

/// Name each sketch file after its file name.
pub fn name_by_filename(paths: &[PathBuf]) -> Result<Vec<(String, PathBuf)>> {
    let named = paths
        .iter()
        .map(|path| Ok((sample_id_from_filename(path)?, path.clone())))
        .collect::<Result<Vec<_>>>()?;

    check_unique_names(named.iter().map(|(name, _)| name.as_str()))?;
    Ok(named)
}

/// Require exactly one sketch file per sample in a sample table.
pub fn single_file_per_sample(samples: Vec<(String, Vec<PathBuf>)>) -> Result<Vec<(String, PathBuf)>> {
    samples
        .into_iter()
        .map(|(name, mut paths)| {
            if paths.len() != 1 {
                bail!("Sample '{}' lists {} sketch files, expected 1", name, paths.len());
            }
            Ok((name, paths.remove(0)))
        })
        .collect()
}

/// Fail if any sample name occurs twice.
pub fn check_unique_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut seen = FxHashSet::default();
    for name in names {
        if !seen.insert(name) {
            bail!("Sample name '{}' is used more than once", name);
        }
    }

    Ok(())
}

/// Fail if any of the files does not exist.
pub fn check_files_exist<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) -> Result<()> {
    for path in paths {
        if !path.exists() {
            bail!("File {} does not exist.", path.display());
        }
    }

    Ok(())
}
