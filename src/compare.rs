//! This module builds a cross-sample presence table from per-sample sketch files.
//!
//! It works in two passes over the sketch files:
//! - Pass 1 counts in how many samples each fingerprint occurs and keeps those that
//!   occur in at least `min_count` samples (the whitelist).
//! - Pass 2 re-reads every sketch and marks the samples in which each whitelisted
//!   fingerprint is present.
//!
//! Only whitelisted fingerprints get a presence vector, so memory is bounded by the
//! number of recurring fingerprints rather than by the size of the corpus.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use log::info;
use num_format::{Locale, ToFormattedString};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use rustc_hash::FxHashMap;

use crate::hashing::Fingerprint;
use crate::presence_sketch::BitArray;
use crate::progress::{progress_bar_msg, to_millions};
use crate::sketch_params::SketchParams;
use crate::sketch_store::{read_sketch, Sketch};

/// Name of the comparison output file.
pub const PRESENCE_TABLE_FILE: &str = "kmers.json";

/// Presence of whitelisted fingerprints across samples.
#[derive(Clone, Debug, PartialEq)]
pub struct PresenceTable {
    names: Vec<String>,
    rows: BTreeMap<Fingerprint, Vec<u8>>,
}

impl PresenceTable {
    /// Sample names, in the order of the presence vectors.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn rows(&self) -> &BTreeMap<Fingerprint, Vec<u8>> {
        &self.rows
    }

    /// Presence vector of a fingerprint, if whitelisted.
    pub fn get(&self, fingerprint: Fingerprint) -> Option<&[u8]> {
        self.rows.get(&fingerprint).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write as JSON lines: the sample names, then `[fingerprint, [0/1, ...]]` per row.
    pub fn write_json_lines<W: Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer(&mut writer, &self.names)?;
        writeln!(writer)?;

        for (fingerprint, presence) in &self.rows {
            serde_json::to_writer(&mut writer, &(fingerprint, presence))?;
            writeln!(writer)?;
        }

        writer.flush()?;
        Ok(())
    }
}

/// Build the presence table of fingerprints found in at least `min_count` samples.
///
/// Sketch files are read `chunk_size` at a time in parallel, but always merged in
/// sample order.
pub fn compare(samples: &[(String, PathBuf)], min_count: u16, chunk_size: usize) -> Result<PresenceTable> {
    ensure!(!samples.is_empty(), "No sketches to compare");
    ensure!(min_count >= 2, "Minimum sample count must be at least 2");
    let chunk_size = chunk_size.max(1);

    info!("Building whitelist from {} sketches.", samples.len());
    let (mut rows, fingerprint_counts) = build_whitelist(samples, min_count, chunk_size)?;
    info!(
        "Whitelisted {} fingerprints present in >= {} samples.",
        rows.len().to_formatted_string(&Locale::en),
        min_count
    );

    info!("Collecting presence of whitelisted fingerprints.");
    collect_presence(samples, chunk_size, &fingerprint_counts, &mut rows)?;

    Ok(PresenceTable {
        names: samples.iter().map(|(name, _)| name.clone()).collect(),
        rows: rows.into_iter().collect(),
    })
}

/// Pass 1: whitelist fingerprints occurring in at least `min_count` samples.
///
/// Returns an empty presence vector per whitelisted fingerprint along with the number
/// of fingerprints in each sketch.
fn build_whitelist(
    samples: &[(String, PathBuf)],
    min_count: u16,
    chunk_size: usize,
) -> Result<(FxHashMap<Fingerprint, Vec<u8>>, Vec<usize>)> {
    // first sighting sets a bit, later sightings are counted
    let mut reference: Option<(SketchParams, BitArray)> = None;
    let mut repeats: FxHashMap<Fingerprint, u16> = FxHashMap::default();
    let mut fingerprint_counts = Vec::with_capacity(samples.len());

    let progress_bar = progress_bar_msg(samples.len() as u64);
    progress_bar.set_prefix("count");
    for_each_sketch(samples, chunk_size, |sample_idx, sketch| {
        let params = sketch.header.params();
        let (ref_params, seen) = reference.get_or_insert_with(|| {
            (params.clone(), BitArray::new(params.fingerprint_bits()))
        });
        ref_params
            .check_compatibility(params)
            .context(format!("Sketch of sample '{}' is incompatible", samples[sample_idx].0))?;

        for &fingerprint in &sketch.fingerprints {
            if seen.get(fingerprint) {
                let count = repeats.entry(fingerprint).or_insert(0);
                *count = count.saturating_add(1);
            } else {
                seen.set(fingerprint);
            }
        }
        fingerprint_counts.push(sketch.fingerprints.len());

        progress_bar.inc(1);
        progress_bar.set_message(format!(
            "{} seen, {} recurring",
            to_millions(seen.count_ones()),
            to_millions(repeats.len() as u64)
        ));
        Ok(())
    })?;
    progress_bar.finish();

    if let Some((_, seen)) = &reference {
        info!(
            "Sketches contain {} distinct fingerprints.",
            seen.count_ones().to_formatted_string(&Locale::en)
        );
    }

    let num_samples = samples.len();
    let rows = repeats
        .into_iter()
        .filter(|&(_, count)| count >= min_count - 1)
        .map(|(fingerprint, _)| (fingerprint, vec![0u8; num_samples]))
        .collect();

    Ok((rows, fingerprint_counts))
}

/// Pass 2: mark the samples in which each whitelisted fingerprint is present.
///
/// Fails if a sketch no longer holds the number of fingerprints counted in pass 1.
fn collect_presence(
    samples: &[(String, PathBuf)],
    chunk_size: usize,
    fingerprint_counts: &[usize],
    rows: &mut FxHashMap<Fingerprint, Vec<u8>>,
) -> Result<()> {
    let progress_bar = progress_bar_msg(samples.len() as u64);
    progress_bar.set_prefix("collect");
    for_each_sketch(samples, chunk_size, |sample_idx, sketch| {
        if sketch.fingerprints.len() != fingerprint_counts[sample_idx] {
            bail!(
                "Sketch of sample '{}' changed between passes ({} vs {} fingerprints)",
                samples[sample_idx].0,
                fingerprint_counts[sample_idx],
                sketch.fingerprints.len()
            );
        }

        for fingerprint in &sketch.fingerprints {
            if let Some(row) = rows.get_mut(fingerprint) {
                row[sample_idx] = 1;
            }
        }

        progress_bar.inc(1);
        Ok(())
    })?;
    progress_bar.finish();

    Ok(())
}

/// Read sketches in sample order and hand each to `f` with its sample index.
fn for_each_sketch<F>(samples: &[(String, PathBuf)], chunk_size: usize, mut f: F) -> Result<()>
where
    F: FnMut(usize, Sketch) -> Result<()>,
{
    for (chunk_idx, chunk) in samples.chunks(chunk_size).enumerate() {
        let sketches = chunk
            .par_iter()
            .map(|(_, path)| read_sketch(path))
            .collect::<Result<Vec<Sketch>>>()?;

        for (offset, sketch) in sketches.into_iter().enumerate() {
            f(chunk_idx * chunk_size + offset, sketch)?;
        }
    }

    Ok(())
}

/// Compare sketches and write the presence table to `<out_dir>/kmers.json`.
pub fn compare_to_file(
    samples: &[(String, PathBuf)],
    min_count: u16,
    chunk_size: usize,
    out_dir: &Path,
) -> Result<PresenceTable> {
    let table = compare(samples, min_count, chunk_size)?;

    let out_file = out_dir.join(PRESENCE_TABLE_FILE);
    info!("Writing presence table to {}.", out_file.display());
    let file = std::fs::File::create(&out_file)
        .context(format!("Failed to create {}", out_file.display()))?;
    table.write_json_lines(std::io::BufWriter::new(file))?;

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    use crate::sketch_store::{write_sketch, SketchHeader};

    fn test_params() -> SketchParams {
        SketchParams::default().with_fingerprint_bits(16)
    }

    fn write_sketches(
        sets: &[&[Fingerprint]],
        params: &SketchParams,
        dir: &TempDir,
    ) -> Vec<(String, PathBuf)> {
        sets.iter()
            .enumerate()
            .map(|(idx, fingerprints)| {
                let name = format!("sample{}", idx + 1);
                let path = dir.path().join(format!("{name}.kmers"));
                let header = SketchHeader::new(&name, params, 0, 0);
                write_sketch(&path, &header, fingerprints).unwrap();
                (name, path)
            })
            .collect()
    }

    #[test]
    fn test_two_samples() {
        let dir = tempdir().unwrap();
        let samples = write_sketches(&[&[5, 9, 20], &[9, 20, 31]], &test_params(), &dir);

        let table = compare(&samples, 2, 1).unwrap();

        assert_eq!(table.names(), &["sample1".to_string(), "sample2".to_string()]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(9), Some(&[1u8, 1][..]));
        assert_eq!(table.get(20), Some(&[1u8, 1][..]));
        assert_eq!(table.get(5), None);
        assert_eq!(table.get(31), None);
    }

    #[test]
    fn test_whitelist_threshold() {
        let dir = tempdir().unwrap();
        let sets: [&[Fingerprint]; 4] = [&[1, 2, 3, 4], &[2, 3, 4], &[3, 4, 100], &[4, 100, 65535]];
        let samples = write_sketches(&sets, &test_params(), &dir);

        for chunk_size in [1, 3, 8] {
            let table = compare(&samples, 3, chunk_size).unwrap();
            let whitelisted: Vec<Fingerprint> = table.rows().keys().copied().collect();
            assert_eq!(whitelisted, vec![3, 4]);
            assert_eq!(table.get(3), Some(&[1u8, 1, 1, 0][..]));
            assert_eq!(table.get(4), Some(&[1u8, 1, 1, 1][..]));
        }

        let table = compare(&samples, 2, 2).unwrap();
        let whitelisted: Vec<Fingerprint> = table.rows().keys().copied().collect();
        assert_eq!(whitelisted, vec![2, 3, 4, 100]);
        assert_eq!(table.get(100), Some(&[0u8, 0, 1, 1][..]));

        let table = compare(&samples, 5, 2).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_incompatible_sketches() {
        let dir = tempdir().unwrap();
        let mut samples = write_sketches(&[&[1, 2]], &test_params(), &dir);
        let other = tempdir().unwrap();
        samples.extend(write_sketches(&[&[1, 2]], &test_params().with_ratio(1), &other));

        assert!(compare(&samples, 2, 1).is_err());
    }

    #[test]
    fn test_invalid_inputs() {
        let dir = tempdir().unwrap();
        assert!(compare(&[], 2, 1).is_err());

        let samples = write_sketches(&[&[1], &[1]], &test_params(), &dir);
        assert!(compare(&samples, 1, 1).is_err());

        let missing = vec![("gone".to_string(), dir.path().join("gone.kmers"))];
        assert!(compare(&missing, 2, 1).is_err());
    }

    #[test]
    fn test_sketch_changed_between_passes() {
        let dir = tempdir().unwrap();
        let samples = write_sketches(&[&[5, 9, 20], &[9, 20, 31]], &test_params(), &dir);

        let (mut rows, counts) = build_whitelist(&samples, 2, 1).unwrap();
        assert_eq!(counts, vec![3, 3]);

        // sample2 rewritten after the whitelist was built
        let header = SketchHeader::new("sample2", &test_params(), 0, 0);
        write_sketch(&samples[1].1, &header, &[9, 20]).unwrap();

        let err = collect_presence(&samples, 1, &counts, &mut rows).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'sample2'"), "{msg}");
        assert!(msg.contains("3 vs 2"), "{msg}");
    }

    #[test]
    fn test_fingerprint_outside_universe() {
        let dir = tempdir().unwrap();
        let samples = write_sketches(&[&[5, 9], &[5, 70000]], &test_params(), &dir);

        let err = compare(&samples, 2, 1).unwrap_err();
        assert!(format!("{err:#}").contains("exceeds 16-bit universe"), "{err:#}");
    }

    #[test]
    fn test_json_lines_output() {
        let dir = tempdir().unwrap();
        let samples = write_sketches(&[&[5, 9, 20], &[9, 20, 31], &[20]], &test_params(), &dir);

        let out_dir = tempdir().unwrap();
        compare_to_file(&samples, 2, 2, out_dir.path()).unwrap();

        let contents = std::fs::read_to_string(out_dir.path().join(PRESENCE_TABLE_FILE)).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"["sample1","sample2","sample3"]"#,
                "[9,[1,1,0]]",
                "[20,[1,1,1]]",
            ]
        );

        let names: Vec<String> = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(names.len(), 3);
        let (fingerprint, presence): (Fingerprint, Vec<u8>) = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(fingerprint, 20);
        assert_eq!(presence, vec![1, 1, 1]);
    }

    #[test]
    fn test_reads_to_presence_table() {
        use crate::hashing::KmerFilter;
        use crate::sample_sketch::sketch_samples;

        let read_dir = tempdir().unwrap();
        let sketch_dir = tempdir().unwrap();

        let shared = ">r1\nACGTACGTAC\n>r2\nACGTACGTAC\n";
        let private = ">r1\nGATTACAGAT\n>r2\nGATTACAGAT\n";
        let mut read_samples = Vec::new();
        for (name, contents) in [("gut_a", shared), ("gut_b", shared), ("soil", private)] {
            let path = read_dir.path().join(format!("{name}.fa"));
            std::fs::write(&path, contents).unwrap();
            read_samples.push((name.to_string(), vec![path]));
        }

        let params = SketchParams::default()
            .with_kmer_length(5)
            .with_ratio(1)
            .with_fingerprint_bits(20);
        let sketch_files = sketch_samples(&read_samples, &params, sketch_dir.path()).unwrap();
        let samples: Vec<(String, PathBuf)> = read_samples
            .iter()
            .map(|(name, _)| name.clone())
            .zip(sketch_files)
            .collect();

        let out_dir = tempdir().unwrap();
        let table = compare_to_file(&samples, 2, 2, out_dir.path()).unwrap();

        let filter = KmerFilter::new(&params);
        let mut expected: Vec<Fingerprint> = filter.fingerprints(b"ACGTACGTAC").collect();
        expected.sort_unstable();
        expected.dedup();
        let private_fps: Vec<Fingerprint> = filter.fingerprints(b"GATTACAGAT").collect();

        assert_eq!(table.rows().keys().copied().collect::<Vec<_>>(), expected);
        for fingerprint in &expected {
            let soil = u8::from(private_fps.contains(fingerprint));
            assert_eq!(table.get(*fingerprint), Some(&[1u8, 1, soil][..]));
        }

        let contents = std::fs::read_to_string(out_dir.path().join(PRESENCE_TABLE_FILE)).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], r#"["gut_a","gut_b","soil"]"#);
        assert_eq!(lines.len(), expected.len() + 1);
    }
}
