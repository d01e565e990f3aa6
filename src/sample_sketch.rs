
//! Per-sample presence sketching.
//!
//! All reads of a sample, possibly spread over several read files, are streamed through
//! one `PresenceSketch`. Each read file contributes at most `max_reads` records. After
//! the pass, fingerprints seen at least twice are written to `<out_dir>/<sample>.kmers`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::MultiProgress;
use log::{debug, info, warn};
use needletail::errors::ParseErrorKind;
use needletail::parse_fastx_file;
use num_format::{Locale, ToFormattedString};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::hashing::KmerFilter;
use crate::presence_sketch::PresenceSketch;
use crate::progress::{progress_bar, progress_bar_msg, to_millions};
use crate::sketch_params::SketchParams;
use crate::sketch_store::{write_sketch, SketchHeader, SKETCH_EXTENSION};

const PROGRESS_INTERVAL: u64 = 1_000_000;

/// Builds the presence sketch of a single sample.
#[derive(Clone, Debug)]
pub struct SampleSketcher {
    name: String,
    params: SketchParams,
    filter: KmerFilter,
    sketch: PresenceSketch,
    read_count: u64,
    bp_count: u64,
    kmer_count: u64,
}

impl SampleSketcher {
    pub fn new(name: &str, params: &SketchParams) -> Self {
        SampleSketcher {
            name: name.to_string(),
            params: params.clone(),
            filter: KmerFilter::new(params),
            sketch: PresenceSketch::with_universe_bits(params.fingerprint_bits()),
            read_count: 0,
            bp_count: 0,
            kmer_count: 0,
        }
    }

    pub fn process_seq(&mut self, seq: &[u8]) {
        self.read_count += 1;
        self.bp_count += seq.len() as u64;

        for fingerprint in self.filter.fingerprints(seq) {
            self.sketch.record(fingerprint);
            self.kmer_count += 1;
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn read_count(&self) -> u64 {
        self.read_count
    }

    pub fn bp_count(&self) -> u64 {
        self.bp_count
    }

    /// Number of k-mers retained after subsampling.
    pub fn kmer_count(&self) -> u64 {
        self.kmer_count
    }

    pub fn sketch(&self) -> &PresenceSketch {
        &self.sketch
    }

    pub fn header(&self) -> SketchHeader {
        SketchHeader::new(&self.name, &self.params, self.read_count, self.bp_count)
    }

    /// Write fingerprints seen at least twice to a sketch file, returning their number.
    pub fn write(&self, path: &Path) -> Result<usize> {
        let doubles = self.sketch.export_doubles();
        write_sketch(path, &self.header(), &doubles)?;
        Ok(doubles.len())
    }
}

/// Sketch all reads of one sample.
pub fn sketch_sample(
    name: &str,
    read_files: &[PathBuf],
    params: &SketchParams,
    multi_progress: &MultiProgress,
) -> Result<SampleSketcher> {
    let mut sketcher = params.create_sketcher(name);
    debug!(
        "{}: allocated {} MiB presence sketch",
        name,
        sketcher.sketch().memory_bytes() >> 20
    );

    let progress_bar = multi_progress.add(progress_bar_msg(read_files.len() as u64));
    progress_bar.set_prefix(name.to_string());

    for read_file in read_files {
        let mut reader = match parse_fastx_file(read_file) {
            Ok(reader) => reader,
            Err(err) if err.kind == ParseErrorKind::EmptyFile => {
                warn!("{}: {} is empty", name, read_file.display());
                progress_bar.inc(1);
                continue;
            }
            Err(err) => {
                return Err(err).context(format!("Failed to open {}", read_file.display()));
            }
        };

        let mut file_reads = 0;
        while params.max_reads() == 0 || file_reads < params.max_reads() {
            let Some(rec) = reader.next() else {
                break;
            };
            let record = rec.context(format!("Malformed record in {}", read_file.display()))?;
            sketcher.process_seq(&record.seq());
            file_reads += 1;

            if file_reads % PROGRESS_INTERVAL == 0 {
                progress_bar.set_message(progress_message(&sketcher));
            }
        }

        progress_bar.set_message(progress_message(&sketcher));
        progress_bar.inc(1);
        info!(
            "{}: {} reads from {} ({} seen once, {} seen twice)",
            name,
            file_reads.to_formatted_string(&Locale::en),
            read_file.display(),
            sketcher.sketch().seen_once_count().to_formatted_string(&Locale::en),
            sketcher.sketch().seen_twice_count().to_formatted_string(&Locale::en),
        );
    }

    progress_bar.finish();

    Ok(sketcher)
}

fn progress_message(sketcher: &SampleSketcher) -> String {
    format!(
        "{} reads; {} once, {} twice",
        sketcher.read_count().to_formatted_string(&Locale::en),
        to_millions(sketcher.sketch().seen_once_count()),
        to_millions(sketcher.sketch().seen_twice_count()),
    )
}

/// Path of the sketch file of a sample.
pub fn sketch_path(out_dir: &Path, sample_name: &str) -> PathBuf {
    out_dir.join(format!("{sample_name}.{SKETCH_EXTENSION}"))
}

/// Sketch samples and write one sketch file per sample to `out_dir`.
///
/// Samples are processed in parallel on the global thread pool; each holds its own
/// presence sketch, so memory grows with the number of threads.
pub fn sketch_samples(
    samples: &[(String, Vec<PathBuf>)],
    params: &SketchParams,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let multi_progress = MultiProgress::new();
    let overall = multi_progress.add(progress_bar(samples.len() as u64));

    let sketch_files = samples
        .par_iter()
        .map(|(name, read_files)| {
            let sketcher = sketch_sample(name, read_files, params, &multi_progress)?;

            let path = sketch_path(out_dir, name);
            let num_doubles = sketcher.write(&path)?;
            info!(
                "{}: {} reads, {} bp, {} k-mers retained, {} written to {}",
                sketcher.name(),
                sketcher.read_count().to_formatted_string(&Locale::en),
                sketcher.bp_count().to_formatted_string(&Locale::en),
                sketcher.kmer_count().to_formatted_string(&Locale::en),
                num_doubles.to_formatted_string(&Locale::en),
                path.display()
            );

            overall.inc(1);
            Ok(path)
        })
        .collect::<Result<Vec<PathBuf>>>()?;

    overall.finish();

    Ok(sketch_files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::{tempdir, TempDir};

    use crate::sketch_store::read_sketch;

    // Helper to create a temporary read file with given contents
    fn write_temp_reads(contents: &str, filename: &str, dir: &TempDir) -> PathBuf {
        let file_path = dir.path().join(filename);
        let mut file = File::create(&file_path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.sync_all().unwrap();
        file_path
    }

    fn test_params() -> SketchParams {
        SketchParams::default()
            .with_kmer_length(5)
            .with_ratio(1)
            .with_fingerprint_bits(20)
    }

    #[test]
    fn test_process_seq() {
        let params = test_params();
        let filter = KmerFilter::new(&params);
        let mut sketcher = params.create_sketcher("s1");

        // GATTA appears once, ACGTA twice via its reverse complement TACGT
        sketcher.process_seq(b"GATTA");
        sketcher.process_seq(b"ACGTA");
        sketcher.process_seq(b"TACGT");

        assert_eq!(sketcher.read_count(), 3);
        assert_eq!(sketcher.bp_count(), 15);
        assert_eq!(sketcher.kmer_count(), 3);

        let gatta = filter.fingerprints(b"GATTA").next().unwrap();
        let acgta = filter.fingerprints(b"ACGTA").next().unwrap();
        assert!(sketcher.sketch().contains_once(gatta));
        if gatta != acgta {
            assert!(!sketcher.sketch().contains_twice(gatta));
        }
        assert_eq!(sketcher.sketch().export_doubles(), vec![acgta]);
    }

    #[test]
    fn test_sketch_sample_across_files() {
        let temp_dir = tempdir().unwrap();

        let fastq = "@r1\nACGTACGTAC\n+\nIIIIIIIIII\n@r2\nTTTTTGGGGG\n+\nIIIIIIIIII\n";
        let fasta = ">r3\nACGTACGTAC\n";
        let file1 = write_temp_reads(fastq, "s1_a.fq", &temp_dir);
        let file2 = write_temp_reads(fasta, "s1_b.fa", &temp_dir);

        let params = test_params();
        let sketcher = sketch_sample("s1", &[file1, file2], &params, &MultiProgress::new()).unwrap();

        assert_eq!(sketcher.read_count(), 3);
        assert_eq!(sketcher.bp_count(), 30);

        // every k-mer of ACGTACGTAC occurs at least twice, TTTTTGGGGG has no repeats
        let filter = KmerFilter::new(&params);
        let mut expected: Vec<u32> = filter.fingerprints(b"ACGTACGTAC").collect();
        expected.sort_unstable();
        expected.dedup();
        assert_eq!(sketcher.sketch().export_doubles(), expected);

        for fp in filter.fingerprints(b"TTTTTGGGGG") {
            assert!(sketcher.sketch().contains_once(fp));
        }
        assert_eq!(sketcher.sketch().seen_once_count(), expected.len() as u64 + 6);
    }

    #[test]
    fn test_read_cap_per_file() {
        let temp_dir = tempdir().unwrap();

        let fasta = ">r1\nGATTACA\n>r2\nGATTACA\n>r3\nGATTACA\n";
        let file1 = write_temp_reads(fasta, "a.fa", &temp_dir);
        let file2 = write_temp_reads(fasta, "b.fa", &temp_dir);

        let params = test_params().with_max_reads(1);
        let sketcher = sketch_sample("capped", &[file1, file2], &params, &MultiProgress::new()).unwrap();
        assert_eq!(sketcher.read_count(), 2);

        let params = test_params().with_max_reads(0);
        let file3 = write_temp_reads(fasta, "c.fa", &temp_dir);
        let sketcher = sketch_sample("uncapped", &[file3], &params, &MultiProgress::new()).unwrap();
        assert_eq!(sketcher.read_count(), 3);
    }

    #[test]
    fn test_empty_read_file() {
        let temp_dir = tempdir().unwrap();

        let empty = write_temp_reads("", "empty.fq", &temp_dir);
        let sketcher = sketch_sample("empty", &[empty.clone()], &test_params(), &MultiProgress::new()).unwrap();
        assert_eq!(sketcher.read_count(), 0);
        assert!(sketcher.sketch().export_doubles().is_empty());

        // an empty lane does not hide the reads of the others
        let reads = write_temp_reads(">r1\nACGTACGTAC\n>r2\nACGTACGTAC\n", "reads.fa", &temp_dir);
        let sketcher = sketch_sample("mixed", &[empty, reads], &test_params(), &MultiProgress::new()).unwrap();
        assert_eq!(sketcher.read_count(), 2);
        assert!(!sketcher.sketch().export_doubles().is_empty());
    }

    #[test]
    fn test_missing_read_file() {
        let temp_dir = tempdir().unwrap();
        let missing = temp_dir.path().join("missing.fq");
        let result = sketch_sample("s1", &[missing], &test_params(), &MultiProgress::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_read_file() {
        let temp_dir = tempdir().unwrap();
        let file = write_temp_reads("this is not a read file\n", "bad.fq", &temp_dir);
        let result = sketch_sample("bad", &[file], &test_params(), &MultiProgress::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_sketch_samples_writes_files() {
        let temp_dir = tempdir().unwrap();
        let out_dir = tempdir().unwrap();

        let file1 = write_temp_reads(">r1\nACGTACGTAC\n>r2\nACGTACGTAC\n", "s1.fa", &temp_dir);
        let file2 = write_temp_reads(">r1\nGATTACAGAT\n", "s2.fa", &temp_dir);

        let samples = vec![
            ("s1".to_string(), vec![file1]),
            ("s2".to_string(), vec![file2]),
        ];
        let params = test_params();
        let paths = sketch_samples(&samples, &params, out_dir.path()).unwrap();
        assert_eq!(paths, vec![sketch_path(out_dir.path(), "s1"), sketch_path(out_dir.path(), "s2")]);

        let s1 = read_sketch(&paths[0]).unwrap();
        assert_eq!(s1.header.sample_name(), "s1");
        assert_eq!(s1.header.read_count(), 2);
        assert_eq!(s1.header.params(), &params);

        let mut expected: Vec<u32> = KmerFilter::new(&params).fingerprints(b"ACGTACGTAC").collect();
        expected.sort_unstable();
        expected.dedup();
        assert_eq!(s1.fingerprints, expected);
    }
}
