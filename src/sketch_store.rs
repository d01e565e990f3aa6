
//! On-disk format of per-sample sketches.
//!
//! A sketch file holds a bincode encoded `SketchHeader` followed by the length-prefixed,
//! diff-encoded list of fingerprints seen at least twice in the sample. Bincode's
//! variable-length integers keep the small deltas of dense sketches compact.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{ensure, Context, Result};
use bincode::serde::{decode_from_std_read, encode_into_std_write};
use serde::{Deserialize, Serialize};

use crate::diff_codec;
use crate::hashing::Fingerprint;
use crate::sketch_params::{SketchParams, FINGERPRINT_BITS};

pub const FORMAT_VERSION: u8 = 1;

/// Extension of sketch files.
pub const SKETCH_EXTENSION: &str = "kmers";

/// Serializable header of a sketch file.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SketchHeader {
    format_version: u8,
    sample_name: String,
    params: SketchParams,
    read_count: u64,
    bp_count: u64,
}

impl SketchHeader {
    pub fn new(sample_name: &str, params: &SketchParams, read_count: u64, bp_count: u64) -> Self {
        SketchHeader {
            format_version: FORMAT_VERSION,
            sample_name: sample_name.to_string(),
            params: params.clone(),
            read_count,
            bp_count,
        }
    }

    /// Validate header
    pub fn validate(&self) -> Result<()> {
        if self.format_version != FORMAT_VERSION {
            return Err(anyhow::anyhow!(
                "Unsupported sketch format version: {}",
                self.format_version
            ));
        }

        let bits = self.params.fingerprint_bits();
        ensure!(
            (1..=FINGERPRINT_BITS).contains(&bits),
            "Unsupported fingerprint width: {} bits",
            bits
        );

        Ok(())
    }

    pub fn sample_name(&self) -> &str {
        &self.sample_name
    }

    pub fn params(&self) -> &SketchParams {
        &self.params
    }

    pub fn read_count(&self) -> u64 {
        self.read_count
    }

    pub fn bp_count(&self) -> u64 {
        self.bp_count
    }
}

/// A decoded sketch file.
#[derive(Clone, Debug)]
pub struct Sketch {
    pub header: SketchHeader,
    pub fingerprints: Vec<Fingerprint>,
}

/// Write header and diff-encoded fingerprints to a sketch file.
pub fn write_sketch(path: &Path, header: &SketchHeader, doubles: &[Fingerprint]) -> Result<()> {
    let diffs = diff_codec::encode(doubles)?;

    let file = File::create(path)
        .context(format!("Failed to create sketch file {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    encode_into_std_write(header, &mut writer, bincode::config::standard())
        .context("Failed to serialize sketch header")?;
    encode_into_std_write(&diffs, &mut writer, bincode::config::standard())
        .context("Failed to serialize sketch fingerprints")?;

    writer
        .flush()
        .context(format!("Failed to write sketch file {}", path.display()))?;

    Ok(())
}

/// Read a sketch file and recover its sorted fingerprints.
pub fn read_sketch(path: &Path) -> Result<Sketch> {
    let file = File::open(path)
        .context(format!("Failed to open sketch file {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let header: SketchHeader = decode_from_std_read(&mut reader, bincode::config::standard())
        .context(format!("Failed to deserialize header of {}", path.display()))?;
    header.validate()?;

    let diffs: Vec<Fingerprint> = decode_from_std_read(&mut reader, bincode::config::standard())
        .context(format!("Failed to deserialize fingerprints of {}", path.display()))?;
    let fingerprints = diff_codec::decode(&diffs)
        .context(format!("Corrupt sketch file {}", path.display()))?;

    // sorted, so only the last fingerprint can exceed the universe
    let bits = header.params().fingerprint_bits();
    if let Some(&last) = fingerprints.last() {
        ensure!(
            (last as u64) < (1u64 << bits),
            "Corrupt sketch file {}: fingerprint {} exceeds {}-bit universe",
            path.display(),
            last,
            bits
        );
    }

    Ok(Sketch {
        header,
        fingerprints,
    })
}
