
//! This module defines the `SketchParams` struct, which encapsulates the parameters
//! required to build presence sketches: k-mer length, subsampling ratio, per-file read
//! cap, hash seeds, and the width of the fingerprint universe. Parameters are embedded
//! in every sketch file so that sketches built with different settings are rejected
//! when compared.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::hashing::HashSeeds;
use crate::sample_sketch::SampleSketcher;

pub const DEFAULT_K: u8 = 31;
pub const DEFAULT_RATIO: u64 = 32;
pub const DEFAULT_MAX_READS: u64 = 10_000_000;

/// Fingerprints span [0, 2^32). Part of the sketch file format.
pub const FINGERPRINT_BITS: u8 = 32;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SketchParams {
    kmer_length: u8,
    ratio: u64,
    max_reads: u64,
    seeds: HashSeeds,
    fingerprint_bits: u8,
}

impl Default for SketchParams {
    fn default() -> Self {
        SketchParams {
            kmer_length: DEFAULT_K,
            ratio: DEFAULT_RATIO,
            max_reads: DEFAULT_MAX_READS,
            seeds: HashSeeds::default(),
            fingerprint_bits: FINGERPRINT_BITS,
        }
    }
}

impl SketchParams {
    pub fn new(kmer_length: u8, ratio: u64, max_reads: u64, seeds: HashSeeds) -> Self {
        SketchParams {
            kmer_length,
            ratio,
            max_reads,
            seeds,
            fingerprint_bits: FINGERPRINT_BITS,
        }
    }

    pub fn with_kmer_length(mut self, kmer_length: u8) -> Self {
        self.kmer_length = kmer_length;
        self
    }

    pub fn with_ratio(mut self, ratio: u64) -> Self {
        self.ratio = ratio;
        self
    }

    pub fn with_max_reads(mut self, max_reads: u64) -> Self {
        self.max_reads = max_reads;
        self
    }

    /// Narrow the fingerprint universe. Sketches of different widths are incompatible.
    pub fn with_fingerprint_bits(mut self, fingerprint_bits: u8) -> Self {
        self.fingerprint_bits = fingerprint_bits;
        self
    }

    pub fn create_sketcher(&self, sample_name: &str) -> SampleSketcher {
        SampleSketcher::new(sample_name, self)
    }

    pub fn k(&self) -> u8 {
        self.kmer_length
    }

    pub fn ratio(&self) -> u64 {
        self.ratio
    }

    /// Maximum reads taken from each read file, 0 for no limit.
    pub fn max_reads(&self) -> u64 {
        self.max_reads
    }

    pub fn seeds(&self) -> HashSeeds {
        self.seeds
    }

    pub fn fingerprint_bits(&self) -> u8 {
        self.fingerprint_bits
    }

    /// Check that sketches built with these parameters can be compared.
    ///
    /// The read cap only bounds runtime and is not checked.
    pub fn check_compatibility(&self, other: &SketchParams) -> Result<()> {
        if self.k() != other.k() {
            bail!(
                "Sketch has k = {}, but other sketch has k = {}",
                self.k(),
                other.k()
            );
        }

        // Different ratios subsample different k-mer sets, so the presence of a
        // fingerprint would mean different things in the two sketches.
        if self.ratio() != other.ratio() {
            bail!(
                "Sketch has ratio = {}, but other sketch has ratio = {}",
                self.ratio(),
                other.ratio()
            );
        }

        if self.seeds() != other.seeds() {
            bail!(
                "Sketch has seeds = {:?}, but other sketch has seeds = {:?}",
                self.seeds(),
                other.seeds()
            );
        }

        if self.fingerprint_bits() != other.fingerprint_bits() {
            bail!(
                "Sketch has {}-bit fingerprints, but other sketch has {}-bit fingerprints",
                self.fingerprint_bits(),
                other.fingerprint_bits()
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = SketchParams::default();
        assert_eq!(params.k(), 31);
        assert_eq!(params.ratio(), 32);
        assert_eq!(params.max_reads(), 10_000_000);
        assert_eq!(params.seeds(), HashSeeds { subsample: 0, fingerprint: 1 });
        assert_eq!(params.fingerprint_bits(), 32);
    }

    #[test]
    fn test_compatibility() {
        let params = SketchParams::default();
        assert!(params.check_compatibility(&params.clone()).is_ok());
        assert!(params.check_compatibility(&params.clone().with_max_reads(5)).is_ok());

        assert!(params.check_compatibility(&params.clone().with_kmer_length(21)).is_err());
        assert!(params.check_compatibility(&params.clone().with_ratio(1)).is_err());
        assert!(params.check_compatibility(&params.clone().with_fingerprint_bits(24)).is_err());

        let seeds = HashSeeds { subsample: 0, fingerprint: 2 };
        let other = SketchParams::new(DEFAULT_K, DEFAULT_RATIO, DEFAULT_MAX_READS, seeds);
        assert!(params.check_compatibility(&other).is_err());
    }
}
