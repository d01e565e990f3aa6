
//! Fixed-size bit arrays tracking which fingerprints were seen once and twice.
//!
//! A `PresenceSketch` over the full 32-bit universe uses 2 x 512 MiB regardless of how
//! many k-mers are recorded. Distinct k-mers sharing a fingerprint are indistinguishable;
//! the sketch reports their combined occurrences.

use crate::hashing::Fingerprint;
use crate::sketch_params::FINGERPRINT_BITS;

/// Bit array over [0, 2^bits) stored as a contiguous byte buffer.
#[derive(Clone, Debug)]
pub struct BitArray {
    bytes: Vec<u8>,
}

impl BitArray {
    pub fn new(universe_bits: u8) -> Self {
        assert!(
            (1..=FINGERPRINT_BITS).contains(&universe_bits),
            "universe must span between 1 and {FINGERPRINT_BITS} bits"
        );
        let num_bytes = (1u64 << universe_bits).div_ceil(8) as usize;

        BitArray {
            bytes: vec![0; num_bytes],
        }
    }

    #[inline]
    pub fn get(&self, index: Fingerprint) -> bool {
        let index = index as usize;
        self.bytes[index >> 3] >> (index & 7) & 1 == 1
    }

    #[inline]
    pub fn set(&mut self, index: Fingerprint) {
        let index = index as usize;
        self.bytes[index >> 3] |= 1 << (index & 7);
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> u64 {
        self.bytes.iter().map(|b| b.count_ones() as u64).sum()
    }

    /// Positions of set bits in increasing order.
    pub fn ones(&self) -> impl Iterator<Item = Fingerprint> + '_ {
        self.bytes
            .iter()
            .enumerate()
            .filter(|(_, byte)| **byte != 0)
            .flat_map(|(byte_idx, &byte)| {
                (0..8usize)
                    .filter(move |bit| byte >> bit & 1 == 1)
                    .map(move |bit| ((byte_idx << 3) | bit) as Fingerprint)
            })
    }

    /// Size of the buffer in bytes.
    pub fn num_bytes(&self) -> usize {
        self.bytes.len()
    }
}

/// Saturating 2-bit presence counter for every fingerprint in the universe.
#[derive(Clone, Debug)]
pub struct PresenceSketch {
    seen_once: BitArray,
    seen_twice: BitArray,
}

impl Default for PresenceSketch {
    fn default() -> Self {
        PresenceSketch::new()
    }
}

impl PresenceSketch {
    /// Sketch over the full fingerprint universe.
    pub fn new() -> Self {
        PresenceSketch::with_universe_bits(FINGERPRINT_BITS)
    }

    pub fn with_universe_bits(universe_bits: u8) -> Self {
        PresenceSketch {
            seen_once: BitArray::new(universe_bits),
            seen_twice: BitArray::new(universe_bits),
        }
    }

    /// Record an occurrence. Calls beyond the second for the same fingerprint have no effect.
    #[inline]
    pub fn record(&mut self, fingerprint: Fingerprint) {
        if self.seen_once.get(fingerprint) {
            self.seen_twice.set(fingerprint);
        } else {
            self.seen_once.set(fingerprint);
        }
    }

    pub fn contains_once(&self, fingerprint: Fingerprint) -> bool {
        self.seen_once.get(fingerprint)
    }

    pub fn contains_twice(&self, fingerprint: Fingerprint) -> bool {
        self.seen_twice.get(fingerprint)
    }

    /// Fingerprints seen at least twice, in increasing order.
    pub fn export_doubles(&self) -> Vec<Fingerprint> {
        self.seen_twice.ones().collect()
    }

    pub fn seen_once_count(&self) -> u64 {
        self.seen_once.count_ones()
    }

    pub fn seen_twice_count(&self) -> u64 {
        self.seen_twice.count_ones()
    }

    /// Bytes held by both bit arrays.
    pub fn memory_bytes(&self) -> usize {
        self.seen_once.num_bytes() + self.seen_twice.num_bytes()
    }
}
