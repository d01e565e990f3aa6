// The integer hash in this file was ported from minimap2 by Heng Li. K-mer encoding
// used with it was modified from skani by Jim Shaw.

// minimap2 MIT License
//
// Copyright (c) 2018-     Dana-Farber Cancer Institute
//               2017-2018 Broad Institute, Inc.
//
// skani MIT License
//
// Copyright (c) 2022 Jim Shaw
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS
// BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN
// ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use serde::{Deserialize, Serialize};

use crate::canonical::{canonical_kmers, Kmer};
use crate::sketch_params::SketchParams;

pub type ItemHash = u64;

/// Index of a k-mer in a presence sketch.
pub type Fingerprint = u32;

// Seeds are mixed with this constant so that small seeds produce unrelated salts.
const SEED_SALT: ItemHash = 0x9E37_79B9_7F4A_7C15;

/// Thomas Wang's integer hash function.
// Ported from minimap2 and following Rust implementation by Anicet Ebou.
// https://gist.github.com/lh3/974ced188be2f90422cc#file-inthash-c
// https://aebou.rbind.io/post/a-rust-glimpse-at-thomas-wang-integer-hash-function
// Further reading: https://gist.github.com/badboy/6267743
#[inline]
pub fn tw_hash64(kmer: ItemHash) -> ItemHash {
    let mut hash = kmer;

    hash = (!hash).wrapping_add(hash << 21); // key = (key << 21) - key - 1
    hash = hash ^ (hash >> 24);

    hash = hash.wrapping_add(hash << 3).wrapping_add(hash << 8); // key * 265
    hash = hash ^ (hash >> 14);

    hash = hash.wrapping_add(hash << 2).wrapping_add(hash << 4); // key * 21
    hash = hash ^ (hash >> 28);

    hash = hash.wrapping_add(hash << 31);

    hash
}

/// Seeds of the subsampling and fingerprint hash functions.
///
/// Sketches are only comparable when built with identical seeds, so the defaults
/// are part of the file format and must not change between releases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashSeeds {
    pub subsample: u64,
    pub fingerprint: u64,
}

impl Default for HashSeeds {
    fn default() -> Self {
        HashSeeds {
            subsample: 0,
            fingerprint: 1,
        }
    }
}

/// Seeded hash over packed k-mers.
#[derive(Clone, Copy, Debug)]
pub struct HashFilter {
    salt: ItemHash,
}

impl HashFilter {
    pub fn new(seed: u64) -> Self {
        HashFilter {
            salt: tw_hash64(seed ^ SEED_SALT),
        }
    }

    #[inline]
    pub fn hash(&self, kmer: Kmer) -> ItemHash {
        tw_hash64(tw_hash64(kmer) ^ self.salt)
    }
}

/// Subsamples canonical k-mers and maps the retained ones to fingerprints.
#[derive(Clone, Debug)]
pub struct KmerFilter {
    kmer_length: u8,
    ratio: u64,
    subsample: HashFilter,
    fingerprint: HashFilter,
    fingerprint_mask: ItemHash,
}

impl KmerFilter {
    pub fn new(params: &SketchParams) -> Self {
        KmerFilter {
            kmer_length: params.k(),
            ratio: params.ratio(),
            subsample: HashFilter::new(params.seeds().subsample),
            fingerprint: HashFilter::new(params.seeds().fingerprint),
            fingerprint_mask: ItemHash::MAX >> (64 - params.fingerprint_bits() as u32),
        }
    }

    /// Deterministic per k-mer value: the same k-mer is kept in every read and sample.
    #[inline]
    pub fn keep(&self, kmer: Kmer) -> bool {
        self.ratio <= 1 || self.subsample.hash(kmer) % self.ratio == 0
    }

    #[inline]
    pub fn fingerprint(&self, kmer: Kmer) -> Fingerprint {
        (self.fingerprint.hash(kmer) & self.fingerprint_mask) as Fingerprint
    }

    /// Fingerprints of the retained canonical k-mers of a sequence.
    pub fn fingerprints<'a>(&'a self, seq: &'a [u8]) -> impl Iterator<Item = Fingerprint> + 'a {
        canonical_kmers(seq, self.kmer_length)
            .filter(|&kmer| self.keep(kmer))
            .map(|kmer| self.fingerprint(kmer))
    }
}
