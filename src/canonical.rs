
//! Canonical k-mer extraction from nucleotide sequences.
//!
//! K-mers are packed into 2 bits per base (A=0, C=1, G=2, T=3) and the canonical
//! representative is the numerically smaller of the forward and reverse complement
//! encodings. Windows spanning a base outside of {A,C,G,T} are skipped.

pub type Kmer = u64;

pub const MAX_KMER_LENGTH: u8 = 32;

const INVALID: u8 = 4;

const NT_TO_BITS: [u8; 256] = {
    let mut table = [INVALID; 256];

    table[b'A' as usize] = 0;
    table[b'C' as usize] = 1;
    table[b'G' as usize] = 2;
    table[b'T' as usize] = 3;
    table[b'a' as usize] = 0;
    table[b'c' as usize] = 1;
    table[b'g' as usize] = 2;
    table[b't' as usize] = 3;

    table
};

/// Lazy iterator over the canonical k-mers of a sequence, one per valid window.
// Rolling encoding modified from the fmh_seeds method by Jim Shaw in skani.
pub struct CanonicalKmers<'a> {
    seq: &'a [u8],
    pos: usize,
    k: usize,
    valid_run: usize,
    fwd_kmer: Kmer,
    rev_kmer: Kmer,
    fwd_mask: Kmer,
    rev_shift_dist: usize,
}

impl<'a> CanonicalKmers<'a> {
    /// Create iterator over canonical k-mers of length `k` in [1, 32].
    pub fn new(seq: &'a [u8], k: u8) -> Self {
        assert!(
            (1..=MAX_KMER_LENGTH).contains(&k),
            "k-mer length must be in the range [1, {MAX_KMER_LENGTH}]"
        );
        let k = k as usize;

        CanonicalKmers {
            seq,
            pos: 0,
            k,
            valid_run: 0,
            fwd_kmer: 0,
            rev_kmer: 0,
            fwd_mask: Kmer::MAX >> (std::mem::size_of::<Kmer>() * 8 - 2 * k),
            rev_shift_dist: 2 * (k - 1),
        }
    }
}

impl Iterator for CanonicalKmers<'_> {
    type Item = Kmer;

    fn next(&mut self) -> Option<Kmer> {
        while self.pos < self.seq.len() {
            let code = NT_TO_BITS[self.seq[self.pos] as usize];
            self.pos += 1;

            if code == INVALID {
                // restart the window after an ambiguous base
                self.valid_run = 0;
                self.fwd_kmer = 0;
                self.rev_kmer = 0;
                continue;
            }

            let nuc_f = code as Kmer;
            self.fwd_kmer = ((self.fwd_kmer << 2) | nuc_f) & self.fwd_mask;

            let nuc_r = 3 - nuc_f;
            self.rev_kmer = (self.rev_kmer >> 2) | (nuc_r << self.rev_shift_dist);

            if self.valid_run < self.k {
                self.valid_run += 1;
            }

            if self.valid_run == self.k {
                return Some(self.fwd_kmer.min(self.rev_kmer));
            }
        }

        None
    }
}

/// Canonical k-mers of a sequence.
pub fn canonical_kmers(seq: &[u8], k: u8) -> CanonicalKmers<'_> {
    CanonicalKmers::new(seq, k)
}
