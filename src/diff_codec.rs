
//! Delta encoding of strictly increasing fingerprint sequences.

use anyhow::{bail, ensure, Result};

use crate::hashing::Fingerprint;

/// Replace each element after the first by its difference from its predecessor.
pub fn encode(sorted: &[Fingerprint]) -> Result<Vec<Fingerprint>> {
    let mut diffs = Vec::with_capacity(sorted.len());
    let mut prev: Option<Fingerprint> = None;

    for &value in sorted {
        match prev {
            None => diffs.push(value),
            Some(p) => {
                ensure!(
                    value > p,
                    "Cannot diff-encode non-increasing sequence: {} follows {}",
                    value,
                    p
                );
                diffs.push(value - p);
            }
        }
        prev = Some(value);
    }

    Ok(diffs)
}

/// Prefix sum of a diff-encoded sequence.
pub fn decode(diffs: &[Fingerprint]) -> Result<Vec<Fingerprint>> {
    let mut sorted = Vec::with_capacity(diffs.len());

    let mut iter = diffs.iter();
    let Some(&first) = iter.next() else {
        return Ok(sorted);
    };

    let mut acc = first;
    sorted.push(acc);
    for &delta in iter {
        ensure!(
            delta > 0,
            "Decoded sequence is not strictly increasing at position {}",
            sorted.len()
        );
        acc = match acc.checked_add(delta) {
            Some(v) => v,
            None => bail!(
                "Decoded fingerprint overflows 32 bits at position {}",
                sorted.len()
            ),
        };
        sorted.push(acc);
    }

    Ok(sorted)
}
