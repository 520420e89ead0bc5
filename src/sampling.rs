//! Uniform column-index and sign draws.
//!
//! All draws are rejection loops against the column count; collisions
//! between separate noise groups are allowed by design and resolved only
//! at compaction time, so these helpers exclude exactly the indices named
//! by their callers and nothing more.

use crate::cipher::Sign;
use rand::Rng;
use std::collections::HashSet;

/// Draw a column index not yet in `used`, and record it.
pub fn pick_unique_idx<R: Rng>(rng: &mut R, b: usize, used: &mut HashSet<u16>) -> u16 {
    loop {
        let x = rng.gen_range(0..b) as u16;
        if used.insert(x) {
            return x;
        }
    }
}

/// Draw a column index distinct from `exclude`.
pub fn pick_distinct_idx<R: Rng>(rng: &mut R, b: usize, exclude: u16) -> u16 {
    loop {
        let x = rng.gen_range(0..b) as u16;
        if x != exclude {
            return x;
        }
    }
}

/// Draw a column index distinct from both `ex1` and `ex2`.
pub fn pick_distinct_idx2<R: Rng>(rng: &mut R, b: usize, ex1: u16, ex2: u16) -> u16 {
    loop {
        let x = rng.gen_range(0..b) as u16;
        if x != ex1 && x != ex2 {
            return x;
        }
    }
}

/// Uniform sign draw.
pub fn sample_sign<R: Rng>(rng: &mut R) -> Sign {
    Sign::from_bit(rng.next_u64())
}
