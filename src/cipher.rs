//! Ciphertext data model: signed edges over a DAG of layers.
//!
//! A ciphertext is a list of layers (leaves, plus multiplicative nodes
//! produced by homomorphic evaluation) and a multiset of edges. Each edge
//! contributes a signed, R-masked field weight at one `(layer, column)`
//! slot and owns a hash share used by the decoder.

use crate::bitvec::BitVec;
use crate::field::Fp;
use crate::keygen::PublicKey;
use crate::prf::RSeed;

/// Edge polarity. `P` contributes `+w`, `M` contributes `−w`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sign {
    P,
    M,
}

impl Sign {
    /// Map the low bit of a random draw to a sign.
    #[inline]
    pub fn from_bit(bit: u64) -> Sign {
        if bit & 1 == 0 {
            Sign::P
        } else {
            Sign::M
        }
    }

    #[inline]
    pub fn flip(self) -> Sign {
        match self {
            Sign::P => Sign::M,
            Sign::M => Sign::P,
        }
    }

    #[inline]
    pub fn is_plus(self) -> bool {
        matches!(self, Sign::P)
    }

    /// Wire encoding, also fed to the share hash.
    #[inline]
    pub fn as_byte(self) -> u8 {
        match self {
            Sign::P => 0,
            Sign::M => 1,
        }
    }
}

/// One signed contribution at `(layer_id, idx)`.
///
/// `(layer_id, idx, ch)` is the edge's bucket identity; compaction keeps
/// at most one edge per bucket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    pub layer_id: u32,
    pub idx: u16,
    pub ch: Sign,
    pub w: Fp,
    pub s: BitVec,
}

/// A node in the ciphertext DAG.
///
/// Encryption only emits `Base` leaves; `Prod` nodes come from
/// homomorphic multiplication and must survive combining unchanged.
/// Parent indices always point at earlier layers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Layer {
    Base { seed: RSeed },
    Prod { pa: u32, pb: u32, seed: RSeed },
}

impl Layer {
    pub fn seed(&self) -> &RSeed {
        match self {
            Layer::Base { seed } => seed,
            Layer::Prod { seed, .. } => seed,
        }
    }
}

/// A ciphertext: the layer DAG plus the edge multiset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cipher {
    pub layers: Vec<Layer>,
    pub edges: Vec<Edge>,
}

impl Cipher {
    pub fn new() -> Self {
        Cipher::default()
    }
}

/// Mean ones-ratio of the edge shares; `0.0` for an empty edge set.
/// A health probe for callers, not part of the algebra.
pub fn sigma_density(pk: &PublicKey, c: &Cipher) -> f64 {
    if c.edges.is_empty() {
        return 0.0;
    }
    let ones: u64 = c.edges.iter().map(|e| e.s.popcnt() as u64).sum();
    ones as f64 / (c.edges.len() as f64 * pk.prm.m_bits as f64)
}
