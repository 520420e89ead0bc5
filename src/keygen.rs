//! Key generation.

use crate::field::Fp;
use crate::params::Prm;
use rand::Rng;
use std::collections::HashSet;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Secret key: the 256-bit PRF key the masking scalars are derived from.
///
/// Zeroized on drop to prevent secret material from lingering in memory.
/// Does not implement `Debug` to prevent accidental logging of secrets.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    pub prf_key: [u8; 32],
}

impl SecretKey {
    /// Serialized byte size.
    pub const BYTES: usize = 32;

    /// Serialize to bytes.
    ///
    /// The returned buffer is zeroized on drop.
    #[must_use]
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.prf_key.to_vec())
    }

    /// Deserialize from bytes.
    ///
    /// Returns `None` if `data` is not exactly `BYTES` long.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let prf_key: [u8; 32] = data.try_into().ok()?;
        Some(SecretKey { prf_key })
    }
}

/// Public key: parameter block, domain-separation tag, and the generator
/// power table `powg_b[i] = g^i` used to weight edge columns.
#[derive(Clone)]
pub struct PublicKey {
    pub prm: Prm,
    /// Fixed public tag fed to the per-layer z-tag PRG.
    pub canon_tag: u64,
    pub powg_b: Vec<Fp>,
}

impl PublicKey {
    /// Serialized byte size for a given column count.
    pub const fn bytes_for(b: usize) -> usize {
        // b, m_bits, edge_budget, three f64 knobs, canon_tag, then the table
        7 * 8 + b * 16
    }

    /// Serialize to bytes (little-endian fields, then 16-byte field elements).
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::bytes_for(self.prm.b));
        buf.extend_from_slice(&(self.prm.b as u64).to_le_bytes());
        buf.extend_from_slice(&(self.prm.m_bits as u64).to_le_bytes());
        buf.extend_from_slice(&(self.prm.edge_budget as u64).to_le_bytes());
        buf.extend_from_slice(&self.prm.noise_entropy_bits.to_le_bytes());
        buf.extend_from_slice(&self.prm.depth_slope_bits.to_le_bytes());
        buf.extend_from_slice(&self.prm.tuple2_fraction.to_le_bytes());
        buf.extend_from_slice(&self.canon_tag.to_le_bytes());
        for g in &self.powg_b {
            buf.extend_from_slice(&g.as_u128().to_le_bytes());
        }
        buf
    }

    /// Deserialize from bytes.
    ///
    /// Returns `None` on length mismatch or a non-canonical field element.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 8 {
            return None;
        }
        let read_u64 = |off: usize| -> Option<u64> {
            Some(u64::from_le_bytes(data.get(off..off + 8)?.try_into().ok()?))
        };
        let b = read_u64(0)? as usize;
        if b == 0 || b > u16::MAX as usize + 1 || data.len() != Self::bytes_for(b) {
            return None;
        }
        let prm = Prm {
            b,
            m_bits: read_u64(8)? as usize,
            edge_budget: read_u64(16)? as usize,
            noise_entropy_bits: f64::from_le_bytes(data[24..32].try_into().ok()?),
            depth_slope_bits: f64::from_le_bytes(data[32..40].try_into().ok()?),
            tuple2_fraction: f64::from_le_bytes(data[40..48].try_into().ok()?),
        };
        let canon_tag = read_u64(48)?;
        let mut powg_b = Vec::with_capacity(b);
        let mut offset = 56;
        for _ in 0..b {
            let x = u128::from_le_bytes(data[offset..offset + 16].try_into().ok()?);
            if x >= crate::field::P {
                return None;
            }
            powg_b.push(Fp::from_canonical(x));
            offset += 16;
        }
        Some(PublicKey { prm, canon_tag, powg_b })
    }
}

/// Generate a keypair.
///
/// The generator is re-drawn until its first `b` powers are pairwise
/// distinct, so `powg_b` is injective on `[0, b)` and the payload solver
/// never inverts zero.
pub fn keygen<R: Rng>(rng: &mut R, prm: Prm) -> (SecretKey, PublicKey) {
    let mut prf_key = [0u8; 32];
    rng.fill(&mut prf_key);
    let canon_tag = rng.next_u64();

    let powg_b = loop {
        let g = Fp::rand_nonzero(rng);
        let mut table = Vec::with_capacity(prm.b);
        let mut acc = Fp::ONE;
        for _ in 0..prm.b {
            table.push(acc);
            acc = acc.mul(g);
        }
        let mut seen = HashSet::with_capacity(prm.b);
        if table.iter().all(|x| seen.insert(x.as_u128())) {
            break table;
        }
    };

    (SecretKey { prf_key }, PublicKey { prm, canon_tag, powg_b })
}
