//! Seeds and pseudorandom derivations.
//!
//! Every derivation is SHA-256 over a domain-separation prefix plus the
//! little-endian input fields. Field-valued outputs are rejection-sampled
//! from 127-bit counter-mode digests so they stay uniform.

use crate::bitvec::BitVec;
use crate::cipher::Sign;
use crate::field::{Fp, P};
use crate::keygen::{PublicKey, SecretKey};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// A fresh 128-bit per-layer nonce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nonce128 {
    pub lo: u64,
    pub hi: u64,
}

/// Per-layer PRF seed: the layer nonce plus its derived z-tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RSeed {
    pub nonce: Nonce128,
    pub ztag: u64,
}

/// Draw a fresh random nonce.
pub fn make_nonce128<R: RngCore>(rng: &mut R) -> Nonce128 {
    Nonce128 {
        lo: rng.next_u64(),
        hi: rng.next_u64(),
    }
}

/// Derive a layer's z-tag from the public tag and its nonce.
pub fn prg_layer_ztag(canon_tag: u64, nonce: &Nonce128) -> u64 {
    let mut h = Sha256::new();
    h.update(b"lfhe.ztag");
    h.update(canon_tag.to_le_bytes());
    h.update(nonce.lo.to_le_bytes());
    h.update(nonce.hi.to_le_bytes());
    let digest = h.finalize();
    u64::from_le_bytes(digest[..8].try_into().unwrap())
}

/// Derive the masking scalar R for a layer. Always nonzero: R multiplies
/// every edge weight and must stay invertible.
pub fn prf_r(pk: &PublicKey, sk: &SecretKey, seed: &RSeed) -> Fp {
    let mut ctr: u32 = 0;
    loop {
        let mut h = Sha256::new();
        h.update(b"lfhe.prfR");
        h.update(sk.prf_key);
        h.update(pk.canon_tag.to_le_bytes());
        h.update(seed.nonce.lo.to_le_bytes());
        h.update(seed.nonce.hi.to_le_bytes());
        h.update(seed.ztag.to_le_bytes());
        h.update(ctr.to_le_bytes());
        let digest = h.finalize();
        let x = u128::from_le_bytes(digest[..16].try_into().unwrap()) >> 1;
        if x != 0 && x < P {
            return Fp::from_canonical(x);
        }
        ctr += 1;
    }
}

/// Per-group noise delta: perturb the layer seed with fixed odd constants
/// (Weyl mixing of `group_id` and `kind`), then rerun the R derivation.
/// The bit patterns participate in the PRF input and are normative.
pub fn prf_noise_delta(
    pk: &PublicKey,
    sk: &SecretKey,
    base_seed: &RSeed,
    group_id: u32,
    kind: u8,
) -> Fp {
    let gid = group_id as u64;
    let kind = kind as u64;
    let mut s2 = *base_seed;
    s2.nonce.lo ^= 0x9e37_79b9_7f4a_7c15u64.wrapping_mul(gid) ^ kind;
    s2.nonce.hi ^= 0x94d0_49bb_1331_11ebu64.wrapping_mul(gid) ^ (kind << 32);
    s2.ztag ^= 0x517c_c1b7_2722_0a95u64.wrapping_mul(gid) ^ (kind << 48);
    prf_r(pk, sk, &s2)
}

/// Expand an edge's hash share: `m_bits` bits of SHA-256 counter-mode
/// output bound to the layer tag, nonce, column, sign, and a fresh salt.
pub fn sigma_from_h(
    pk: &PublicKey,
    ztag: u64,
    nonce: &Nonce128,
    idx: u16,
    ch: Sign,
    salt: u64,
) -> BitVec {
    let nwords = pk.prm.m_bits.div_ceil(64);
    let mut words = Vec::with_capacity(nwords);
    let mut block: u32 = 0;
    while words.len() < nwords {
        let mut h = Sha256::new();
        h.update(b"lfhe.sigma");
        h.update(pk.canon_tag.to_le_bytes());
        h.update(ztag.to_le_bytes());
        h.update(nonce.lo.to_le_bytes());
        h.update(nonce.hi.to_le_bytes());
        h.update(idx.to_le_bytes());
        h.update([ch.as_byte()]);
        h.update(salt.to_le_bytes());
        h.update(block.to_le_bytes());
        let digest = h.finalize();
        for chunk in digest.chunks_exact(8) {
            if words.len() == nwords {
                break;
            }
            words.push(u64::from_le_bytes(chunk.try_into().unwrap()));
        }
        block += 1;
    }
    BitVec::from_words(pk.prm.m_bits, words)
}
