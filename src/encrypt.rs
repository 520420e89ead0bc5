//! Encryption: balanced payload edges + budgeted cancelling noise.
//!
//! A fresh ciphertext is one base layer carrying exactly 8 payload edges
//! whose signed, R-masked weights encode the plaintext, plus a planned
//! number of 2- and 3-edge noise groups whose generator-weighted sums
//! cancel. The last noise group closes the running delta to zero, so the
//! noise is invisible to the decoder while still flooding the edge set.

use crate::cipher::{Cipher, Edge, Layer, Sign};
use crate::combine::combine_ciphers;
use crate::compact::guard_budget;
use crate::field::Fp;
use crate::keygen::{PublicKey, SecretKey};
use crate::params::Prm;
use crate::prf::{make_nonce128, prf_noise_delta, prf_r, prg_layer_ztag, sigma_from_h, RSeed};
use crate::sampling::{pick_distinct_idx, pick_distinct_idx2, pick_unique_idx, sample_sign};
use rand::Rng;
use std::collections::HashSet;

/// Payload edge count. The solver fixes the last two weights, so at least
/// six carry fresh entropy.
const S: usize = 8;

/// Decide how many 2-edge and 3-edge noise groups to emit.
///
/// The bit budget grows linearly with the depth hint; each tuple pays for
/// itself in index entropy (`2·log2(b)` or `3·log2(b)` bits). A total of
/// exactly one group is forbidden: a lone group would have to be its own
/// closing group and its delta would be forced to zero.
pub fn plan_noise(prm: &Prm, depth_hint: i32) -> (u32, u32) {
    let budget = prm.noise_entropy_bits + prm.depth_slope_bits * depth_hint.max(0) as f64;
    let per2 = 2.0 * (prm.b as f64).log2();
    let per3 = 3.0 * (prm.b as f64).log2();

    let mut z2 = ((budget * prm.tuple2_fraction) / per2.max(1e-6)).floor().max(0.0) as u32;
    let mut z3 = ((budget * (1.0 - prm.tuple2_fraction)) / per3.max(1e-6)).floor().max(0.0) as u32;

    if z2 + z3 == 1 {
        if z3 > 0 {
            z3 += 1;
        } else {
            z2 += 1;
        }
    }
    (z2, z3)
}

fn make_edge<R: Rng>(
    rng: &mut R,
    pk: &PublicKey,
    seed: &RSeed,
    idx: u16,
    ch: Sign,
    w: Fp,
) -> Edge {
    Edge {
        layer_id: 0,
        idx,
        ch,
        w,
        s: sigma_from_h(pk, seed.ztag, &seed.nonce, idx, ch, rng.next_u64()),
    }
}

/// Delta for the next noise group. Non-final groups draw from the PRF and
/// push the running sum; the final group returns whatever cancels it.
fn next_delta(
    pk: &PublicKey,
    sk: &SecretKey,
    seed: &RSeed,
    delta_acc: &mut Fp,
    group_id: u32,
    groups_left: u32,
    kind: u8,
) -> Fp {
    if groups_left <= 1 {
        return delta_acc.neg();
    }
    let d = prf_noise_delta(pk, sk, seed, group_id, kind);
    *delta_acc = delta_acc.add(d);
    d
}

/// Encrypt a field element into a fresh one-layer ciphertext.
pub fn enc_fp_depth<R: Rng>(
    rng: &mut R,
    pk: &PublicKey,
    sk: &SecretKey,
    v: Fp,
    depth_hint: i32,
) -> Cipher {
    let mut c = Cipher::new();

    let nonce = make_nonce128(rng);
    let ztag = prg_layer_ztag(pk.canon_tag, &nonce);
    let seed = RSeed { nonce, ztag };
    c.layers.push(Layer::Base { seed });

    // --- Payload: 8 edges over distinct columns ---
    let mut used = HashSet::with_capacity(S * 2);
    let mut idx = [0u16; S];
    let mut ch = [Sign::P; S];
    let mut r = [Fp::ZERO; S];

    for j in 0..S {
        idx[j] = pick_unique_idx(rng, pk.prm.b, &mut used);
        ch[j] = sample_sign(rng);
    }

    // First six weights are free; track their signed sums.
    let mut sum1 = Fp::ZERO;
    let mut sumg = Fp::ZERO;
    for j in 0..S - 2 {
        r[j] = Fp::rand_nonzero(rng);
        let term = r[j].mul(pk.powg_b[idx[j] as usize]);
        if ch[j].is_plus() {
            sum1 = sum1.add(r[j]);
            sumg = sumg.add(term);
        } else {
            sum1 = sum1.sub(r[j]);
            sumg = sumg.sub(term);
        }
    }

    // Solve the 2×2 system for the last two weights:
    //   Σ s·r = 0  and  Σ s·r·g = v
    let (sa, sb) = (ch[S - 2], ch[S - 1]);
    let ga = pk.powg_b[idx[S - 2] as usize];
    let gb = pk.powg_b[idx[S - 1] as usize];

    let v_rem = v.sub(sumg);
    let rhs = sum1.mul(ga).neg().sub(v_rem);
    // ga != gb: the power table is injective and the indices are distinct.
    let mut rb = rhs.mul(ga.sub(gb).inv());
    if !sb.is_plus() {
        rb = rb.neg();
    }
    let tmp = if sb.is_plus() {
        sum1.neg().sub(rb)
    } else {
        sum1.neg().add(rb)
    };
    r[S - 2] = if sa.is_plus() { tmp } else { tmp.neg() };
    r[S - 1] = rb;

    let rmask = prf_r(pk, sk, &seed);
    for j in 0..S {
        c.edges.push(make_edge(rng, pk, &seed, idx[j], ch[j], r[j].mul(rmask)));
    }

    // --- Noise: Z2 pair groups, then Z3 triple groups ---
    let (z2, z3) = plan_noise(&pk.prm, depth_hint);
    let total = z2 + z3;
    let mut delta_acc = Fp::ZERO;
    let mut group_id: u32 = 0;

    for _ in 0..z2 {
        let i = rng.gen_range(0..pk.prm.b) as u16;
        let j = pick_distinct_idx(rng, pk.prm.b, i);

        let s1 = sample_sign(rng);
        let s2 = s1.flip();

        let delta = next_delta(pk, sk, &seed, &mut delta_acc, group_id, total - group_id, 0);
        let delta_signed = if s1.is_plus() { delta } else { delta.neg() };

        // s1·(rᵢ·gᵢ − rⱼ·gⱼ) = Δ with opposite signs on the pair
        let gi = pk.powg_b[i as usize];
        let gj = pk.powg_b[j as usize];
        let r_i = Fp::rand_nonzero(rng);
        let r_j = r_i.mul(gi).sub(delta_signed).mul(gj.inv());

        c.edges.push(make_edge(rng, pk, &seed, i, s1, r_i.mul(rmask)));
        c.edges.push(make_edge(rng, pk, &seed, j, s2, r_j.mul(rmask)));
        group_id += 1;
    }

    for _ in 0..z3 {
        let i = rng.gen_range(0..pk.prm.b) as u16;
        let j = pick_distinct_idx(rng, pk.prm.b, i);
        let k = pick_distinct_idx2(rng, pk.prm.b, i, j);

        let s1 = sample_sign(rng);
        let s2 = sample_sign(rng);
        let s3 = sample_sign(rng);

        let delta = next_delta(pk, sk, &seed, &mut delta_acc, group_id, total - group_id, 1);

        // Two free weights; the third absorbs the remainder of the delta.
        let a = Fp::rand_nonzero(rng);
        let b = Fp::rand_nonzero(rng);

        let mut term1 = a.mul(pk.powg_b[i as usize]);
        let mut term2 = b.mul(pk.powg_b[j as usize]);
        if !s1.is_plus() {
            term1 = term1.neg();
        }
        if !s2.is_plus() {
            term2 = term2.neg();
        }

        let gk = pk.powg_b[k as usize];
        let gk_signed = if s3.is_plus() { gk } else { gk.neg() };
        let cw = delta.sub(term1.add(term2)).mul(gk_signed.inv());

        c.edges.push(make_edge(rng, pk, &seed, i, s1, a.mul(rmask)));
        c.edges.push(make_edge(rng, pk, &seed, j, s2, b.mul(rmask)));
        c.edges.push(make_edge(rng, pk, &seed, k, s3, cw.mul(rmask)));
        group_id += 1;
    }

    guard_budget(pk, &mut c, "enc");
    c
}

/// Encrypt a u64, blinded as a pair `(v + mask, −mask)` of independent
/// ciphertexts merged at layer granularity.
pub fn enc_value_depth<R: Rng>(
    rng: &mut R,
    pk: &PublicKey,
    sk: &SecretKey,
    v: u64,
    depth_hint: i32,
) -> Cipher {
    let val = Fp::from_u64(v);
    let mask = Fp::rand_nonzero(rng);
    let a = enc_fp_depth(rng, pk, sk, val.add(mask), depth_hint);
    let b = enc_fp_depth(rng, pk, sk, mask.neg(), depth_hint);
    combine_ciphers(pk, a, b)
}

/// Encrypt a u64 with no extra depth allowance.
pub fn enc_value<R: Rng>(rng: &mut R, pk: &PublicKey, sk: &SecretKey, v: u64) -> Cipher {
    enc_value_depth(rng, pk, sk, v, 0)
}

/// Encrypt zero as a `(mask, −mask)` pair.
pub fn enc_zero_depth<R: Rng>(
    rng: &mut R,
    pk: &PublicKey,
    sk: &SecretKey,
    depth_hint: i32,
) -> Cipher {
    let mask = Fp::rand_nonzero(rng);
    let a = enc_fp_depth(rng, pk, sk, mask, depth_hint);
    let b = enc_fp_depth(rng, pk, sk, mask.neg(), depth_hint);
    combine_ciphers(pk, a, b)
}
