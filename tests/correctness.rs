//! Integration tests: algebraic invariants of encryption, compaction and
//! combining, plus the deterministic end-to-end scenarios.

use layered_fhe::cipher::{sigma_density, Cipher, Layer, Sign};
use layered_fhe::combine::combine_ciphers;
use layered_fhe::compact::{compact_edges, compact_layers, guard_budget};
use layered_fhe::encrypt::{enc_fp_depth, enc_value, enc_zero_depth, plan_noise};
use layered_fhe::field::Fp;
use layered_fhe::keygen::{keygen, PublicKey, SecretKey};
use layered_fhe::params::Prm;
use layered_fhe::prf::prf_r;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn setup(seed: u64, prm: Prm) -> (SecretKey, PublicKey, StdRng) {
    let mut rng = StdRng::seed_from_u64(seed);
    let (sk, pk) = keygen(&mut rng, prm);
    (sk, pk, rng)
}

fn noiseless_prm() -> Prm {
    Prm {
        noise_entropy_bits: 0.0,
        depth_slope_bits: 0.0,
        ..Prm::small()
    }
}

/// Signed sum of raw weights over one layer's edges.
fn layer_weight_sum(c: &Cipher, lid: u32) -> Fp {
    let mut sum = Fp::ZERO;
    for e in c.edges.iter().filter(|e| e.layer_id == lid) {
        sum = if e.ch.is_plus() { sum.add(e.w) } else { sum.sub(e.w) };
    }
    sum
}

/// Signed, generator-weighted sum over one layer's edges.
fn layer_value(pk: &PublicKey, c: &Cipher, lid: u32) -> Fp {
    let mut sum = Fp::ZERO;
    for e in c.edges.iter().filter(|e| e.layer_id == lid) {
        let term = e.w.mul(pk.powg_b[e.idx as usize]);
        sum = if e.ch.is_plus() { sum.add(term) } else { sum.sub(term) };
    }
    sum
}

/// The masking scalar of a layer, rederived from its seed.
fn layer_r(pk: &PublicKey, sk: &SecretKey, c: &Cipher, lid: usize) -> Fp {
    prf_r(pk, sk, c.layers[lid].seed())
}

#[test]
fn test_payload_balance() {
    // No noise: the 8 payload edges alone must satisfy both constraints.
    for seed in 0..10 {
        let (sk, pk, mut rng) = setup(seed, noiseless_prm());
        let v = Fp::from_u64(1000 + seed);
        let c = enc_fp_depth(&mut rng, &pk, &sk, v, 0);

        assert_eq!(c.layers.len(), 1);
        assert_eq!(c.edges.len(), 8);
        assert_eq!(layer_weight_sum(&c, 0), Fp::ZERO, "signed weights must cancel");

        let r = layer_r(&pk, &sk, &c, 0);
        assert_eq!(layer_value(&pk, &c, 0), v.mul(r), "encoded value must be v·R");
    }
}

#[test]
fn test_noise_closure() {
    // With noise on, the noise groups' generator-weighted contributions
    // cancel, so the layer still reconstructs to exactly v·R.
    for seed in 0..10 {
        let (sk, pk, mut rng) = setup(seed, Prm::small());
        let v = Fp::from_u64(31337);
        let c = enc_fp_depth(&mut rng, &pk, &sk, v, 2);

        let (z2, z3) = plan_noise(&pk.prm, 2);
        assert!(z2 + z3 > 0, "profile must actually emit noise");
        assert_eq!(c.edges.len(), 8 + 2 * z2 as usize + 3 * z3 as usize);

        let r = layer_r(&pk, &sk, &c, 0);
        assert_eq!(layer_value(&pk, &c, 0), v.mul(r));
    }
}

#[test]
fn test_compact_edges_idempotent_and_sorted() {
    let (sk, pk, mut rng) = setup(3, Prm::small());
    let mut c = enc_fp_depth(&mut rng, &pk, &sk, Fp::from_u64(5), 4);

    compact_edges(&pk, &mut c);
    let once = c.clone();
    compact_edges(&pk, &mut c);
    assert_eq!(c, once, "compact_edges must be idempotent");

    let keys: Vec<(u32, u16, u8)> = c
        .edges
        .iter()
        .map(|e| (e.layer_id, e.idx, e.ch.as_byte()))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort_unstable();
    assert_eq!(keys, sorted, "emission order must be canonical");
    sorted.dedup();
    assert_eq!(keys.len(), sorted.len(), "one edge per bucket");
}

#[test]
fn test_compaction_preserves_layer_value() {
    let (sk, pk, mut rng) = setup(11, Prm::small());
    let v = Fp::from_u64(909);
    let mut c = enc_fp_depth(&mut rng, &pk, &sk, v, 3);
    let before = layer_value(&pk, &c, 0);
    compact_edges(&pk, &mut c);
    assert_eq!(layer_value(&pk, &c, 0), before, "coalescing must not change the sum");
}

#[test]
fn test_layer_reachability_after_combine() {
    let (sk, pk, mut rng) = setup(4, Prm::small());
    let a = enc_fp_depth(&mut rng, &pk, &sk, Fp::from_u64(1), 0);
    let b = enc_fp_depth(&mut rng, &pk, &sk, Fp::from_u64(2), 0);
    let c = combine_ciphers(&pk, a, b);
    for (lid, _) in c.layers.iter().enumerate() {
        assert!(
            c.edges.iter().any(|e| e.layer_id == lid as u32),
            "layer {lid} survived without an edge"
        );
    }
}

#[test]
fn test_combiner_identity() {
    let (sk, pk, mut rng) = setup(5, Prm::small());
    let a = enc_fp_depth(&mut rng, &pk, &sk, Fp::from_u64(42), 0);
    let c = combine_ciphers(&pk, a.clone(), Cipher::new());
    assert_eq!(c, a, "combining with the empty cipher must be the identity");
}

#[test]
fn test_budget_bound() {
    let mut prm = Prm::small();
    prm.edge_budget = 16;
    let (sk, pk, mut rng) = setup(6, prm);
    // depth hint inflates noise well past the budget, forcing the guard
    let mut c = enc_fp_depth(&mut rng, &pk, &sk, Fp::from_u64(7), 8);
    guard_budget(&pk, &mut c, "test");
    // after compaction at most one edge per (layer, column, sign) bucket
    assert!(c.edges.len() <= c.layers.len() * pk.prm.b * 2);
    let r = prf_r(&pk, &sk, c.layers[0].seed());
    assert_eq!(layer_value(&pk, &c, 0), Fp::from_u64(7).mul(r), "guard must not change the value");
}

#[test]
fn test_density_bounds() {
    let (sk, pk, mut rng) = setup(8, Prm::small());
    assert_eq!(sigma_density(&pk, &Cipher::new()), 0.0);
    let c = enc_fp_depth(&mut rng, &pk, &sk, Fp::from_u64(3), 1);
    let d = sigma_density(&pk, &c);
    assert!(d > 0.0 && d < 1.0);
    // hash shares keep the mean ones-ratio near one half
    assert!((d - 0.5).abs() < 0.15, "density {d} far from 0.5");
}

#[test]
fn test_noiseless_encrypt_is_exactly_payload() {
    // b = 64, m = 128, zero noise budget: plan (0,0), 8 edges survive compaction
    let prm = noiseless_prm();
    assert_eq!(plan_noise(&prm, 0), (0, 0));
    let (sk, pk, mut rng) = setup(1, prm);
    let mut c = enc_fp_depth(&mut rng, &pk, &sk, Fp::from_u64(42), 0);
    assert_eq!(c.edges.len(), 8);
    compact_edges(&pk, &mut c);
    assert_eq!(c.edges.len(), 8, "distinct payload columns leave nothing to merge");
}

#[test]
fn test_pair_noise_only() {
    // tuple2_fraction = 1: only 2-edge groups, each with opposite signs
    let prm = Prm {
        b: 256,
        noise_entropy_bits: 120.0,
        depth_slope_bits: 0.0,
        tuple2_fraction: 1.0,
        ..Prm::default_128bit()
    };
    let (z2, z3) = plan_noise(&prm, 0);
    assert_eq!((z2, z3), (7, 0));

    let (sk, pk, mut rng) = setup(2, prm);
    let c = enc_fp_depth(&mut rng, &pk, &sk, Fp::from_u64(1), 0);
    assert_eq!(c.edges.len(), 8 + 2 * z2 as usize);
    for pair in c.edges[8..].chunks_exact(2) {
        assert_ne!(pair[0].ch, pair[1].ch, "pair group signs must be opposite");
    }
}

#[test]
fn test_combined_zero_encryptions_keep_both_layers() {
    let (sk, pk, mut rng) = setup(9, Prm::small());
    let a = enc_fp_depth(&mut rng, &pk, &sk, Fp::ZERO, 0);
    let b = enc_fp_depth(&mut rng, &pk, &sk, Fp::ZERO, 0);
    let c = combine_ciphers(&pk, a, b);
    assert_eq!(c.layers.len(), 2, "both layers carry edges and must survive");
    assert!(c.edges.iter().any(|e| e.layer_id == 0));
    assert!(c.edges.iter().any(|e| e.layer_id == 1));
}

#[test]
fn test_zero_encryption_reconstructs_zero() {
    for seed in 0..5 {
        let (sk, pk, mut rng) = setup(20 + seed, Prm::small());
        let c = enc_zero_depth(&mut rng, &pk, &sk, 0);
        assert_eq!(c.layers.len(), 2);
        // unmask each layer by its own R; the pair must cancel
        let mut total = Fp::ZERO;
        for lid in 0..c.layers.len() {
            let r = layer_r(&pk, &sk, &c, lid);
            total = total.add(layer_value(&pk, &c, lid as u32).mul(r.inv()));
        }
        assert_eq!(total, Fp::ZERO, "zero encryption must sum to zero");
    }
}

#[test]
fn test_value_encryption_reconstructs_value() {
    for (seed, v) in [(30u64, 0u64), (31, 1), (32, 42), (33, u64::MAX)] {
        let (sk, pk, mut rng) = setup(seed, Prm::small());
        let c = enc_value(&mut rng, &pk, &sk, v);
        assert_eq!(c.layers.len(), 2, "masked pair encrypts as two base layers");
        let mut total = Fp::ZERO;
        for lid in 0..c.layers.len() {
            let r = layer_r(&pk, &sk, &c, lid);
            total = total.add(layer_value(&pk, &c, lid as u32).mul(r.inv()));
        }
        assert_eq!(total, Fp::from_u64(v), "masked pair must reconstruct v");
    }
}

#[test]
fn test_prod_layers_survive_combining() {
    // A Prod layer from homomorphic evaluation must ride through combine
    // with its parents intact.
    let (sk, pk, mut rng) = setup(40, Prm::small());
    let mut a = enc_fp_depth(&mut rng, &pk, &sk, Fp::from_u64(6), 0);
    let seed = *a.layers[0].seed();
    a.layers.push(Layer::Prod { pa: 0, pb: 0, seed });
    if let Some(e) = a.edges.first_mut() {
        e.layer_id = 1;
    }
    let b = enc_fp_depth(&mut rng, &pk, &sk, Fp::from_u64(7), 0);
    let c = combine_ciphers(&pk, a, b);
    assert_eq!(c.layers.len(), 3);
    assert!(matches!(c.layers[1], Layer::Prod { pa: 0, pb: 0, .. }));
}

#[test]
fn test_edges_keep_sign_split() {
    // Both polarities show up in a real encryption (overwhelmingly likely
    // across 8 payload signs and the noise draws for a fixed seed).
    let (sk, pk, mut rng) = setup(50, Prm::small());
    let c = enc_fp_depth(&mut rng, &pk, &sk, Fp::from_u64(99), 1);
    let plus = c.edges.iter().filter(|e| e.ch == Sign::P).count();
    let minus = c.edges.len() - plus;
    assert!(plus > 0 && minus > 0);
}

#[test]
fn test_compact_layers_is_noop_on_fresh_encryption() {
    let (sk, pk, mut rng) = setup(60, Prm::small());
    let mut c = enc_fp_depth(&mut rng, &pk, &sk, Fp::from_u64(13), 0);
    let before = c.clone();
    compact_layers(&mut c);
    assert_eq!(c, before, "a fresh single-layer cipher has nothing to collect");
}
