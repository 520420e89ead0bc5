//! Structural compaction: edge coalescing and layer garbage collection.
//!
//! Compaction is the only place edges are ever merged. It folds the whole
//! edge multiset into a dense `(layer, column, sign)` accumulator, then
//! re-emits surviving buckets in canonical order, so two semantically
//! equal edge sets always compact to the same sequence.

use crate::bitvec::BitVec;
use crate::cipher::{Cipher, Edge, Layer, Sign};
use crate::field::Fp;
use crate::keygen::PublicKey;
use tracing::debug;

#[derive(Default)]
struct Slot {
    p: Option<(Fp, BitVec)>,
    m: Option<(Fp, BitVec)>,
}

fn fold_into(sub: &mut Option<(Fp, BitVec)>, w: Fp, s: BitVec) {
    match sub {
        Some((acc_w, acc_s)) => {
            *acc_w = acc_w.add(w);
            acc_s.xor_with(&s);
        }
        None => *sub = Some((w, s)),
    }
}

/// Coalesce edges sharing `(layer_id, idx, sign)`: weights are field-added,
/// shares are XOR-merged. Buckets that cancel to zero weight *and* zero
/// share are dropped. Emission order is layer-major, then column, with the
/// `P` bucket before the `M` bucket.
pub fn compact_edges(pk: &PublicKey, c: &mut Cipher) {
    let b = pk.prm.b;
    let nl = c.layers.len();
    let n_in = c.edges.len();

    let mut acc: Vec<Slot> = Vec::new();
    acc.resize_with(nl * b, Slot::default);

    for e in c.edges.drain(..) {
        let slot = &mut acc[e.layer_id as usize * b + e.idx as usize];
        match e.ch {
            Sign::P => fold_into(&mut slot.p, e.w, e.s),
            Sign::M => fold_into(&mut slot.m, e.w, e.s),
        }
    }

    // The weight test must not leak through timing; the share popcount is
    // public structure and may shortcut.
    let keep = |w: &Fp, s: &BitVec| w.ct_is_nonzero() || s.popcnt() != 0;

    let mut out = Vec::with_capacity(n_in);
    for (pos, slot) in acc.into_iter().enumerate() {
        let (lid, k) = ((pos / b) as u32, (pos % b) as u16);
        if let Some((w, s)) = slot.p {
            if keep(&w, &s) {
                out.push(Edge { layer_id: lid, idx: k, ch: Sign::P, w, s });
            }
        }
        if let Some((w, s)) = slot.m {
            if keep(&w, &s) {
                out.push(Edge { layer_id: lid, idx: k, ch: Sign::M, w, s });
            }
        }
    }
    c.edges = out;
}

/// Drop layers not reachable from any edge, directly or through `Prod`
/// parent references, and renumber the survivors in original order.
pub fn compact_layers(c: &mut Cipher) {
    let n = c.layers.len();
    if n == 0 {
        return;
    }

    let mut used = vec![false; n];
    for e in &c.edges {
        if (e.layer_id as usize) < n {
            used[e.layer_id as usize] = true;
        }
    }

    // Fixed-point closure over Prod parents.
    let mut changed = true;
    while changed {
        changed = false;
        for lid in 0..n {
            if !used[lid] {
                continue;
            }
            if let Layer::Prod { pa, pb, .. } = c.layers[lid] {
                for p in [pa as usize, pb as usize] {
                    if p < n && !used[p] {
                        used[p] = true;
                        changed = true;
                    }
                }
            }
        }
    }

    let mut remap = vec![u32::MAX; n];
    let mut new_layers = Vec::with_capacity(n);
    for lid in 0..n {
        if used[lid] {
            remap[lid] = new_layers.len() as u32;
            new_layers.push(c.layers[lid].clone());
        }
    }
    if new_layers.len() == n {
        return;
    }

    for layer in &mut new_layers {
        if let Layer::Prod { pa, pb, .. } = layer {
            *pa = remap[*pa as usize];
            *pb = remap[*pb as usize];
        }
    }
    for e in &mut c.edges {
        e.layer_id = remap[e.layer_id as usize];
    }
    c.layers = new_layers;
}

/// Compact the edge set if it exceeds the budget; otherwise a no-op.
/// `site_tag` only feeds the trace channel.
pub fn guard_budget(pk: &PublicKey, c: &mut Cipher, site_tag: &str) {
    if c.edges.len() > pk.prm.edge_budget {
        debug!(site = site_tag, edges = c.edges.len(), budget = pk.prm.edge_budget,
               "edge budget exceeded, compacting");
        compact_edges(pk, c);
    }
}
