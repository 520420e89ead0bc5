//! Combining: disjoint union of two ciphertext layer graphs.

use crate::cipher::{Cipher, Layer};
use crate::compact::{compact_layers, guard_budget};
use crate::keygen::PublicKey;

/// Merge two ciphertexts by appending `b`'s layers after `a`'s and
/// relocating every layer reference in `b` by the offset. Consumes both
/// inputs; the result is compacted if the union breaks the edge budget,
/// and unreachable layers are always collected.
pub fn combine_ciphers(pk: &PublicKey, a: Cipher, b: Cipher) -> Cipher {
    let mut c = Cipher {
        layers: Vec::with_capacity(a.layers.len() + b.layers.len()),
        edges: Vec::with_capacity(a.edges.len() + b.edges.len()),
    };

    c.layers.extend(a.layers);
    let off = c.layers.len() as u32;

    for mut layer in b.layers {
        if let Layer::Prod { pa, pb, .. } = &mut layer {
            *pa += off;
            *pb += off;
        }
        c.layers.push(layer);
    }

    c.edges.extend(a.edges);
    for mut e in b.edges {
        e.layer_id += off;
        c.edges.push(e);
    }

    guard_budget(pk, &mut c, "combine");
    compact_layers(&mut c);
    c
}
