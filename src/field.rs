//! Arithmetic in the Mersenne field GF(p), p = 2^127 − 1.
//!
//! Elements are canonical `u128` values in `[0, p)`. Multiplication goes
//! through a 256-bit schoolbook product of 64-bit halves followed by
//! Mersenne folding (2^127 ≡ 1 mod p), so no modulo instruction is ever
//! taken on a secret-dependent operand.

use rand::Rng;
use subtle::ConstantTimeEq;

/// The field modulus p = 2^127 − 1.
pub const P: u128 = (1u128 << 127) - 1;

const LO64: u128 = 0xffff_ffff_ffff_ffff;

/// A field element in canonical form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fp(u128);

/// Full 256-bit product of two u128s, as (low, high) halves.
#[inline(always)]
const fn mul_wide(a: u128, b: u128) -> (u128, u128) {
    let (a0, a1) = (a & LO64, a >> 64);
    let (b0, b1) = (b & LO64, b >> 64);
    let ll = a0 * b0;
    let lh = a0 * b1;
    let hl = a1 * b0;
    let hh = a1 * b1;
    let mid = (ll >> 64) + (lh & LO64) + (hl & LO64);
    let lo = (mid << 64) | (ll & LO64);
    let hi = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);
    (lo, hi)
}

/// Reduce a 256-bit value hi·2^128 + lo modulo p.
/// 2^127 ≡ 1, so hi·2^128 ≡ 2·hi and lo ≡ (lo mod 2^127) + (lo div 2^127).
#[inline(always)]
const fn reduce_wide(lo: u128, hi: u128) -> u128 {
    let r = (lo & P) + (lo >> 127) + (hi << 1);
    let r = (r & P) + (r >> 127);
    if r >= P { r - P } else { r }
}

impl Fp {
    pub const ZERO: Fp = Fp(0);
    pub const ONE: Fp = Fp(1);

    /// Embed a u64 (always below p).
    #[inline(always)]
    pub const fn from_u64(x: u64) -> Fp {
        Fp(x as u128)
    }

    /// Wrap an already-canonical value. Callers must ensure `x < p`.
    #[inline(always)]
    pub(crate) const fn from_canonical(x: u128) -> Fp {
        Fp(x)
    }

    /// The canonical representative in `[0, p)`.
    #[inline(always)]
    pub const fn as_u128(self) -> u128 {
        self.0
    }

    #[inline(always)]
    pub const fn add(self, rhs: Fp) -> Fp {
        let s = self.0 + rhs.0;
        Fp(if s >= P { s - P } else { s })
    }

    #[inline(always)]
    pub const fn sub(self, rhs: Fp) -> Fp {
        Fp(if self.0 >= rhs.0 {
            self.0 - rhs.0
        } else {
            self.0 + P - rhs.0
        })
    }

    #[inline(always)]
    pub const fn neg(self) -> Fp {
        Fp(if self.0 == 0 { 0 } else { P - self.0 })
    }

    #[inline(always)]
    pub const fn mul(self, rhs: Fp) -> Fp {
        let (lo, hi) = mul_wide(self.0, rhs.0);
        Fp(reduce_wide(lo, hi))
    }

    /// Exponentiation by square-and-multiply.
    pub const fn pow(self, mut exp: u128) -> Fp {
        let mut result = Fp::ONE;
        let mut base = self;
        while exp > 0 {
            if exp & 1 == 1 {
                result = result.mul(base);
            }
            base = base.mul(base);
            exp >>= 1;
        }
        result
    }

    /// Multiplicative inverse via Fermat: a^(p−2). Maps 0 to 0.
    pub const fn inv(self) -> Fp {
        self.pow(P - 2)
    }

    /// Constant-time nonzero test. Canonical form means the two u64 halves
    /// fold to zero exactly when the element is zero.
    #[inline]
    pub fn ct_is_nonzero(self) -> bool {
        let folded = (self.0 as u64) | ((self.0 >> 64) as u64);
        folded.ct_eq(&0).unwrap_u8() == 0
    }

    /// Uniform element of `[0, p)` by 127-bit rejection sampling.
    pub fn rand<R: Rng>(rng: &mut R) -> Fp {
        loop {
            let x = rng.gen::<u128>() >> 1;
            if x < P {
                return Fp(x);
            }
        }
    }

    /// Uniform nonzero element.
    pub fn rand_nonzero<R: Rng>(rng: &mut R) -> Fp {
        loop {
            let x = Fp::rand(rng);
            if x != Fp::ZERO {
                return x;
            }
        }
    }
}
