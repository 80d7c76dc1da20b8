// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! Primality testing and safe-prime generation.
//!
//! Small inputs are resolved exactly (table lookup, then exhaustive trial
//! division); everything larger goes through Miller-Rabin with enough rounds
//! to be cryptographically adequate.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::num::NonZeroUsize;

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Zero};

use crate::csprng::Csprng;

pub const PRIMES_TABLE_U8: [u8; 54] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
    101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173, 179, 181, 191, 193,
    197, 199, 211, 223, 227, 229, 233, 239, 241, 251,
];

// The log_2 of the largest number for which we'll do exhaustive trial division.
const EXHAUSTIVE_TRIAL_DIVISION_MAX_L2: u64 = 20;

/// The number of Miller-Rabin rounds performed for a probabilistic test.
pub const MILLER_RABIN_ITERATIONS: usize = 50;

/// Primality test.
///
/// For numbers above `2^20` the test is probabilistic, using
/// [`MILLER_RABIN_ITERATIONS`] rounds of Miller-Rabin with bases drawn from
/// the supplied generator. Calling this on very large numbers can get quite
/// expensive.
pub fn is_prime<T: Borrow<BigUint>>(n: &T, csprng: &mut Csprng) -> bool {
    let n: &BigUint = n.borrow();

    let n_low_u32 = n.iter_u32_digits().next().unwrap_or_default();

    match n.bits() {
        // `0` and `1` are not prime.
        0..=1 => false,
        // `2` and `3` are prime.
        2 => true,
        n_bits => {
            if n_low_u32 % 2 == 0 {
                return false;
            }
            match n_bits {
                0..=8 => {
                    let n_u8 = n_low_u32 as u8;
                    for p in PRIMES_TABLE_U8 {
                        match n_u8.cmp(&p) {
                            Ordering::Less => break,
                            Ordering::Equal => return true,
                            Ordering::Greater => {}
                        }
                    }
                    false
                }
                9..=EXHAUSTIVE_TRIAL_DIVISION_MAX_L2 => {
                    use num_integer::Roots;
                    static_assertions::const_assert!(EXHAUSTIVE_TRIAL_DIVISION_MAX_L2 < 32);

                    let n = n_low_u32;
                    let n_sqrt = n.sqrt();
                    (3_u32..=n_sqrt).step_by(2).all(|p| n % p != 0)
                }
                _ => miller_rabin(n, MILLER_RABIN_ITERATIONS, csprng),
            }
        }
    }
}

/// Miller-Rabin probabilistic primality test (NIST FIPS 186-5, B.3.1).
///
/// `w` must be odd and at least 3.
fn miller_rabin(w: &BigUint, iterations: usize, csprng: &mut Csprng) -> bool {
    assert!(w.is_odd(), "requires w odd");
    assert!(!w.is_one(), "requires 3 <= w");
    assert!(iterations > 0);

    // w - 1 = m * 2^a with m odd.
    let w_minus_1: BigUint = w - 1_u8;
    // The `.unwrap()` is justified here because `w_minus_1` is even and nonzero.
    #[allow(clippy::unwrap_used)]
    let a = w_minus_1.trailing_zeros().unwrap();
    let m = &w_minus_1 >> a;

    // The `.unwrap()` is justified here because 3 <= `w`.
    #[allow(clippy::unwrap_used)]
    let wlen = NonZeroUsize::new(w.bits() as usize).unwrap();

    let two = BigUint::from(2_u8);

    'rounds: for _ in 0..iterations {
        let b = loop {
            let b = csprng.next_biguint(wlen);
            if !(b.is_zero() || b.is_one() || b >= w_minus_1) {
                break b;
            }
        };

        let mut z = b.modpow(&m, w);
        if z.is_one() || z == w_minus_1 {
            continue 'rounds;
        }

        for _ in 1..a {
            z = z.modpow(&two, w);
            if z == w_minus_1 {
                continue 'rounds;
            }
        }

        return false;
    }

    true
}

/// Returns whether `p` is a safe prime, i.e. both `p` and `(p - 1) / 2` are prime.
pub fn is_safe_prime<T: Borrow<BigUint>>(p: &T, csprng: &mut Csprng) -> bool {
    let p: &BigUint = p.borrow();
    if p.bits() < 3 || p.is_even() {
        return false;
    }
    let q: BigUint = (p - 1_u8) >> 1;
    is_prime(&q, csprng) && is_prime(p, csprng)
}

/// Generates a safe prime `p` of exactly `bits` bits, returning `(p, q)` with
/// `p = 2q + 1` and `q` prime.
///
/// `bits` must be at least 4. For key-strength sizes this takes a while; it is
/// meant for a key ceremony, not a request path.
pub fn generate_safe_prime(bits: NonZeroUsize, csprng: &mut Csprng) -> (BigUint, BigUint) {
    let bits = bits.get();
    assert!(bits >= 4, "a safe prime needs at least 4 bits");

    // The `.unwrap()` is justified here because `bits >= 4`.
    #[allow(clippy::unwrap_used)]
    let q_bits = NonZeroUsize::new(bits - 1).unwrap();

    loop {
        let mut q = csprng.next_biguint_requiring_bits(q_bits);
        q |= BigUint::one();
        if !is_prime(&q, csprng) {
            continue;
        }
        let p: BigUint = (&q << 1) | BigUint::one();
        if is_prime(&p, csprng) {
            return (p, q);
        }
    }
}
