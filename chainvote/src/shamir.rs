// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! Shamir secret sharing over a Mersenne prime.
//!
//! The ElGamal secret exponent is split among trustees at the key ceremony
//! and reconstructed once at tally time. The share modulus is the smallest
//! Mersenne prime exceeding the subgroup order, so any legal exponent fits
//! without reduction.

use num_bigint::BigUint;
use num_traits::One;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use util::{
    algebra::{FieldElement, ScalarField},
    algebra_utils::field_lagrange_at_zero,
    csprng::Csprng,
};

use crate::errors::{CoreError, CoreResult};

/// Exponents `e` of the known Mersenne primes `2^e - 1` large enough to be
/// useful as share moduli.
pub const MERSENNE_EXPONENTS: [u32; 12] = [
    521, 607, 1279, 2203, 2281, 3217, 4253, 4423, 9689, 9941, 11213, 19937,
];

/// Returns the smallest Mersenne prime `2^e - 1` strictly greater than `n`.
///
/// With 2048-bit ElGamal parameters the subgroup order has 2047 bits, which
/// selects `2^2203 - 1`.
pub fn mersenne_prime_exceeding(n: &BigUint) -> CoreResult<BigUint> {
    for e in MERSENNE_EXPONENTS {
        let candidate = (BigUint::one() << e) - BigUint::one();
        if &candidate > n {
            return Ok(candidate);
        }
    }
    Err(CoreError::BadParams(format!(
        "no known Mersenne prime exceeds a {}-bit value",
        n.bits()
    )))
}

/// One point `(i, f(i))` of the sharing polynomial.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Share {
    pub index: u32,
    pub value: FieldElement,
}

impl Zeroize for Share {
    fn zeroize(&mut self) {
        self.value.zeroize();
    }
}

/// Splits `secret` into `count` shares, any `threshold` of which recover it.
///
/// The polynomial is `f(z) = secret + a_1 z + ... + a_{threshold-1}
/// z^{threshold-1} mod prime` with uniformly random coefficients; the shares
/// are `(i, f(i))` for `i` in `1..=count`.
pub fn make_shares(
    secret: &BigUint,
    threshold: u32,
    count: u32,
    prime: &BigUint,
    csprng: &mut Csprng,
) -> CoreResult<Vec<Share>> {
    if threshold < 2 {
        return Err(CoreError::BadParams(format!(
            "threshold {threshold} makes the secret trivially recoverable"
        )));
    }
    if threshold > count {
        return Err(CoreError::BadParams(format!(
            "threshold {threshold} exceeds share count {count}; the secret would be irrecoverable"
        )));
    }
    if secret >= prime {
        return Err(CoreError::BadParams(
            "secret does not fit the share modulus".into(),
        ));
    }

    let field = ScalarField::new_unchecked(prime.clone());

    let mut coefficients = Vec::with_capacity(threshold as usize);
    coefficients.push(FieldElement::from(secret.clone(), &field));
    for _ in 1..threshold {
        coefficients.push(field.random_field_elem(csprng));
    }

    let shares = (1..=count)
        .map(|i| {
            // Horner evaluation of f(i).
            let x = FieldElement::from(i, &field);
            let value = coefficients
                .iter()
                .rev()
                .fold(ScalarField::zero(), |acc, c| {
                    acc.mul(&x, &field).add(c, &field)
                });
            Share { index: i, value }
        })
        .collect();

    Ok(shares)
}

/// Recovers the secret from at least `threshold` shares by Lagrange
/// interpolation at zero.
///
/// With fewer than `threshold` (but at least two) distinct shares this
/// returns *some* field element carrying no information about the secret;
/// callers that can verify the result (e.g. against a public key) must do so.
pub fn recover_secret(shares: &[Share], prime: &BigUint) -> CoreResult<BigUint> {
    if shares.len() < 2 {
        return Err(CoreError::BadParams(
            "at least two shares are required".into(),
        ));
    }
    if shares.iter().any(|s| s.index == 0) {
        return Err(CoreError::InvalidInput(
            "share index 0 is not a legal evaluation point".into(),
        ));
    }

    let field = ScalarField::new_unchecked(prime.clone());
    let xs: Vec<FieldElement> = shares
        .iter()
        .map(|s| FieldElement::from(s.index, &field))
        .collect();
    let ys: Vec<FieldElement> = shares.iter().map(|s| s.value.clone()).collect();

    let secret = field_lagrange_at_zero(&xs, &ys, &field)
        .ok_or_else(|| CoreError::InvalidInput("duplicate share indices".into()))?;

    Ok(secret.value().clone())
}
