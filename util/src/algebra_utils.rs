// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! Modular-arithmetic utilities shared by the cryptographic modules.

use itertools::Itertools;
use std::{borrow::Borrow, collections::HashMap, iter::zip, mem};

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, ToPrimitive, Zero};

use crate::algebra::{FieldElement, ScalarField};

/// Extended Euclidean algorithm.
///
/// Returns `(gcd, x, y)` such that `a*x + b*y == gcd`.
pub fn extended_gcd(a: &BigUint, b: &BigUint) -> (BigUint, BigInt, BigInt) {
    let mut r = (
        BigInt::from_biguint(Sign::Plus, a.clone()),
        BigInt::from_biguint(Sign::Plus, b.clone()),
    );
    let mut s = (BigInt::one(), BigInt::zero());
    let mut t = (BigInt::zero(), BigInt::one());

    while !r.1.is_zero() {
        let quotient = &r.0 / &r.1;
        let step = |mut pair: (BigInt, BigInt)| {
            mem::swap(&mut pair.0, &mut pair.1);
            pair.1 -= &quotient * &pair.0;
            pair
        };
        r = step(r);
        s = step(s);
        t = step(t);
    }

    (r.0.magnitude().clone(), s.0, t.0)
}

/// Computes the inverse of `a` modulo `m`, if it exists.
///
/// Returns `Some(a^-1 mod m)` iff `gcd(a, m) == 1`. The result is in `[0, m)`.
pub fn mod_inverse(a: &BigUint, m: &BigUint) -> Option<BigUint> {
    if m.is_zero() {
        return None;
    }

    let (gcd, _, y) = extended_gcd(m, a);
    if !gcd.is_one() {
        return None;
    }

    let m_int = BigInt::from_biguint(Sign::Plus, m.clone());
    let inv = ((y % &m_int) + &m_int) % &m_int;
    Some(inv.magnitude().clone())
}

/// Solves `base^x = target (mod modulus)` for `x` in `[0, order)` using
/// baby-step giant-step.
///
/// This is a diagnostic tool for small ranges: `order` beyond about `2^40`
/// returns `None` outright rather than allocating an absurd table. Tallies use
/// the precomputed lookup table instead.
pub fn baby_step_giant_step(
    base: &BigUint,
    target: &BigUint,
    modulus: &BigUint,
    order: &BigUint,
) -> Option<BigUint> {
    use num_integer::Roots;

    if modulus.is_zero() || order.is_zero() || target >= modulus {
        return None;
    }

    let m = (order.sqrt() + BigUint::one()).to_u64().filter(|&m| m <= 1 << 20)?;

    let mut table: HashMap<BigUint, u64> = HashMap::new();
    let mut k = BigUint::one();
    for j in 0..m {
        table.entry(k.clone()).or_insert(j);
        k = (k * base) % modulus;
    }

    // giant stride: base^-m
    let stride = mod_inverse(&base.modpow(&BigUint::from(m), modulus), modulus)?;

    let mut gamma = target.clone();
    for i in 0..=m {
        if let Some(j) = table.get(&gamma) {
            return Some(BigUint::from(i) * m + *j);
        }
        gamma = (gamma * &stride) % modulus;
    }
    None
}

/// Computes a single Lagrange coefficient at zero,
/// `w_i = prod_{l != i} l / (l - i) mod q`.
///
/// The output may be nonsensical if the nodes in `xs` are not unique.
fn single_coefficient_at_zero_unchecked(
    xs: &[FieldElement],
    i: &FieldElement,
    field: &ScalarField,
) -> FieldElement {
    xs.iter()
        .filter_map(|l| {
            let l_minus_i = l.sub(i, field);
            let inv_l_minus_i = l_minus_i.inv(field)?;
            Some(l.mul(&inv_l_minus_i, field))
        })
        .fold(ScalarField::one(), |acc, s| acc.mul(&s, field))
}

/// Computes a single Lagrange coefficient at zero.
///
/// Returns `None` if `i` is not one of the nodes or the nodes are not unique.
pub fn single_coefficient_at_zero(
    xs: &[FieldElement],
    i: &FieldElement,
    field: &ScalarField,
) -> Option<FieldElement> {
    if !xs.contains(i) || !xs.iter().all_unique() {
        return None;
    }
    Some(single_coefficient_at_zero_unchecked(xs, i, field))
}

/// Lagrange interpolation at zero in the field `Z_q`: evaluates the unique
/// polynomial through the points `(xs[k], ys[k])` at `0`.
///
/// Returns `None` if the nodes are not unique or the slices differ in length.
pub fn field_lagrange_at_zero(
    xs: &[FieldElement],
    ys: &[FieldElement],
    field: &ScalarField,
) -> Option<FieldElement> {
    if xs.len() != ys.len() || !xs.iter().all_unique() {
        return None;
    }
    let y0 = zip(xs, ys)
        .map(|(i, y)| single_coefficient_at_zero_unchecked(xs, i, field).mul(y, field))
        .fold(ScalarField::zero(), |acc, s| acc.add(&s, field));
    Some(y0)
}

/// Returns the number of bits required to represent `n` (at least 1).
pub fn cnt_bits_repr<T: Borrow<BigUint>>(n: &T) -> usize {
    let n: &BigUint = n.borrow();
    if n.is_zero() { 1 } else { n.bits() as usize }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test {
    use super::*;

    #[test]
    fn extended_gcd_bezout_identity() {
        let a = BigUint::from(240_u32);
        let b = BigUint::from(46_u32);
        let (g, x, y) = extended_gcd(&a, &b);
        assert_eq!(g, BigUint::from(2_u32));
        let lhs = BigInt::from(240) * x + BigInt::from(46) * y;
        assert_eq!(lhs, BigInt::from(2));
    }

    #[test]
    fn mod_inverse_known_values() {
        assert_eq!(
            mod_inverse(&BigUint::from(3_u8), &BigUint::from(11_u8)),
            Some(BigUint::from(4_u8)),
        );
        assert_eq!(mod_inverse(&BigUint::from(0_u8), &BigUint::from(11_u8)), None);
        assert_eq!(mod_inverse(&BigUint::from(3_u8), &BigUint::from(12_u8)), None);
        assert_eq!(mod_inverse(&BigUint::from(3_u8), &BigUint::zero()), None);
    }

    #[test]
    fn mod_inverse_round_trip() {
        let m = BigUint::from(1_000_003_u32); // prime
        for a in 1_u32..50 {
            let a = BigUint::from(a);
            let inv = mod_inverse(&a, &m).unwrap();
            assert_eq!((a * inv) % &m, BigUint::one());
        }
    }

    #[test]
    fn bsgs_recovers_small_exponents() {
        // 2 generates the order-11 subgroup of Z_23.
        let base = BigUint::from(2_u8);
        let modulus = BigUint::from(23_u8);
        let order = BigUint::from(11_u8);
        for x in 0_u32..11 {
            let target = base.modpow(&BigUint::from(x), &modulus);
            assert_eq!(
                baby_step_giant_step(&base, &target, &modulus, &order),
                Some(BigUint::from(x)),
            );
        }
    }

    #[test]
    fn bsgs_rejects_unsolvable_and_oversized() {
        let base = BigUint::from(2_u8);
        let modulus = BigUint::from(23_u8);
        // 5 is not in the subgroup generated by 2.
        assert_eq!(
            baby_step_giant_step(&base, &BigUint::from(5_u8), &modulus, &BigUint::from(11_u8)),
            None
        );
        // A range too large for diagnostics is refused.
        let huge = BigUint::one() << 100;
        assert_eq!(baby_step_giant_step(&base, &base, &modulus, &huge), None);
    }

    #[test]
    fn lagrange_at_zero_recovers_constant_term() {
        let field = ScalarField::new_unchecked(BigUint::from(127_u8));

        // f(z) = 42 + 3z + z^2 over Z_127.
        let f = |z: u32| (42 + 3 * z + z * z) % 127;
        let xs: Vec<_> = (1_u32..=3).map(|x| FieldElement::from(x, &field)).collect();
        let ys: Vec<_> = (1_u32..=3).map(|x| FieldElement::from(f(x), &field)).collect();

        assert_eq!(
            field_lagrange_at_zero(&xs, &ys, &field),
            Some(FieldElement::from(42_u8, &field))
        );

        // Mismatched lengths and repeated nodes are rejected.
        assert_eq!(field_lagrange_at_zero(&xs[0..2], &ys, &field), None);
        let repeated = [xs[0].clone(), xs[1].clone(), xs[1].clone()];
        assert_eq!(field_lagrange_at_zero(&repeated, &ys, &field), None);
    }

    #[test]
    fn single_coefficient_requires_membership() {
        let field = ScalarField::new_unchecked(BigUint::from(127_u8));
        let xs: Vec<_> = (1_u32..=3).map(|x| FieldElement::from(x, &field)).collect();
        let outside = FieldElement::from(9_u8, &field);
        assert_eq!(single_coefficient_at_zero(&xs, &outside, &field), None);
        assert!(single_coefficient_at_zero(&xs, &xs[0], &field).is_some());
    }

    #[test]
    fn cnt_bits() {
        for (n, expected) in [1, 1, 2, 2, 3, 3, 3, 3, 4].into_iter().enumerate() {
            assert_eq!(cnt_bits_repr(&BigUint::from(n)), expected);
        }
    }
}
