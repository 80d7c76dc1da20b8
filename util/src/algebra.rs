#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! Wrappers around `BigUint` separating field and group elements in the code.
//!
//! [`ScalarField`] is the field `Z_q` of exponents; [`Group`] is the order-`q`
//! multiplicative subgroup of `Z_p^*` for a safe prime `p = 2q + 1`. Every
//! operation reduces into `[0, m)` for its modulus `m`.

use crate::{algebra_utils::mod_inverse, csprng::Csprng, prime::is_prime};
use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// An element of the field `Z_q` as defined by [`ScalarField`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct FieldElement(#[serde(with = "crate::biguint_serde")] BigUint);

/// The finite field `Z_q` of integers modulo prime `q`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScalarField {
    /// Field order.
    #[serde(with = "crate::biguint_serde")]
    q: BigUint,
}

impl FieldElement {
    /// The numeric value of the field element. Guaranteed to be `< q` when the
    /// element was produced by operations over the same field.
    pub fn value(&self) -> &BigUint {
        &self.0
    }

    /// Renders the element as a decimal string.
    pub fn to_decimal(&self) -> String {
        self.0.to_str_radix(10)
    }

    /// Computes `(self + other) % q`.
    pub fn add(&self, other: &FieldElement, field: &ScalarField) -> Self {
        FieldElement((&self.0 + &other.0) % &field.q)
    }

    /// Computes `(self - other) % q`, wrapping into `[0, q)`.
    pub fn sub(&self, other: &FieldElement, field: &ScalarField) -> Self {
        if self.0 >= other.0 {
            FieldElement((&self.0 - &other.0) % &field.q)
        } else {
            FieldElement((&field.q - (&other.0 - &self.0) % &field.q) % &field.q)
        }
    }

    /// Computes `(self * other) % q`.
    pub fn mul(&self, other: &FieldElement, field: &ScalarField) -> Self {
        FieldElement((&self.0 * &other.0) % &field.q)
    }

    /// Computes the multiplicative inverse in `Z_q` if it exists,
    /// i.e. iff `gcd(self, q) == 1`.
    pub fn inv(&self, field: &ScalarField) -> Option<Self> {
        mod_inverse(&self.0, &field.q).map(FieldElement)
    }

    /// Creates a field element from a given integer, reducing mod `q`.
    pub fn from<T>(x: T, field: &ScalarField) -> Self
    where
        BigUint: From<T>,
    {
        FieldElement(BigUint::from(x) % &field.q)
    }

    /// Creates a field element from big-endian bytes, reducing mod `q`.
    pub fn from_bytes_be(x: &[u8], field: &ScalarField) -> Self {
        FieldElement(BigUint::from_bytes_be(x) % &field.q)
    }

    /// Returns true if the element is zero.
    pub fn is_zero(&self) -> bool {
        BigUint::is_zero(&self.0)
    }

    /// Returns true iff `0 <= self < q`.
    pub fn is_valid(&self, field: &ScalarField) -> bool {
        // The lower bound holds because the representation is unsigned.
        self.0 < field.q
    }
}

impl Zeroize for FieldElement {
    fn zeroize(&mut self) {
        // `BigUint` offers no in-place scrubbing; dropping the limbs is the
        // best available.
        self.0 = BigUint::zero();
    }
}

impl ScalarField {
    /// Constructs a new scalar field from a given order.
    ///
    /// Returns `None` if the order is not prime. The check is expensive, so a
    /// field should be constructed once and reused.
    pub fn new(order: BigUint, csprng: &mut Csprng) -> Option<Self> {
        let f = ScalarField { q: order };
        f.is_valid(csprng).then_some(f)
    }

    /// Constructs a new scalar field *assuming* the given order is prime.
    pub fn new_unchecked(order: BigUint) -> Self {
        ScalarField { q: order }
    }

    /// Validates that the field order is prime. Expensive.
    pub fn is_valid(&self, csprng: &mut Csprng) -> bool {
        is_prime(&self.q, csprng)
    }

    /// Returns one, the neutral element of multiplication, as a field element.
    pub fn one() -> FieldElement {
        FieldElement(BigUint::one())
    }

    /// Returns zero, the neutral element of addition, as a field element.
    pub fn zero() -> FieldElement {
        FieldElement(BigUint::zero())
    }

    /// Returns a uniform random integer in `[0, q)` as a field element.
    pub fn random_field_elem(&self, csprng: &mut Csprng) -> FieldElement {
        FieldElement(csprng.next_biguint_lt(&self.q))
    }

    /// Returns the order `q` of the field.
    pub fn order(&self) -> &BigUint {
        &self.q
    }
}

/// An element of the multiplicative group `Z_p^r` as defined by [`Group`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct GroupElement(#[serde(with = "crate::biguint_serde")] BigUint);

/// The order-`q` multiplicative subgroup of `Z_p^*`, where `p = 2q + 1` is a
/// safe prime and `g` generates the subgroup.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    /// Prime modulus `p`.
    #[serde(with = "crate::biguint_serde")]
    p: BigUint,

    /// Subgroup generator `g`.
    #[serde(with = "crate::biguint_serde")]
    g: BigUint,

    /// Subgroup order `q`.
    #[serde(with = "crate::biguint_serde")]
    q: BigUint,
}

impl GroupElement {
    /// Computes `(self * other) mod p`.
    pub fn mul(&self, other: &GroupElement, group: &Group) -> GroupElement {
        GroupElement((&self.0 * &other.0) % &group.p)
    }

    /// Computes the multiplicative inverse. Always `Some` for valid group
    /// elements.
    pub fn inv(&self, group: &Group) -> Option<Self> {
        mod_inverse(&self.0, &group.p).map(GroupElement)
    }

    /// Raises the element to a plain integer exponent, mod `p`.
    pub fn pow(&self, exponent: impl Into<BigUint>, group: &Group) -> GroupElement {
        GroupElement(self.0.modpow(&exponent.into(), &group.p))
    }

    /// Raises the element to a field-element exponent, mod `p`. This defines
    /// the action of `Z_q` over the group.
    pub fn exp(&self, exponent: &FieldElement, group: &Group) -> GroupElement {
        GroupElement(self.0.modpow(&exponent.0, &group.p))
    }

    /// Returns true iff `0 < self < p` and `self^q % p == 1`.
    pub fn is_valid(&self, group: &Group) -> bool {
        let in_range = !self.0.is_zero() && self.0 < group.p;
        in_range && self.0.modpow(&group.q, &group.p).is_one()
    }

    /// The numeric value of the group element.
    pub fn value(&self) -> &BigUint {
        &self.0
    }

    /// Renders the element as a decimal string.
    pub fn to_decimal(&self) -> String {
        self.0.to_str_radix(10)
    }

    /// Wraps an integer already known to be a valid group element.
    pub fn from_biguint_unchecked(u: BigUint) -> Self {
        GroupElement(u)
    }
}

impl Group {
    /// Constructs the group for safe prime `p` and generator `g`, validating
    /// both. Expensive; construct once and reuse.
    pub fn new(p: BigUint, g: BigUint, csprng: &mut Csprng) -> Option<Self> {
        let group = Self::new_unchecked(p, g);
        group.is_valid(csprng).then_some(group)
    }

    /// Constructs the group for safe prime `p` and generator `g` without any
    /// validation. The subgroup order is derived as `q = (p - 1) / 2`.
    pub fn new_unchecked(p: BigUint, g: BigUint) -> Self {
        let q: BigUint = (&p - 1_u8) >> 1;
        Group { p, g, q }
    }

    /// Validates the group. Expensive.
    ///
    /// The group is valid if `p` and `q` are prime with `p = 2q + 1`, and `g`
    /// is a generator of the order-`q` subgroup (`g != 1`, `g^q = 1 mod p`).
    pub fn is_valid(&self, csprng: &mut Csprng) -> bool {
        let p_matches_q = self.p == ((&self.q << 1) | BigUint::one());
        if !p_matches_q {
            return false;
        }

        if self.g.is_one()
            || self.g >= self.p
            || self.g.is_zero()
            || !self.g.modpow(&self.q, &self.p).is_one()
        {
            return false;
        }

        // Expensive primality testing last.
        is_prime(&self.q, csprng) && is_prime(&self.p, csprng)
    }

    /// Returns a uniform random group element, `g^x % p` for uniform
    /// `x` in `[0, q)`.
    pub fn random_group_elem(&self, csprng: &mut Csprng) -> GroupElement {
        let exponent = FieldElement(csprng.next_biguint_lt(&self.q));
        self.g_exp(&exponent)
    }

    /// Returns generator `g` raised to the power of `x`, mod `p`.
    pub fn g_exp(&self, x: &FieldElement) -> GroupElement {
        GroupElement(self.g.modpow(&x.0, &self.p))
    }

    /// Returns one, the neutral element, as a group element.
    pub fn one() -> GroupElement {
        GroupElement(BigUint::one())
    }

    /// Returns a reference to the order of the group.
    pub fn order(&self) -> &BigUint {
        &self.q
    }

    /// Returns a reference to the modulus of the group.
    pub fn modulus(&self) -> &BigUint {
        &self.p
    }

    /// Returns a generator of the group.
    pub fn generator(&self) -> GroupElement {
        GroupElement(self.g.clone())
    }

    /// Returns whether the group and the given field have the same order.
    pub fn matches_field(&self, field: &ScalarField) -> bool {
        self.q == field.q
    }
}
