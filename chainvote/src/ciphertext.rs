// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! The ElGamal ciphertext pair and its homomorphic product.

use serde::{Deserialize, Serialize};
use util::algebra::{Group, GroupElement};

/// An ElGamal ciphertext `(alpha, beta) = (g^k, y^k * m) mod p`.
///
/// The ciphertext space is multiplicative: the pairwise product of two
/// ciphertexts encrypts the product of their plaintexts, which for
/// exponent-encoded messages `g^v` means the sum of the exponents.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ciphertext {
    pub alpha: GroupElement,
    pub beta: GroupElement,
}

impl Ciphertext {
    /// The multiplicative identity, an encryption of `g^0` with nonce `0`.
    pub fn one() -> Self {
        Ciphertext {
            alpha: Group::one(),
            beta: Group::one(),
        }
    }

    /// Homomorphic product: `(alpha1 * alpha2, beta1 * beta2) mod p`.
    pub fn mul(&self, other: &Ciphertext, group: &Group) -> Ciphertext {
        Ciphertext {
            alpha: self.alpha.mul(&other.alpha, group),
            beta: self.beta.mul(&other.beta, group),
        }
    }

    /// Returns whether both components are valid group elements.
    pub fn is_valid(&self, group: &Group) -> bool {
        self.alpha.is_valid(group) && self.beta.is_valid(group)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test {
    use super::*;
    use num_bigint::BigUint;
    use util::algebra::{FieldElement, ScalarField};

    #[test]
    fn identity_is_neutral() {
        let group = Group::new_unchecked(BigUint::from(23_u8), BigUint::from(2_u8));
        let field = ScalarField::new_unchecked(BigUint::from(11_u8));

        let ct = Ciphertext {
            alpha: group.g_exp(&FieldElement::from(3_u8, &field)),
            beta: group.g_exp(&FieldElement::from(7_u8, &field)),
        };
        assert_eq!(ct.mul(&Ciphertext::one(), &group), ct);
        assert_eq!(Ciphertext::one().mul(&ct, &group), ct);
    }

    #[test]
    fn product_multiplies_componentwise() {
        let group = Group::new_unchecked(BigUint::from(23_u8), BigUint::from(2_u8));
        let field = ScalarField::new_unchecked(BigUint::from(11_u8));
        let g = |e: u8| group.g_exp(&FieldElement::from(e, &field));

        let a = Ciphertext { alpha: g(2), beta: g(3) };
        let b = Ciphertext { alpha: g(4), beta: g(5) };
        let prod = a.mul(&b, &group);
        assert_eq!(prod.alpha, g(6));
        assert_eq!(prod.beta, g(8));
    }
}
