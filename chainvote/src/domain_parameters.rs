// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! The shared domain parameters `(p, g, q)`.
//!
//! `p` is a safe prime, `g` generates the order-`q` subgroup of `Z_p^*` with
//! `q = (p - 1) / 2`. Both the ElGamal cryptosystem and the ballot proofs
//! operate over these parameters.

use std::num::NonZeroUsize;

use num_bigint::BigUint;
use num_traits::One;

use util::{
    algebra::{Group, ScalarField},
    csprng::Csprng,
    prime::generate_safe_prime,
};

use crate::errors::{CoreError, CoreResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainParameters {
    /// Prime field `Z_q` of exponents.
    field: ScalarField,

    /// Group `Z_p^r` of the same order as `Z_q`, including generator `g`.
    group: Group,
}

impl DomainParameters {
    /// Generates fresh parameters with a safe prime `p` of exactly `bits`
    /// bits.
    ///
    /// The generator is obtained by squaring a random element of `Z_p^*`,
    /// which lands in the order-`q` subgroup. This is a key-ceremony
    /// operation; at key-strength sizes it takes minutes.
    pub fn generate(bits: NonZeroUsize, csprng: &mut Csprng) -> Self {
        let (p, q) = generate_safe_prime(bits, csprng);

        let two = BigUint::from(2_u8);
        let g = loop {
            let h = csprng.next_biguint_range(&two, &(&p - 1_u8));
            let g = h.modpow(&two, &p);
            if !g.is_one() {
                break g;
            }
        };

        DomainParameters {
            field: ScalarField::new_unchecked(q),
            group: Group::new_unchecked(p, g),
        }
    }

    /// Rebuilds parameters from a modulus and generator, deriving
    /// `q = (p - 1) / 2`, without validating.
    ///
    /// Use [`DomainParameters::validate`] when `p` and `g` come from an
    /// untrusted chain.
    pub fn from_modulus_and_generator(p: BigUint, g: BigUint) -> Self {
        let group = Group::new_unchecked(p, g);
        let field = ScalarField::new_unchecked(group.order().clone());
        DomainParameters { field, group }
    }

    /// Verifies that the parameters form a valid safe-prime group. Expensive.
    pub fn validate(&self, csprng: &mut Csprng) -> CoreResult<()> {
        if !self.group.is_valid(csprng) {
            return Err(CoreError::InvalidInput(
                "domain parameters do not describe a safe-prime group".into(),
            ));
        }
        if !self.group.matches_field(&self.field) {
            return Err(CoreError::InvalidInput(
                "group order does not match the scalar field".into(),
            ));
        }
        Ok(())
    }

    pub fn field(&self) -> &ScalarField {
        &self.field
    }

    pub fn group(&self) -> &Group {
        &self.group
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test {
    use super::*;

    fn test_csprng(label: &[u8]) -> Csprng {
        Csprng::build().write_bytes(label).finish()
    }

    #[test]
    fn generated_parameters_validate() {
        let mut csprng = test_csprng(b"domain generation");
        let params = DomainParameters::generate(NonZeroUsize::new(48).unwrap(), &mut csprng);
        assert!(params.validate(&mut csprng).is_ok());
        assert_eq!(params.group().modulus().bits(), 48);
        // The generator is in the subgroup.
        assert!(params.group().generator().is_valid(params.group()));
    }

    #[test]
    fn derived_parameters_match_generated_ones() {
        let mut csprng = test_csprng(b"domain round trip");
        let params = DomainParameters::generate(NonZeroUsize::new(32).unwrap(), &mut csprng);
        let rebuilt = DomainParameters::from_modulus_and_generator(
            params.group().modulus().clone(),
            params.group().generator().value().clone(),
        );
        assert_eq!(rebuilt, params);
    }

    #[test]
    fn non_safe_prime_is_rejected() {
        let mut csprng = test_csprng(b"domain rejection");
        let params = DomainParameters::from_modulus_and_generator(
            BigUint::from(13_u8),
            BigUint::from(3_u8),
        );
        assert!(matches!(
            params.validate(&mut csprng),
            Err(CoreError::InvalidInput(_))
        ));
    }
}
