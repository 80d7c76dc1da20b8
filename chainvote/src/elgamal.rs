// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! Exponential-ElGamal key generation, encryption and decryption.
//!
//! Ballot values are encoded in the exponent: an encryption of `v` is
//! `(g^k, y^k * g^v) mod p`. This keeps the scheme additively homomorphic
//! under componentwise multiplication; decryption recovers `g^v`, and a
//! lookup table inverts the final discrete log (see [`crate::tally`]).
//!
//! Public keys serialize to the wire form `{p, g, y}` with decimal-string
//! integers; the secret exponent `x` never travels with a chain.

use std::num::NonZeroUsize;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use num_traits::Zero;
use util::{
    algebra::{FieldElement, GroupElement, ScalarField},
    csprng::Csprng,
};

use crate::{ciphertext::Ciphertext, domain_parameters::DomainParameters};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    domain: DomainParameters,

    /// `y = g^x mod p`.
    y: GroupElement,
}

/// Wire form of a public key. Never carries the secret exponent.
#[derive(Serialize, Deserialize)]
struct PublicKeyWire {
    #[serde(with = "util::biguint_serde")]
    p: BigUint,
    #[serde(with = "util::biguint_serde")]
    g: BigUint,
    #[serde(with = "util::biguint_serde")]
    y: BigUint,
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        PublicKeyWire {
            p: self.domain.group().modulus().clone(),
            g: self.domain.group().generator().value().clone(),
            y: self.y.value().clone(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        let wire = PublicKeyWire::deserialize(deserializer)?;
        if wire.y.is_zero() || wire.y >= wire.p {
            return Err(D::Error::custom("public key y out of range"));
        }
        let domain = DomainParameters::from_modulus_and_generator(wire.p, wire.g);
        Ok(PublicKey {
            domain,
            y: GroupElement::from_biguint_unchecked(wire.y),
        })
    }
}

impl PublicKey {
    pub fn new(domain: DomainParameters, y: GroupElement) -> Self {
        PublicKey { domain, y }
    }

    pub fn domain(&self) -> &DomainParameters {
        &self.domain
    }

    /// Access to the group element `y`.
    pub fn y(&self) -> &GroupElement {
        &self.y
    }

    /// Draws a fresh encryption nonce uniformly from `[0, q)`.
    pub fn random_nonce(&self, csprng: &mut Csprng) -> FieldElement {
        self.domain.field().random_field_elem(csprng)
    }

    /// Encrypts the exponent-encoded value `v` with the given nonce:
    /// `(g^k, y^k * g^v) mod p`.
    pub fn encrypt_value(&self, v: u64, nonce: &FieldElement) -> Ciphertext {
        let group = self.domain.group();
        let m = group.generator().pow(v, group);
        self.encrypt_element(&m, nonce)
    }

    /// Encrypts an arbitrary group element `m`: `(g^k, y^k * m) mod p`.
    pub fn encrypt_element(&self, m: &GroupElement, nonce: &FieldElement) -> Ciphertext {
        let group = self.domain.group();
        Ciphertext {
            alpha: group.g_exp(nonce),
            beta: self.y.exp(nonce, group).mul(m, group),
        }
    }
}

pub struct SecretKey {
    public: PublicKey,

    /// Secret exponent, `0 < x < q`.
    x: FieldElement,
}

impl SecretKey {
    /// Generates a key pair over freshly generated domain parameters with a
    /// safe prime of `bits` bits.
    pub fn generate(bits: NonZeroUsize, csprng: &mut Csprng) -> Self {
        let domain = DomainParameters::generate(bits, csprng);
        Self::generate_for_domain(domain, csprng)
    }

    /// Generates a key pair over existing domain parameters.
    pub fn generate_for_domain(domain: DomainParameters, csprng: &mut Csprng) -> Self {
        let x = loop {
            let x = domain.field().random_field_elem(csprng);
            if !x.is_zero() {
                break x;
            }
        };
        Self::from_exponent(domain, x)
    }

    /// Builds the key pair determined by the secret exponent `x`.
    pub fn from_exponent(domain: DomainParameters, x: FieldElement) -> Self {
        let y = domain.group().g_exp(&x);
        SecretKey {
            public: PublicKey::new(domain, y),
            x,
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Access to the secret exponent.
    pub fn x(&self) -> &FieldElement {
        &self.x
    }

    /// Decrypts a ciphertext: `beta * alpha^(-x) mod p`.
    ///
    /// For exponent-encoded plaintexts the result is `g^v`, not `v`.
    pub fn decrypt(&self, ct: &Ciphertext) -> GroupElement {
        let group = self.public.domain.group();
        // alpha has order q, so alpha^(-x) = alpha^(q - x).
        let neg_x = ScalarField::zero().sub(&self.x, self.public.domain.field());
        ct.beta.mul(&ct.alpha.exp(&neg_x, group), group)
    }
}

impl Zeroize for SecretKey {
    fn zeroize(&mut self) {
        self.x.zeroize();
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for SecretKey {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test {
    use super::*;

    fn test_csprng(label: &[u8]) -> Csprng {
        Csprng::build().write_bytes(label).finish()
    }

    fn small_key(csprng: &mut Csprng) -> SecretKey {
        SecretKey::generate(NonZeroUsize::new(48).unwrap(), csprng)
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let mut csprng = test_csprng(b"elgamal round trip");
        let sk = small_key(&mut csprng);
        let pk = sk.public_key();
        let group = pk.domain().group();

        for v in [0_u64, 1, 5, 1000] {
            let nonce = pk.random_nonce(&mut csprng);
            let ct = pk.encrypt_value(v, &nonce);
            assert!(ct.is_valid(group));
            assert_eq!(sk.decrypt(&ct), group.generator().pow(v, group));
        }
    }

    #[test]
    fn homomorphic_product_adds_exponents() {
        let mut csprng = test_csprng(b"elgamal homomorphism");
        let sk = small_key(&mut csprng);
        let pk = sk.public_key();
        let group = pk.domain().group();

        let values = [3_u64, 4, 0, 7];
        let product = values
            .iter()
            .map(|&v| {
                let nonce = pk.random_nonce(&mut csprng);
                pk.encrypt_value(v, &nonce)
            })
            .fold(Ciphertext::one(), |acc, ct| acc.mul(&ct, group));

        let total: u64 = values.iter().sum();
        assert_eq!(sk.decrypt(&product), group.generator().pow(total, group));
    }

    #[test]
    fn public_key_wire_form_round_trips_without_x() {
        let mut csprng = test_csprng(b"elgamal wire");
        let sk = small_key(&mut csprng);
        let pk = sk.public_key();

        let json = serde_json::to_string(pk).unwrap();
        assert!(json.contains("\"p\""));
        assert!(json.contains("\"g\""));
        assert!(json.contains("\"y\""));
        assert!(!json.contains("\"x\""));

        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(&back, pk);
    }

    #[test]
    fn public_key_deserialization_rejects_out_of_range_y() {
        let bad = r#"{"p":"23","g":"2","y":"0"}"#;
        assert!(serde_json::from_str::<PublicKey>(bad).is_err());
        let bad = r#"{"p":"23","g":"2","y":"24"}"#;
        assert!(serde_json::from_str::<PublicKey>(bad).is_err());
    }
}
