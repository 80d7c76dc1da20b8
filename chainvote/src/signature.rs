// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! Voter-eligibility signatures.
//!
//! A voter's credential is an ECDSA key pair; the election's voter list holds
//! the hex-encoded compressed public keys. The eligibility signature carried
//! by a vote is the voter's signature over their *own* encoded public key
//! (their "address"), so verification is a scan of the voter list: the vote
//! is eligible iff some listed key verifies the signature over its own
//! encoding.
//!
//! The core only depends on the [`EligibilityVerifier`] seam; the secp256k1
//! implementation below is one choice of curve and format, not a contract.

use k256::ecdsa::{
    Signature, SigningKey, VerifyingKey,
    signature::{Signer, Verifier},
};
use k256::elliptic_curve::sec1::ToEncodedPoint;

use util::csprng::Csprng;

/// Serde helper encoding `Vec<u8>` as lowercase hex,
/// e.g. `#[serde(with = "chainvote::signature::hex_bytes")]`.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        faster_hex::hex_string(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        let s = String::deserialize(deserializer)?;
        let mut bytes = vec![0_u8; s.len() / 2];
        faster_hex::hex_decode(s.as_bytes(), &mut bytes)
            .map_err(|e| D::Error::custom(format!("not a hex string: {e}")))?;
        Ok(bytes)
    }
}

/// A voter's signing credential.
pub struct VoterKey(SigningKey);

impl VoterKey {
    /// Generates a fresh credential from the given randomness source.
    pub fn generate(csprng: &mut Csprng) -> VoterKey {
        loop {
            let mut bytes = [0_u8; 32];
            csprng.fill_bytes(&mut bytes);
            // Rejected only for 0 or >= the curve order, i.e. almost never.
            if let Ok(key) = SigningKey::from_slice(&bytes) {
                return VoterKey(key);
            }
        }
    }

    /// Restores a credential from its 32-byte secret scalar.
    pub fn from_secret_bytes(bytes: &[u8]) -> Option<VoterKey> {
        SigningKey::from_slice(bytes).ok().map(VoterKey)
    }

    /// The secret scalar, for key-file persistence.
    pub fn secret_bytes(&self) -> Vec<u8> {
        self.0.to_bytes().to_vec()
    }

    /// The compressed SEC1 encoding of the public key, lowercase hex. This is
    /// the form that appears in voter lists.
    pub fn public_key_hex(&self) -> String {
        let point = self.0.verifying_key().to_encoded_point(true);
        faster_hex::hex_string(point.as_bytes())
    }

    /// Signs an arbitrary message, returning the DER-encoded signature.
    pub fn sign(&self, msg: &[u8]) -> Vec<u8> {
        let signature: Signature = self.0.sign(msg);
        signature.to_der().as_bytes().to_vec()
    }

    /// The voter's eligibility signature: a signature over the voter's own
    /// encoded public key.
    pub fn address(&self) -> Vec<u8> {
        let point = self.0.verifying_key().to_encoded_point(true);
        self.sign(point.as_bytes())
    }
}

/// Verifies a DER signature by the hex-encoded public key over `msg`.
pub fn verify_signature(public_key_hex: &str, msg: &[u8], signature_der: &[u8]) -> bool {
    let mut key_bytes = vec![0_u8; public_key_hex.len() / 2];
    if faster_hex::hex_decode(public_key_hex.as_bytes(), &mut key_bytes).is_err() {
        return false;
    }
    let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(&key_bytes) else {
        return false;
    };
    let Ok(signature) = Signature::from_der(signature_der) else {
        return false;
    };
    verifying_key.verify(msg, &signature).is_ok()
}

/// The seam through which the core checks vote eligibility. Implementations
/// choose the curve and signature format.
pub trait EligibilityVerifier {
    /// Returns whether `signature` proves membership in `voter_list`.
    fn is_eligible(&self, signature: &[u8], voter_list: &[String]) -> bool;
}

/// The default [`EligibilityVerifier`]: address-style ECDSA over secp256k1.
#[derive(Clone, Copy, Debug, Default)]
pub struct EcdsaEligibility;

impl EligibilityVerifier for EcdsaEligibility {
    fn is_eligible(&self, signature: &[u8], voter_list: &[String]) -> bool {
        voter_list.iter().any(|key_hex| {
            let mut key_bytes = vec![0_u8; key_hex.len() / 2];
            if faster_hex::hex_decode(key_hex.as_bytes(), &mut key_bytes).is_err() {
                return false;
            }
            verify_signature(key_hex, &key_bytes, signature)
        })
    }
}

/// An [`EligibilityVerifier`] that accepts everything. Strictly for tests and
/// closed demos.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAllEligibility;

impl EligibilityVerifier for AcceptAllEligibility {
    fn is_eligible(&self, _signature: &[u8], _voter_list: &[String]) -> bool {
        true
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
    fn sign_verify_round_trip() {
        let mut csprng = test_csprng(b"signature round trip");
        let key = VoterKey::generate(&mut csprng);
        let msg = b"tally me";
        let sig = key.sign(msg);
        assert!(verify_signature(&key.public_key_hex(), msg, &sig));
        assert!(!verify_signature(&key.public_key_hex(), b"tally you", &sig));
    }

    #[test]
    fn address_is_eligible_against_listed_key() {
        let mut csprng = test_csprng(b"signature address");
        let voter = VoterKey::generate(&mut csprng);
        let bystander = VoterKey::generate(&mut csprng);

        let voter_list = vec![bystander.public_key_hex(), voter.public_key_hex()];
        let verifier = EcdsaEligibility;

        assert!(verifier.is_eligible(&voter.address(), &voter_list));

        let outsider = VoterKey::generate(&mut csprng);
        assert!(!verifier.is_eligible(&outsider.address(), &voter_list));
    }

    #[test]
    fn garbage_inputs_do_not_verify() {
        let mut csprng = test_csprng(b"signature garbage");
        let key = VoterKey::generate(&mut csprng);
        assert!(!verify_signature("zz-not-hex", b"m", &key.sign(b"m")));
        assert!(!verify_signature(&key.public_key_hex(), b"m", b"not-der"));
        assert!(!EcdsaEligibility.is_eligible(b"not-der", &[key.public_key_hex()]));
        assert!(!EcdsaEligibility.is_eligible(&key.address(), &[]));
    }

    #[test]
    fn secret_bytes_round_trip() {
        let mut csprng = test_csprng(b"signature secret bytes");
        let key = VoterKey::generate(&mut csprng);
        let restored = VoterKey::from_secret_bytes(&key.secret_bytes()).unwrap();
        assert_eq!(restored.public_key_hex(), key.public_key_hex());
    }
}
