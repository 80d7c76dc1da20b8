// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! Non-interactive disjunctive Chaum-Pedersen proofs.
//!
//! A [`BallotProof`] accompanies one ciphertext `(a, b)` and proves that it
//! encrypts `g^0` or `g^1` without revealing which: the prover answers the
//! real branch honestly and simulates the other with a self-chosen
//! sub-challenge, and the Fiat-Shamir identity `c0 + c1 = H(...) mod q` binds
//! the two sub-challenges so at most one branch can be simulated.
//!
//! The challenge hash is SHA-256 over the decimal renderings of
//! `y, a, b, a0, b0, a1, b1`, reduced mod `q`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use util::{
    algebra::{FieldElement, GroupElement, ScalarField},
    csprng::Csprng,
};

use crate::{ciphertext::Ciphertext, elgamal::PublicKey};

/// Reasons a [`BallotProof`] fails verification. The whole vote carrying the
/// proof is rejected in every case.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum ProofError {
    /// A ciphertext component is not a valid group element.
    #[error("ciphertext component outside the group")]
    MalformedCiphertext,

    /// A commitment is not a valid group element, or a challenge/response is
    /// not a valid field element.
    #[error("proof component out of range")]
    MalformedProof,

    /// One of the four commitment equations does not hold.
    #[error("commitment equation failed on branch {branch}")]
    CommitmentEquation { branch: u8 },

    /// The commitment equations hold but the sub-challenges do not add up to
    /// the hash of the transcript. Such proofs come from legacy artifacts or
    /// forgers and must be flagged, never accepted.
    #[error("challenge identity failed (commitment equations held)")]
    ChallengeIdentity,

    /// Post-tally check: the options of one ballot sum to an encryption
    /// outside `{0, 1}`, i.e. more than one selection.
    #[error("ballot {index} sums to more than one selection")]
    BallotSum { index: usize },
}

/// Proof that a ciphertext encrypts `g^0` or `g^1`.
///
/// Branch 0 attests `b = y^k`, branch 1 attests `b = y^k * g`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BallotProof {
    pub a0: GroupElement,
    pub a1: GroupElement,
    pub b0: GroupElement,
    pub b1: GroupElement,
    pub c0: FieldElement,
    pub c1: FieldElement,
    pub r0: FieldElement,
    pub r1: FieldElement,
}

/// `-x mod q`.
fn neg(x: &FieldElement, field: &ScalarField) -> FieldElement {
    ScalarField::zero().sub(x, field)
}

/// The Fiat-Shamir challenge `H(y, a, b, a0, b0, a1, b1) mod q`.
fn challenge(
    pk: &PublicKey,
    ct: &Ciphertext,
    a0: &GroupElement,
    b0: &GroupElement,
    a1: &GroupElement,
    b1: &GroupElement,
) -> FieldElement {
    let mut hasher = Sha256::new();
    for component in [pk.y(), &ct.alpha, &ct.beta, a0, b0, a1, b1] {
        hasher.update(component.to_decimal().as_bytes());
    }
    let digest = hasher.finalize();
    FieldElement::from_bytes_be(&digest, pk.domain().field())
}

impl BallotProof {
    /// Proves that `ct` encrypts `g^0` (`encrypts_one == false`) or `g^1`
    /// (`encrypts_one == true`).
    ///
    /// `nonce` must be the encryption nonce `k` of `ct`; the proof is
    /// worthless (and will not verify) otherwise.
    pub fn prove(
        pk: &PublicKey,
        ct: &Ciphertext,
        nonce: &FieldElement,
        encrypts_one: bool,
        csprng: &mut Csprng,
    ) -> BallotProof {
        let field = pk.domain().field();
        let group = pk.domain().group();

        // Honest commitment for the true branch.
        let w = field.random_field_elem(csprng);
        let commit_a = group.g_exp(&w);
        let commit_b = pk.y().exp(&w, group);

        // Simulated sub-challenge and response for the false branch.
        let sim_c = field.random_field_elem(csprng);
        let sim_r = field.random_field_elem(csprng);
        let neg_sim_c = neg(&sim_c, field);

        if encrypts_one {
            // Simulate branch 0: a0 = g^r0 * a^-c0, b0 = y^r0 * b^-c0.
            let a0 = group.g_exp(&sim_r).mul(&ct.alpha.exp(&neg_sim_c, group), group);
            let b0 = pk
                .y()
                .exp(&sim_r, group)
                .mul(&ct.beta.exp(&neg_sim_c, group), group);

            let c = challenge(pk, ct, &a0, &b0, &commit_a, &commit_b);
            let c1 = c.sub(&sim_c, field);
            let r1 = w.add(&c1.mul(nonce, field), field);

            BallotProof {
                a0,
                a1: commit_a,
                b0,
                b1: commit_b,
                c0: sim_c,
                c1,
                r0: sim_r,
                r1,
            }
        } else {
            // Simulate branch 1: a1 = g^r1 * a^-c1, b1 = y^r1 * (b/g)^-c1.
            let b_over_g = ct
                .beta
                .mul(&group.generator().exp(&neg(&ScalarField::one(), field), group), group);
            let a1 = group.g_exp(&sim_r).mul(&ct.alpha.exp(&neg_sim_c, group), group);
            let b1 = pk
                .y()
                .exp(&sim_r, group)
                .mul(&b_over_g.exp(&neg_sim_c, group), group);

            let c = challenge(pk, ct, &commit_a, &commit_b, &a1, &b1);
            let c0 = c.sub(&sim_c, field);
            let r0 = w.add(&c0.mul(nonce, field), field);

            BallotProof {
                a0: commit_a,
                a1,
                b0: commit_b,
                b1,
                c0,
                c1: sim_c,
                r0,
                r1: sim_r,
            }
        }
    }

    /// Verifies the proof against its ciphertext.
    ///
    /// All five checks must hold:
    /// 1. `g^r0 = a0 * a^c0`
    /// 2. `g^r1 = a1 * a^c1`
    /// 3. `y^r0 = b0 * b^c0`
    /// 4. `y^r1 = b1 * (b * g^-1)^c1`
    /// 5. `(c0 + c1) mod q = H(y, a, b, a0, b0, a1, b1) mod q`
    pub fn verify(&self, pk: &PublicKey, ct: &Ciphertext) -> Result<(), ProofError> {
        let field = pk.domain().field();
        let group = pk.domain().group();

        if !ct.is_valid(group) {
            return Err(ProofError::MalformedCiphertext);
        }
        let commitments_valid = [&self.a0, &self.a1, &self.b0, &self.b1]
            .into_iter()
            .all(|e| e.is_valid(group));
        let scalars_valid = [&self.c0, &self.c1, &self.r0, &self.r1]
            .into_iter()
            .all(|s| s.is_valid(field));
        if !commitments_valid || !scalars_valid {
            return Err(ProofError::MalformedProof);
        }

        // (1) g^r0 = a0 * a^c0
        let lhs = group.g_exp(&self.r0);
        let rhs = self.a0.mul(&ct.alpha.exp(&self.c0, group), group);
        if lhs != rhs {
            return Err(ProofError::CommitmentEquation { branch: 0 });
        }

        // (2) g^r1 = a1 * a^c1
        let lhs = group.g_exp(&self.r1);
        let rhs = self.a1.mul(&ct.alpha.exp(&self.c1, group), group);
        if lhs != rhs {
            return Err(ProofError::CommitmentEquation { branch: 1 });
        }

        // (3) y^r0 = b0 * b^c0
        let lhs = pk.y().exp(&self.r0, group);
        let rhs = self.b0.mul(&ct.beta.exp(&self.c0, group), group);
        if lhs != rhs {
            return Err(ProofError::CommitmentEquation { branch: 0 });
        }

        // (4) y^r1 = b1 * (b * g^-1)^c1
        let b_over_g = ct
            .beta
            .mul(&group.generator().exp(&neg(&ScalarField::one(), field), group), group);
        let lhs = pk.y().exp(&self.r1, group);
        let rhs = self.b1.mul(&b_over_g.exp(&self.c1, group), group);
        if lhs != rhs {
            return Err(ProofError::CommitmentEquation { branch: 1 });
        }

        // (5) the binding step: c0 + c1 must equal the transcript hash.
        let c = challenge(pk, ct, &self.a0, &self.b0, &self.a1, &self.b1);
        if self.c0.add(&self.c1, field) != c {
            return Err(ProofError::ChallengeIdentity);
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test {
    use super::*;
    use crate::elgamal::SecretKey;
    use std::num::NonZeroUsize;

    fn test_csprng(label: &[u8]) -> Csprng {
        Csprng::build().write_bytes(label).finish()
    }

    fn small_key(csprng: &mut Csprng) -> SecretKey {
        SecretKey::generate(NonZeroUsize::new(48).unwrap(), csprng)
    }

    #[test]
    fn honest_proofs_verify_for_both_values() {
        let mut csprng = test_csprng(b"dcp honest");
        let sk = small_key(&mut csprng);
        let pk = sk.public_key();

        for encrypts_one in [false, true] {
            let nonce = pk.random_nonce(&mut csprng);
            let ct = pk.encrypt_value(u64::from(encrypts_one), &nonce);
            let proof = BallotProof::prove(pk, &ct, &nonce, encrypts_one, &mut csprng);
            assert_eq!(proof.verify(pk, &ct), Ok(()));
        }
    }

    #[test]
    fn proof_for_out_of_range_value_fails() {
        let mut csprng = test_csprng(b"dcp soundness");
        let sk = small_key(&mut csprng);
        let pk = sk.public_key();

        // An encryption of 2 cannot be proven in {0, 1} by the honest prover,
        // whichever branch it claims.
        let nonce = pk.random_nonce(&mut csprng);
        let ct = pk.encrypt_value(2, &nonce);
        for claim in [false, true] {
            let proof = BallotProof::prove(pk, &ct, &nonce, claim, &mut csprng);
            assert!(proof.verify(pk, &ct).is_err());
        }
    }

    #[test]
    fn proof_is_bound_to_its_ciphertext() {
        let mut csprng = test_csprng(b"dcp binding");
        let sk = small_key(&mut csprng);
        let pk = sk.public_key();

        let nonce = pk.random_nonce(&mut csprng);
        let ct = pk.encrypt_value(1, &nonce);
        let proof = BallotProof::prove(pk, &ct, &nonce, true, &mut csprng);

        let other_nonce = pk.random_nonce(&mut csprng);
        let other_ct = pk.encrypt_value(1, &other_nonce);
        assert!(proof.verify(pk, &other_ct).is_err());
    }

    #[test]
    fn wrong_nonce_makes_the_proof_worthless() {
        let mut csprng = test_csprng(b"dcp nonce");
        let sk = small_key(&mut csprng);
        let pk = sk.public_key();

        let nonce = pk.random_nonce(&mut csprng);
        let wrong_nonce = pk.random_nonce(&mut csprng);
        let ct = pk.encrypt_value(0, &nonce);
        let proof = BallotProof::prove(pk, &ct, &wrong_nonce, false, &mut csprng);
        assert!(proof.verify(pk, &ct).is_err());
    }

    /// Simulating *both* branches satisfies the commitment equations by
    /// construction for any ciphertext; only check (5) stops it.
    fn forge_both_branches(pk: &PublicKey, ct: &Ciphertext, csprng: &mut Csprng) -> BallotProof {
        let field = pk.domain().field();
        let group = pk.domain().group();

        let (c0, r0) = (field.random_field_elem(csprng), field.random_field_elem(csprng));
        let (c1, r1) = (field.random_field_elem(csprng), field.random_field_elem(csprng));

        let a0 = group.g_exp(&r0).mul(&ct.alpha.exp(&neg(&c0, field), group), group);
        let b0 = pk
            .y()
            .exp(&r0, group)
            .mul(&ct.beta.exp(&neg(&c0, field), group), group);

        let b_over_g = ct
            .beta
            .mul(&group.generator().exp(&neg(&ScalarField::one(), field), group), group);
        let a1 = group.g_exp(&r1).mul(&ct.alpha.exp(&neg(&c1, field), group), group);
        let b1 = pk
            .y()
            .exp(&r1, group)
            .mul(&b_over_g.exp(&neg(&c1, field), group), group);

        BallotProof { a0, a1, b0, b1, c0, c1, r0, r1 }
    }

    #[test]
    fn forged_double_simulation_fails_exactly_the_challenge_identity() {
        let mut csprng = test_csprng(b"dcp forgery");
        let sk = small_key(&mut csprng);
        let pk = sk.public_key();

        // The forged ciphertext encrypts 5, far outside {0, 1}.
        let nonce = pk.random_nonce(&mut csprng);
        let ct = pk.encrypt_value(5, &nonce);
        let forged = forge_both_branches(pk, &ct, &mut csprng);

        assert_eq!(forged.verify(pk, &ct), Err(ProofError::ChallengeIdentity));
    }

    #[test]
    fn tampered_components_are_rejected() {
        let mut csprng = test_csprng(b"dcp tamper");
        let sk = small_key(&mut csprng);
        let pk = sk.public_key();
        let field = pk.domain().field();

        let nonce = pk.random_nonce(&mut csprng);
        let ct = pk.encrypt_value(1, &nonce);
        let proof = BallotProof::prove(pk, &ct, &nonce, true, &mut csprng);

        let mut tampered = proof.clone();
        tampered.r0 = tampered.r0.add(&ScalarField::one(), field);
        assert!(tampered.verify(pk, &ct).is_err());

        let mut tampered = proof.clone();
        tampered.c1 = tampered.c1.add(&ScalarField::one(), field);
        assert!(tampered.verify(pk, &ct).is_err());

        // An unreduced scalar (equal to q) must be caught by the range check.
        let mut tampered = proof;
        tampered.c0 =
            serde_json::from_str(&format!("\"{}\"", pk.domain().field().order())).unwrap();
        assert_eq!(tampered.verify(pk, &ct), Err(ProofError::MalformedProof));
    }

    #[test]
    fn proof_serde_round_trip() {
        let mut csprng = test_csprng(b"dcp serde");
        let sk = small_key(&mut csprng);
        let pk = sk.public_key();

        let nonce = pk.random_nonce(&mut csprng);
        let ct = pk.encrypt_value(0, &nonce);
        let proof = BallotProof::prove(pk, &ct, &nonce, false, &mut csprng);

        let json = serde_json::to_string(&proof).unwrap();
        let back: BallotProof = serde_json::from_str(&json).unwrap();
        assert_eq!(back, proof);
        assert_eq!(back.verify(pk, &ct), Ok(()));
    }
}
