// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! Encrypted ballots and signed votes.
//!
//! A ballot is one ciphertext per election option, exactly one of which
//! encrypts `g^1`, plus one disjunctive proof per ciphertext. Nothing ever
//! inspects the plaintexts directly; the one-hot invariant is enforced by the
//! proofs (per option) and by post-tally verification (across options).

use serde::{Deserialize, Serialize};

use util::csprng::Csprng;

use crate::{
    ballot_proof::BallotProof,
    ciphertext::Ciphertext,
    elgamal::PublicKey,
    errors::{CoreError, CoreResult},
    signature::EligibilityVerifier,
};

/// An encrypted ballot: the option ciphertexts and their proofs, not yet
/// signed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptedBallot {
    pub options: Vec<Ciphertext>,
    pub proofs: Vec<BallotProof>,
}

/// Encrypts a one-hot ballot choosing `choice` out of `option_count` options.
///
/// A fresh nonce is drawn per option, so the ciphertexts of one ballot are
/// mutually unlinkable.
pub fn encrypt_ballot(
    pk: &PublicKey,
    choice: usize,
    option_count: usize,
    csprng: &mut Csprng,
) -> CoreResult<EncryptedBallot> {
    if option_count == 0 {
        return Err(CoreError::InvalidInput("election has no options".into()));
    }
    if choice >= option_count {
        return Err(CoreError::InvalidInput(format!(
            "choice {choice} out of range for {option_count} options"
        )));
    }

    let mut options = Vec::with_capacity(option_count);
    let mut proofs = Vec::with_capacity(option_count);
    for j in 0..option_count {
        let encrypts_one = j == choice;
        let nonce = pk.random_nonce(csprng);
        let ct = pk.encrypt_value(u64::from(encrypts_one), &nonce);
        let proof = BallotProof::prove(pk, &ct, &nonce, encrypts_one, csprng);
        options.push(ct);
        proofs.push(proof);
    }

    Ok(EncryptedBallot { options, proofs })
}

/// A ballot bound to a voter: ciphertexts, proofs and the eligibility
/// signature. This is the transaction type of the ledger.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vote {
    pub options: Vec<Ciphertext>,
    pub proofs: Vec<BallotProof>,
    #[serde(with = "crate::signature::hex_bytes")]
    pub signature: Vec<u8>,
}

impl Vote {
    pub fn new(ballot: EncryptedBallot, signature: Vec<u8>) -> Self {
        Vote {
            options: ballot.options,
            proofs: ballot.proofs,
            signature,
        }
    }

    /// Validates the vote against an election: shape, every proof, and the
    /// eligibility signature.
    ///
    /// Rejections never mutate anything; a vote must pass here before it may
    /// touch a mempool.
    pub fn verify(
        &self,
        pk: &PublicKey,
        option_count: usize,
        voter_list: &[String],
        verifier: &dyn EligibilityVerifier,
    ) -> CoreResult<()> {
        if self.options.len() != option_count || self.proofs.len() != option_count {
            return Err(CoreError::InvalidInput(format!(
                "ballot shape {}x{} does not match {option_count} options",
                self.options.len(),
                self.proofs.len(),
            )));
        }

        for (ct, proof) in self.options.iter().zip(&self.proofs) {
            proof.verify(pk, ct)?;
        }

        if !verifier.is_eligible(&self.signature, voter_list) {
            return Err(CoreError::SignatureInvalid);
        }

        Ok(())
    }
}
