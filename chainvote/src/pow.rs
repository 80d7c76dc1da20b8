// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! Proof-of-work over block hashes.
//!
//! A proof is a 128-bit value. It is valid relative to the previous block
//! when the lowercase-hex SHA-256 of the concatenation
//! `decimal(prev_proof) || prev_hash || decimal(proof)` starts with
//! `difficulty` ASCII zeros. Miners pick a random starting point and scan
//! linearly.

use util::csprng::Csprng;

use crate::hash::sha256_hex;

/// Difficulties outside this range are either no work at all or unusable.
pub const DIFFICULTY_RANGE: std::ops::RangeInclusive<u32> = 1..=6;

/// Returns whether `proof` is a valid proof-of-work on top of the block with
/// the given proof and hash.
pub fn proof_is_valid(prev_proof: u128, prev_hash: &str, proof: u128, difficulty: u32) -> bool {
    let guess = sha256_hex(format!("{prev_proof}{prev_hash}{proof}"));
    guess.bytes().take(difficulty as usize).all(|b| b == b'0')
}

/// Finds a valid proof by linear scan from a random 128-bit starting point.
///
/// Expected work is `16^difficulty` hashes.
pub fn find_proof(prev_proof: u128, prev_hash: &str, difficulty: u32, csprng: &mut Csprng) -> u128 {
    let mut proof = csprng.next_u128();
    while !proof_is_valid(prev_proof, prev_hash, proof, difficulty) {
        proof = proof.wrapping_add(1);
    }
    proof
}
