// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! Homomorphic tallying.
//!
//! Per option position `j`, the ciphertexts of all accepted votes are
//! multiplied into one aggregate `(A_j, B_j)`, which decrypts to `g^{n_j}`
//! for the option count `n_j`. The final discrete log is inverted through a
//! precomputed [`DecryptionTable`] of powers of `g`, keyed by the public key
//! component `y` so elections sharing a key share the table.
//!
//! Decryption is either direct (the secret key is at hand) or threshold: at
//! least `t` Shamir shares reconstruct the secret exponent, which is then
//! checked against the election public key before use.

use std::collections::HashMap;

use num_bigint::BigUint;
use num_traits::One;

use util::algebra::{FieldElement, Group, GroupElement};

use crate::{
    ballot::Vote,
    ciphertext::Ciphertext,
    elgamal::{PublicKey, SecretKey},
    errors::{CoreError, CoreResult},
    shamir::{self, Share},
};

/// Aggregates the option ciphertexts of `votes` into one ciphertext per
/// option position.
///
/// Fails with `InvalidInput` if any vote does not have exactly
/// `option_count` options. An empty vote list aggregates to encryptions of
/// zero.
pub fn aggregate_votes<'a>(
    votes: impl IntoIterator<Item = &'a Vote>,
    option_count: usize,
    group: &Group,
) -> CoreResult<Vec<Ciphertext>> {
    let mut aggregates = vec![Ciphertext::one(); option_count];
    for vote in votes {
        if vote.options.len() != option_count {
            return Err(CoreError::InvalidInput(format!(
                "vote has {} options, election has {option_count}",
                vote.options.len()
            )));
        }
        for (aggregate, ct) in aggregates.iter_mut().zip(&vote.options) {
            *aggregate = aggregate.mul(ct, group);
        }
    }
    Ok(aggregates)
}

/// The precomputed powers `g^0 .. g^max_count mod p` used to invert the
/// discrete log after aggregate decryption.
#[derive(Clone, Debug)]
pub struct DecryptionTable {
    /// The `y` component of the public key the table belongs to.
    y: BigUint,
    powers: Vec<BigUint>,
    index: HashMap<BigUint, u64>,
}

impl DecryptionTable {
    /// Builds the table for `pk` covering counts `0..=max_count`.
    /// `max_count` must be at least the number of eligible voters.
    pub fn build(pk: &PublicKey, max_count: u64) -> Self {
        let group = pk.domain().group();
        let g = pk.domain().group().generator();

        let mut powers = Vec::with_capacity(max_count as usize + 1);
        let mut current = BigUint::one();
        for _ in 0..=max_count {
            powers.push(current.clone());
            current = (current * g.value()) % group.modulus();
        }

        Self::from_powers(pk.y().value().clone(), powers)
    }

    /// Rebuilds a table from persisted powers.
    pub fn from_powers(y: BigUint, powers: Vec<BigUint>) -> Self {
        let index = powers
            .iter()
            .enumerate()
            .map(|(i, p)| (p.clone(), i as u64))
            .collect();
        DecryptionTable { y, powers, index }
    }

    /// The `y` the table is keyed by.
    pub fn y(&self) -> &BigUint {
        &self.y
    }

    /// The raw powers, in exponent order, for persistence.
    pub fn powers(&self) -> &[BigUint] {
        &self.powers
    }

    /// The largest count the table can resolve.
    pub fn max_count(&self) -> u64 {
        self.powers.len().saturating_sub(1) as u64
    }

    pub fn matches_key(&self, pk: &PublicKey) -> bool {
        &self.y == pk.y().value()
    }

    /// Looks up the exponent of `element`, i.e. the count it represents.
    pub fn find(&self, element: &GroupElement) -> Option<u64> {
        self.index.get(element.value()).copied()
    }
}

/// Decrypts per-option aggregates into plaintext counts.
///
/// Fails with `BadParams` when the table belongs to a different key or an
/// aggregate decrypts outside the table range.
pub fn decrypt_tally(
    sk: &SecretKey,
    aggregates: &[Ciphertext],
    table: &DecryptionTable,
) -> CoreResult<Vec<u64>> {
    if !table.matches_key(sk.public_key()) {
        return Err(CoreError::BadParams(
            "decryption table belongs to a different key".into(),
        ));
    }

    aggregates
        .iter()
        .map(|aggregate| {
            let plaintext = sk.decrypt(aggregate);
            table.find(&plaintext).ok_or_else(|| {
                CoreError::BadParams(format!(
                    "aggregate decrypts beyond the table range 0..={}",
                    table.max_count()
                ))
            })
        })
        .collect()
}

/// Tallies `votes` with the secret key in hand.
pub fn tally_direct<'a>(
    sk: &SecretKey,
    votes: impl IntoIterator<Item = &'a Vote>,
    option_count: usize,
    table: &DecryptionTable,
) -> CoreResult<Vec<u64>> {
    let aggregates = aggregate_votes(votes, option_count, sk.public_key().domain().group())?;
    decrypt_tally(sk, &aggregates, table)
}

/// Reconstructs the secret key for `pk` from at least `t` Shamir shares.
///
/// The reconstructed exponent is verified against the public key: mismatched
/// or insufficient shares fail with `InvalidInput` instead of producing a
/// silently wrong tally.
pub fn reconstruct_secret_key(
    pk: &PublicKey,
    shares: &[Share],
    share_prime: &BigUint,
) -> CoreResult<SecretKey> {
    let x = shamir::recover_secret(shares, share_prime)?;
    if &x >= pk.domain().field().order() {
        return Err(CoreError::InvalidInput(
            "shares do not reconstruct the election key".into(),
        ));
    }

    let x = FieldElement::from(x, pk.domain().field());
    let sk = SecretKey::from_exponent(pk.domain().clone(), x);
    if sk.public_key().y() != pk.y() {
        return Err(CoreError::InvalidInput(
            "shares do not reconstruct the election key".into(),
        ));
    }
    Ok(sk)
}

/// Tallies `votes` by threshold decryption: reconstruct the key from shares,
/// then decrypt as usual.
pub fn tally_with_shares<'a>(
    pk: &PublicKey,
    shares: &[Share],
    share_prime: &BigUint,
    votes: impl IntoIterator<Item = &'a Vote>,
    option_count: usize,
    table: &DecryptionTable,
) -> CoreResult<Vec<u64>> {
    let sk = reconstruct_secret_key(pk, shares, share_prime)?;
    tally_direct(&sk, votes, option_count, table)
}

/// Post-tally ballot soundness: every accepted ballot's options must sum to
/// an encryption of 0 or 1.
///
/// Per-option proofs bound each plaintext to `{0, 1}`; this check rules out
/// ballots that select more than one option.
pub fn verify_ballot_sums<'a>(
    sk: &SecretKey,
    votes: impl IntoIterator<Item = &'a Vote>,
) -> CoreResult<()> {
    let group = sk.public_key().domain().group();
    let g = group.generator();

    for (i, vote) in votes.into_iter().enumerate() {
        let sum = vote
            .options
            .iter()
            .fold(Ciphertext::one(), |acc, ct| acc.mul(ct, group));
        let plaintext = sk.decrypt(&sum);
        if plaintext != Group::one() && plaintext != g {
            return Err(crate::ballot_proof::ProofError::BallotSum { index: i }.into());
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test {
    use super::*;
    use crate::ballot::encrypt_ballot;
    use crate::shamir::make_shares;
    use std::num::NonZeroUsize;
    use util::csprng::Csprng;

    fn test_csprng(label: &[u8]) -> Csprng {
        Csprng::build().write_bytes(label).finish()
    }

    fn small_key(csprng: &mut Csprng) -> SecretKey {
        SecretKey::generate(NonZeroUsize::new(48).unwrap(), csprng)
    }

    fn cast(pk: &PublicKey, choice: usize, csprng: &mut Csprng) -> Vote {
        let ballot = encrypt_ballot(pk, choice, 2, csprng).unwrap();
        Vote::new(ballot, vec![])
    }

    #[test]
    fn three_voters_two_options() {
        let mut csprng = test_csprng(b"tally three voters");
        let sk = small_key(&mut csprng);
        let pk = sk.public_key().clone();

        // Votes [1,0], [0,1], [1,0] -> counts [2, 1].
        let votes = vec![
            cast(&pk, 0, &mut csprng),
            cast(&pk, 1, &mut csprng),
            cast(&pk, 0, &mut csprng),
        ];

        let table = DecryptionTable::build(&pk, 10);
        let counts = tally_direct(&sk, &votes, 2, &table).unwrap();
        assert_eq!(counts, vec![2, 1]);

        // The aggregates themselves decrypt to g^2 and g^1.
        let group = pk.domain().group();
        let aggregates = aggregate_votes(&votes, 2, group).unwrap();
        assert_eq!(sk.decrypt(&aggregates[0]), group.generator().pow(2_u8, group));
        assert_eq!(sk.decrypt(&aggregates[1]), group.generator().pow(1_u8, group));
    }

    #[test]
    fn empty_election_tallies_to_zeros() {
        let mut csprng = test_csprng(b"tally empty");
        let sk = small_key(&mut csprng);
        let table = DecryptionTable::build(sk.public_key(), 4);
        let counts = tally_direct(&sk, &[], 3, &table).unwrap();
        assert_eq!(counts, vec![0, 0, 0]);
    }

    #[test]
    fn table_range_miss_is_bad_params() {
        let mut csprng = test_csprng(b"tally range");
        let sk = small_key(&mut csprng);
        let pk = sk.public_key().clone();

        let votes: Vec<Vote> = (0..4).map(|_| cast(&pk, 0, &mut csprng)).collect();
        // Table resolves only 0..=2 but option 0 has 4 votes.
        let table = DecryptionTable::build(&pk, 2);
        assert!(matches!(
            tally_direct(&sk, &votes, 2, &table),
            Err(CoreError::BadParams(_))
        ));
    }

    #[test]
    fn table_is_bound_to_its_key() {
        let mut csprng = test_csprng(b"tally wrong key");
        let sk = small_key(&mut csprng);
        let other = small_key(&mut csprng);
        let table = DecryptionTable::build(other.public_key(), 4);
        assert!(matches!(
            decrypt_tally(&sk, &[], &table),
            Err(CoreError::BadParams(_))
        ));
    }

    #[test]
    fn threshold_tally_matches_direct_tally() {
        let mut csprng = test_csprng(b"tally threshold");
        let sk = small_key(&mut csprng);
        let pk = sk.public_key().clone();

        let share_prime = shamir::mersenne_prime_exceeding(pk.domain().field().order()).unwrap();
        let shares = make_shares(sk.x().value(), 3, 5, &share_prime, &mut csprng).unwrap();

        let votes: Vec<Vote> = (0..6).map(|i| cast(&pk, i % 2, &mut csprng)).collect();
        let table = DecryptionTable::build(&pk, 10);

        // Any 3 of 5 shares tally correctly.
        let subset = &shares[1..4];
        let counts = tally_with_shares(&pk, subset, &share_prime, &votes, 2, &table).unwrap();
        assert_eq!(counts, vec![3, 3]);

        // 2 shares reconstruct garbage, which the key check catches.
        assert!(matches!(
            tally_with_shares(&pk, &shares[0..2], &share_prime, &votes, 2, &table),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn ballot_sum_check_flags_double_voting() {
        let mut csprng = test_csprng(b"tally sums");
        let sk = small_key(&mut csprng);
        let pk = sk.public_key().clone();

        let honest = cast(&pk, 1, &mut csprng);
        assert!(verify_ballot_sums(&sk, [&honest]).is_ok());

        // Two options both encrypt 1.
        let nonce_a = pk.random_nonce(&mut csprng);
        let nonce_b = pk.random_nonce(&mut csprng);
        let double = Vote {
            options: vec![
                pk.encrypt_value(1, &nonce_a),
                pk.encrypt_value(1, &nonce_b),
            ],
            proofs: vec![],
            signature: vec![],
        };
        assert!(verify_ballot_sums(&sk, [&double]).is_err());
    }

    #[test]
    fn table_round_trips_through_raw_powers() {
        let mut csprng = test_csprng(b"tally table persist");
        let sk = small_key(&mut csprng);
        let pk = sk.public_key();

        let table = DecryptionTable::build(pk, 8);
        let rebuilt =
            DecryptionTable::from_powers(table.y().clone(), table.powers().to_vec());
        assert_eq!(rebuilt.max_count(), 8);

        let group = pk.domain().group();
        for v in 0..=8_u64 {
            let elem = group.generator().pow(v, group);
            assert_eq!(rebuilt.find(&elem), Some(v));
        }
        assert_eq!(rebuilt.find(&group.generator().pow(9_u64, group)), None);
    }
}
