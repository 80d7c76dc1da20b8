// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! The election registry: one chain per election id.
//!
//! Elections live in the `active` map until their end time passes, after
//! which a sweep moves them to `finished`. Tallies are only served for
//! finished elections. Ids are 256 random bits; a collision at creation is
//! rejected rather than silently overwritten.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use util::csprng::Csprng;

use crate::{
    ballot::Vote,
    chain::{Chain, ElectionTemplate},
    errors::{CoreError, CoreResult},
    signature::EligibilityVerifier,
};

/// A 256-bit election identifier, rendered as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElectionId([u8; 32]);

impl ElectionId {
    pub fn random(csprng: &mut Csprng) -> Self {
        let mut bytes = [0_u8; 32];
        csprng.fill_bytes(&mut bytes);
        ElectionId(bytes)
    }

    pub fn from_hex(s: &str) -> CoreResult<Self> {
        let mut bytes = [0_u8; 32];
        if s.len() != 64 || faster_hex::hex_decode(s.as_bytes(), &mut bytes).is_err() {
            return Err(CoreError::InvalidInput(format!(
                "not a 256-bit hex election id: {s:?}"
            )));
        }
        Ok(ElectionId(bytes))
    }

    pub fn to_hex(self) -> String {
        faster_hex::hex_string(&self.0)
    }
}

impl fmt::Display for ElectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ElectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElectionId({})", self.to_hex())
    }
}

impl Serialize for ElectionId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_hex().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ElectionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        let s = String::deserialize(deserializer)?;
        ElectionId::from_hex(&s).map_err(|e| D::Error::custom(e.to_string()))
    }
}

/// Maps election ids to their chains, separated by lifecycle state.
pub struct ElectionRegistry {
    difficulty: u32,
    active: HashMap<ElectionId, Chain>,
    finished: HashMap<ElectionId, Chain>,
}

impl ElectionRegistry {
    pub fn new(difficulty: u32) -> Self {
        ElectionRegistry {
            difficulty,
            active: HashMap::new(),
            finished: HashMap::new(),
        }
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Opens a new election under a fresh random id.
    pub fn create_election(
        &mut self,
        template: ElectionTemplate,
        now: u64,
        csprng: &mut Csprng,
    ) -> CoreResult<ElectionId> {
        let id = ElectionId::random(csprng);
        self.insert_election(id, template, now, csprng)?;
        Ok(id)
    }

    /// Opens a new election under a caller-chosen id, rejecting collisions.
    pub fn insert_election(
        &mut self,
        id: ElectionId,
        template: ElectionTemplate,
        now: u64,
        csprng: &mut Csprng,
    ) -> CoreResult<()> {
        if self.active.contains_key(&id) || self.finished.contains_key(&id) {
            return Err(CoreError::InvalidInput(format!(
                "election id collision: {id}"
            )));
        }
        let chain = Chain::new(template, self.difficulty, now, csprng)?;
        info!(%id, name = chain.name(), "created election");
        self.active.insert(id, chain);
        Ok(())
    }

    /// Adopts an existing chain (e.g. received from a peer) under `id`.
    pub fn adopt_chain(&mut self, id: ElectionId, chain: Chain, now: u64) -> CoreResult<()> {
        if self.active.contains_key(&id) || self.finished.contains_key(&id) {
            return Err(CoreError::InvalidInput(format!(
                "election id collision: {id}"
            )));
        }
        chain.validate()?;
        if now > chain.end_time() {
            self.finished.insert(id, chain);
        } else {
            self.active.insert(id, chain);
        }
        Ok(())
    }

    /// The chain for `id`, whether active or finished.
    pub fn chain(&self, id: &ElectionId) -> Option<&Chain> {
        self.active.get(id).or_else(|| self.finished.get(id))
    }

    pub fn active_chain_mut(&mut self, id: &ElectionId) -> Option<&mut Chain> {
        self.active.get_mut(id)
    }

    pub fn active_ids(&self) -> Vec<ElectionId> {
        self.active.keys().copied().collect()
    }

    pub fn finished_ids(&self) -> Vec<ElectionId> {
        self.finished.keys().copied().collect()
    }

    pub fn is_finished(&self, id: &ElectionId) -> bool {
        self.finished.contains_key(id)
    }

    /// Validates a vote against its active election and appends it to the
    /// mempool, returning the vote ticket.
    pub fn submit_vote(
        &mut self,
        id: &ElectionId,
        vote: Vote,
        verifier: &dyn EligibilityVerifier,
        now: u64,
    ) -> CoreResult<u64> {
        if self.finished.contains_key(id) {
            return Err(CoreError::InvalidInput(format!(
                "election {id} has already finished"
            )));
        }
        let chain = self
            .active
            .get_mut(id)
            .ok_or_else(|| CoreError::NotFound(id.to_hex()))?;
        if now > chain.end_time() {
            return Err(CoreError::InvalidInput(format!(
                "election {id} has already finished"
            )));
        }
        chain.submit_vote(vote, verifier)
    }

    /// Reconciles the chain of `id` against competing chains.
    pub fn merge_chain(&mut self, id: &ElectionId, others: Vec<Chain>) -> CoreResult<bool> {
        let chain = self
            .active
            .get_mut(id)
            .or_else(|| self.finished.get_mut(id))
            .ok_or_else(|| CoreError::NotFound(id.to_hex()))?;
        chain.update_chain(others)
    }

    /// Moves every active chain whose end time has passed into the finished
    /// map. Returns the ids that moved.
    pub fn sweep_finished(&mut self, now: u64) -> Vec<ElectionId> {
        let expired: Vec<ElectionId> = self
            .active
            .iter()
            .filter(|(_, chain)| now > chain.end_time())
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            if let Some(chain) = self.active.remove(id) {
                info!(%id, name = chain.name(), "election finished");
                self.finished.insert(*id, chain);
            }
        }
        expired
    }

    /// The chain for `id`, only if the election is finished. Tallies must not
    /// be served while voting is open.
    pub fn finished_chain(&self, id: &ElectionId) -> CoreResult<&Chain> {
        if self.active.contains_key(id) {
            return Err(CoreError::InvalidInput(format!(
                "election {id} is still active"
            )));
        }
        self.finished
            .get(id)
            .ok_or_else(|| CoreError::NotFound(id.to_hex()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test {
    use super::*;
    use crate::ballot::encrypt_ballot;
    use crate::elgamal::SecretKey;
    use crate::signature::AcceptAllEligibility;
    use std::num::NonZeroUsize;

    const T0: u64 = 1_700_000_000;

    fn test_csprng(label: &[u8]) -> Csprng {
        Csprng::build().write_bytes(label).finish()
    }

    fn template(sk: &SecretKey, end_time: u64) -> ElectionTemplate {
        ElectionTemplate {
            name: "poll".into(),
            start_time: None,
            end_time,
            public_key: sk.public_key().clone(),
            voter_list: vec![],
            option_list: vec!["a".into(), "b".into()],
        }
    }

    #[test]
    fn election_ids_round_trip_as_hex() {
        let mut csprng = test_csprng(b"registry ids");
        let id = ElectionId::random(&mut csprng);
        let hex = id.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(ElectionId::from_hex(&hex).unwrap(), id);
        assert!(ElectionId::from_hex("abc").is_err());

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(serde_json::from_str::<ElectionId>(&json).unwrap(), id);
    }

    #[test]
    fn create_vote_and_finish() {
        let mut csprng = test_csprng(b"registry lifecycle");
        let sk = SecretKey::generate(NonZeroUsize::new(48).unwrap(), &mut csprng);
        let mut registry = ElectionRegistry::new(2);

        let id = registry
            .create_election(template(&sk, T0 + 100), T0, &mut csprng)
            .unwrap();
        assert_eq!(registry.active_ids(), vec![id]);

        let ballot = encrypt_ballot(sk.public_key(), 0, 2, &mut csprng).unwrap();
        let ticket = registry
            .submit_vote(&id, Vote::new(ballot, vec![]), &AcceptAllEligibility, T0 + 1)
            .unwrap();
        assert_eq!(ticket, 1);

        // Tally refused while active.
        assert!(matches!(
            registry.finished_chain(&id),
            Err(CoreError::InvalidInput(_))
        ));

        // Sweep past the end time.
        assert_eq!(registry.sweep_finished(T0 + 101), vec![id]);
        assert!(registry.is_finished(&id));
        assert!(registry.finished_chain(&id).is_ok());

        // No more votes after finishing.
        let ballot = encrypt_ballot(sk.public_key(), 1, 2, &mut csprng).unwrap();
        assert!(matches!(
            registry.submit_vote(&id, Vote::new(ballot, vec![]), &AcceptAllEligibility, T0 + 102),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let mut csprng = test_csprng(b"registry unknown");
        let mut registry = ElectionRegistry::new(2);
        let id = ElectionId::random(&mut csprng);

        let sk = SecretKey::generate(NonZeroUsize::new(48).unwrap(), &mut csprng);
        let ballot = encrypt_ballot(sk.public_key(), 0, 2, &mut csprng).unwrap();
        assert!(matches!(
            registry.submit_vote(&id, Vote::new(ballot, vec![]), &AcceptAllEligibility, T0),
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            registry.finished_chain(&id),
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            registry.merge_chain(&id, vec![]),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn id_collisions_are_rejected() {
        let mut csprng = test_csprng(b"registry collision");
        let sk = SecretKey::generate(NonZeroUsize::new(48).unwrap(), &mut csprng);
        let mut registry = ElectionRegistry::new(2);

        let id = registry
            .create_election(template(&sk, T0 + 100), T0, &mut csprng)
            .unwrap();
        assert!(matches!(
            registry.insert_election(id, template(&sk, T0 + 200), T0, &mut csprng),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn sweeping_twice_is_idempotent() {
        let mut csprng = test_csprng(b"registry sweep");
        let sk = SecretKey::generate(NonZeroUsize::new(48).unwrap(), &mut csprng);
        let mut registry = ElectionRegistry::new(2);
        let id = registry
            .create_election(template(&sk, T0 + 10), T0, &mut csprng)
            .unwrap();

        assert_eq!(registry.sweep_finished(T0 + 5), vec![]);
        assert_eq!(registry.sweep_finished(T0 + 11), vec![id]);
        assert_eq!(registry.sweep_finished(T0 + 12), vec![]);
    }
}
