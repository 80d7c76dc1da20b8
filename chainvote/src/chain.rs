// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! The per-election blockchain.
//!
//! A [`Chain`] owns the durable block list and the non-persistent mempool of
//! pending votes. Votes are validated before they enter the mempool, sealed
//! into blocks by proof-of-work, and never reordered after append. Forks of
//! the same election reconcile to the longest valid chain, ties broken by
//! the lexicographically smallest tip hash.

use serde::{Deserialize, Serialize};
use tracing::debug;

use util::csprng::Csprng;

use crate::{
    ballot::Vote,
    block::{Block, DataBlock, GenesisBlock},
    elgamal::PublicKey,
    errors::{CoreError, CoreResult},
    pow,
    signature::EligibilityVerifier,
};

/// Leading-zero prefix length required of block proofs unless configured
/// otherwise.
pub const DEFAULT_DIFFICULTY: u32 = 3;

/// Current UNIX time in seconds.
pub fn unix_now() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The election definition an organizer submits to open an election.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ElectionTemplate {
    pub name: String,

    /// When voting opens; defaults to creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<u64>,

    /// When voting closes.
    pub end_time: u64,

    pub public_key: PublicKey,
    pub voter_list: Vec<String>,
    pub option_list: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct Chain {
    difficulty: u32,
    blocks: Vec<Block>,

    /// Mempool. Never persisted, drained atomically on seal.
    pending: Vec<Vote>,
}

impl Chain {
    /// Opens a new election chain by building its genesis block.
    pub fn new(
        template: ElectionTemplate,
        difficulty: u32,
        now: u64,
        csprng: &mut Csprng,
    ) -> CoreResult<Chain> {
        if template.option_list.is_empty() {
            return Err(CoreError::InvalidInput("election has no options".into()));
        }
        let start_time = template.start_time.unwrap_or(now);
        if template.end_time <= start_time {
            return Err(CoreError::InvalidInput(
                "election ends before it starts".into(),
            ));
        }

        let genesis = GenesisBlock {
            index: 0,
            proof: csprng.next_u128(),
            start_time,
            timestamp: now,
            end_time: template.end_time,
            public_key: template.public_key,
            voter_list: template.voter_list,
            option_list: template.option_list,
            name: template.name,
        };

        Ok(Chain {
            difficulty,
            blocks: vec![Block::Genesis(genesis)],
            pending: Vec::new(),
        })
    }

    /// Rebuilds a chain from persisted or received blocks, validating it.
    pub fn from_blocks(blocks: Vec<Block>, difficulty: u32) -> CoreResult<Chain> {
        let chain = Chain {
            difficulty,
            blocks,
            pending: Vec::new(),
        };
        chain.validate()?;
        Ok(chain)
    }

    pub fn genesis(&self) -> &GenesisBlock {
        // A Chain cannot be constructed without a genesis block.
        match &self.blocks[0] {
            Block::Genesis(g) => g,
            Block::Data(_) => unreachable!("chain constructed without genesis"),
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn pending(&self) -> &[Vote] {
        &self.pending
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.genesis().public_key
    }

    pub fn name(&self) -> &str {
        &self.genesis().name
    }

    pub fn option_list(&self) -> &[String] {
        &self.genesis().option_list
    }

    pub fn voter_list(&self) -> &[String] {
        &self.genesis().voter_list
    }

    pub fn end_time(&self) -> u64 {
        self.genesis().end_time
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        // A chain always has its genesis block.
        false
    }

    /// All sealed votes, in chain order.
    pub fn votes(&self) -> impl Iterator<Item = &Vote> {
        self.blocks
            .iter()
            .filter_map(Block::as_data)
            .flat_map(|b| b.transactions.iter())
    }

    pub fn genesis_hash(&self) -> CoreResult<String> {
        self.blocks[0].hash()
    }

    pub fn tip_hash(&self) -> CoreResult<String> {
        // Non-empty by construction.
        self.blocks[self.blocks.len() - 1].hash()
    }

    /// Validates a vote against this election and appends it to the mempool.
    ///
    /// Returns the index of the block the vote is expected to be sealed into
    /// (the vote "ticket"). Rejected votes never touch the mempool.
    pub fn submit_vote(
        &mut self,
        vote: Vote,
        verifier: &dyn EligibilityVerifier,
    ) -> CoreResult<u64> {
        let genesis = self.genesis();
        vote.verify(
            &genesis.public_key,
            genesis.option_list.len(),
            &genesis.voter_list,
            verifier,
        )?;
        self.pending.push(vote);
        Ok(self.blocks.len() as u64)
    }

    /// Computes a proof-of-work for the current tip.
    pub fn proof_of_work(&self, csprng: &mut Csprng) -> CoreResult<u128> {
        let tip = &self.blocks[self.blocks.len() - 1];
        Ok(pow::find_proof(
            tip.proof(),
            &tip.hash()?,
            self.difficulty,
            csprng,
        ))
    }

    /// Seals the pending votes into a new block.
    ///
    /// Fails without side effects if the mempool is empty or the proof does
    /// not validate against the current tip. On success the mempool is
    /// drained atomically with the append.
    pub fn seal_block(&mut self, proof: u128, now: u64) -> CoreResult<&Block> {
        if self.pending.is_empty() {
            return Err(CoreError::InvalidInput(
                "no pending votes to seal".into(),
            ));
        }

        let tip = &self.blocks[self.blocks.len() - 1];
        let tip_hash = tip.hash()?;
        if !pow::proof_is_valid(tip.proof(), &tip_hash, proof, self.difficulty) {
            return Err(CoreError::ChainInvalid(
                "proof of work does not validate against the tip".into(),
            ));
        }

        let block = DataBlock {
            index: self.blocks.len() as u64,
            // Keep timestamps monotone even under clock skew.
            timestamp: now.max(tip.timestamp()),
            proof,
            previous_hash: tip_hash,
            transactions: std::mem::take(&mut self.pending),
        };
        debug!(
            index = block.index,
            votes = block.transactions.len(),
            "sealed block"
        );
        self.blocks.push(Block::Data(block));
        Ok(&self.blocks[self.blocks.len() - 1])
    }

    /// Checks the structural invariants of the whole chain.
    pub fn validate(&self) -> CoreResult<()> {
        let Some(first) = self.blocks.first() else {
            return Err(CoreError::ChainInvalid("chain has no blocks".into()));
        };
        let Some(genesis) = first.as_genesis() else {
            return Err(CoreError::ChainInvalid(
                "first block is not a genesis block".into(),
            ));
        };
        if genesis.index != 0 {
            return Err(CoreError::ChainInvalid("genesis index is not 0".into()));
        }

        for i in 1..self.blocks.len() {
            let prev = &self.blocks[i - 1];
            let Some(block) = self.blocks[i].as_data() else {
                return Err(CoreError::ChainInvalid(format!(
                    "block {i} is a second genesis block"
                )));
            };

            if block.index != i as u64 {
                return Err(CoreError::ChainInvalid(format!(
                    "block {i} carries index {}",
                    block.index
                )));
            }
            if block.timestamp < prev.timestamp() {
                return Err(CoreError::ChainInvalid(format!(
                    "block {i} is older than its predecessor"
                )));
            }
            let prev_hash = prev.hash()?;
            if block.previous_hash != prev_hash {
                return Err(CoreError::ChainInvalid(format!(
                    "block {i} does not link to its predecessor"
                )));
            }
            if !pow::proof_is_valid(prev.proof(), &prev_hash, block.proof, self.difficulty) {
                return Err(CoreError::ChainInvalid(format!(
                    "block {i} fails proof-of-work"
                )));
            }
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Reconciles this chain against competing chains of the same election.
    ///
    /// Of `{self} ∪ others`, only validly structured chains whose genesis
    /// hash matches this chain's are considered; the longest wins, with ties
    /// going to the lexicographically smallest tip hash. Returns whether the
    /// block list was replaced. The mempool is untouched either way.
    pub fn update_chain(&mut self, others: Vec<Chain>) -> CoreResult<bool> {
        let genesis_hash = self.genesis_hash()?;

        let mut best: Option<(usize, String, Vec<Block>)> = None;
        let mut consider = |chain: &Chain| -> CoreResult<()> {
            if chain.validate().is_err() {
                return Ok(());
            }
            if chain.genesis_hash()? != genesis_hash {
                return Ok(());
            }
            let key = (chain.blocks.len(), chain.tip_hash()?);
            let better = match &best {
                None => true,
                Some((best_len, best_tip, _)) => {
                    key.0 > *best_len || (key.0 == *best_len && key.1 < *best_tip)
                }
            };
            if better {
                best = Some((key.0, key.1, chain.blocks.clone()));
            }
            Ok(())
        };

        let mut self_snapshot = self.clone();
        self_snapshot.pending.clear();
        consider(&self_snapshot)?;
        for other in &others {
            consider(other)?;
        }

        match best {
            Some((_, _, blocks)) if blocks != self.blocks => {
                debug!(
                    from = self.blocks.len(),
                    to = blocks.len(),
                    "replacing chain with longer valid fork"
                );
                self.blocks = blocks;
                Ok(true)
            }
            Some(_) => Ok(false),
            // Not even this chain is valid: refuse to pick anything.
            None => Err(CoreError::ChainInvalid(
                "no valid chain among the candidates".into(),
            )),
        }
    }
}
