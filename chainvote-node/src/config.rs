// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! Node configuration: a JSON file with defaults for every field, so an
//! empty file (or none at all) yields a runnable local node.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use chainvote::{chain::DEFAULT_DIFFICULTY, errors::CoreResult, pow::DIFFICULTY_RANGE};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NodeConfig {
    /// Where chains, keys, tables and peers are persisted.
    pub data_dir: PathBuf,

    /// Request port this node answers on; the subscription port is derived
    /// by convention where the transport needs it.
    pub rep_port: u16,
    pub sub_port: u16,

    /// Leading-zero prefix length for proof-of-work.
    pub difficulty: u32,

    /// Largest per-option count the decryption table resolves. Must be at
    /// least the number of eligible voters of any hosted election.
    pub table_max_count: u64,

    /// Ingress poll timeout.
    pub poll_interval_ms: u64,

    /// Miner yield between sweeps.
    pub mine_interval_ms: u64,

    /// Publisher yield when the queue is empty.
    pub publish_interval_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            data_dir: PathBuf::from("chainvote-data"),
            rep_port: 5560,
            sub_port: 5561,
            difficulty: DEFAULT_DIFFICULTY,
            table_max_count: 10_000,
            poll_interval_ms: 1_000,
            mine_interval_ms: 1_000,
            publish_interval_ms: 1_000,
        }
    }
}

impl NodeConfig {
    /// Loads the config file, or the defaults when the file does not exist.
    pub fn load(path: Option<&Path>) -> CoreResult<NodeConfig> {
        let Some(path) = path else {
            return Ok(NodeConfig::default());
        };
        let contents = std::fs::read_to_string(path)?;
        let config: NodeConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if !DIFFICULTY_RANGE.contains(&self.difficulty) {
            return Err(chainvote::CoreError::BadParams(format!(
                "difficulty {} outside {DIFFICULTY_RANGE:?}",
                self.difficulty
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn mine_interval(&self) -> Duration {
        Duration::from_millis(self.mine_interval_ms)
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }

    pub fn chains_dir(&self) -> PathBuf {
        self.data_dir.join("chains")
    }

    pub fn key_file(&self) -> PathBuf {
        self.data_dir.join("keys.jsonl")
    }

    pub fn tables_file(&self) -> PathBuf {
        self.data_dir.join("tables.json")
    }

    pub fn peers_file(&self) -> PathBuf {
        self.data_dir.join("peers.json")
    }
}
