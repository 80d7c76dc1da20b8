// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! The shared node context.
//!
//! All workers receive one `Arc<Core>`. The registry sits behind a
//! single-writer/multi-reader lock so tallies and listings proceed
//! concurrently while creations, seals and merges serialize. The peer list
//! and publish queue are plain mutexes with snapshot-copy reads. No worker
//! may hold any of these locks across a network or disk operation.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_lock::{Mutex, RwLock};
use tracing::{info, warn};

use chainvote::{
    chain::unix_now,
    errors::CoreResult,
    message::{Message, PeerInfo},
    registry::ElectionRegistry,
    storage,
};
use util::csprng::Csprng;

use crate::config::NodeConfig;

pub struct Core {
    pub config: NodeConfig,
    pub registry: RwLock<ElectionRegistry>,
    pub peers: Mutex<Vec<PeerInfo>>,
    pub publish_queue: Mutex<VecDeque<Message>>,
    pub csprng: Mutex<Csprng>,
    running: AtomicBool,
}

impl Core {
    pub fn new(config: NodeConfig) -> Arc<Core> {
        let registry = ElectionRegistry::new(config.difficulty);
        Arc::new(Core {
            config,
            registry: RwLock::new(registry),
            peers: Mutex::new(Vec::new()),
            publish_queue: Mutex::new(VecDeque::new()),
            csprng: Mutex::new(Csprng::new(b"chainvote-node")),
            running: AtomicBool::new(true),
        })
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Queues a message for the publisher to fan out to every known peer.
    /// This is the outbound half of the broadcast interface; the local vote
    /// and election surfaces call it after accepting an operation.
    pub async fn enqueue_broadcast(&self, msg: Message) {
        self.publish_queue.lock().await.push_back(msg);
    }

    /// Asks every worker to wind down at its next suspension point.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Loads persisted chains and peers from the data directory.
    pub async fn restore(&self) -> CoreResult<()> {
        let chains_dir = self.config.chains_dir();
        if chains_dir.is_dir() {
            let mut registry = self.registry.write().await;
            for entry in std::fs::read_dir(&chains_dir)? {
                let path = entry?.path();
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                let Ok(id) = chainvote::registry::ElectionId::from_hex(stem) else {
                    warn!(?path, "skipping chain file with an unusable name");
                    continue;
                };
                match storage::load_chain(&path, self.config.difficulty) {
                    Ok(chain) => {
                        if let Err(e) = registry.adopt_chain(id, chain, unix_now()) {
                            warn!(%id, error = %e, "skipping persisted chain");
                        }
                    }
                    Err(e) => warn!(?path, error = %e, "skipping unreadable chain file"),
                }
            }
        }

        let peers_file = self.config.peers_file();
        if peers_file.is_file() {
            let restored = crate::peers::load_peers(&peers_file)?;
            let mut peers = self.peers.lock().await;
            *peers = restored;
        }
        Ok(())
    }

    /// Flushes registries and peers to disk. Called on shutdown and safe to
    /// call repeatedly.
    pub async fn flush(&self) -> CoreResult<()> {
        let chains_dir = self.config.chains_dir();
        std::fs::create_dir_all(&chains_dir)?;

        // Snapshot under the read lock, write after releasing it.
        let snapshots: Vec<(chainvote::registry::ElectionId, chainvote::chain::Chain)> = {
            let registry = self.registry.read().await;
            registry
                .active_ids()
                .into_iter()
                .chain(registry.finished_ids())
                .filter_map(|id| registry.chain(&id).map(|c| (id, c.clone())))
                .collect()
        };
        for (id, chain) in &snapshots {
            let path = chains_dir.join(format!("{id}.json"));
            storage::save_chain(&path, chain)?;
        }

        let peers = { self.peers.lock().await.clone() };
        crate::peers::save_peers(&self.config.peers_file(), &peers)?;

        info!(
            chains = snapshots.len(),
            peers = peers.len(),
            "flushed node state"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test {
    use super::*;
    use chainvote::chain::ElectionTemplate;
    use chainvote::elgamal::SecretKey;
    use std::num::NonZeroUsize;

    fn test_config(dir: &std::path::Path) -> NodeConfig {
        NodeConfig {
            data_dir: dir.to_path_buf(),
            difficulty: 2,
            ..NodeConfig::default()
        }
    }

    #[test]
    fn flush_and_restore_round_trip() {
        async_global_executor::block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let core = Core::new(test_config(dir.path()));

            let id = {
                let mut csprng = core.csprng.lock().await;
                let sk = SecretKey::generate(NonZeroUsize::new(48).unwrap(), &mut csprng);
                let template = ElectionTemplate {
                    name: "restorable".into(),
                    start_time: None,
                    end_time: unix_now() + 3600,
                    public_key: sk.public_key().clone(),
                    voter_list: vec![],
                    option_list: vec!["a".into(), "b".into()],
                };
                let mut registry = core.registry.write().await;
                registry
                    .create_election(template, unix_now(), &mut csprng)
                    .unwrap()
            };

            {
                let mut peers = core.peers.lock().await;
                peers.push(PeerInfo {
                    ip_address: "10.0.0.9".into(),
                    rep_port: 5560,
                    sub_port: 5561,
                });
            }

            core.flush().await.unwrap();

            let restored = Core::new(test_config(dir.path()));
            restored.restore().await.unwrap();
            {
                let registry = restored.registry.read().await;
                assert_eq!(registry.active_ids(), vec![id]);
            }
            assert_eq!(restored.peers.lock().await.len(), 1);
        });
    }

    #[test]
    fn shutdown_flag_flips_once() {
        let dir = tempfile::tempdir().unwrap();
        let core = Core::new(test_config(dir.path()));
        assert!(core.running());
        core.shutdown();
        assert!(!core.running());
    }
}
