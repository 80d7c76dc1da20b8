// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! Ingress worker: polls the transport with a bounded wait and dispatches
//! inbound `PEER` and `VOTE` frames.
//!
//! Every error is logged and the loop continues; a malformed or dishonest
//! frame must never take the worker down.

use std::sync::Arc;

use async_io::Timer;
use tracing::{info, warn};

use chainvote::{
    chain::unix_now,
    errors::CoreResult,
    message::Message,
    signature::EligibilityVerifier,
};

use crate::{core_ctx::Core, peers::ingest_peer, transport::Transport};

pub async fn run(
    core: Arc<Core>,
    transport: Arc<dyn Transport>,
    verifier: Arc<dyn EligibilityVerifier + Send + Sync>,
) {
    info!("ingress worker started");
    while core.running() {
        match transport.try_recv() {
            Some(frame) => {
                if let Err(e) = handle_frame(&core, verifier.as_ref(), &frame).await {
                    warn!(error = %e, "rejected inbound frame");
                }
            }
            None => {
                // Bounded wait; re-checks the running flag afterwards.
                Timer::after(core.config.poll_interval()).await;
            }
        }
    }
    info!("ingress worker stopped");
}

/// Dispatches one decoded frame into the shared state.
pub async fn handle_frame(
    core: &Core,
    verifier: &(dyn EligibilityVerifier + Send + Sync),
    frame: &str,
) -> CoreResult<()> {
    match Message::decode(frame)? {
        Message::Peer(info) => {
            let mut peers = core.peers.lock().await;
            if ingest_peer(&mut peers, info.clone())? {
                info!(ip = %info.ip_address, "learned new peer");
            }
            Ok(())
        }
        Message::Vote(msg) => {
            let mut registry = core.registry.write().await;
            let ticket =
                registry.submit_vote(&msg.election_id, msg.vote, verifier, unix_now())?;
            info!(election = %msg.election_id, ticket, "accepted vote");
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test {
    use super::*;
    use crate::config::NodeConfig;
    use chainvote::ballot::{Vote, encrypt_ballot};
    use chainvote::chain::ElectionTemplate;
    use chainvote::elgamal::SecretKey;
    use chainvote::message::{PeerInfo, VoteMessage};
    use chainvote::registry::ElectionId;
    use chainvote::signature::AcceptAllEligibility;
    use std::num::NonZeroUsize;
    use util::csprng::Csprng;

    fn test_core(dir: &std::path::Path) -> Arc<Core> {
        Core::new(NodeConfig {
            data_dir: dir.to_path_buf(),
            difficulty: 2,
            ..NodeConfig::default()
        })
    }

    #[test]
    fn peer_frames_land_in_the_peer_list_once() {
        async_global_executor::block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let core = test_core(dir.path());

            let frame = Message::Peer(PeerInfo {
                ip_address: "10.0.0.3".into(),
                rep_port: 5560,
                sub_port: 5561,
            })
            .encode()
            .unwrap();

            handle_frame(&core, &AcceptAllEligibility, &frame).await.unwrap();
            handle_frame(&core, &AcceptAllEligibility, &frame).await.unwrap();
            assert_eq!(core.peers.lock().await.len(), 1);
        });
    }

    #[test]
    fn vote_frames_reach_the_mempool() {
        async_global_executor::block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let core = test_core(dir.path());

            let (id, pk) = {
                let mut csprng = core.csprng.lock().await;
                let sk = SecretKey::generate(NonZeroUsize::new(48).unwrap(), &mut csprng);
                let template = ElectionTemplate {
                    name: "ingress".into(),
                    start_time: None,
                    end_time: unix_now() + 3600,
                    public_key: sk.public_key().clone(),
                    voter_list: vec![],
                    option_list: vec!["a".into(), "b".into()],
                };
                let mut registry = core.registry.write().await;
                let id = registry
                    .create_election(template, unix_now(), &mut csprng)
                    .unwrap();
                (id, sk.public_key().clone())
            };

            let vote = {
                let mut csprng = core.csprng.lock().await;
                let ballot = encrypt_ballot(&pk, 1, 2, &mut csprng).unwrap();
                Vote::new(ballot, vec![])
            };
            let frame = Message::Vote(VoteMessage {
                election_id: id,
                vote,
            })
            .encode()
            .unwrap();

            handle_frame(&core, &AcceptAllEligibility, &frame).await.unwrap();

            let registry = core.registry.read().await;
            assert_eq!(registry.chain(&id).unwrap().pending().len(), 1);
        });
    }

    #[test]
    fn bad_frames_surface_errors_without_state_changes() {
        async_global_executor::block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let core = test_core(dir.path());

            assert!(handle_frame(&core, &AcceptAllEligibility, "garbage").await.is_err());

            // A vote for an unknown election is NotFound.
            let mut csprng = Csprng::build().write_bytes(b"ingress unknown").finish();
            let sk = SecretKey::generate(NonZeroUsize::new(48).unwrap(), &mut csprng);
            let ballot = encrypt_ballot(sk.public_key(), 0, 2, &mut csprng).unwrap();
            let frame = Message::Vote(VoteMessage {
                election_id: ElectionId::random(&mut csprng),
                vote: Vote::new(ballot, vec![]),
            })
            .encode()
            .unwrap();
            assert!(handle_frame(&core, &AcceptAllEligibility, &frame).await.is_err());

            assert!(core.peers.lock().await.is_empty());
            assert!(core.registry.read().await.active_ids().is_empty());
        });
    }
}
