// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! Publisher worker: drains the outbound queue to every known peer.
//!
//! The peer list is snapshot-copied per message so the lock is never held
//! across a send. Transport errors are logged; the message is not requeued
//! (gossip redundancy, not retries, provides delivery).

use std::sync::Arc;

use async_io::Timer;
use tracing::{info, warn};

use chainvote::message::Message;

use crate::{core_ctx::Core, transport::Transport};

pub async fn run(core: Arc<Core>, transport: Arc<dyn Transport>) {
    info!("publisher worker started");
    while core.running() {
        match next_message(&core).await {
            Some(msg) => publish_one(&core, transport.as_ref(), &msg).await,
            None => {
                Timer::after(core.config.publish_interval()).await;
            }
        }
    }

    // Best-effort drain on shutdown.
    while let Some(msg) = next_message(&core).await {
        publish_one(&core, transport.as_ref(), &msg).await;
    }
    info!("publisher worker stopped");
}

async fn next_message(core: &Core) -> Option<Message> {
    core.publish_queue.lock().await.pop_front()
}

/// Sends one message to every currently known peer.
pub async fn publish_one(core: &Core, transport: &dyn Transport, msg: &Message) {
    let frame = match msg.encode() {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "dropping unencodable outbound message");
            return;
        }
    };

    let peers = { core.peers.lock().await.clone() };
    for peer in peers {
        if let Err(e) = transport.send(&peer, &frame) {
            warn!(ip = %peer.ip_address, error = %e, "send failed");
        }
    }
}
