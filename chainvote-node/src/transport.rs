// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! The transport seam.
//!
//! Peer discovery and gossip live outside this process; the workers only
//! need a way to poll for inbound frames and to push a frame at a peer.
//! Implementations must never block indefinitely: `try_recv` returns
//! immediately and the ingress worker supplies the bounded wait between
//! polls.

use std::collections::VecDeque;
use std::sync::Mutex;

use chainvote::message::PeerInfo;

pub trait Transport: Send + Sync {
    /// Takes one inbound frame if any is ready. Must not block.
    fn try_recv(&self) -> Option<String>;

    /// Sends one frame to one peer, fire-and-forget. Single writer per
    /// destination; errors are for the caller to log and retry later.
    fn send(&self, peer: &PeerInfo, frame: &str) -> std::io::Result<()>;
}

/// In-process transport for tests and single-machine demos: inbound frames
/// are pushed by hand, outbound frames are recorded.
#[derive(Default)]
pub struct LoopbackTransport {
    inbound: Mutex<VecDeque<String>>,
    outbound: Mutex<Vec<(PeerInfo, String)>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a frame as if a peer had delivered it.
    pub fn push_inbound(&self, frame: impl Into<String>) {
        if let Ok(mut inbound) = self.inbound.lock() {
            inbound.push_back(frame.into());
        }
    }

    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<(PeerInfo, String)> {
        self.outbound.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

impl Transport for LoopbackTransport {
    fn try_recv(&self) -> Option<String> {
        self.inbound.lock().ok()?.pop_front()
    }

    fn send(&self, peer: &PeerInfo, frame: &str) -> std::io::Result<()> {
        self.outbound
            .lock()
            .map_err(|_| std::io::Error::other("loopback poisoned"))?
            .push((peer.clone(), frame.to_string()));
        Ok(())
    }
}
