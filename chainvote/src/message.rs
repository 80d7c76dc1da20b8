// Copyright (C) Microsoft Corporation. All rights reserved.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::manual_assert)]

//! Wire messages exchanged between nodes.
//!
//! Frames are a header word, one space, a JSON body, and a newline:
//!
//! ```text
//! PEER {"ip_address":"10.0.0.7","rep_port":5560,"sub_port":5561}
//! VOTE {"election_id":"...","options":[...],"proofs":[...],"signature":"..."}
//! ```
//!
//! Transport and peer discovery live outside the core; this module only
//! defines the frame grammar and the tagged message variants.

use serde::{Deserialize, Serialize};

use crate::{
    ballot::Vote,
    errors::{CoreError, CoreResult},
    registry::ElectionId,
};

/// How a node can be reached.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PeerInfo {
    pub ip_address: String,
    pub rep_port: u16,
    pub sub_port: u16,
}

impl PeerInfo {
    /// Normalizes whitespace and rejects unusable entries.
    pub fn sanitized(mut self) -> CoreResult<PeerInfo> {
        self.ip_address = self.ip_address.trim().to_string();
        if self.ip_address.is_empty() || self.ip_address.contains(char::is_whitespace) {
            return Err(CoreError::InvalidInput("peer address is unusable".into()));
        }
        if self.rep_port == 0 || self.sub_port == 0 {
            return Err(CoreError::InvalidInput("peer port is zero".into()));
        }
        Ok(self)
    }
}

/// A vote addressed to an election, as it travels between nodes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteMessage {
    pub election_id: ElectionId,
    #[serde(flatten)]
    pub vote: Vote,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    Peer(PeerInfo),
    Vote(VoteMessage),
}

impl Message {
    const PEER_HEADER: &'static str = "PEER";
    const VOTE_HEADER: &'static str = "VOTE";

    /// Encodes the message as a wire frame, newline included.
    pub fn encode(&self) -> CoreResult<String> {
        let (header, body) = match self {
            Message::Peer(peer) => (Self::PEER_HEADER, serde_json::to_string(peer)?),
            Message::Vote(vote) => (Self::VOTE_HEADER, serde_json::to_string(vote)?),
        };
        Ok(format!("{header} {body}\n"))
    }

    /// Decodes one wire frame. The trailing newline is optional.
    pub fn decode(frame: &str) -> CoreResult<Message> {
        let frame = frame.strip_suffix('\n').unwrap_or(frame);
        let (header, body) = frame.split_once(' ').ok_or_else(|| {
            CoreError::InvalidInput("frame has no header separator".into())
        })?;

        match header {
            Self::PEER_HEADER => Ok(Message::Peer(serde_json::from_str(body)?)),
            Self::VOTE_HEADER => Ok(Message::Vote(serde_json::from_str(body)?)),
            other => Err(CoreError::InvalidInput(format!(
                "unknown message header {other:?}"
            ))),
        }
    }
}
