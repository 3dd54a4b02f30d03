// Copyright 2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The broadcast channel: a best-effort, fire-and-forget publish handle bound to a single
//! state-key.
//!
//! Broadcasts never supersede each other at this layer and completion is never reported back to
//! the caller, so [`GossipTransport::enqueue_broadcast`] takes a plain payload rather than a
//! queue-item object with supersession/completion hooks.

use std::sync::Arc;

use bytes::Bytes;
use log::warn;

use crate::transport::GossipTransport;

/// A handle bound to one state-key, returned by [`crate::Peer::add_state`].
#[derive(Clone)]
pub struct BroadcastChannel {
    key: String,
    transport: Arc<dyn GossipTransport>,
}

impl BroadcastChannel {
    pub(crate) fn new(key: String, transport: Arc<dyn GossipTransport>) -> Self {
        Self { key, transport }
    }

    /// The state-key this channel is bound to.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Wraps `data` in a `Part` keyed by this channel's state-key and enqueues it on the
    /// transport's broadcast queue. There is no synchronous delivery guarantee: this returns as
    /// soon as the payload is handed to the transport, not when any peer has seen it.
    pub fn broadcast(&self, data: Bytes) {
        let part = crate::part::Part::new(self.key.clone(), data);
        self.transport.enqueue_broadcast(part.encode());
    }
}

/// Decodes a broadcast-queue message into a `Part` and returns it, or logs and returns `None` on
/// a malformed payload; encoding errors are swallowed here, never propagated.
pub(crate) fn decode_incoming(buf: &[u8]) -> Option<crate::part::Part> {
    match crate::part::Part::decode(buf) {
        Ok(part) => Some(part),
        Err(err) => {
            warn!("discarding malformed broadcast message: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeDescriptor, PeerName};
    use crate::transport::{LoopbackNetwork, LoopbackTransport};
    use std::sync::Mutex;

    struct CapturingDelegate {
        received: Mutex<Vec<Vec<u8>>>,
    }

    impl crate::transport::Delegate for CapturingDelegate {
        fn local_state(&self, _join: bool) -> Bytes {
            Bytes::new()
        }
        fn merge_remote_state(&self, _buf: &[u8], _join: bool) {}
        fn notify_msg(&self, buf: &[u8]) {
            self.received.lock().unwrap().push(buf.to_vec());
        }
        fn notify_join(&self, _node: NodeDescriptor) {}
        fn notify_update(&self, _node: NodeDescriptor) {}
        fn notify_leave(&self, _node: NodeDescriptor) {}
    }

    #[tokio::test]
    async fn broadcast_is_delivered_and_decodes_back_to_the_same_part() {
        let net = LoopbackNetwork::new();
        let sender_delegate = Arc::new(CapturingDelegate { received: Mutex::new(Vec::new()) });
        let receiver_delegate = Arc::new(CapturingDelegate { received: Mutex::new(Vec::new()) });

        let sender_node = NodeDescriptor::new(PeerName::new("S"), "127.0.0.1:9201".parse().unwrap());
        let receiver_node = NodeDescriptor::new(PeerName::new("R"), "127.0.0.1:9202".parse().unwrap());

        let sender_transport: Arc<dyn GossipTransport> = Arc::new(LoopbackTransport::new(
            net.clone(),
            sender_node,
            sender_delegate.clone() as Arc<dyn crate::transport::Delegate>,
        ));
        let _receiver_transport = LoopbackTransport::new(
            net.clone(),
            receiver_node,
            receiver_delegate.clone() as Arc<dyn crate::transport::Delegate>,
        );

        let channel = BroadcastChannel::new("silences".to_string(), sender_transport);
        channel.broadcast(Bytes::from_static(b"hello"));

        let received = receiver_delegate.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        let part = decode_incoming(&received[0]).expect("valid part");
        assert_eq!(part.key, "silences");
        assert_eq!(&part.data[..], b"hello");
    }
}
