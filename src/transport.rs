// Copyright 2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The gossip-transport boundary.
//!
//! The SWIM transport itself (UDP probing, the failure detector, the TCP push/pull wire format)
//! is an external collaborator, not something this crate implements. What belongs to this crate
//! is the seam a real transport plugs into: [`GossipTransport`], the handle [`Peer`](crate::Peer)
//! drives, and [`Delegate`], the callback surface a transport invokes whenever it observes a
//! join/leave/update/message/push-pull. [`LoopbackTransport`] is this crate's own minimal, fully
//! in-process implementation, with the socket collapsed to a shared in-memory hub, since
//! reimplementing SWIM's wire protocol is not this crate's job.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;
use crate::node::NodeDescriptor;

/// Callback surface a [`GossipTransport`] implementation invokes on membership and message
/// events. Implemented internally by [`crate::delegate::PeerDelegate`]; applications never
/// implement this trait directly, they implement [`crate::state::State`] instead.
pub trait Delegate: Send + Sync {
    /// Node metadata payload advertised alongside probes, bounded by `limit` bytes. Empty in
    /// this core.
    fn node_meta(&self, limit: usize) -> Bytes {
        let _ = limit;
        Bytes::new()
    }

    /// Serializes every registered [`State`](crate::state::State) into a single snapshot for a
    /// transport-initiated push/pull.
    fn local_state(&self, join: bool) -> Bytes;

    /// Parses an incoming push/pull snapshot and dispatches each part to its registered state.
    fn merge_remote_state(&self, buf: &[u8], join: bool);

    /// A single broadcast message arrived; decode and dispatch it.
    fn notify_msg(&self, buf: &[u8]);

    /// A peer joined (or rejoined).
    fn notify_join(&self, node: NodeDescriptor);

    /// A peer's metadata changed without a status transition.
    fn notify_update(&self, node: NodeDescriptor);

    /// A peer left (or was declared failed).
    fn notify_leave(&self, node: NodeDescriptor);
}

/// The handle [`crate::Peer`] drives. A real implementation wraps a SWIM gossip transport; this
/// crate supplies [`LoopbackTransport`] for its own tests.
#[async_trait]
pub trait GossipTransport: Send + Sync + 'static {
    /// Attempts to join the cluster through the given concrete addresses. Returns the number of
    /// addresses that were successfully contacted, or an error if none were reachable. Failure
    /// here is non-fatal at `Join`; the caller logs and relies on the reconnect loop.
    async fn join(&self, addrs: &[SocketAddr]) -> Result<usize, TransportError>;

    /// Gracefully leaves the cluster, waiting up to `timeout` for the handshake to complete.
    async fn leave(&self, timeout: Duration) -> Result<(), TransportError>;

    /// The transport's current view of cluster membership (pass-through).
    fn members(&self) -> Vec<NodeDescriptor>;

    /// This node's own descriptor, as seen by the transport (pass-through).
    fn local_node(&self) -> NodeDescriptor;

    /// Current cluster size including self (pass-through).
    fn cluster_size(&self) -> usize {
        self.members().len()
    }

    /// Replaces the local node's metadata blob (re-gossiped to the cluster).
    fn update_local_metadata(&self, metadata: Bytes);

    /// Enqueues a payload on the transport's best-effort broadcast queue.
    fn enqueue_broadcast(&self, payload: Bytes);
}

/// Builds a [`GossipTransport`] for a local node, wiring in the delegate `Peer::join` supplies.
/// A real implementation closes over whatever connection pool or socket set its transport needs;
/// [`LoopbackNetwork`] implements this directly since the "connection pool" is just itself.
pub trait TransportFactory: Send + Sync {
    /// Constructs a transport for `local`, dispatching callbacks to `delegate`.
    fn build(&self, local: NodeDescriptor, delegate: Arc<dyn Delegate>) -> Arc<dyn GossipTransport>;
}

impl TransportFactory for LoopbackNetwork {
    fn build(&self, local: NodeDescriptor, delegate: Arc<dyn Delegate>) -> Arc<dyn GossipTransport> {
        Arc::new(LoopbackTransport::new(self.clone(), local, delegate))
    }
}

struct Registered {
    descriptor: NodeDescriptor,
    delegate: Arc<dyn Delegate>,
}

/// The shared hub backing every [`LoopbackTransport`] instance joined to it. Cloning a handle is
/// cheap (it's an `Arc`); every test that wants several in-process peers to see each other shares
/// one hub.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    inner: Arc<Mutex<HashMap<SocketAddr, Registered>>>,
}

impl LoopbackNetwork {
    /// Creates a fresh, empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, descriptor: NodeDescriptor, delegate: Arc<dyn Delegate>) {
        self.inner
            .lock()
            .expect("loopback network lock poisoned")
            .insert(descriptor.address, Registered { descriptor, delegate });
    }

    fn unregister(&self, addr: &SocketAddr) -> Option<Registered> {
        self.inner.lock().expect("loopback network lock poisoned").remove(addr)
    }

    fn snapshot(&self) -> Vec<(SocketAddr, NodeDescriptor)> {
        self.inner
            .lock()
            .expect("loopback network lock poisoned")
            .values()
            .map(|r| (r.descriptor.address, r.descriptor.clone()))
            .collect()
    }

    fn delegate_for(&self, addr: &SocketAddr) -> Option<Arc<dyn Delegate>> {
        self.inner
            .lock()
            .expect("loopback network lock poisoned")
            .get(addr)
            .map(|r| Arc::clone(&r.delegate))
    }
}

/// A fully in-process [`GossipTransport`]: no probing, no failure detection, no actual sockets.
/// Joins and leaves are delivered synchronously to every other registered [`LoopbackTransport`].
/// Because it has no failure detector of its own, tests that want a peer to appear `Failed` must
/// call [`LoopbackTransport::inject_failure`] explicitly; the point of `LoopbackTransport` is to
/// exercise the membership/broadcast machinery, not to reimplement SWIM.
pub struct LoopbackTransport {
    network: LoopbackNetwork,
    local: Mutex<NodeDescriptor>,
    delegate: Arc<dyn Delegate>,
}

impl LoopbackTransport {
    /// Creates a transport for `local`, registered against `network`, dispatching callbacks to
    /// `delegate`. The local node becomes immediately discoverable by anyone who later joins
    /// using its address as a seed (mirroring a SWIM node advertising itself as soon as it binds).
    pub fn new(network: LoopbackNetwork, local: NodeDescriptor, delegate: Arc<dyn Delegate>) -> Self {
        network.register(local.clone(), Arc::clone(&delegate));
        Self {
            network,
            local: Mutex::new(local),
            delegate,
        }
    }

    fn local_descriptor(&self) -> NodeDescriptor {
        self.local.lock().expect("local descriptor lock poisoned").clone()
    }

    /// Test-only: simulates the SWIM failure detector declaring `addr` unreachable, without an
    /// actual partition. Delivers a `notify_leave` to the local delegate only.
    pub fn inject_failure(&self, failed: NodeDescriptor) {
        self.delegate.notify_leave(failed);
    }
}

#[async_trait]
impl GossipTransport for LoopbackTransport {
    async fn join(&self, addrs: &[SocketAddr]) -> Result<usize, TransportError> {
        let local = self.local_descriptor();
        let mut reached = 0usize;
        let mut unreachable = Vec::new();

        for addr in addrs {
            if *addr == local.address {
                continue;
            }
            match self.network.delegate_for(addr) {
                Some(remote_delegate) => {
                    remote_delegate.notify_join(local.clone());
                    if let Some((_, remote_descriptor)) = self.network.snapshot().into_iter().find(|(a, _)| a == addr) {
                        self.delegate.notify_join(remote_descriptor);
                    }
                    reached += 1;
                }
                None => unreachable.push(*addr),
            }
        }

        if addrs.is_empty() || reached > 0 {
            Ok(reached)
        } else {
            Err(TransportError::JoinFailed(unreachable))
        }
    }

    async fn leave(&self, _timeout: Duration) -> Result<(), TransportError> {
        let local = self.local_descriptor();
        if let Some(registered) = self.network.unregister(&local.address) {
            let _ = registered;
        }
        for (addr, _) in self.network.snapshot() {
            if let Some(delegate) = self.network.delegate_for(&addr) {
                delegate.notify_leave(local.clone());
            }
        }
        Ok(())
    }

    fn members(&self) -> Vec<NodeDescriptor> {
        self.network.snapshot().into_iter().map(|(_, d)| d).collect()
    }

    fn local_node(&self) -> NodeDescriptor {
        self.local_descriptor()
    }

    fn update_local_metadata(&self, metadata: Bytes) {
        self.local.lock().expect("local descriptor lock poisoned").metadata = metadata;
    }

    fn enqueue_broadcast(&self, payload: Bytes) {
        for (addr, _) in self.network.snapshot() {
            if addr == self.local_descriptor().address {
                continue;
            }
            if let Some(delegate) = self.network.delegate_for(&addr) {
                delegate.notify_msg(&payload);
            }
        }
    }
}
