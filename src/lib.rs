// Copyright 2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Cluster membership and gossip dissemination for a highly-available alert notification
//! service.
//!
//! The SWIM-style wire protocol itself (UDP probing, failure detection, the push/pull
//! handshake) is an external collaborator: this crate supplies the membership bookkeeping,
//! reconnect/eviction loops, settle barrier, and gossip-state plumbing that sit on top of any
//! [`GossipTransport`] implementation, plus [`transport::LoopbackTransport`] as a fully
//! in-process reference transport for tests.
//!
//! ## Example
//!
//! ```no_run
//! use alert_cluster::{Config, Peer};
//! use alert_cluster::transport::LoopbackNetwork;
//!
//! # async fn run() -> Result<(), alert_cluster::ClusterError> {
//! let network = LoopbackNetwork::new();
//! let config = Config {
//!     bind_addr: "127.0.0.1:7946".parse().unwrap(),
//!     ..Config::default()
//! };
//! let peer = Peer::join(config, "node-1", &network).await?;
//! peer.wait_ready().await;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

pub mod broadcast;
pub mod config;
mod delegate;
pub mod error;
mod eviction;
pub mod metrics;
pub mod node;
pub mod part;
pub mod peer;
mod reconnect;
pub mod resolver;
mod settle;
pub mod state;
pub mod time;
pub mod transport;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use log::{info, warn};
use tokio::sync::watch;

pub use broadcast::BroadcastChannel;
pub use config::Config;
pub use error::{ClusterError, ResolveError, TransportError};
pub use node::{NodeDescriptor, PeerName};
pub use part::Part;
pub use peer::{Counters, NodeStatus, PeerTable, RemotePeerRecord};
pub use resolver::{Resolve, SystemResolver};
pub use settle::ReadyGate;
pub use state::{State, StateRegistry};
pub use transport::{Delegate, GossipTransport, LoopbackNetwork, LoopbackTransport, TransportFactory};

use delegate::PeerDelegate;

/// Readiness as observed through the settle barrier.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    /// The settle barrier has not yet opened the ready gate.
    Settling,
    /// The ready gate is open; membership has either stabilized or settle was cancelled.
    Ready,
}

/// A debug snapshot of local identity and current membership, returned by [`Peer::info`].
#[derive(Clone, Debug)]
pub struct Info {
    /// This node's own descriptor.
    pub local: NodeDescriptor,
    /// Every member the transport currently reports, including self.
    pub members: Vec<NodeDescriptor>,
}

/// A running cluster membership handle: the result of [`Peer::join`].
///
/// Lives until [`Peer::leave`] is called (or it is dropped, which leaves the background loops
/// running until the process exits; callers that need a clean shutdown must call `leave`
/// explicitly).
pub struct Peer {
    name: PeerName,
    table: PeerTable,
    states: StateRegistry,
    transport: Arc<dyn GossipTransport>,
    gate: ReadyGate,
    stop_tx: watch::Sender<bool>,
}

impl Peer {
    /// Joins a cluster using the system DNS resolver. See [`Peer::join_with_resolver`] for the
    /// full algorithm; this is the entry point real callers use.
    pub async fn join(
        config: Config,
        name: impl Into<PeerName>,
        factory: &dyn TransportFactory,
    ) -> Result<Peer, ClusterError> {
        Self::join_with_resolver(config, name, factory, &SystemResolver).await
    }

    /// Joins a cluster: resolves seeds, builds the transport through `factory`, pre-populates
    /// the failed list, attempts the transport-level join (non-fatal on error), and spawns the
    /// reconnect, eviction, and settle background tasks.
    ///
    /// `resolver` is injectable so tests can substitute a deterministic fake for real DNS.
    pub async fn join_with_resolver(
        config: Config,
        name: impl Into<PeerName>,
        factory: &dyn TransportFactory,
        resolver: &dyn Resolve,
    ) -> Result<Peer, ClusterError> {
        if config.bind_addr.port() == 0 {
            return Err(ClusterError::InvalidBindAddress(config.bind_addr.to_string()));
        }
        if let Some(advertise) = config.advertise_addr {
            if advertise.ip().is_unspecified() {
                return Err(ClusterError::InvalidAdvertiseAddress(advertise.to_string()));
            }
        }

        let name = name.into();
        let local_addr = config.advertise_addr.unwrap_or(config.bind_addr);
        let local_descriptor = NodeDescriptor::new(name.clone(), local_addr);

        let no_cancel = watch::channel(false).1;
        let resolved =
            resolver::resolve_seeds(resolver, &config.seed_peers, config.wait_if_empty, local_addr, no_cancel).await?;

        warn_if_unreachable(&local_descriptor.address, &resolved);

        let table = PeerTable::default();
        let states = StateRegistry::new();
        let delegate: Arc<dyn Delegate> = Arc::new(PeerDelegate::new(table.clone(), states.clone()));
        let transport = factory.build(local_descriptor, delegate);

        table.set_initial_failed(&resolved);

        if let Err(err) = transport.join(&resolved).await {
            warn!("initial join did not reach any seed: {err}; relying on the reconnect loop");
        }

        let (stop_tx, stop_rx) = watch::channel(false);

        if config.reconnect_interval > Duration::ZERO {
            tokio::spawn(reconnect::run(
                table.clone(),
                Arc::clone(&transport),
                config.reconnect_interval,
                stop_rx.clone(),
            ));
        }
        if config.reconnect_timeout > Duration::ZERO {
            tokio::spawn(eviction::run(table.clone(), config.reconnect_timeout, stop_rx.clone()));
        }

        let (gate_handle, gate) = settle::ReadyGateHandle::new();
        tokio::spawn(settle::run(Arc::clone(&transport), gate_handle, config.settle_poll_interval, stop_rx));

        Ok(Peer { name, table, states, transport, gate, stop_tx })
    }

    /// Leaves the cluster: closes the stop signal (ending the reconnect, eviction, and settle
    /// tasks if still running), then invokes a transport-level leave. A transport error is
    /// logged and swallowed; the stop signal must close regardless.
    pub async fn leave(&self, timeout: Duration) {
        let _ = self.stop_tx.send(true);
        if let Err(err) = self.transport.leave(timeout).await {
            warn!("transport leave did not complete cleanly: {err}");
        }
    }

    /// This node's self-reported name.
    pub fn name(&self) -> &PeerName {
        &self.name
    }

    /// Current cluster size including self (pass-through to the transport).
    pub fn cluster_size(&self) -> usize {
        self.transport.cluster_size()
    }

    /// This node's own descriptor, as seen by the transport.
    pub fn local(&self) -> NodeDescriptor {
        self.transport.local_node()
    }

    /// Every member the transport currently reports, including self.
    pub fn peers(&self) -> Vec<NodeDescriptor> {
        self.transport.members()
    }

    /// Whether the ready gate has opened.
    pub fn ready(&self) -> bool {
        self.gate.is_ready()
    }

    /// Resolves once the ready gate opens (immediately if it already has).
    pub async fn wait_ready(&self) {
        self.gate.wait().await
    }

    /// Readiness as an enum, for callers that want to match rather than branch on a bool.
    pub fn status(&self) -> Status {
        if self.gate.is_ready() {
            Status::Ready
        } else {
            Status::Settling
        }
    }

    /// The local peer's stable position within the membership: every member is sorted
    /// lexicographically by name, and this returns the index of self in that ordering. Used by
    /// callers to deterministically shard work across the cluster. Returns `None` only if the
    /// transport's own membership view omits self, which a correctly behaving transport never
    /// does.
    pub fn position(&self) -> Option<usize> {
        let mut members = self.transport.members();
        members.sort();
        let local = self.transport.local_node();
        members.iter().position(|m| m.name == local.name)
    }

    /// A debug snapshot of self and current membership.
    pub fn info(&self) -> Info {
        Info {
            local: self.transport.local_node(),
            members: self.transport.members(),
        }
    }

    /// Registers a [`State`] handler under `key` (overwriting any prior registration) and
    /// returns a channel bound to it for publishing updates. Callers should register every
    /// state before the ready gate opens, per the register-before-ready contract.
    pub fn add_state(&self, key: impl Into<String>, handler: Arc<dyn State>) -> BroadcastChannel {
        let key = key.into();
        self.states.insert(key.clone(), handler);
        BroadcastChannel::new(key, Arc::clone(&self.transport))
    }

    /// The underlying peer table, for callers that want direct access to counters or the failed
    /// list (e.g. to export the `cluster_failed_peers` gauge; see [`crate::metrics`]).
    pub fn peer_table(&self) -> &PeerTable {
        &self.table
    }

    /// Replaces the local node's advertised metadata blob.
    pub fn update_metadata(&self, metadata: Bytes) {
        self.transport.update_local_metadata(metadata);
    }
}

/// Logs a pre-flight warning if `local` is loopback/unspecified and at least one resolved seed
/// is not, since the node would then be unreachable from the rest of the cluster.
fn warn_if_unreachable(local: &SocketAddr, resolved_seeds: &[SocketAddr]) {
    let local_is_local = local.ip().is_loopback() || local.ip().is_unspecified();
    if local_is_local && resolved_seeds.iter().any(|addr| !addr.ip().is_loopback() && !addr.ip().is_unspecified()) {
        warn!("advertise address {local} is loopback/unspecified but seed peers resolve to non-local addresses; this node will be unreachable");
    } else {
        info!("advertise address {local} checked against {} resolved seed(s)", resolved_seeds.len());
    }
}
