// Copyright 2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy: configuration and DNS errors are fatal at [`crate::Peer::join`]; transport and
//! encoding errors are logged and retried/dropped and never surface here.

use std::net::SocketAddr;

use thiserror::Error;

/// Errors that can cause [`crate::Peer::join`] to fail outright.
#[derive(Error, Debug)]
pub enum ClusterError {
    /// The configured bind address could not be parsed or bound.
    #[error("invalid bind address: {0}")]
    InvalidBindAddress(String),

    /// The configured advertise address could not be parsed.
    #[error("invalid advertise address: {0}")]
    InvalidAdvertiseAddress(String),

    /// Seed-peer resolution failed (only surfaced when `wait_if_empty` retries exhaust themselves
    /// on a hard DNS error).
    #[error("seed resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    /// The underlying gossip transport could not be constructed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Errors surfaced by the [`crate::resolver`] module.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// A seed entry was not of the form `host:port`.
    #[error("seed {0:?} is not a valid host:port pair")]
    MalformedSeed(String),

    /// The resolver backend (DNS) reported a hard failure.
    #[error("DNS resolution of {host:?} failed: {source}")]
    Dns {
        /// The host name that failed to resolve.
        host: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Resolution was cancelled while waiting for a non-empty result (`wait_if_empty`).
    #[error("resolution of {0:?} was cancelled before any address was found")]
    Cancelled(String),
}

/// Errors surfaced by a [`crate::transport::GossipTransport`] implementation.
///
/// The layer treats every variant as non-fatal at [`crate::Peer::join`]: a failed initial join
/// just means the reconnect loop has more work to do.
#[derive(Error, Debug)]
pub enum TransportError {
    /// None of the given addresses could be reached.
    #[error("could not join any of {0:?}")]
    JoinFailed(Vec<SocketAddr>),

    /// The graceful leave handshake did not complete within the given deadline.
    #[error("leave did not complete before the deadline")]
    LeaveTimedOut,
}
