// Copyright 2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The settle barrier: a heuristic that delays "ready" until membership stops churning.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::watch;

use crate::transport::GossipTransport;

const STABLE_POLLS_REQUIRED: u32 = 3;

/// The one-shot ready gate. Cloning shares the same underlying signal; every clone's
/// [`ReadyGate::wait`] resolves the moment any one of them opens the gate.
#[derive(Clone)]
pub struct ReadyGate {
    rx: watch::Receiver<bool>,
}

impl ReadyGate {
    pub(crate) fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// True once the gate has opened.
    pub fn is_ready(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves immediately if already open; otherwise waits for the opening.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        let _ = rx.changed().await;
    }
}

pub(crate) struct ReadyGateHandle {
    tx: watch::Sender<bool>,
}

impl ReadyGateHandle {
    pub(crate) fn new() -> (Self, ReadyGate) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, ReadyGate::new(rx))
    }

    fn open(&self) {
        let _ = self.tx.send(true);
    }
}

/// Runs the settle algorithm to completion against `transport`'s membership count, then opens
/// `gate`. Exits early (opening the gate immediately) if `cancel` fires before three consecutive
/// stable polls are observed.
pub(crate) async fn run(
    transport: Arc<dyn GossipTransport>,
    gate: ReadyGateHandle,
    poll_interval: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    let mut n_peers = 0usize;
    let mut n_okay = 0u32;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = cancel.changed() => {
                if *cancel.borrow() {
                    info!("settle cancelled before stabilizing, opening ready gate");
                    gate.open();
                    return;
                }
            }
        }

        let n = transport.cluster_size();
        if n_okay >= STABLE_POLLS_REQUIRED {
            gate.open();
            return;
        }
        if n == n_peers {
            n_okay += 1;
        } else {
            n_okay = 0;
        }
        n_peers = n;
        debug!("settle poll: cluster_size={n} n_okay={n_okay}");
    }
}
