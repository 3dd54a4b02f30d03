// Copyright 2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! `PeerDelegate`: the bridge between a [`GossipTransport`](crate::transport::GossipTransport)
//! implementation's callbacks and this crate's own peer table and state registry. Applications
//! never implement [`Delegate`](crate::transport::Delegate) themselves; they implement
//! [`State`](crate::state::State) and register it via [`crate::Peer::add_state`], and this type
//! does the dispatching.

use bytes::Bytes;
use log::warn;

use crate::broadcast::decode_incoming;
use crate::node::NodeDescriptor;
use crate::part::Part;
use crate::peer::PeerTable;
use crate::state::StateRegistry;
use crate::transport::Delegate;

pub(crate) struct PeerDelegate {
    table: PeerTable,
    states: StateRegistry,
}

impl PeerDelegate {
    pub(crate) fn new(table: PeerTable, states: StateRegistry) -> Self {
        Self { table, states }
    }

    fn dispatch(&self, part: Part) {
        match self.states.get(&part.key) {
            Some(handler) => handler.merge(&part.data),
            None => warn!("dropping part for unregistered state key {:?}", part.key),
        }
    }
}

impl Delegate for PeerDelegate {
    fn local_state(&self, _join: bool) -> Bytes {
        let parts: Vec<Part> = self
            .states
            .serialize_all()
            .into_iter()
            .map(|(key, data)| Part::new(key, data))
            .collect();
        Part::encode_list(&parts)
    }

    fn merge_remote_state(&self, buf: &[u8], _join: bool) {
        match Part::decode_list(buf) {
            Ok(parts) => {
                for part in parts {
                    self.dispatch(part);
                }
            }
            Err(err) => warn!("discarding malformed push/pull snapshot: {err}"),
        }
    }

    fn notify_msg(&self, buf: &[u8]) {
        if let Some(part) = decode_incoming(buf) {
            self.dispatch(part);
        }
    }

    fn notify_join(&self, node: NodeDescriptor) {
        self.table.peer_join(node);
    }

    fn notify_update(&self, node: NodeDescriptor) {
        self.table.peer_update(node);
    }

    fn notify_leave(&self, node: NodeDescriptor) {
        self.table.peer_leave(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::PeerName;
    use crate::state::State;
    use std::sync::{Arc, Mutex};

    struct RecordingState {
        merged: Mutex<Vec<Vec<u8>>>,
    }

    impl State for RecordingState {
        fn serialize(&self) -> Bytes {
            Bytes::from_static(b"snapshot")
        }
        fn merge(&self, data: &[u8]) {
            self.merged.lock().unwrap().push(data.to_vec());
        }
    }

    #[test]
    fn merge_remote_state_dispatches_known_keys_and_drops_unknown_ones() {
        let table = PeerTable::default();
        let states = StateRegistry::new();
        let handler = Arc::new(RecordingState { merged: Mutex::new(Vec::new()) });
        states.insert("silences", handler.clone());

        let delegate = PeerDelegate::new(table, states);
        let parts = vec![
            Part::new("silences", Bytes::from_static(b"a")),
            Part::new("nflog", Bytes::from_static(b"b")),
        ];
        delegate.merge_remote_state(&Part::encode_list(&parts), true);

        assert_eq!(handler.merged.lock().unwrap().as_slice(), &[b"a".to_vec()]);
    }

    #[test]
    fn local_state_round_trips_every_registered_handler() {
        let table = PeerTable::default();
        let states = StateRegistry::new();
        states.insert("silences", Arc::new(RecordingState { merged: Mutex::new(Vec::new()) }));
        let delegate = PeerDelegate::new(table, states);

        let snapshot = delegate.local_state(true);
        let parts = Part::decode_list(&snapshot).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].key, "silences");
        assert_eq!(&parts[0].data[..], b"snapshot");
    }

    #[test]
    fn notify_join_and_leave_forward_to_the_peer_table() {
        let table = PeerTable::default();
        let delegate = PeerDelegate::new(table.clone(), StateRegistry::new());
        let node = NodeDescriptor::new(PeerName::new("N1"), "127.0.0.1:9501".parse().unwrap());

        delegate.notify_join(node.clone());
        assert_eq!(table.counters().joined(), 1);

        delegate.notify_leave(node);
        assert_eq!(table.counters().left(), 1);
        assert_eq!(table.failed_len(), 1);
    }
}
