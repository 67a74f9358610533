//! The L3 forwarding node.
//!
//! A node exclusively owns its FIB, PIT, CS, strategy and face table, and
//! is driven entirely from the outside: the event loop hands it arriving
//! packets and timer callbacks, and pulls whatever its faces queued up.

use crate::config::{ForwarderConfig, LinkLimits};
use crate::cs::ContentStore;
use crate::face::{Face, FaceTable};
use crate::fib::{Fib, FibEntryId};
use crate::pit::Pit;
use crate::strategy::{ForwardingStrategy, Tables};
use log::debug;
use rust_ndnr_common::metrics::ForwarderMetrics;
use rust_ndnr_common::ndn::{Name, Packet};
use rust_ndnr_common::types::{FaceId, Timestamp};
use std::time::Duration;

/// One forwarding node.
pub struct Node {
    pub fib: Fib,
    pub pit: Pit,
    pub cs: ContentStore,
    pub faces: FaceTable,
    pub strategy: ForwardingStrategy,
    pub metrics: ForwarderMetrics,

    /// Bucket sizing parameters for faces created on limited links.
    pub link_limits: Option<LinkLimits>,
    /// Give every new link face a lowest-priority default route.
    pub default_routes: bool,
}

impl Node {
    pub fn new(config: &ForwarderConfig) -> Self {
        Self {
            fib: Fib::new(),
            pit: config.build_pit(),
            cs: config.build_cs(),
            faces: FaceTable::new(),
            strategy: config.build_strategy(),
            metrics: ForwarderMetrics::new(),
            link_limits: None,
            default_routes: false,
        }
    }

    /// Registers a transport with this node.
    pub fn add_face(&mut self, face: Box<dyn Face>) -> FaceId {
        let id = self.faces.insert(face);
        if self.default_routes {
            self.add_route(Name::new(), id, i32::MAX);
        }
        id
    }

    /// Adds a route, returning the (possibly pre-existing) FIB entry.
    pub fn add_route(&mut self, prefix: Name, face: FaceId, cost: i32) -> FibEntryId {
        let id = self.fib.add(prefix, face, cost);
        self.metrics.fib_size.set(self.fib.len() as u64);
        id
    }

    /// Dispatches one arriving packet through the strategy.
    pub fn on_receive(&mut self, face_in: FaceId, packet: &Packet, now: Timestamp) {
        let strategy = self.strategy;
        let mut tables = Tables {
            fib: &mut self.fib,
            pit: &mut self.pit,
            cs: &mut self.cs,
            faces: &mut self.faces,
            metrics: &self.metrics,
        };
        match packet {
            Packet::Interest(header) => strategy.on_interest(&mut tables, face_in, header, now),
            Packet::Data { header, payload } => {
                strategy.on_data(&mut tables, face_in, header, payload, now)
            }
        }
        self.sync_gauges();
    }

    /// Runs the PIT expiry cleaner; returns when it should fire next.
    pub fn on_pit_cleanup(&mut self, now: Timestamp) -> Option<Timestamp> {
        let expired = self.pit.clean_expired(now);
        for entry in &expired {
            self.strategy.will_erase_pending_interest(entry);
            self.metrics.pit_expirations.increment();
        }
        self.sync_gauges();
        self.pit.next_expiry()
    }

    /// Tears a face out of the node, sweeping every table that names it.
    ///
    /// PIT entries left with no incoming faces are erased; the CS holds no
    /// face references and is untouched.
    pub fn remove_face(&mut self, face: FaceId) {
        debug!("removing {}", face);
        self.strategy.remove_face(face);
        self.fib.remove_face(face);

        for pit_id in self.pit.entry_ids() {
            let orphaned = {
                let Some(entry) = self.pit.entry_mut(pit_id) else {
                    continue;
                };
                entry.remove_incoming(face);
                entry.remove_outgoing(face);
                entry.incoming_is_empty()
            };
            if orphaned {
                self.pit.mark_erased(pit_id);
            }
        }

        self.faces.remove(face);
        self.sync_gauges();
    }

    /// Periodic leak of every face's admission bucket.
    pub fn leak_buckets(&mut self, interval: Duration) {
        for (_, face) in self.faces.iter_mut() {
            face.leak_bucket(interval);
        }
    }

    fn sync_gauges(&self) {
        self.metrics.pit_size.set(self.pit.len() as u64);
        self.metrics.cs_size.set(self.cs.len() as u64);
        self.metrics.fib_size.set(self.fib.len() as u64);
    }
}
