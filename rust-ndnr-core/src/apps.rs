//! Producer and consumer applications.
//!
//! Applications sit behind app faces and drive the node from the edges:
//! the producer registers its prefix and answers Interests with Content
//! Objects, the consumer emits sequence-numbered Interests and retransmits
//! the ones that time out. Both expose shared counters so scenarios and
//! the CLI can read results after a run.

use crate::fib::FaceStatus;
use crate::node::Node;
use bytes::Bytes;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_ndnr_common::metrics::Counter;
use rust_ndnr_common::ndn::{ContentObjectHeader, InterestHeader, Name, Packet};
use rust_ndnr_common::types::{FaceId, Timestamp};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// An application attached to a node through an app face.
///
/// Applications never touch the node directly after start-up; they receive
/// the packets the node sends down their face and answer with packets to
/// inject back, all within the same serial dispatch.
pub trait App {
    /// One-time set-up with access to the owning node, e.g. to register
    /// prefixes. Returned packets are injected immediately.
    fn on_start(&mut self, node: &mut Node, face: FaceId, now: Timestamp) -> Vec<Packet>;

    /// A packet arrived for this application.
    fn on_packet(&mut self, packet: &Packet, now: Timestamp) -> Vec<Packet>;

    /// Periodic timer; returns packets to inject and the delay until the
    /// next firing, or `None` to stop the timer.
    fn on_timer(&mut self, now: Timestamp) -> (Vec<Packet>, Option<Duration>);
}

/* ---------------------------------------------------------------- *
 * Producer
 * ---------------------------------------------------------------- */

/// Serves a prefix: every Interest is answered with a Content Object of
/// the same name and a synthetic payload.
pub struct Producer {
    /// Prefix for which the producer has the data.
    pub prefix: Name,
    /// Locator of the attachment point, for mobile producers.
    pub locator: Option<Name>,
    /// Virtual payload size for Content packets.
    pub payload_size: usize,
    pub signature_bits: u32,
}

impl Producer {
    pub fn new(prefix: Name) -> Self {
        Self {
            prefix,
            locator: None,
            payload_size: 1024,
            signature_bits: 0,
        }
    }

    pub fn with_locator(mut self, locator: Name) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn with_payload_size(mut self, payload_size: usize) -> Self {
        self.payload_size = payload_size;
        self
    }

    pub fn with_signature_bits(mut self, signature_bits: u32) -> Self {
        self.signature_bits = signature_bits;
        self
    }
}

impl App for Producer {
    fn on_start(&mut self, node: &mut Node, face: FaceId, _now: Timestamp) -> Vec<Packet> {
        // Register the served prefix and make the app face green, so it
        // is used primarily.
        let fib_id = node.add_route(self.prefix.clone(), face, 0);
        if let Some(entry) = node.fib.entry_mut(fib_id) {
            entry.update_status(face, FaceStatus::Green);
        }
        info!("producer serving {}", self.prefix);
        Vec::new()
    }

    fn on_packet(&mut self, packet: &Packet, now: Timestamp) -> Vec<Packet> {
        let Some(interest) = packet.as_interest() else {
            return Vec::new();
        };
        debug!("producer responding to {}", interest.name);

        let mut header = ContentObjectHeader::new(interest.name.clone())
            .with_timestamp(now)
            .with_signature_bits(self.signature_bits);

        // A located Interest reveals a mobile requester: advertise our own
        // attachment point and flag the position.
        if interest.has_locator() {
            if let Some(locator) = self.locator.as_ref().filter(|l| !l.is_empty()) {
                header = header.with_locator(locator.clone());
            }
            header = header.with_position(1);
        } else {
            header = header.with_position(-1);
        }

        vec![Packet::Data {
            header,
            payload: Bytes::from(vec![0u8; self.payload_size]),
        }]
    }

    fn on_timer(&mut self, _now: Timestamp) -> (Vec<Packet>, Option<Duration>) {
        (Vec::new(), None)
    }
}

/* ---------------------------------------------------------------- *
 * Consumer
 * ---------------------------------------------------------------- */

/// Counters a [`Consumer`] shares with whoever set it up.
#[derive(Debug, Default)]
pub struct ConsumerStats {
    pub sent: Counter,
    pub received: Counter,
    pub retransmissions: Counter,
}

/// Requests `/prefix/0 .. /prefix/count`, one new name per timer tick,
/// retransmitting outstanding names with a fresh nonce after a timeout.
pub struct Consumer {
    prefix: Name,
    count: u64,
    interval: Duration,
    lifetime: Duration,
    retx_timeout: Duration,
    next_seq: u64,
    outstanding: HashMap<u64, Timestamp>,
    rng: StdRng,
    stats: Arc<ConsumerStats>,
}

impl Consumer {
    pub fn new(prefix: Name, count: u64) -> Self {
        let lifetime = Duration::from_secs(4);
        Self {
            prefix,
            count,
            interval: Duration::from_millis(100),
            lifetime,
            retx_timeout: lifetime,
            next_seq: 0,
            outstanding: HashMap::new(),
            rng: StdRng::from_entropy(),
            stats: Arc::new(ConsumerStats::default()),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self.retx_timeout = lifetime;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn stats(&self) -> Arc<ConsumerStats> {
        Arc::clone(&self.stats)
    }

    fn seq_name(&self, seq: u64) -> Name {
        self.prefix.appending(seq.to_string().into_bytes())
    }

    fn make_interest(&mut self, seq: u64) -> Packet {
        Packet::Interest(
            InterestHeader::new(self.seq_name(seq))
                .with_nonce(self.rng.gen())
                .with_lifetime(self.lifetime),
        )
    }

    fn done(&self) -> bool {
        self.next_seq >= self.count && self.outstanding.is_empty()
    }
}

impl App for Consumer {
    fn on_start(&mut self, _node: &mut Node, _face: FaceId, _now: Timestamp) -> Vec<Packet> {
        Vec::new()
    }

    fn on_packet(&mut self, packet: &Packet, _now: Timestamp) -> Vec<Packet> {
        if let Packet::Data { header, .. } = packet {
            let satisfied: Vec<u64> = self
                .outstanding
                .keys()
                .copied()
                .filter(|&seq| self.seq_name(seq) == header.name)
                .collect();
            for seq in satisfied {
                debug!("consumer got {}", header.name);
                self.outstanding.remove(&seq);
                self.stats.received.increment();
            }
        }
        Vec::new()
    }

    fn on_timer(&mut self, now: Timestamp) -> (Vec<Packet>, Option<Duration>) {
        let mut out = Vec::new();

        let overdue: Vec<u64> = self
            .outstanding
            .iter()
            .filter(|(_, &deadline)| deadline <= now)
            .map(|(&seq, _)| seq)
            .collect();
        for seq in overdue {
            debug!("consumer retransmitting {}", self.seq_name(seq));
            self.outstanding.insert(seq, now + self.retx_timeout);
            self.stats.retransmissions.increment();
            out.push(self.make_interest(seq));
        }

        if self.next_seq < self.count {
            let seq = self.next_seq;
            self.next_seq += 1;
            self.outstanding.insert(seq, now + self.retx_timeout);
            out.push(self.make_interest(seq));
        }

        self.stats.sent.add(out.len() as u64);
        let next = if self.done() { None } else { Some(self.interval) };
        (out, next)
    }
}
