//! Faces: the packet endpoints the forwarder speaks through.
//!
//! The core consumes the [`Face`] contract only: a stable id, a
//! non-blocking `send`, a leaky-bucket admission hint and up/down lifecycle
//! signals. Transports live outside the core; [`QueuedFace`] is the
//! in-process implementation used by the simulation harness and by tests,
//! buffering outbound packets for whoever sits on the other side.

use log::trace;
use rust_ndnr_common::ndn::Packet;
use rust_ndnr_common::types::FaceId;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

/// Transport-side contract the forwarding core consumes.
pub trait Face {
    /// Unique, stable for the face lifetime.
    fn id(&self) -> FaceId;

    /// Non-blocking enqueue; `true` means accepted for sending.
    fn send(&mut self, packet: Packet) -> bool;

    /// Leaky-bucket admission hint for outgoing Interests.
    fn is_below_limit(&self) -> bool;

    fn set_bucket_max(&mut self, max: f64);

    fn set_bucket_leak(&mut self, leak_per_sec: f64);

    /// Drains the bucket by one leak interval; driven periodically by the
    /// event loop.
    fn leak_bucket(&mut self, interval: Duration);

    fn up(&mut self);

    fn down(&mut self);

    fn is_up(&self) -> bool;

    /// Pulls one buffered outbound packet, if the implementation buffers.
    fn poll_outbox(&mut self) -> Option<Packet> {
        None
    }
}

/// Token-bucket admission for outgoing Interests.
///
/// Disabled until a positive maximum is configured. The bucket fills by
/// one per admitted Interest and drains at the leak rate.
#[derive(Debug, Clone, Default)]
pub struct LeakyBucket {
    bucket: f64,
    max: f64,
    leak_per_sec: f64,
}

impl LeakyBucket {
    pub fn enabled(&self) -> bool {
        self.max > 0.0
    }

    pub fn set_max(&mut self, max: f64) {
        self.max = max;
    }

    pub fn set_leak(&mut self, leak_per_sec: f64) {
        self.leak_per_sec = leak_per_sec;
    }

    pub fn is_below_limit(&self) -> bool {
        !self.enabled() || self.bucket + 1.0 <= self.max
    }

    pub fn consume(&mut self) {
        if self.enabled() {
            self.bucket += 1.0;
        }
    }

    pub fn leak(&mut self, interval: Duration) {
        if self.enabled() {
            self.bucket = (self.bucket - self.leak_per_sec * interval.as_secs_f64()).max(0.0);
        }
    }
}

/// What sits on the other side of a [`QueuedFace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceKind {
    /// A link towards another node.
    Link,
    /// A local application.
    App,
}

/// In-process face buffering outbound packets for the event loop to drain.
#[derive(Debug)]
pub struct QueuedFace {
    id: FaceId,
    kind: FaceKind,
    bucket: LeakyBucket,
    outbox: VecDeque<Packet>,
    is_up: bool,
}

impl QueuedFace {
    pub fn new(id: FaceId, kind: FaceKind) -> Self {
        Self {
            id,
            kind,
            bucket: LeakyBucket::default(),
            outbox: VecDeque::new(),
            is_up: false,
        }
    }

    pub fn kind(&self) -> FaceKind {
        self.kind
    }
}

impl Face for QueuedFace {
    fn id(&self) -> FaceId {
        self.id
    }

    fn send(&mut self, packet: Packet) -> bool {
        if !self.is_up {
            trace!("{} is down, dropping {}", self.id, packet);
            return false;
        }
        if packet.is_interest() {
            self.bucket.consume();
        }
        self.outbox.push_back(packet);
        true
    }

    fn is_below_limit(&self) -> bool {
        self.is_up && self.bucket.is_below_limit()
    }

    fn set_bucket_max(&mut self, max: f64) {
        self.bucket.set_max(max);
    }

    fn set_bucket_leak(&mut self, leak_per_sec: f64) {
        self.bucket.set_leak(leak_per_sec);
    }

    fn leak_bucket(&mut self, interval: Duration) {
        self.bucket.leak(interval);
    }

    fn up(&mut self) {
        self.is_up = true;
    }

    fn down(&mut self) {
        self.is_up = false;
    }

    fn is_up(&self) -> bool {
        self.is_up
    }

    fn poll_outbox(&mut self) -> Option<Packet> {
        self.outbox.pop_front()
    }
}

/// The node's face table: id-ordered so iteration is deterministic.
#[derive(Default)]
pub struct FaceTable {
    faces: BTreeMap<FaceId, Box<dyn Face>>,
    next_id: u32,
}

impl FaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_id(&mut self) -> FaceId {
        let id = FaceId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, face: Box<dyn Face>) -> FaceId {
        let id = face.id();
        debug_assert!(!self.faces.contains_key(&id), "duplicate face id");
        self.faces.insert(id, face);
        id
    }

    pub fn get(&self, id: FaceId) -> Option<&dyn Face> {
        self.faces.get(&id).map(|f| f.as_ref())
    }

    pub fn get_mut(&mut self, id: FaceId) -> Option<&mut Box<dyn Face>> {
        self.faces.get_mut(&id)
    }

    pub fn remove(&mut self, id: FaceId) -> Option<Box<dyn Face>> {
        self.faces.remove(&id)
    }

    pub fn ids(&self) -> Vec<FaceId> {
        self.faces.keys().copied().collect()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (FaceId, &mut Box<dyn Face>)> {
        self.faces.iter_mut().map(|(&id, f)| (id, f))
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}
