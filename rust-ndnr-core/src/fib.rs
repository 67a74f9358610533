//! FIB: name-prefix routing table.
//!
//! Each registered prefix maps to a set of faces with routing metrics. The
//! set is indexed twice: by face identity for updates, and by the ordering
//! key `(status, cost, face)` for the strategy, which walks candidates best
//! first and stops at the first RED face. Both indexes are touched together
//! so the metric-ordered view never disagrees with the face map.

use crate::trie::NameTrie;
use log::debug;
use rust_ndnr_common::ndn::{InterestHeader, Name};
use rust_ndnr_common::types::FaceId;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::time::Duration;

/// Status colouring of a FIB face.
///
/// The ordering is load-bearing: GREEN sorts before YELLOW sorts before
/// RED, and the strategy relies on every RED face coming last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FaceStatus {
    Green,
    Yellow,
    Red,
}

impl fmt::Display for FaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaceStatus::Green => write!(f, "green"),
            FaceStatus::Yellow => write!(f, "yellow"),
            FaceStatus::Red => write!(f, "red"),
        }
    }
}

/// Per-face routing metric of one FIB entry.
#[derive(Debug, Clone)]
pub struct FaceMetric {
    pub face: FaceId,
    pub routing_cost: i32,
    pub status: FaceStatus,
    /// Smoothed round-trip estimate; `None` until the first sample.
    pub rtt_estimate: Option<Duration>,
}

/// Stable identifier of a FIB entry.
///
/// PIT entries hold this id as a non-owning relation; after the entry is
/// removed the id simply stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FibEntryId(u32);

type MetricKey = (FaceStatus, i32, FaceId);

/// One registered prefix and its face metrics.
#[derive(Debug)]
pub struct FibEntry {
    pub prefix: Name,
    faces: HashMap<FaceId, FaceMetric>,
    order: BTreeSet<MetricKey>,
}

impl FibEntry {
    fn new(prefix: Name) -> Self {
        Self {
            prefix,
            faces: HashMap::new(),
            order: BTreeSet::new(),
        }
    }

    fn key(metric: &FaceMetric) -> MetricKey {
        (metric.status, metric.routing_cost, metric.face)
    }

    fn upsert_face(&mut self, face: FaceId, cost: i32) {
        match self.faces.get_mut(&face) {
            Some(metric) => {
                self.order.remove(&Self::key(metric));
                metric.routing_cost = cost;
                self.order.insert(Self::key(metric));
            }
            None => {
                let metric = FaceMetric {
                    face,
                    routing_cost: cost,
                    status: FaceStatus::Yellow,
                    rtt_estimate: None,
                };
                self.order.insert(Self::key(&metric));
                self.faces.insert(face, metric);
            }
        }
    }

    /// Recolours a face, reordering the metric view.
    pub fn update_status(&mut self, face: FaceId, status: FaceStatus) -> bool {
        let Some(metric) = self.faces.get_mut(&face) else {
            return false;
        };
        self.order.remove(&Self::key(metric));
        metric.status = status;
        self.order.insert(Self::key(metric));
        true
    }

    /// Feeds one RTT sample into the exponential moving average.
    pub fn update_face_rtt(&mut self, face: FaceId, sample: Duration) {
        if let Some(metric) = self.faces.get_mut(&face) {
            metric.rtt_estimate = Some(match metric.rtt_estimate {
                None => sample,
                Some(srtt) => srtt.mul_f64(0.875) + sample.mul_f64(0.125),
            });
        }
    }

    pub fn face(&self, face: FaceId) -> Option<&FaceMetric> {
        self.faces.get(&face)
    }

    /// Faces in metric order: non-RED first, ascending `(status, cost)`,
    /// ties broken by face id.
    pub fn faces_by_metric(&self) -> impl Iterator<Item = &FaceMetric> {
        self.order
            .iter()
            .map(|(_, _, face)| &self.faces[face])
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    fn remove_face(&mut self, face: FaceId) -> bool {
        match self.faces.remove(&face) {
            Some(metric) => {
                self.order.remove(&Self::key(&metric));
                true
            }
            None => false,
        }
    }
}

/// The forwarding information base.
#[derive(Debug, Default)]
pub struct Fib {
    trie: NameTrie<FibEntryId>,
    entries: HashMap<FibEntryId, FibEntry>,
    next_id: u32,
}

impl Fib {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `face` as a next hop for `prefix`.
    ///
    /// Creates the entry when the prefix is new; otherwise unions the face
    /// into the metric set, updating the cost if it is already there. New
    /// faces start YELLOW with an unknown RTT.
    pub fn add(&mut self, prefix: Name, face: FaceId, cost: i32) -> FibEntryId {
        if let Some(&id) = self
            .trie
            .exact_match(&prefix)
            .and_then(|node| self.trie.payload(node))
        {
            let entry = self.entries.get_mut(&id).expect("trie payload is live");
            entry.upsert_face(face, cost);
            return id;
        }

        let id = FibEntryId(self.next_id);
        self.next_id += 1;
        let mut entry = FibEntry::new(prefix.clone());
        entry.upsert_face(face, cost);
        self.entries.insert(id, entry);
        self.trie.insert(&prefix, id);
        debug!("FIB add {} via {} cost {}", prefix, face, cost);
        id
    }

    /// Deepest registered prefix that is a prefix of `name`.
    pub fn longest_prefix_match(&self, name: &Name) -> Option<FibEntryId> {
        self.trie
            .longest_prefix_match(name)
            .and_then(|node| self.trie.payload(node))
            .copied()
    }

    /// Longest-prefix match against the Interest's locator name.
    ///
    /// Only meaningful for Interests carrying a non-empty locator; such
    /// Interests are routed towards the producer's attachment point rather
    /// than by their content name.
    pub fn longest_prefix_match_of_locator(&self, interest: &InterestHeader) -> Option<FibEntryId> {
        let locator = interest.locator.as_ref().filter(|l| !l.is_empty())?;
        self.longest_prefix_match(locator)
    }

    pub fn entry(&self, id: FibEntryId) -> Option<&FibEntry> {
        self.entries.get(&id)
    }

    pub fn entry_mut(&mut self, id: FibEntryId) -> Option<&mut FibEntry> {
        self.entries.get_mut(&id)
    }

    /// Removes one face from one prefix; drops the entry when it was the
    /// last face.
    pub fn remove_route(&mut self, prefix: &Name, face: FaceId) -> bool {
        let Some(node) = self.trie.exact_match(prefix) else {
            return false;
        };
        let id = *self.trie.payload(node).expect("exact match has payload");
        let entry = self.entries.get_mut(&id).expect("trie payload is live");
        if !entry.remove_face(face) {
            return false;
        }
        if entry.face_count() == 0 {
            self.entries.remove(&id);
            self.trie.erase(node);
        }
        true
    }

    /// Sweeps a face out of every entry; entries left without faces are
    /// removed.
    pub fn remove_face(&mut self, face: FaceId) {
        let mut emptied = Vec::new();
        for (&id, entry) in self.entries.iter_mut() {
            if entry.remove_face(face) && entry.face_count() == 0 {
                emptied.push((id, entry.prefix.clone()));
            }
        }
        for (id, prefix) in emptied {
            self.entries.remove(&id);
            if let Some(node) = self.trie.exact_match(&prefix) {
                self.trie.erase(node);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FibEntryId, &FibEntry)> {
        self.entries.iter().map(|(&id, e)| (id, e))
    }
}
