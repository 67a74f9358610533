//! Replacement policies for the bounded tables.
//!
//! A policy watches every insert, erase and lookup-hit on a table and
//! decides whether a new entry is admitted and which victim, if any, has to
//! make room for it. Policies track trie nodes, not entry contents, so one
//! implementation serves PIT and CS alike. A `max_size` of 0 means the
//! table is unbounded.

use crate::trie::NodeId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Outcome of offering a new entry to a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admit {
    /// Entry admitted, nothing has to go.
    Accept,
    /// Entry admitted once the given victim is erased by the caller.
    AcceptEvict(NodeId),
    /// Entry not admitted; the caller must back out the insert.
    Reject,
}

/// Bounded-set discipline over trie nodes.
pub trait ReplacementPolicy {
    /// Offers a freshly inserted node. On [`Admit::AcceptEvict`] the caller
    /// erases the victim through the normal path, which calls
    /// [`ReplacementPolicy::on_erase`] for it.
    fn on_insert(&mut self, node: NodeId) -> Admit;

    fn on_erase(&mut self, node: NodeId);

    fn on_hit(&mut self, node: NodeId);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn set_max_size(&mut self, max_size: usize);

    fn max_size(&self) -> usize;
}

/// Identifies one of the built-in policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    Persistent,
    Lru,
    Random,
    Fifo,
}

/// Builds a boxed policy of the given kind.
pub fn make_policy(kind: PolicyKind, max_size: usize) -> Box<dyn ReplacementPolicy> {
    match kind {
        PolicyKind::Persistent => Box::new(PersistentPolicy::new(max_size)),
        PolicyKind::Lru => Box::new(LruPolicy::new(max_size)),
        PolicyKind::Random => Box::new(RandomPolicy::new(max_size)),
        PolicyKind::Fifo => Box::new(FifoPolicy::new(max_size)),
    }
}

/* ---------------------------------------------------------------- *
 * Recency list shared by the ordered policies
 * ---------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, Default)]
struct Links {
    prev: Option<NodeId>, // towards the head (most recent)
    next: Option<NodeId>, // towards the tail (least recent)
}

#[derive(Debug, Default)]
struct RecencyList {
    links: HashMap<NodeId, Links>,
    head: Option<NodeId>,
    tail: Option<NodeId>,
}

impl RecencyList {
    fn len(&self) -> usize {
        self.links.len()
    }

    fn contains(&self, node: NodeId) -> bool {
        self.links.contains_key(&node)
    }

    fn push_front(&mut self, node: NodeId) {
        let old_head = self.head;
        self.links.insert(
            node,
            Links {
                prev: None,
                next: old_head,
            },
        );
        if let Some(h) = old_head {
            self.links.get_mut(&h).expect("head is linked").prev = Some(node);
        }
        self.head = Some(node);
        if self.tail.is_none() {
            self.tail = Some(node);
        }
    }

    fn unlink(&mut self, node: NodeId) -> bool {
        let Some(links) = self.links.remove(&node) else {
            return false;
        };
        match links.prev {
            Some(p) => self.links.get_mut(&p).expect("prev is linked").next = links.next,
            None => self.head = links.next,
        }
        match links.next {
            Some(n) => self.links.get_mut(&n).expect("next is linked").prev = links.prev,
            None => self.tail = links.prev,
        }
        true
    }

    fn move_to_front(&mut self, node: NodeId) {
        if self.contains(node) && self.head != Some(node) {
            self.unlink(node);
            self.push_front(node);
        }
    }

    fn tail(&self) -> Option<NodeId> {
        self.tail
    }
}

/* ---------------------------------------------------------------- *
 * persistent
 * ---------------------------------------------------------------- */

/// Never evicts; rejects inserts once the table is full.
#[derive(Debug)]
pub struct PersistentPolicy {
    items: HashMap<NodeId, ()>,
    max_size: usize,
}

impl PersistentPolicy {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: HashMap::new(),
            max_size,
        }
    }
}

impl ReplacementPolicy for PersistentPolicy {
    fn on_insert(&mut self, node: NodeId) -> Admit {
        if self.max_size > 0 && self.items.len() >= self.max_size {
            return Admit::Reject;
        }
        self.items.insert(node, ());
        Admit::Accept
    }

    fn on_erase(&mut self, node: NodeId) {
        self.items.remove(&node);
    }

    fn on_hit(&mut self, _node: NodeId) {}

    fn len(&self) -> usize {
        self.items.len()
    }

    fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
    }

    fn max_size(&self) -> usize {
        self.max_size
    }
}

/* ---------------------------------------------------------------- *
 * lru
 * ---------------------------------------------------------------- */

/// Evicts the least-recently-used entry; hits refresh recency.
#[derive(Debug)]
pub struct LruPolicy {
    list: RecencyList,
    max_size: usize,
}

impl LruPolicy {
    pub fn new(max_size: usize) -> Self {
        Self {
            list: RecencyList::default(),
            max_size,
        }
    }
}

impl ReplacementPolicy for LruPolicy {
    fn on_insert(&mut self, node: NodeId) -> Admit {
        let victim = if self.max_size > 0 && self.list.len() >= self.max_size {
            self.list.tail()
        } else {
            None
        };
        self.list.push_front(node);
        match victim {
            Some(v) => Admit::AcceptEvict(v),
            None => Admit::Accept,
        }
    }

    fn on_erase(&mut self, node: NodeId) {
        self.list.unlink(node);
    }

    fn on_hit(&mut self, node: NodeId) {
        self.list.move_to_front(node);
    }

    fn len(&self) -> usize {
        self.list.len()
    }

    fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
    }

    fn max_size(&self) -> usize {
        self.max_size
    }
}

/* ---------------------------------------------------------------- *
 * fifo
 * ---------------------------------------------------------------- */

/// Evicts in insertion order; hits do not refresh anything.
#[derive(Debug)]
pub struct FifoPolicy {
    inner: LruPolicy,
}

impl FifoPolicy {
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: LruPolicy::new(max_size),
        }
    }
}

impl ReplacementPolicy for FifoPolicy {
    fn on_insert(&mut self, node: NodeId) -> Admit {
        self.inner.on_insert(node)
    }

    fn on_erase(&mut self, node: NodeId) {
        self.inner.on_erase(node);
    }

    fn on_hit(&mut self, _node: NodeId) {}

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn set_max_size(&mut self, max_size: usize) {
        self.inner.set_max_size(max_size);
    }

    fn max_size(&self) -> usize {
        self.inner.max_size()
    }
}

/* ---------------------------------------------------------------- *
 * random
 * ---------------------------------------------------------------- */

/// Evicts a uniformly random entry when full.
#[derive(Debug)]
pub struct RandomPolicy {
    items: Vec<NodeId>,
    positions: HashMap<NodeId, usize>,
    rng: StdRng,
    max_size: usize,
}

impl RandomPolicy {
    pub fn new(max_size: usize) -> Self {
        Self::with_rng(max_size, StdRng::from_entropy())
    }

    pub fn with_seed(max_size: usize, seed: u64) -> Self {
        Self::with_rng(max_size, StdRng::seed_from_u64(seed))
    }

    fn with_rng(max_size: usize, rng: StdRng) -> Self {
        Self {
            items: Vec::new(),
            positions: HashMap::new(),
            rng,
            max_size,
        }
    }
}

impl ReplacementPolicy for RandomPolicy {
    fn on_insert(&mut self, node: NodeId) -> Admit {
        let victim = if self.max_size > 0 && self.items.len() >= self.max_size {
            let idx = self.rng.gen_range(0..self.items.len());
            Some(self.items[idx])
        } else {
            None
        };
        self.positions.insert(node, self.items.len());
        self.items.push(node);
        match victim {
            Some(v) => Admit::AcceptEvict(v),
            None => Admit::Accept,
        }
    }

    fn on_erase(&mut self, node: NodeId) {
        let Some(pos) = self.positions.remove(&node) else {
            return;
        };
        let last = self.items.len() - 1;
        self.items.swap(pos, last);
        self.items.pop();
        if pos < self.items.len() {
            self.positions.insert(self.items[pos], pos);
        }
    }

    fn on_hit(&mut self, _node: NodeId) {}

    fn len(&self) -> usize {
        self.items.len()
    }

    fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
    }

    fn max_size(&self) -> usize {
        self.max_size
    }
}
