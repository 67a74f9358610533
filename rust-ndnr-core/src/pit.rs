//! PIT: pending Interest table.
//!
//! One entry per outstanding Interest name, living as the payload of a trie
//! node. Interests look entries up by exact name, Content Objects by
//! longest prefix. Creation is gated by the FIB (no route, no entry) and by
//! the replacement policy (a full `persistent` table rejects). A time index
//! ordered by expiry feeds a single rescheduling cleaner.

use crate::fib::{Fib, FibEntryId};
use crate::policy::{Admit, ReplacementPolicy};
use crate::trie::{NameTrie, NodeId};
use log::{debug, trace};
use rust_ndnr_common::ndn::{ContentObjectHeader, InterestHeader, Name};
use rust_ndnr_common::types::{FaceId, Timestamp};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

/// Handle to a live PIT entry.
pub type PitEntryId = NodeId;

/// Record of one Interest propagation out of a face.
#[derive(Debug, Clone, Copy)]
pub struct OutgoingRecord {
    pub send_time: Timestamp,
    pub retx_count: u32,
}

/// State of one outstanding Interest name.
#[derive(Debug)]
pub struct PitEntry {
    pub prefix: Name,
    /// Non-owning relation to the FIB entry the Interest resolved through.
    pub fib_entry: FibEntryId,
    incoming: HashSet<FaceId>,
    outgoing: HashMap<FaceId, OutgoingRecord>,
    nonces_seen: HashSet<u32>,
    expire_at: Timestamp,
    max_retx_allowed: u32,
}

impl PitEntry {
    fn new(prefix: Name, fib_entry: FibEntryId, expire_at: Timestamp) -> Self {
        Self {
            prefix,
            fib_entry,
            incoming: HashSet::new(),
            outgoing: HashMap::new(),
            nonces_seen: HashSet::new(),
            expire_at,
            max_retx_allowed: 1,
        }
    }

    pub fn is_nonce_seen(&self, nonce: u32) -> bool {
        self.nonces_seen.contains(&nonce)
    }

    pub fn add_seen_nonce(&mut self, nonce: u32) {
        self.nonces_seen.insert(nonce);
    }

    pub fn add_incoming(&mut self, face: FaceId) -> bool {
        self.incoming.insert(face)
    }

    pub fn remove_incoming(&mut self, face: FaceId) {
        self.incoming.remove(&face);
    }

    pub fn has_incoming(&self, face: FaceId) -> bool {
        self.incoming.contains(&face)
    }

    pub fn incoming(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.incoming.iter().copied()
    }

    pub fn incoming_is_empty(&self) -> bool {
        self.incoming.is_empty()
    }

    pub fn clear_incoming(&mut self) {
        self.incoming.clear();
    }

    /// Upserts the outgoing record for `face`: first send creates it with a
    /// count of one, re-sends bump the count and refresh the send time.
    pub fn add_outgoing(&mut self, face: FaceId, now: Timestamp) {
        self.outgoing
            .entry(face)
            .and_modify(|record| {
                record.retx_count += 1;
                record.send_time = now;
            })
            .or_insert(OutgoingRecord {
                send_time: now,
                retx_count: 1,
            });
    }

    pub fn outgoing(&self, face: FaceId) -> Option<&OutgoingRecord> {
        self.outgoing.get(&face)
    }

    pub fn has_outgoing(&self, face: FaceId) -> bool {
        self.outgoing.contains_key(&face)
    }

    pub fn remove_outgoing(&mut self, face: FaceId) {
        self.outgoing.remove(&face);
    }

    pub fn outgoing_is_empty(&self) -> bool {
        self.outgoing.is_empty()
    }

    pub fn clear_outgoing(&mut self) {
        self.outgoing.clear();
    }

    pub fn expire_at(&self) -> Timestamp {
        self.expire_at
    }

    pub fn max_retx_allowed(&self) -> u32 {
        self.max_retx_allowed
    }

    /// Grants one more send per face for the current retransmission cycle.
    pub fn increase_allowed_retx(&mut self) {
        self.max_retx_allowed += 1;
    }
}

/// The pending Interest table.
pub struct Pit {
    trie: NameTrie<PitEntry>,
    policy: Box<dyn ReplacementPolicy>,
    time_index: BTreeSet<(Timestamp, PitEntryId)>,
}

impl Pit {
    pub fn new(policy: Box<dyn ReplacementPolicy>) -> Self {
        Self {
            trie: NameTrie::new(),
            policy,
            time_index: BTreeSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.trie.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.policy.max_size()
    }

    pub fn set_max_size(&mut self, max_size: usize) {
        self.policy.set_max_size(max_size);
    }

    pub fn entry(&self, id: PitEntryId) -> Option<&PitEntry> {
        self.trie.payload(id)
    }

    pub fn entry_mut(&mut self, id: PitEntryId) -> Option<&mut PitEntry> {
        self.trie.payload_mut(id)
    }

    /// Exact-match lookup for an arriving Interest.
    pub fn lookup_interest(&mut self, interest: &InterestHeader) -> Option<PitEntryId> {
        let id = self.trie.exact_match(&interest.name)?;
        self.policy.on_hit(id);
        Some(id)
    }

    /// Longest-prefix lookup for an arriving Content Object.
    pub fn lookup_data(&mut self, header: &ContentObjectHeader) -> Option<PitEntryId> {
        let id = self.trie.longest_prefix_match(&header.name)?;
        self.policy.on_hit(id);
        Some(id)
    }

    /// Creates the entry for a first-seen Interest.
    ///
    /// Resolves the FIB by the locator when one is attached, by the content
    /// name otherwise; without a route no entry is made. Returns the
    /// already-present entry when the name is raced into the table, and
    /// `None` when the replacement policy refuses admission.
    pub fn create(&mut self, interest: &InterestHeader, fib: &Fib, now: Timestamp) -> Option<PitEntryId> {
        let fib_entry = if interest.has_locator() {
            fib.longest_prefix_match_of_locator(interest)?
        } else {
            fib.longest_prefix_match(&interest.name)?
        };

        let expire_at = now + interest.lifetime;
        let entry = PitEntry::new(interest.name.clone(), fib_entry, expire_at);
        let (id, inserted) = self.trie.insert(&interest.name, entry);
        if !inserted {
            return Some(id);
        }

        match self.policy.on_insert(id) {
            Admit::Accept => {}
            Admit::AcceptEvict(victim) => {
                debug!("PIT evicting {} for {}", self.trie.name_of(victim), interest.name);
                self.erase(victim);
            }
            Admit::Reject => {
                trace!("PIT admission rejected for {}", interest.name);
                self.trie.erase(id);
                return None;
            }
        }

        self.time_index.insert((expire_at, id));
        Some(id)
    }

    /// Extends the entry lifetime to `max(expire_at, now + lifetime)`.
    ///
    /// Only the time index is updated; the cleaner recomputes its schedule
    /// the next time it fires.
    pub fn update_lifetime(&mut self, id: PitEntryId, now: Timestamp, lifetime: Duration) {
        let Some(entry) = self.trie.payload_mut(id) else {
            return;
        };
        let new_expiry = (now + lifetime).max(entry.expire_at);
        if new_expiry == entry.expire_at {
            return;
        }
        let old_expiry = entry.expire_at;
        entry.expire_at = new_expiry;
        self.time_index.remove(&(old_expiry, id));
        self.time_index.insert((new_expiry, id));
    }

    /// Immediate removal of a satisfied or abandoned entry.
    pub fn mark_erased(&mut self, id: PitEntryId) -> Option<PitEntry> {
        self.erase(id)
    }

    fn erase(&mut self, id: PitEntryId) -> Option<PitEntry> {
        let entry = self.trie.erase(id)?;
        self.policy.on_erase(id);
        self.time_index.remove(&(entry.expire_at, id));
        Some(entry)
    }

    /// Expiry of the soonest-dying entry; when the cleaner should next run.
    pub fn next_expiry(&self) -> Option<Timestamp> {
        self.time_index.iter().next().map(|&(t, _)| t)
    }

    /// Evicts every entry whose lifetime has passed, returning them so the
    /// strategy can be notified of each.
    pub fn clean_expired(&mut self, now: Timestamp) -> Vec<PitEntry> {
        let mut expired = Vec::new();
        while let Some(&(expire_at, id)) = self.time_index.iter().next() {
            if expire_at > now {
                break;
            }
            if let Some(entry) = self.erase(id) {
                expired.push(entry);
            }
        }
        expired
    }

    /// Ids of all live entries, safe to iterate while mutating the table.
    pub fn entry_ids(&self) -> Vec<PitEntryId> {
        self.trie.payload_ids()
    }
}
