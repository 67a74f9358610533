//! CS: content store.
//!
//! Bounded name-indexed cache of Content Objects returned through this
//! node. Lookup is exact-match first; when the queried name is a proper
//! prefix of stored content, the deepest stored object under it answers,
//! so an Interest for `/a/b` is satisfied by a cached `/a/b/c`.

use crate::policy::{Admit, ReplacementPolicy};
use crate::trie::NameTrie;
use bytes::Bytes;
use log::trace;
use rust_ndnr_common::ndn::{ContentObjectHeader, Name};

/// One cached Content Object.
#[derive(Debug, Clone)]
pub struct CsEntry {
    pub header: ContentObjectHeader,
    pub payload: Bytes,
}

/// The content store.
pub struct ContentStore {
    trie: NameTrie<CsEntry>,
    policy: Box<dyn ReplacementPolicy>,
}

impl ContentStore {
    pub fn new(policy: Box<dyn ReplacementPolicy>) -> Self {
        Self {
            trie: NameTrie::new(),
            policy,
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

    /// Caches a Content Object, replacing any previous object of the same
    /// name. May evict per the replacement policy; a rejected insert drops
    /// the object on the floor.
    pub fn add(&mut self, header: ContentObjectHeader, payload: Bytes) {
        let name = header.name.clone();
        let entry = CsEntry { header, payload };

        let (id, inserted) = self.trie.insert(&name, entry.clone());
        if !inserted {
            // Same name again: keep one entry per key, refresh contents
            *self.trie.payload_mut(id).expect("node has payload") = entry;
            self.policy.on_hit(id);
            return;
        }

        match self.policy.on_insert(id) {
            Admit::Accept => {}
            Admit::AcceptEvict(victim) => {
                trace!("CS evicting {}", self.trie.name_of(victim));
                self.policy.on_erase(victim);
                self.trie.erase(victim);
            }
            Admit::Reject => {
                self.trie.erase(id);
            }
        }
    }

    /// Looks up the best cached object for `name`.
    ///
    /// Exact match wins; otherwise the deepest object the name is a prefix
    /// of. A hit counts as a use for the eviction policy.
    pub fn lookup(&mut self, name: &Name) -> Option<&CsEntry> {
        let found = self.trie.find(name);
        if !found.reached_last {
            return None;
        }
        let id = if self.trie.payload(found.deepest).is_some() {
            found.deepest
        } else {
            self.trie.deepest_payload_in_subtree(found.deepest)?
        };
        self.policy.on_hit(id);
        self.trie.payload(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CsEntry> {
        self.trie.iter().map(|(_, entry)| entry)
    }
}
