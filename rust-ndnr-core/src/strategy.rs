//! Forwarding strategy: the state machine binding FIB, PIT and CS.
//!
//! `on_interest` and `on_data` orchestrate the data plane; the smaller
//! methods are the hooks a strategy variant may specialise. Variants are
//! tagged values selecting the propagation rule, not separate types; only
//! `do_propagate_interest` differs between them.

use crate::cs::ContentStore;
use crate::face::{Face, FaceTable};
use crate::fib::{FaceStatus, Fib};
use crate::pit::{Pit, PitEntry, PitEntryId};
use bytes::Bytes;
use log::{debug, trace};
use rust_ndnr_common::metrics::ForwarderMetrics;
use rust_ndnr_common::ndn::{ContentObjectHeader, InterestHeader, Packet};
use rust_ndnr_common::types::{FaceId, Timestamp};

/// Propagation rule selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Forward to every eligible (non-RED, non-incoming) face of the
    /// matched FIB entry.
    #[default]
    Flooding,
}

/// Mutable view over one node's tables, assembled per dispatch.
///
/// The dispatch loop is single-threaded, so holding all tables at once is
/// what makes the PIT/FIB/CS invariants hold without locks.
pub struct Tables<'a> {
    pub fib: &'a mut Fib,
    pub pit: &'a mut Pit,
    pub cs: &'a mut ContentStore,
    pub faces: &'a mut FaceTable,
    pub metrics: &'a ForwarderMetrics,
}

/// The forwarding strategy and its configuration.
#[derive(Debug, Clone, Copy)]
pub struct ForwardingStrategy {
    pub kind: StrategyKind,
    /// Cache overheard data that have not been requested.
    pub cache_unsolicited_data: bool,
    /// If a non-duplicate interest is received on the same face more than
    /// once, it is considered a retransmission.
    pub detect_retransmissions: bool,
}

impl Default for ForwardingStrategy {
    fn default() -> Self {
        Self::new(StrategyKind::Flooding)
    }
}

impl ForwardingStrategy {
    pub fn new(kind: StrategyKind) -> Self {
        Self {
            kind,
            cache_unsolicited_data: false,
            detect_retransmissions: true,
        }
    }

    /* ------------------------------------------------------------ *
     * Interest pipeline
     * ------------------------------------------------------------ */

    pub fn on_interest(
        &self,
        t: &mut Tables<'_>,
        face_in: FaceId,
        interest: &InterestHeader,
        now: Timestamp,
    ) {
        t.metrics.in_interests.increment();
        trace!("in interest {} nonce {} on {}", interest.name, interest.nonce, face_in);

        let pit_id = match t.pit.lookup_interest(interest) {
            Some(id) => id,
            None => match t.pit.create(interest, t.fib, now) {
                Some(id) => {
                    self.did_create_pit_entry(face_in, interest);
                    id
                }
                None => {
                    self.failed_to_create_pit_entry(t, face_in, interest);
                    return;
                }
            },
        };

        {
            let Some(entry) = t.pit.entry_mut(pit_id) else {
                return;
            };
            if entry.is_nonce_seen(interest.nonce) {
                self.did_receive_duplicate_interest(t, face_in, interest, pit_id);
                return;
            }
            entry.add_seen_nonce(interest.nonce);
        }

        // Membership before this arrival is recorded decides whether the
        // face is retransmitting.
        let is_retransmitted = self.detect_retransmissions
            && t.pit
                .entry(pit_id)
                .map_or(false, |entry| entry.has_incoming(face_in));

        if let Some(hit) = t.cs.lookup(&interest.name) {
            let header = hit.header.clone();
            let payload = hit.payload.clone();
            t.metrics.cs_hits.increment();
            if let Some(entry) = t.pit.entry_mut(pit_id) {
                entry.add_incoming(face_in);
            }
            self.will_satisfy_pending_interest(t, None, pit_id, now);
            self.satisfy_pending_interest(t, None, pit_id, &header, &payload);
            return;
        }
        t.metrics.cs_misses.increment();

        if self.should_suppress_incoming_interest(t, face_in, pit_id, is_retransmitted) {
            if let Some(entry) = t.pit.entry_mut(pit_id) {
                entry.add_incoming(face_in);
            }
            t.pit.update_lifetime(pit_id, now, interest.lifetime);
            debug!("suppress interest {} from {}", interest.name, face_in);
            t.metrics.drop_interests.increment();
            return;
        }

        self.propagate_interest(t, face_in, interest, pit_id, is_retransmitted, now);
    }

    /// An entry is fresh until any face is recorded on it; fresh entries
    /// are never suppressed. A non-duplicate Interest arriving from a face
    /// we forwarded to is also propagated rather than suppressed.
    fn should_suppress_incoming_interest(
        &self,
        t: &Tables<'_>,
        face_in: FaceId,
        pit_id: PitEntryId,
        is_retransmitted: bool,
    ) -> bool {
        let Some(entry) = t.pit.entry(pit_id) else {
            return false;
        };
        let is_new = entry.incoming_is_empty() && entry.outgoing_is_empty();
        if is_new {
            return false;
        }
        if entry.has_outgoing(face_in) {
            return false;
        }
        !is_retransmitted
    }

    fn propagate_interest(
        &self,
        t: &mut Tables<'_>,
        face_in: FaceId,
        interest: &InterestHeader,
        pit_id: PitEntryId,
        is_retransmitted: bool,
        now: Timestamp,
    ) {
        if let Some(entry) = t.pit.entry_mut(pit_id) {
            entry.add_incoming(face_in);
        }
        t.pit.update_lifetime(pit_id, now, interest.lifetime);

        let mut propagated = self.do_propagate_interest(t, face_in, interest, pit_id, now);

        if !propagated && is_retransmitted {
            // One more chance for a retransmitted Interest
            if let Some(entry) = t.pit.entry_mut(pit_id) {
                entry.increase_allowed_retx();
            }
            propagated = self.do_propagate_interest(t, face_in, interest, pit_id, now);
        }

        if !propagated
            && t.pit
                .entry(pit_id)
                .map_or(true, |entry| entry.outgoing_is_empty())
        {
            self.did_exhaust_forwarding_options(t, face_in, interest);
        }
    }

    fn do_propagate_interest(
        &self,
        t: &mut Tables<'_>,
        face_in: FaceId,
        interest: &InterestHeader,
        pit_id: PitEntryId,
        now: Timestamp,
    ) -> bool {
        match self.kind {
            StrategyKind::Flooding => self.propagate_flooding(t, face_in, interest, pit_id, now),
        }
    }

    fn propagate_flooding(
        &self,
        t: &mut Tables<'_>,
        face_in: FaceId,
        interest: &InterestHeader,
        pit_id: PitEntryId,
        now: Timestamp,
    ) -> bool {
        let Some(fib_id) = t.pit.entry(pit_id).map(|entry| entry.fib_entry) else {
            return false;
        };
        let Some(fib_entry) = t.fib.entry(fib_id) else {
            return false;
        };
        let candidates: Vec<(FaceId, FaceStatus)> = fib_entry
            .faces_by_metric()
            .map(|metric| (metric.face, metric.status))
            .collect();

        let mut header = interest.clone();
        let mut propagated = 0;

        for (face, status) in candidates {
            // All non-RED faces are in the front of the metric order
            if status == FaceStatus::Red {
                break;
            }
            if face == face_in {
                continue;
            }
            if !self.will_send_out_interest(t, face, pit_id, now) {
                continue;
            }

            // Only the first relay of an agent-marked Interest carries the
            // rewritten header; later copies reuse the arriving packet.
            let packet = if header.agent == 1 {
                header.agent = 2;
                Packet::Interest(header.clone())
            } else {
                Packet::Interest(interest.clone())
            };
            if let Some(f) = t.faces.get_mut(face) {
                f.send(packet);
            }
            self.did_send_out_interest(t, face, interest);
            propagated += 1;
        }

        debug!("interest {} propagated to {} faces", interest.name, propagated);
        propagated > 0
    }

    /// Admission check before sending on a candidate outgoing face.
    fn will_send_out_interest(
        &self,
        t: &mut Tables<'_>,
        face_out: FaceId,
        pit_id: PitEntryId,
        now: Timestamp,
    ) -> bool {
        {
            let Some(entry) = t.pit.entry(pit_id) else {
                return false;
            };
            if let Some(record) = entry.outgoing(face_out) {
                if record.retx_count >= entry.max_retx_allowed() {
                    trace!(
                        "{} already forwarded {} times this cycle",
                        face_out,
                        record.retx_count
                    );
                    return false;
                }
            }
        }

        if !t
            .faces
            .get(face_out)
            .map_or(false, |face| face.is_below_limit())
        {
            trace!("{} over admission limit", face_out);
            return false;
        }

        if let Some(entry) = t.pit.entry_mut(pit_id) {
            entry.add_outgoing(face_out, now);
        }
        true
    }

    /* ------------------------------------------------------------ *
     * Data pipeline
     * ------------------------------------------------------------ */

    pub fn on_data(
        &self,
        t: &mut Tables<'_>,
        face_in: FaceId,
        header: &ContentObjectHeader,
        payload: &Bytes,
        now: Timestamp,
    ) {
        t.metrics.in_data.increment();
        trace!("in data {} on {}", header.name, face_in);

        if t.pit.lookup_data(header).is_none() {
            self.did_receive_unsolicited_data(t, face_in, header, payload);
            return;
        }

        t.cs.add(header.clone(), payload.clone());

        // Several entries across different prefixes may match; the lookup
        // returns them longest first, one at a time.
        while let Some(pit_id) = t.pit.lookup_data(header) {
            self.will_satisfy_pending_interest(t, Some(face_in), pit_id, now);
            self.satisfy_pending_interest(t, Some(face_in), pit_id, header, payload);
        }
    }

    /// Sends the Content Object to every face still waiting on the entry,
    /// then retires the entry.
    fn satisfy_pending_interest(
        &self,
        t: &mut Tables<'_>,
        face_in: Option<FaceId>,
        pit_id: PitEntryId,
        header: &ContentObjectHeader,
        payload: &Bytes,
    ) {
        let targets: Vec<FaceId> = {
            let Some(entry) = t.pit.entry_mut(pit_id) else {
                return;
            };
            if let Some(face) = face_in {
                entry.remove_incoming(face);
            }
            let targets = entry.incoming().collect();
            entry.clear_incoming();
            entry.clear_outgoing();
            targets
        };

        for face in targets {
            let ok = t
                .faces
                .get_mut(face)
                .map(|f| {
                    f.send(Packet::Data {
                        header: header.clone(),
                        payload: payload.clone(),
                    })
                })
                .unwrap_or(false);
            if ok {
                debug!("satisfy {} towards {}", header.name, face);
                t.metrics.out_data.increment();
            } else {
                debug!("cannot satisfy {} towards {}", header.name, face);
                t.metrics.drop_data.increment();
            }
        }

        t.pit.mark_erased(pit_id);
    }

    /// Data-plane measurement before satisfaction: an answer arriving on a
    /// face we forwarded through yields an RTT sample for the FIB.
    fn will_satisfy_pending_interest(
        &self,
        t: &mut Tables<'_>,
        face_in: Option<FaceId>,
        pit_id: PitEntryId,
        now: Timestamp,
    ) {
        let Some(face) = face_in else {
            return;
        };
        let Some(entry) = t.pit.entry(pit_id) else {
            return;
        };
        if let Some(record) = entry.outgoing(face) {
            let sample = now.since(record.send_time);
            if let Some(fib_entry) = t.fib.entry_mut(entry.fib_entry) {
                fib_entry.update_face_rtt(face, sample);
            }
        }
    }

    /* ------------------------------------------------------------ *
     * Hooks
     * ------------------------------------------------------------ */

    fn did_create_pit_entry(&self, face_in: FaceId, interest: &InterestHeader) {
        trace!("pit entry created for {} via {}", interest.name, face_in);
    }

    fn failed_to_create_pit_entry(
        &self,
        t: &mut Tables<'_>,
        face_in: FaceId,
        interest: &InterestHeader,
    ) {
        debug!("no pit entry for {} from {}", interest.name, face_in);
        t.metrics.drop_interests.increment();
    }

    /// Duplicate interests still record their incoming face.
    fn did_receive_duplicate_interest(
        &self,
        t: &mut Tables<'_>,
        face_in: FaceId,
        interest: &InterestHeader,
        pit_id: PitEntryId,
    ) {
        debug!("duplicate nonce {} for {}", interest.nonce, interest.name);
        if let Some(entry) = t.pit.entry_mut(pit_id) {
            entry.add_incoming(face_in);
        }
        t.metrics.drop_interests.increment();
    }

    fn did_send_out_interest(&self, t: &mut Tables<'_>, face_out: FaceId, interest: &InterestHeader) {
        trace!("out interest {} on {}", interest.name, face_out);
        t.metrics.out_interests.increment();
    }

    fn did_exhaust_forwarding_options(
        &self,
        t: &mut Tables<'_>,
        face_in: FaceId,
        interest: &InterestHeader,
    ) {
        debug!("no forwarding options left for {} from {}", interest.name, face_in);
        t.metrics.drop_interests.increment();
    }

    fn did_receive_unsolicited_data(
        &self,
        t: &mut Tables<'_>,
        face_in: FaceId,
        header: &ContentObjectHeader,
        payload: &Bytes,
    ) {
        if self.cache_unsolicited_data {
            t.cs.add(header.clone(), payload.clone());
        } else {
            // Unsolicited data must not poison the content store
            debug!("unsolicited data {} from {}", header.name, face_in);
            t.metrics.drop_data.increment();
        }
    }

    /// Called by the PIT cleaner for every entry it expires.
    pub fn will_erase_pending_interest(&self, entry: &PitEntry) {
        debug!("pit entry for {} expired", entry.prefix);
    }

    /// Called when a face is torn out of the node.
    pub fn remove_face(&self, face: FaceId) {
        trace!("{} removed", face);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::{Face, FaceKind, QueuedFace};
    use crate::policy::{make_policy, PolicyKind};
    use rust_ndnr_common::ndn::Name;
    use std::time::Duration;

    struct Rig {
        fib: Fib,
        pit: Pit,
        cs: ContentStore,
        faces: FaceTable,
        metrics: ForwarderMetrics,
        strategy: ForwardingStrategy,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                fib: Fib::new(),
                pit: Pit::new(make_policy(PolicyKind::Persistent, 0)),
                cs: ContentStore::new(make_policy(PolicyKind::Lru, 16)),
                faces: FaceTable::new(),
                metrics: ForwarderMetrics::new(),
                strategy: ForwardingStrategy::default(),
            }
        }

        fn add_face(&mut self) -> FaceId {
            let id = self.faces.alloc_id();
            let mut face = QueuedFace::new(id, FaceKind::Link);
            face.up();
            self.faces.insert(Box::new(face));
            id
        }

        fn sent(&mut self, id: FaceId) -> Vec<Packet> {
            let mut out = Vec::new();
            if let Some(face) = self.faces.get_mut(id) {
                while let Some(packet) = face.poll_outbox() {
                    out.push(packet);
                }
            }
            out
        }

        fn on_interest(&mut self, face: FaceId, interest: &InterestHeader, now: Timestamp) {
            let strategy = self.strategy;
            let mut tables = Tables {
                fib: &mut self.fib,
                pit: &mut self.pit,
                cs: &mut self.cs,
                faces: &mut self.faces,
                metrics: &self.metrics,
            };
            strategy.on_interest(&mut tables, face, interest, now);
        }

        fn on_data(
            &mut self,
            face: FaceId,
            header: &ContentObjectHeader,
            payload: &Bytes,
            now: Timestamp,
        ) {
            let strategy = self.strategy;
            let mut tables = Tables {
                fib: &mut self.fib,
                pit: &mut self.pit,
                cs: &mut self.cs,
                faces: &mut self.faces,
                metrics: &self.metrics,
            };
            strategy.on_data(&mut tables, face, header, payload, now);
        }
    }

    fn name(s: &str) -> Name {
        Name::from_string(s).unwrap()
    }

    fn interest(s: &str, nonce: u32) -> InterestHeader {
        InterestHeader::new(name(s)).with_nonce(nonce)
    }

    fn data(s: &str) -> (ContentObjectHeader, Bytes) {
        (ContentObjectHeader::new(name(s)), Bytes::from_static(b"payload"))
    }

    #[test]
    fn interest_without_route_is_dropped() {
        let mut rig = Rig::new();
        let consumer = rig.add_face();

        rig.on_interest(consumer, &interest("/x/1", 1), Timestamp::ZERO);

        assert_eq!(rig.metrics.drop_interests.value(), 1);
        assert_eq!(rig.metrics.out_interests.value(), 0);
        assert_eq!(rig.pit.len(), 0);
    }

    #[test]
    fn novel_interest_floods_upstream() {
        let mut rig = Rig::new();
        let consumer = rig.add_face();
        let up_a = rig.add_face();
        let up_b = rig.add_face();
        rig.fib.add(name("/x"), up_a, 10);
        rig.fib.add(name("/x"), up_b, 20);

        rig.on_interest(consumer, &interest("/x/1", 42), Timestamp::ZERO);

        assert_eq!(rig.metrics.out_interests.value(), 2);
        assert_eq!(rig.sent(up_a).len(), 1);
        assert_eq!(rig.sent(up_b).len(), 1);
        assert!(rig.sent(consumer).is_empty());

        let id = rig.pit.lookup_interest(&interest("/x/1", 42)).unwrap();
        let entry = rig.pit.entry(id).unwrap();
        assert!(entry.has_incoming(consumer));
        assert!(entry.has_outgoing(up_a));
        assert!(entry.has_outgoing(up_b));
    }

    #[test]
    fn flooding_skips_incoming_and_red_faces() {
        let mut rig = Rig::new();
        let consumer = rig.add_face();
        let up = rig.add_face();
        let bad = rig.add_face();
        let id = rig.fib.add(name("/x"), up, 10);
        rig.fib.add(name("/x"), consumer, 1);
        rig.fib.add(name("/x"), bad, 0);
        rig.fib
            .entry_mut(id)
            .unwrap()
            .update_status(bad, FaceStatus::Red);

        rig.on_interest(consumer, &interest("/x/1", 1), Timestamp::ZERO);

        // Only the non-RED, non-incoming face is used
        assert_eq!(rig.metrics.out_interests.value(), 1);
        assert_eq!(rig.sent(up).len(), 1);
        assert!(rig.sent(bad).is_empty());
        assert!(rig.sent(consumer).is_empty());
    }

    #[test]
    fn duplicate_nonce_is_dropped_but_face_recorded() {
        let mut rig = Rig::new();
        let c1 = rig.add_face();
        let c2 = rig.add_face();
        let up = rig.add_face();
        rig.fib.add(name("/x"), up, 0);

        rig.on_interest(c1, &interest("/x/1", 7), Timestamp::ZERO);
        rig.on_interest(c2, &interest("/x/1", 7), Timestamp::ZERO);

        assert_eq!(rig.metrics.out_interests.value(), 1);
        assert_eq!(rig.metrics.drop_interests.value(), 1);

        let id = rig.pit.lookup_interest(&interest("/x/1", 7)).unwrap();
        let entry = rig.pit.entry(id).unwrap();
        assert!(entry.has_incoming(c1));
        assert!(entry.has_incoming(c2));
    }

    #[test]
    fn second_consumer_is_suppressed_not_propagated() {
        let mut rig = Rig::new();
        let c1 = rig.add_face();
        let c2 = rig.add_face();
        let up = rig.add_face();
        rig.fib.add(name("/x"), up, 0);

        rig.on_interest(c1, &interest("/x/1", 1), Timestamp::ZERO);
        rig.on_interest(c2, &interest("/x/1", 2), Timestamp::from_millis(10));

        // One propagation upstream, the second arrival aggregated
        assert_eq!(rig.metrics.out_interests.value(), 1);
        assert_eq!(rig.metrics.drop_interests.value(), 1);
        assert_eq!(rig.sent(up).len(), 1);

        let id = rig.pit.lookup_interest(&interest("/x/1", 1)).unwrap();
        let entry = rig.pit.entry(id).unwrap();
        assert!(entry.has_incoming(c1));
        assert!(entry.has_incoming(c2));
    }

    #[test]
    fn suppression_extends_entry_lifetime() {
        let mut rig = Rig::new();
        let c1 = rig.add_face();
        let c2 = rig.add_face();
        let up = rig.add_face();
        rig.fib.add(name("/x"), up, 0);

        rig.on_interest(
            c1,
            &interest("/x/1", 1).with_lifetime(Duration::from_secs(1)),
            Timestamp::ZERO,
        );
        rig.on_interest(
            c2,
            &interest("/x/1", 2).with_lifetime(Duration::from_secs(4)),
            Timestamp::from_millis(500),
        );

        assert_eq!(
            rig.pit.next_expiry(),
            Some(Timestamp::from_millis(4500))
        );
    }

    #[test]
    fn data_satisfies_all_waiting_faces_and_caches() {
        let mut rig = Rig::new();
        let c1 = rig.add_face();
        let c2 = rig.add_face();
        let up = rig.add_face();
        rig.fib.add(name("/x"), up, 0);

        rig.on_interest(c1, &interest("/x/1", 1), Timestamp::ZERO);
        rig.on_interest(c2, &interest("/x/1", 2), Timestamp::ZERO);
        rig.sent(up);

        let (header, payload) = data("/x/1");
        rig.on_data(up, &header, &payload, Timestamp::from_millis(20));

        assert_eq!(rig.metrics.out_data.value(), 2);
        assert_eq!(rig.sent(c1).len(), 1);
        assert_eq!(rig.sent(c2).len(), 1);
        // Satisfy symmetry: the entry is gone, the object cached
        assert_eq!(rig.pit.len(), 0);
        assert_eq!(rig.cs.len(), 1);
    }

    #[test]
    fn duplicate_nonce_face_is_still_satisfied() {
        let mut rig = Rig::new();
        let c1 = rig.add_face();
        let c2 = rig.add_face();
        let up = rig.add_face();
        rig.fib.add(name("/x"), up, 0);

        rig.on_interest(c1, &interest("/x/1", 7), Timestamp::ZERO);
        rig.on_interest(c2, &interest("/x/1", 7), Timestamp::ZERO);
        rig.sent(up);

        let (header, payload) = data("/x/1");
        rig.on_data(up, &header, &payload, Timestamp::from_millis(20));

        // The duplicate recorded c2's face, so both consumers get the
        // object, while nothing was propagated twice
        assert_eq!(rig.metrics.out_interests.value(), 1);
        assert_eq!(rig.sent(c1).len(), 1);
        assert_eq!(rig.sent(c2).len(), 1);
        assert_eq!(rig.pit.len(), 0);
    }

    #[test]
    fn cs_hit_answers_without_reaching_propagation() {
        let mut rig = Rig::new();
        let consumer = rig.add_face();
        let up = rig.add_face();
        rig.fib.add(name("/x"), up, 0);

        rig.on_interest(consumer, &interest("/x/1", 1), Timestamp::ZERO);
        rig.sent(up);
        let (header, payload) = data("/x/1");
        rig.on_data(up, &header, &payload, Timestamp::from_millis(10));
        rig.sent(consumer);

        // Cache round-trip: the repeat never goes upstream
        rig.on_interest(consumer, &interest("/x/1", 2), Timestamp::from_millis(50));

        assert_eq!(rig.metrics.out_interests.value(), 1);
        assert_eq!(rig.metrics.cs_hits.value(), 1);
        let replies = rig.sent(consumer);
        assert_eq!(replies.len(), 1);
        assert!(!replies[0].is_interest());
        assert!(rig.sent(up).is_empty());
        assert_eq!(rig.pit.len(), 0);
    }

    #[test]
    fn unsolicited_data_dropped_by_default() {
        let mut rig = Rig::new();
        let up = rig.add_face();

        let (header, payload) = data("/nobody/asked");
        rig.on_data(up, &header, &payload, Timestamp::ZERO);

        assert_eq!(rig.metrics.drop_data.value(), 1);
        assert_eq!(rig.cs.len(), 0);
    }

    #[test]
    fn unsolicited_data_cached_when_configured() {
        let mut rig = Rig::new();
        rig.strategy.cache_unsolicited_data = true;
        let up = rig.add_face();

        let (header, payload) = data("/nobody/asked");
        rig.on_data(up, &header, &payload, Timestamp::ZERO);

        assert_eq!(rig.metrics.drop_data.value(), 0);
        assert_eq!(rig.cs.len(), 1);
    }

    #[test]
    fn retransmission_earns_another_propagation_cycle() {
        let mut rig = Rig::new();
        let consumer = rig.add_face();
        let up_a = rig.add_face();
        let up_b = rig.add_face();
        rig.fib.add(name("/x"), up_a, 10);
        rig.fib.add(name("/x"), up_b, 20);

        rig.on_interest(consumer, &interest("/x/1", 1), Timestamp::ZERO);
        assert_eq!(rig.metrics.out_interests.value(), 2);

        // Same face, fresh nonce, data never came: a retransmission
        rig.on_interest(consumer, &interest("/x/1", 2), Timestamp::from_secs(2));

        assert_eq!(rig.metrics.out_interests.value(), 4);
        let id = rig.pit.lookup_interest(&interest("/x/1", 1)).unwrap();
        let entry = rig.pit.entry(id).unwrap();
        assert_eq!(entry.max_retx_allowed(), 2);
        assert_eq!(entry.outgoing(up_a).unwrap().retx_count, 2);
    }

    #[test]
    fn repeat_is_suppressed_without_detection() {
        let mut rig = Rig::new();
        rig.strategy.detect_retransmissions = false;
        let consumer = rig.add_face();
        let up = rig.add_face();
        rig.fib.add(name("/x"), up, 0);

        rig.on_interest(consumer, &interest("/x/1", 1), Timestamp::ZERO);
        rig.on_interest(consumer, &interest("/x/1", 2), Timestamp::from_secs(2));

        // Without detection the second arrival is suppressed as a plain
        // aggregate, so nothing more went out
        assert_eq!(rig.metrics.out_interests.value(), 1);
        assert_eq!(rig.metrics.drop_interests.value(), 1);
    }

    #[test]
    fn data_return_feeds_rtt_estimate() {
        let mut rig = Rig::new();
        let consumer = rig.add_face();
        let up = rig.add_face();
        let fib_id = rig.fib.add(name("/x"), up, 0);

        rig.on_interest(consumer, &interest("/x/1", 1), Timestamp::ZERO);
        let (header, payload) = data("/x/1");
        rig.on_data(up, &header, &payload, Timestamp::from_millis(80));

        let estimate = rig
            .fib
            .entry(fib_id)
            .unwrap()
            .face(up)
            .unwrap()
            .rtt_estimate;
        assert_eq!(estimate, Some(Duration::from_millis(80)));
    }

    #[test]
    fn reflected_interest_from_outgoing_face_is_not_suppressed() {
        let mut rig = Rig::new();
        let consumer = rig.add_face();
        let up_a = rig.add_face();
        let up_b = rig.add_face();
        rig.fib.add(name("/x"), up_a, 10);
        rig.fib.add(name("/x"), up_b, 20);

        rig.on_interest(consumer, &interest("/x/1", 1), Timestamp::ZERO);
        rig.sent(up_a);
        rig.sent(up_b);

        // The producer side reflects the Interest back with a new nonce.
        // It arrives on a face we forwarded to, so it reaches propagation
        // instead of the suppression path.
        let drops_before = rig.metrics.drop_interests.value();
        rig.on_interest(up_a, &interest("/x/1", 3), Timestamp::from_millis(5));

        let id = rig.pit.lookup_interest(&interest("/x/1", 1)).unwrap();
        assert!(rig.pit.entry(id).unwrap().has_incoming(up_a));
        assert_eq!(rig.metrics.drop_interests.value(), drops_before);
    }

    #[test]
    fn agent_rewrite_only_on_first_relay() {
        let mut rig = Rig::new();
        let consumer = rig.add_face();
        let up_a = rig.add_face();
        let up_b = rig.add_face();
        rig.fib.add(name("/x"), up_a, 10);
        rig.fib.add(name("/x"), up_b, 20);

        rig.on_interest(
            consumer,
            &interest("/x/1", 1).with_agent(1),
            Timestamp::ZERO,
        );

        // Lowest cost face first: it sees the rewritten header
        let first = rig.sent(up_a);
        assert_eq!(first[0].as_interest().unwrap().agent, 2);
        // Later copies reuse the arriving packet
        let second = rig.sent(up_b);
        assert_eq!(second[0].as_interest().unwrap().agent, 1);
    }

    #[test]
    fn admission_limit_blocks_propagation() {
        let mut rig = Rig::new();
        let consumer = rig.add_face();
        let up = rig.add_face();
        rig.fib.add(name("/x"), up, 0);

        // A full bucket refuses further Interests
        if let Some(face) = rig.faces.get_mut(up) {
            face.set_bucket_max(1.0);
            face.set_bucket_leak(0.0);
        }

        rig.on_interest(consumer, &interest("/x/1", 1), Timestamp::ZERO);
        assert_eq!(rig.metrics.out_interests.value(), 1);

        rig.on_interest(consumer, &interest("/x/2", 2), Timestamp::ZERO);
        // No admission: exhausted, dropped
        assert_eq!(rig.metrics.out_interests.value(), 1);
        assert_eq!(rig.metrics.drop_interests.value(), 1);
        assert!(rig.sent(up).len() == 1);
    }

    #[test]
    fn data_satisfies_entries_across_prefixes() {
        let mut rig = Rig::new();
        let c1 = rig.add_face();
        let c2 = rig.add_face();
        let up = rig.add_face();
        rig.fib.add(name("/x"), up, 0);

        // Two live entries at different depths under the same prefix
        rig.on_interest(c1, &interest("/x/1", 1), Timestamp::ZERO);
        rig.on_interest(c2, &interest("/x/1/blockA", 2), Timestamp::ZERO);
        rig.sent(up);
        assert_eq!(rig.pit.len(), 2);

        let (header, payload) = data("/x/1/blockA");
        rig.on_data(up, &header, &payload, Timestamp::from_millis(10));

        // LPM satisfaction loops until no entry matches
        assert_eq!(rig.pit.len(), 0);
        assert_eq!(rig.sent(c1).len(), 1);
        assert_eq!(rig.sent(c2).len(), 1);
    }
}
