//! Virtual-time event loop and topology harness.
//!
//! All packet arrivals and timer callbacks are dispatched serially from a
//! single event queue over virtual time; nothing inside the node ever
//! blocks or interleaves. The PIT expiry cleaner of each node holds at
//! most one outstanding timer, rescheduled when an earlier expiry appears
//! and recomputed whenever it fires.

use crate::apps::App;
use crate::config::ForwarderConfig;
use crate::face::{Face, FaceKind, QueuedFace};
use crate::node::Node;
use log::trace;
use rust_ndnr_common::ndn::Packet;
use rust_ndnr_common::types::{FaceId, Timestamp};
use rust_ndnr_common::{Error, Result};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::time::Duration;

/// How often admission buckets are leaked.
const LEAK_INTERVAL: Duration = Duration::from_secs(1);

/// Handle to one scheduled event, usable for logical cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventHandle(u64);

#[derive(Debug)]
enum SimEvent {
    Deliver {
        node: usize,
        face: FaceId,
        packet: Packet,
    },
    PitCleanup {
        node: usize,
    },
    AppTimer {
        app: usize,
    },
    LeakBuckets,
}

#[derive(Debug)]
struct Scheduled {
    at: Timestamp,
    seq: u64,
    event: SimEvent,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.at.cmp(&other.at).then(self.seq.cmp(&other.seq))
    }
}

/// Min-heap event queue over virtual time.
///
/// Cancellation is logical: a cancelled handle's event is skipped when its
/// turn comes, so a timer cancelled before it fires never executes.
pub struct Scheduler {
    now: Timestamp,
    queue: BinaryHeap<Reverse<Scheduled>>,
    cancelled: HashSet<u64>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            now: Timestamp::ZERO,
            queue: BinaryHeap::new(),
            cancelled: HashSet::new(),
            next_seq: 0,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    fn schedule(&mut self, delay: Duration, event: SimEvent) -> EventHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Scheduled {
            at: self.now + delay,
            seq,
            event,
        }));
        EventHandle(seq)
    }

    fn cancel(&mut self, handle: EventHandle) {
        self.cancelled.insert(handle.0);
    }

    /// Pops the next live event due at or before `until`, advancing the
    /// clock to its firing time.
    fn pop_due(&mut self, until: Timestamp) -> Option<SimEvent> {
        while let Some(Reverse(head)) = self.queue.peek() {
            if head.at > until {
                return None;
            }
            let Reverse(scheduled) = self.queue.pop().expect("peeked entry exists");
            if self.cancelled.remove(&scheduled.seq) {
                continue;
            }
            self.now = scheduled.at;
            return Some(scheduled.event);
        }
        None
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

struct AppSlot {
    node: usize,
    face: FaceId,
    app: Box<dyn App>,
}

/// A topology of nodes, links and applications under one event loop.
pub struct Sim {
    scheduler: Scheduler,
    nodes: Vec<Node>,
    stacked: Vec<bool>,
    links: HashMap<(usize, FaceId), (usize, FaceId, Duration)>,
    apps: Vec<AppSlot>,
    app_faces: HashMap<(usize, FaceId), usize>,
    cleaners: Vec<Option<(Timestamp, EventHandle)>>,
}

/// Parameters of one point-to-point link.
#[derive(Debug, Clone)]
pub struct LinkSpec {
    pub delay: Duration,
    /// Bits per second; enables bucket limits on nodes configured with
    /// link limits.
    pub bitrate: Option<f64>,
}

impl Default for LinkSpec {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(10),
            bitrate: None,
        }
    }
}

impl Sim {
    pub fn new() -> Self {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(LEAK_INTERVAL, SimEvent::LeakBuckets);
        Self {
            scheduler,
            nodes: Vec::new(),
            stacked: Vec::new(),
            links: HashMap::new(),
            apps: Vec::new(),
            app_faces: HashMap::new(),
            cleaners: Vec::new(),
        }
    }

    pub fn now(&self) -> Timestamp {
        self.scheduler.now()
    }

    /// Adds a bare node carrying a default forwarding stack.
    pub fn add_node(&mut self) -> usize {
        self.nodes.push(Node::new(&ForwarderConfig::default()));
        self.stacked.push(false);
        self.cleaners.push(None);
        self.nodes.len() - 1
    }

    /// Installs a configured forwarding stack on a node.
    ///
    /// Must happen before faces are attached; installing twice is an
    /// installer-level error.
    pub fn install_stack(&mut self, node: usize, config: &ForwarderConfig) -> Result<()> {
        if self.stacked[node] {
            return Err(Error::AlreadyInstalled);
        }
        if !self.nodes[node].faces.is_empty() {
            return Err(Error::Config(
                "stack must be installed before faces are added".into(),
            ));
        }
        self.nodes[node] = Node::new(config);
        self.stacked[node] = true;
        Ok(())
    }

    pub fn node(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub fn node_mut(&mut self, idx: usize) -> &mut Node {
        &mut self.nodes[idx]
    }

    /// Wires two nodes together, creating one face on each side.
    pub fn link(&mut self, a: usize, b: usize, spec: &LinkSpec) -> (FaceId, FaceId) {
        let face_a = self.make_link_face(a, spec);
        let face_b = self.make_link_face(b, spec);
        self.links.insert((a, face_a), (b, face_b, spec.delay));
        self.links.insert((b, face_b), (a, face_a, spec.delay));
        (face_a, face_b)
    }

    fn make_link_face(&mut self, node: usize, spec: &LinkSpec) -> FaceId {
        let limits = self.nodes[node].link_limits.clone();
        let n = &mut self.nodes[node];
        let id = n.faces.alloc_id();
        let mut face = QueuedFace::new(id, FaceKind::Link);
        face.up();
        if let (Some(limits), Some(bitrate)) = (limits, spec.bitrate) {
            face.set_bucket_max(limits.bucket_max(bitrate));
            face.set_bucket_leak(limits.max_interests_per_sec(bitrate));
        }
        n.add_face(Box::new(face))
    }

    /// Adds a standalone face to a node, e.g. for injecting test traffic.
    pub fn add_face(&mut self, node: usize, kind: FaceKind) -> FaceId {
        let n = &mut self.nodes[node];
        let id = n.faces.alloc_id();
        let mut face = QueuedFace::new(id, kind);
        face.up();
        n.add_face(Box::new(face))
    }

    /// Feeds one packet into a node as if it arrived on `face` now.
    pub fn inject(&mut self, node: usize, face: FaceId, packet: &Packet) {
        let now = self.scheduler.now();
        self.nodes[node].on_receive(face, packet, now);
        self.after_node(node);
    }

    /// Attaches an application behind a fresh app face; its first timer
    /// fires after `start_delay`.
    pub fn add_app(&mut self, node: usize, mut app: Box<dyn App>, start_delay: Duration) -> FaceId {
        let face = {
            let n = &mut self.nodes[node];
            let id = n.faces.alloc_id();
            let mut f = QueuedFace::new(id, FaceKind::App);
            f.up();
            n.add_face(Box::new(f))
        };

        let now = self.scheduler.now();
        let injections = app.on_start(&mut self.nodes[node], face, now);

        let app_idx = self.apps.len();
        self.apps.push(AppSlot { node, face, app });
        self.app_faces.insert((node, face), app_idx);

        for packet in injections {
            self.nodes[node].on_receive(face, &packet, now);
        }
        self.after_node(node);

        self.scheduler
            .schedule(start_delay, SimEvent::AppTimer { app: app_idx });
        face
    }

    /// Tears a face out of a node and forgets any link through it.
    pub fn remove_face(&mut self, node: usize, face: FaceId) {
        if let Some((peer, peer_face, _)) = self.links.remove(&(node, face)) {
            self.links.remove(&(peer, peer_face));
        }
        self.nodes[node].remove_face(face);
        self.after_node(node);
    }

    /// Runs every event due up to and including `until`.
    pub fn run_until(&mut self, until: Timestamp) {
        while let Some(event) = self.scheduler.pop_due(until) {
            self.dispatch(event);
        }
        self.scheduler.now = until;
    }

    pub fn run_for(&mut self, duration: Duration) {
        let until = self.scheduler.now() + duration;
        self.run_until(until);
    }

    fn dispatch(&mut self, event: SimEvent) {
        let now = self.scheduler.now();
        match event {
            SimEvent::Deliver { node, face, packet } => {
                trace!("deliver {} to node {} {}", packet, node, face);
                self.nodes[node].on_receive(face, &packet, now);
                self.after_node(node);
            }
            SimEvent::PitCleanup { node } => {
                self.cleaners[node] = None;
                self.nodes[node].on_pit_cleanup(now);
                self.after_node(node);
            }
            SimEvent::AppTimer { app } => {
                let (node, face) = (self.apps[app].node, self.apps[app].face);
                let (injections, next) = self.apps[app].app.on_timer(now);
                for packet in injections {
                    self.nodes[node].on_receive(face, &packet, now);
                }
                self.after_node(node);
                if let Some(delay) = next {
                    self.scheduler.schedule(delay, SimEvent::AppTimer { app });
                }
            }
            SimEvent::LeakBuckets => {
                for node in &mut self.nodes {
                    node.leak_buckets(LEAK_INTERVAL);
                }
                self.scheduler.schedule(LEAK_INTERVAL, SimEvent::LeakBuckets);
            }
        }
    }

    fn after_node(&mut self, node: usize) {
        self.flush_node(node);
        self.reconcile_cleaner(node);
    }

    /// Drains everything the node's faces queued: link traffic becomes
    /// delayed delivery events, app traffic is handed to the application,
    /// whose responses feed straight back into the node.
    fn flush_node(&mut self, node: usize) {
        let now = self.scheduler.now();
        loop {
            let mut progressed = false;
            for face_id in self.nodes[node].faces.ids() {
                let link = self.links.get(&(node, face_id)).copied();
                let app_idx = self.app_faces.get(&(node, face_id)).copied();
                if link.is_none() && app_idx.is_none() {
                    // Nothing attached; leave the outbox to its owner
                    continue;
                }
                loop {
                    let packet = self.nodes[node]
                        .faces
                        .get_mut(face_id)
                        .and_then(|face| face.poll_outbox());
                    let Some(packet) = packet else {
                        break;
                    };
                    progressed = true;

                    if let Some((peer, peer_face, delay)) = link {
                        self.scheduler.schedule(
                            delay,
                            SimEvent::Deliver {
                                node: peer,
                                face: peer_face,
                                packet,
                            },
                        );
                    } else if let Some(app_idx) = app_idx {
                        let responses = self.apps[app_idx].app.on_packet(&packet, now);
                        for response in responses {
                            self.nodes[node].on_receive(face_id, &response, now);
                        }
                    }
                }
            }
            if !progressed {
                break;
            }
        }
    }

    /// Keeps at most one cleanup timer per node, pulled earlier when a new
    /// entry expires sooner. Entries whose lifetimes were merely extended
    /// leave the timer alone; the cleaner recomputes when it fires.
    fn reconcile_cleaner(&mut self, node: usize) {
        let desired = self.nodes[node].pit.next_expiry();
        match (desired, self.cleaners[node]) {
            (None, Some((_, handle))) => {
                self.scheduler.cancel(handle);
                self.cleaners[node] = None;
            }
            (Some(at), current) => {
                if let Some((scheduled_at, handle)) = current {
                    if at >= scheduled_at {
                        return;
                    }
                    self.scheduler.cancel(handle);
                }
                let delay = at.since(self.scheduler.now());
                let handle = self.scheduler.schedule(delay, SimEvent::PitCleanup { node });
                self.cleaners[node] = Some((at, handle));
            }
            (None, None) => {}
        }
    }
}

impl Default for Sim {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_ndnr_common::ndn::{InterestHeader, Name};

    fn name(s: &str) -> Name {
        Name::from_string(s).unwrap()
    }

    fn interest(s: &str, nonce: u32) -> Packet {
        Packet::Interest(
            InterestHeader::new(name(s))
                .with_nonce(nonce)
                .with_lifetime(Duration::from_secs(1)),
        )
    }

    #[test]
    fn scheduler_fires_in_time_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(Duration::from_millis(30), SimEvent::LeakBuckets);
        scheduler.schedule(Duration::from_millis(10), SimEvent::PitCleanup { node: 0 });
        scheduler.schedule(Duration::from_millis(20), SimEvent::PitCleanup { node: 1 });

        let until = Timestamp::from_secs(1);
        assert!(matches!(
            scheduler.pop_due(until),
            Some(SimEvent::PitCleanup { node: 0 })
        ));
        assert_eq!(scheduler.now(), Timestamp::from_millis(10));
        assert!(matches!(
            scheduler.pop_due(until),
            Some(SimEvent::PitCleanup { node: 1 })
        ));
        assert!(matches!(scheduler.pop_due(until), Some(SimEvent::LeakBuckets)));
        assert!(scheduler.pop_due(until).is_none());
    }

    #[test]
    fn cancelled_events_never_fire() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule(Duration::from_millis(5), SimEvent::PitCleanup { node: 0 });
        scheduler.schedule(Duration::from_millis(10), SimEvent::PitCleanup { node: 1 });
        scheduler.cancel(handle);

        assert!(matches!(
            scheduler.pop_due(Timestamp::from_secs(1)),
            Some(SimEvent::PitCleanup { node: 1 })
        ));
    }

    #[test]
    fn events_respect_the_horizon() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(Duration::from_secs(5), SimEvent::LeakBuckets);
        assert!(scheduler.pop_due(Timestamp::from_secs(4)).is_none());
        assert!(scheduler.pop_due(Timestamp::from_secs(5)).is_some());
    }

    #[test]
    fn install_stack_rejects_a_second_install() {
        let mut sim = Sim::new();
        let node = sim.add_node();
        let config = ForwarderConfig::default();

        assert!(sim.install_stack(node, &config).is_ok());
        assert!(matches!(
            sim.install_stack(node, &config),
            Err(Error::AlreadyInstalled)
        ));
    }

    #[test]
    fn link_delivers_with_delay() {
        let mut sim = Sim::new();
        let a = sim.add_node();
        let b = sim.add_node();
        let (face_a, _face_b) = sim.link(
            a,
            b,
            &LinkSpec {
                delay: Duration::from_millis(50),
                bitrate: None,
            },
        );

        // Hand node A a packet whose only route is the link towards B
        sim.node_mut(a).add_route(name("/x"), face_a, 0);
        let consumer = sim.add_face(a, FaceKind::Link);
        sim.inject(a, consumer, &interest("/x/1", 1));

        sim.run_until(Timestamp::from_millis(49));
        assert_eq!(sim.node(b).metrics.in_interests.value(), 0);

        sim.run_until(Timestamp::from_millis(51));
        assert_eq!(sim.node(b).metrics.in_interests.value(), 1);
    }

    #[test]
    fn pit_cleaner_expires_unanswered_interest() {
        let mut sim = Sim::new();
        let a = sim.add_node();
        let b = sim.add_node();
        let (face_a, _) = sim.link(a, b, &LinkSpec::default());
        sim.node_mut(a).add_route(name("/x"), face_a, 0);

        let consumer = sim.add_face(a, FaceKind::Link);
        sim.inject(a, consumer, &interest("/x/1", 1));
        assert_eq!(sim.node(a).pit.len(), 1);

        // Nothing ever answers: the cleaner fires at lifetime expiry
        sim.run_until(Timestamp::from_millis(999));
        assert_eq!(sim.node(a).pit.len(), 1);

        sim.run_until(Timestamp::from_millis(1001));
        assert_eq!(sim.node(a).pit.len(), 0);
        assert_eq!(sim.node(a).metrics.pit_expirations.value(), 1);
    }

    #[test]
    fn limited_links_get_sized_buckets() {
        let mut sim = Sim::new();
        let a = sim.add_node();
        let b = sim.add_node();
        sim.node_mut(a).link_limits = Some(crate::config::LinkLimits::default());

        let (face_a, _) = sim.link(
            a,
            b,
            &LinkSpec {
                delay: Duration::from_millis(10),
                bitrate: Some(1000.0), // tiny link: bucket well below 1
            },
        );
        // Bucket max under 1 means nothing is admitted
        assert!(!sim
            .node(a)
            .faces
            .get(face_a)
            .unwrap()
            .is_below_limit());
    }
}
