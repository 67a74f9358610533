//! The `run` command: a consumer/router/producer chain over virtual time.

use anyhow::{Context, Result};
use clap::Args;
use log::info;
use rust_ndnr_common::ndn::Name;
use rust_ndnr_core::apps::{Consumer, ConsumerStats, Producer};
use rust_ndnr_core::config::{CsPolicy, ForwarderConfig, PitPolicy};
use rust_ndnr_core::sim::{LinkSpec, Sim};
use rust_ndnr_core::strategy::StrategyKind;
use std::sync::Arc;
use std::time::Duration;

use crate::utils::format_duration;

#[derive(Args)]
pub struct RunArgs {
    /// Name prefix the producer serves
    #[clap(short, long, default_value = "/demo")]
    pub prefix: String,

    /// Number of Interests each consumer sends
    #[clap(short, long, default_value = "20")]
    pub count: u64,

    /// Number of consumers attached to the first router
    #[clap(long, default_value = "1")]
    pub consumers: usize,

    /// Routers between the consumers and the producer
    #[clap(long, default_value = "1")]
    pub hops: usize,

    /// Interval between new Interests in milliseconds
    #[clap(long, default_value = "100")]
    pub interval_ms: u64,

    /// Interest lifetime in milliseconds
    #[clap(long, default_value = "4000")]
    pub lifetime_ms: u64,

    /// Per-link propagation delay in milliseconds
    #[clap(long, default_value = "10")]
    pub delay_ms: u64,

    /// Virtual payload size for Content packets
    #[clap(long, default_value = "1024")]
    pub payload_size: usize,

    /// PIT replacement policy (persistent, lru, random)
    #[clap(long, default_value = "persistent")]
    pub pit_policy: String,

    /// Maximum PIT entries, 0 for unbounded
    #[clap(long, default_value = "0")]
    pub pit_max: usize,

    /// CS eviction policy (lru, random, fifo)
    #[clap(long, default_value = "lru")]
    pub cs_policy: String,

    /// Maximum cached Content Objects
    #[clap(long, default_value = "100")]
    pub cs_max: usize,

    /// Cache overheard data that have not been requested
    #[clap(long)]
    pub cache_unsolicited: bool,

    /// Disable retransmission detection
    #[clap(long)]
    pub no_detect_retx: bool,
}

impl RunArgs {
    pub fn forwarder_config(&self) -> Result<ForwarderConfig> {
        Ok(ForwarderConfig {
            cache_unsolicited_data: self.cache_unsolicited,
            detect_retransmissions: !self.no_detect_retx,
            pit_max_size: self.pit_max,
            pit_policy: self
                .pit_policy
                .parse::<PitPolicy>()
                .context("invalid --pit-policy")?,
            cs_max_size: self.cs_max,
            cs_policy: self
                .cs_policy
                .parse::<CsPolicy>()
                .context("invalid --cs-policy")?,
            strategy: StrategyKind::Flooding,
        })
    }
}

pub struct Scenario {
    pub sim: Sim,
    pub routers: Vec<usize>,
    pub consumer_stats: Vec<Arc<ConsumerStats>>,
}

/// Builds consumers — R1 — … — Rn — producer and wires the routes.
pub fn build_scenario(args: &RunArgs) -> Result<Scenario> {
    let prefix = Name::from_string(&args.prefix).context("invalid --prefix")?;
    let config = args.forwarder_config()?;
    let hops = args.hops.max(1);

    let mut sim = Sim::new();
    let mut routers = Vec::with_capacity(hops);
    for _ in 0..hops {
        let node = sim.add_node();
        sim.install_stack(node, &config)
            .context("installing forwarding stack")?;
        routers.push(node);
    }
    let producer_node = sim.add_node();

    let spec = LinkSpec {
        delay: Duration::from_millis(args.delay_ms),
        bitrate: None,
    };
    for pair in routers.windows(2) {
        let (upstream_face, _) = sim.link(pair[0], pair[1], &spec);
        sim.node_mut(pair[0]).add_route(prefix.clone(), upstream_face, 0);
    }
    let last = *routers.last().expect("at least one router");
    let (to_producer, _) = sim.link(last, producer_node, &spec);
    sim.node_mut(last).add_route(prefix.clone(), to_producer, 0);

    sim.add_app(
        producer_node,
        Box::new(Producer::new(prefix.clone()).with_payload_size(args.payload_size)),
        Duration::from_millis(1),
    );

    let mut consumer_stats = Vec::with_capacity(args.consumers);
    for i in 0..args.consumers.max(1) {
        let consumer = Consumer::new(prefix.clone(), args.count)
            .with_interval(Duration::from_millis(args.interval_ms))
            .with_lifetime(Duration::from_millis(args.lifetime_ms))
            .with_seed(0x5eed + i as u64);
        consumer_stats.push(consumer.stats());
        sim.add_app(routers[0], Box::new(consumer), Duration::from_millis(1));
    }

    Ok(Scenario {
        sim,
        routers,
        consumer_stats,
    })
}

pub fn execute(args: RunArgs) -> Result<()> {
    let run_for = Duration::from_millis(args.count * args.interval_ms)
        + Duration::from_millis(5 * args.lifetime_ms);

    let Scenario {
        mut sim,
        routers,
        consumer_stats,
    } = build_scenario(&args)?;

    info!(
        "running {} consumer(s) x {} interests over {} hop(s)",
        args.consumers.max(1),
        args.count,
        routers.len()
    );
    sim.run_for(run_for);

    println!("finished at virtual {}", format_duration(sim.now().as_duration()));
    for (i, stats) in consumer_stats.iter().enumerate() {
        println!(
            "consumer {}: sent {}, received {}, retransmitted {}",
            i,
            stats.sent.value(),
            stats.received.value(),
            stats.retransmissions.value()
        );
    }
    for (i, &node) in routers.iter().enumerate() {
        let m = &sim.node(node).metrics;
        println!(
            "router {}: in/out/drop interests {}/{}/{}, in/out/drop data {}/{}/{}, cs {} (hits {}), pit {}",
            i,
            m.in_interests.value(),
            m.out_interests.value(),
            m.drop_interests.value(),
            m.in_data.value(),
            m.out_data.value(),
            m.drop_data.value(),
            m.cs_size.value(),
            m.cs_hits.value(),
            m.pit_size.value(),
        );
    }

    Ok(())
}
