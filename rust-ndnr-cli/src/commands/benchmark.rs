//! The `benchmark` command: forwarding-plane throughput in virtual time.

use anyhow::{Context, Result};
use clap::Args;
use log::info;
use rust_ndnr_common::ndn::{InterestHeader, Name, Packet};
use rust_ndnr_core::apps::Producer;
use rust_ndnr_core::config::ForwarderConfig;
use rust_ndnr_core::face::FaceKind;
use rust_ndnr_core::sim::{LinkSpec, Sim};
use std::time::Duration;

use crate::utils::{format_bytes, format_duration};

#[derive(Args)]
pub struct BenchmarkArgs {
    /// Number of Interests to send
    #[clap(short, long, default_value = "1000")]
    pub count: u64,

    /// Name prefix to use for the benchmark
    #[clap(short, long, default_value = "/benchmark")]
    pub prefix: String,

    /// Virtual payload size for Content packets
    #[clap(long, default_value = "1024")]
    pub payload_size: usize,

    /// Content store capacity on the router
    #[clap(long, default_value = "1000")]
    pub cs_max: usize,
}

pub fn execute(args: BenchmarkArgs) -> Result<()> {
    let prefix = Name::from_string(&args.prefix).context("invalid --prefix")?;

    let mut sim = Sim::new();
    let router = sim.add_node();
    sim.install_stack(
        router,
        &ForwarderConfig {
            cs_max_size: args.cs_max,
            ..Default::default()
        },
    )?;
    let producer_node = sim.add_node();
    let (to_producer, _) = sim.link(router, producer_node, &LinkSpec::default());
    sim.node_mut(router).add_route(prefix.clone(), to_producer, 0);
    sim.add_app(
        producer_node,
        Box::new(Producer::new(prefix.clone()).with_payload_size(args.payload_size)),
        Duration::from_millis(1),
    );
    let driver = sim.add_face(router, FaceKind::App);

    info!("benchmarking {} interests under {}", args.count, prefix);

    // First pass misses the cache and travels to the producer
    let started = sim.now();
    for i in 0..args.count {
        let name = prefix.appending(i.to_string().into_bytes());
        let interest = Packet::Interest(InterestHeader::new(name).with_nonce(i as u32));
        sim.inject(router, driver, &interest);
        sim.run_for(Duration::from_millis(25));
    }
    let first_pass = sim.now().since(started);

    // Second pass is served from the content store
    let started = sim.now();
    for i in 0..args.count {
        let name = prefix.appending(i.to_string().into_bytes());
        let interest = Packet::Interest(InterestHeader::new(name).with_nonce(u32::MAX - i as u32));
        sim.inject(router, driver, &interest);
    }
    sim.run_for(Duration::from_millis(100));
    let second_pass = sim.now().since(started);

    let metrics = &sim.node(router).metrics;
    let cached = metrics.cs_hits.value();
    println!(
        "first pass: {} interests in {}",
        args.count,
        format_duration(first_pass)
    );
    println!(
        "second pass: {} interests in {} ({} cache hits)",
        args.count,
        format_duration(second_pass),
        cached
    );
    println!(
        "payload moved: {}",
        format_bytes((metrics.out_data.value() as usize) * args.payload_size)
    );
    println!(
        "router counters: in {} / out {} / dropped {}",
        metrics.in_interests.value(),
        metrics.out_interests.value(),
        metrics.drop_interests.value()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_pass_is_cache_served() {
        let mut sim = Sim::new();
        let router = sim.add_node();
        sim.install_stack(
            router,
            &ForwarderConfig {
                cs_max_size: 64,
                ..Default::default()
            },
        )
        .unwrap();
        let producer_node = sim.add_node();
        let (to_producer, _) = sim.link(router, producer_node, &LinkSpec::default());
        let prefix = Name::from_string("/benchmark").unwrap();
        sim.node_mut(router).add_route(prefix.clone(), to_producer, 0);
        sim.add_app(
            producer_node,
            Box::new(Producer::new(prefix.clone()).with_payload_size(8)),
            Duration::from_millis(1),
        );
        let driver = sim.add_face(router, FaceKind::App);

        for i in 0..10u32 {
            let name = prefix.appending(i.to_string().into_bytes());
            sim.inject(
                router,
                driver,
                &Packet::Interest(InterestHeader::new(name).with_nonce(i)),
            );
            sim.run_for(Duration::from_millis(25));
        }
        assert_eq!(sim.node(router).metrics.out_interests.value(), 10);

        for i in 0..10u32 {
            let name = prefix.appending(i.to_string().into_bytes());
            sim.inject(
                router,
                driver,
                &Packet::Interest(InterestHeader::new(name).with_nonce(1000 + i)),
            );
        }

        // Nothing new went upstream; every repeat hit the cache
        assert_eq!(sim.node(router).metrics.out_interests.value(), 10);
        assert_eq!(sim.node(router).metrics.cs_hits.value(), 10);
    }
}
