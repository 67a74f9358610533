//! Node configuration.
//!
//! The original global type-registration machinery is replaced by plain
//! enumerated options and a small factory: every pluggable piece (PIT
//! policy, CS policy, strategy variant) is a value here, and
//! [`ForwarderConfig`] builds the concrete tables from them.

use crate::cs::ContentStore;
use crate::pit::Pit;
use crate::policy::{make_policy, PolicyKind};
use crate::strategy::{ForwardingStrategy, StrategyKind};
use rust_ndnr_common::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Replacement discipline for the PIT.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PitPolicy {
    #[default]
    Persistent,
    Lru,
    Random,
}

impl From<PitPolicy> for PolicyKind {
    fn from(policy: PitPolicy) -> Self {
        match policy {
            PitPolicy::Persistent => PolicyKind::Persistent,
            PitPolicy::Lru => PolicyKind::Lru,
            PitPolicy::Random => PolicyKind::Random,
        }
    }
}

impl FromStr for PitPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "persistent" => Ok(PitPolicy::Persistent),
            "lru" => Ok(PitPolicy::Lru),
            "random" => Ok(PitPolicy::Random),
            other => Err(Error::Config(format!("unknown PIT policy '{}'", other))),
        }
    }
}

/// Eviction discipline for the content store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CsPolicy {
    #[default]
    Lru,
    Random,
    Fifo,
}

impl From<CsPolicy> for PolicyKind {
    fn from(policy: CsPolicy) -> Self {
        match policy {
            CsPolicy::Lru => PolicyKind::Lru,
            CsPolicy::Random => PolicyKind::Random,
            CsPolicy::Fifo => PolicyKind::Fifo,
        }
    }
}

impl FromStr for CsPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "lru" => Ok(CsPolicy::Lru),
            "random" => Ok(CsPolicy::Random),
            "fifo" => Ok(CsPolicy::Fifo),
            other => Err(Error::Config(format!("unknown CS policy '{}'", other))),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "flooding" => Ok(StrategyKind::Flooding),
            other => Err(Error::Config(format!("unknown strategy '{}'", other))),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cs_max_size() -> usize {
    100
}

/// Everything a forwarding stack can be configured with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwarderConfig {
    /// Cache overheard data that have not been requested.
    #[serde(default)]
    pub cache_unsolicited_data: bool,

    /// Treat repeated non-duplicate Interests from one face as
    /// retransmissions.
    #[serde(default = "default_true")]
    pub detect_retransmissions: bool,

    /// Maximum number of PIT entries; 0 leaves the table unbounded.
    #[serde(default)]
    pub pit_max_size: usize,

    #[serde(default)]
    pub pit_policy: PitPolicy,

    /// Maximum number of cached Content Objects.
    #[serde(default = "default_cs_max_size")]
    pub cs_max_size: usize,

    #[serde(default)]
    pub cs_policy: CsPolicy,

    #[serde(default)]
    pub strategy: StrategyKind,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            cache_unsolicited_data: false,
            detect_retransmissions: true,
            pit_max_size: 0,
            pit_policy: PitPolicy::default(),
            cs_max_size: default_cs_max_size(),
            cs_policy: CsPolicy::default(),
            strategy: StrategyKind::default(),
        }
    }
}

impl ForwarderConfig {
    pub fn build_pit(&self) -> Pit {
        Pit::new(make_policy(self.pit_policy.into(), self.pit_max_size))
    }

    pub fn build_cs(&self) -> ContentStore {
        ContentStore::new(make_policy(self.cs_policy.into(), self.cs_max_size))
    }

    pub fn build_strategy(&self) -> ForwardingStrategy {
        let mut strategy = ForwardingStrategy::new(self.strategy);
        strategy.cache_unsolicited_data = self.cache_unsolicited_data;
        strategy.detect_retransmissions = self.detect_retransmissions;
        strategy
    }
}

/// Link parameters used to size leaky buckets on new faces.
///
/// `max_interests_per_sec = bitrate / 8 / (avg_content + avg_interest)`;
/// the bucket maximum is one bandwidth-delay product worth of Interests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkLimits {
    pub avg_rtt: Duration,
    pub avg_interest_size: usize,
    pub avg_content_size: usize,
}

impl Default for LinkLimits {
    fn default() -> Self {
        Self {
            avg_rtt: Duration::from_millis(100),
            avg_interest_size: 40,
            avg_content_size: 1100,
        }
    }
}

impl LinkLimits {
    /// Interests per second the link can carry at `bitrate` bits/s.
    pub fn max_interests_per_sec(&self, bitrate: f64) -> f64 {
        bitrate / 8.0 / (self.avg_content_size + self.avg_interest_size) as f64
    }

    /// Bucket depth: one BDP expressed in Interest packets.
    pub fn bucket_max(&self, bitrate: f64) -> f64 {
        self.avg_rtt.as_secs_f64() * self.max_interests_per_sec(bitrate)
    }
}
