//! Common types and utilities for the rust-ndnr NDN forwarding node.
//!
//! This crate provides the leaf types shared by the forwarding core and the
//! command line tooling: names, packet headers, identifiers, errors and the
//! forwarder metrics counters.

pub mod ndn;
pub mod types;
pub mod metrics;
pub mod error;

/// Reexport of common types
pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
