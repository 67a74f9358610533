//! Error types for the rust-ndnr node.

use thiserror::Error;

use crate::ndn::Name;
use crate::types::FaceId;

/// All possible errors that can occur within the rust-ndnr node.
#[derive(Error, Debug)]
pub enum Error {
    /// Error related to NDN packet contents or name parsing.
    #[error("NDN packet error: {0}")]
    NdnPacket(String),

    /// No FIB entry matched the looked-up name.
    #[error("no route towards {0}")]
    NoRoute(Name),

    /// The PIT replacement policy rejected a new entry.
    #[error("PIT admission rejected for {0}")]
    PitAdmission(Name),

    /// A face identifier did not resolve to a live face.
    #[error("unknown face {0}")]
    FaceNotFound(FaceId),

    /// A forwarding stack was installed on a node that already has one.
    #[error("node already carries a forwarding stack")]
    AlreadyInstalled,

    /// Error in the node or application configuration.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Other error: {0}")]
    Other(String),
}
