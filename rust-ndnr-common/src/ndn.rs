//! NDN packet types and structures.
//!
//! This module provides the core data structures that represent NDN names
//! and packets inside the rust-ndnr node. Wire encoding and decoding is the
//! business of an external codec; the forwarding plane only ever sees the
//! structured forms defined here.

use crate::error::Error;
use crate::types::Timestamp;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Maximum length of an NDN name component.
pub const MAX_NAME_COMPONENT_LENGTH: usize = 255;

/// Maximum number of components in an NDN name.
pub const MAX_NAME_COMPONENTS: usize = 16;

/// Interest lifetime used when the consumer does not specify one.
pub const DEFAULT_INTEREST_LIFETIME: Duration = Duration::from_millis(4000);

/// Represents an NDN name component.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NameComponent(pub Bytes);

impl NameComponent {
    /// Creates a new name component from a byte slice.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Returns the component as bytes.
    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Print printable ASCII characters directly, otherwise use hex
        let mut printable = true;
        for &b in self.0.iter() {
            if !b.is_ascii_graphic() && b != b' ' {
                printable = false;
                break;
            }
        }

        if printable {
            write!(f, "{}", String::from_utf8_lossy(&self.0))
        } else {
            write!(f, "0x")?;
            for &b in self.0.iter() {
                write!(f, "{:02x}", b)?;
            }
            Ok(())
        }
    }
}

/// Represents an NDN name, which is a sequence of name components.
///
/// Equality and ordering are componentwise lexicographic, so a name sorts
/// directly before every name it is a prefix of.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Name {
    components: Vec<NameComponent>,
}

impl Name {
    /// Creates a new empty NDN name.
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Creates a name from a string representation with '/' as component separator.
    pub fn from_string(s: &str) -> Result<Self, Error> {
        let components: Vec<NameComponent> = s
            .split('/')
            .filter(|comp| !comp.is_empty())
            .map(|comp| NameComponent::new(comp.as_bytes().to_vec()))
            .collect();

        if components.len() > MAX_NAME_COMPONENTS {
            return Err(Error::NdnPacket(format!(
                "name has {} components, maximum is {}",
                components.len(),
                MAX_NAME_COMPONENTS
            )));
        }
        if let Some(c) = components
            .iter()
            .find(|c| c.as_bytes().len() > MAX_NAME_COMPONENT_LENGTH)
        {
            return Err(Error::NdnPacket(format!(
                "name component of {} bytes exceeds maximum of {}",
                c.as_bytes().len(),
                MAX_NAME_COMPONENT_LENGTH
            )));
        }

        Ok(Self { components })
    }

    /// Adds a component to the name.
    pub fn push(&mut self, component: NameComponent) -> &mut Self {
        self.components.push(component);
        self
    }

    /// Returns a copy of this name with one more component appended.
    pub fn appending(&self, component: impl Into<Bytes>) -> Self {
        let mut name = self.clone();
        name.push(NameComponent::new(component));
        name
    }

    /// Returns the number of components in the name.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns true if the name has no components.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns an iterator over the name components.
    pub fn components(&self) -> impl Iterator<Item = &NameComponent> {
        self.components.iter()
    }

    /// Gets a component at the specified index.
    pub fn get(&self, index: usize) -> Option<&NameComponent> {
        self.components.get(index)
    }

    /// Returns a prefix of this name with the specified length.
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            components: self.components.iter().take(len).cloned().collect(),
        }
    }

    /// Checks if this name is a prefix of another name.
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        if self.len() > other.len() {
            return false;
        }

        for (i, component) in self.components.iter().enumerate() {
            if component != &other.components[i] {
                return false;
            }
        }

        true
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }

        for component in &self.components {
            write!(f, "/{}", component)?;
        }

        Ok(())
    }
}

/// Kind of negative acknowledgement an Interest may carry.
///
/// Carried by the forwarding plane, never acted upon by it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum NackType {
    #[default]
    Normal = 0,
    Loop = 1,
    Congestion = 2,
}

/// Header of an NDN Interest packet.
///
/// Only `name`, `locator`, `nonce`, `lifetime` and `agent` are interpreted
/// by the forwarding plane; scope and the selector fields are preserved for
/// downstream modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestHeader {
    /// The name requested in the Interest.
    pub name: Name,

    /// Locator towards a mobile producer; when present, forwarding resolves
    /// routes against the locator instead of the content name.
    pub locator: Option<Name>,

    /// A nonce value to detect looping Interests.
    pub nonce: u32,

    /// How long a PIT entry for this Interest stays alive.
    pub lifetime: Duration,

    /// Scope restriction, -1 when unrestricted.
    pub scope: i8,

    pub min_suffix_components: i32,
    pub max_suffix_components: i32,
    pub exclude: Option<Name>,
    pub child_selector: bool,
    pub answer_origin_kind: bool,

    pub nack_type: NackType,

    /// Mobility agent marker, rewritten by the Flooding strategy on relay.
    pub agent: i8,
}

impl InterestHeader {
    /// Creates a new Interest header for `name` with default field values.
    pub fn new(name: Name) -> Self {
        Self {
            name,
            locator: None,
            nonce: 0,
            lifetime: DEFAULT_INTEREST_LIFETIME,
            scope: -1,
            min_suffix_components: -1,
            max_suffix_components: -1,
            exclude: None,
            child_selector: false,
            answer_origin_kind: false,
            nack_type: NackType::Normal,
            agent: 0,
        }
    }

    /// Sets the nonce value.
    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = nonce;
        self
    }

    /// Sets the Interest lifetime.
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Sets the locator name.
    pub fn with_locator(mut self, locator: Name) -> Self {
        self.locator = Some(locator);
        self
    }

    /// Sets the agent marker.
    pub fn with_agent(mut self, agent: i8) -> Self {
        self.agent = agent;
        self
    }

    /// True when a non-empty locator is attached.
    pub fn has_locator(&self) -> bool {
        self.locator.as_ref().map_or(false, |l| !l.is_empty())
    }
}

/// Signing metadata of a Content Object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignedInfo {
    pub timestamp: Timestamp,
}

/// Opaque signature bits of a Content Object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub signature_bits: u32,
}

/// Header of an NDN Content Object packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentObjectHeader {
    /// The name of the Content Object.
    pub name: Name,

    /// Locator of the producer that answered, if it advertises one.
    pub locator: Option<Name>,

    /// Producer position marker, -1 when the Interest carried no locator.
    pub position: i8,

    pub signed_info: SignedInfo,
    pub signature: Signature,
}

impl ContentObjectHeader {
    /// Creates a new Content Object header for `name` with default fields.
    pub fn new(name: Name) -> Self {
        Self {
            name,
            locator: None,
            position: -1,
            signed_info: SignedInfo::default(),
            signature: Signature::default(),
        }
    }

    pub fn with_locator(mut self, locator: Name) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn with_position(mut self, position: i8) -> Self {
        self.position = position;
        self
    }

    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.signed_info.timestamp = timestamp;
        self
    }

    pub fn with_signature_bits(mut self, signature_bits: u32) -> Self {
        self.signature.signature_bits = signature_bits;
        self
    }
}

/// A packet travelling between faces: either an Interest or a Content
/// Object carrying its payload bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    Interest(InterestHeader),
    Data {
        header: ContentObjectHeader,
        payload: Bytes,
    },
}

impl Packet {
    /// The name the packet is addressed by.
    pub fn name(&self) -> &Name {
        match self {
            Packet::Interest(header) => &header.name,
            Packet::Data { header, .. } => &header.name,
        }
    }

    pub fn is_interest(&self) -> bool {
        matches!(self, Packet::Interest(_))
    }

    pub fn as_interest(&self) -> Option<&InterestHeader> {
        match self {
            Packet::Interest(header) => Some(header),
            Packet::Data { .. } => None,
        }
    }

    pub fn as_data(&self) -> Option<(&ContentObjectHeader, &Bytes)> {
        match self {
            Packet::Interest(_) => None,
            Packet::Data { header, payload } => Some((header, payload)),
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Packet::Interest(header) => {
                write!(f, "Interest({}, nonce={})", header.name, header.nonce)
            }
            Packet::Data { header, payload } => {
                write!(f, "Data({}, {} bytes)", header.name, payload.len())
            }
        }
    }
}

#[cfg(test)]
mod tests;
