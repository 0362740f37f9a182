//! NDN packet types and structures.
//!
//! This module provides the names, Interests and Data packets that flow
//! through the PIT-CS composite table, together with the matching rule that
//! decides whether a Data packet can satisfy an Interest.

use crate::error::Error;
use crate::tlv::{self, TlvElement};
use bytes::{Buf, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};


/// Maximum length of an NDN name component.
pub const MAX_NAME_COMPONENT_LENGTH: usize = 255;

/// Maximum size of an NDN packet.
pub const MAX_NDN_PACKET_SIZE: usize = 8800;

/// Length of an implicit SHA-256 digest.
pub const IMPLICIT_DIGEST_LENGTH: usize = 32;

/// Length of an encoded implicit digest component (type, length, value).
pub const IMPLICIT_DIGEST_SIZE: usize = 2 + IMPLICIT_DIGEST_LENGTH;

const DIGEST_URI_PREFIX: &str = "sha256digest=";

/// Represents an NDN name component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameComponent {
    tlv_type: u8,
    value: Bytes,
}

impl NameComponent {
    /// Creates a new generic name component from a byte slice.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            tlv_type: tlv::TLV_COMPONENT,
            value: bytes.into(),
        }
    }

    /// Creates an implicit SHA-256 digest component.
    pub fn implicit_digest(digest: [u8; IMPLICIT_DIGEST_LENGTH]) -> Self {
        Self {
            tlv_type: tlv::TLV_IMPLICIT_DIGEST,
            value: Bytes::copy_from_slice(&digest),
        }
    }

    /// Returns the component value as bytes.
    pub fn as_bytes(&self) -> &Bytes {
        &self.value
    }

    /// Returns the TLV type of this component.
    pub fn tlv_type(&self) -> u8 {
        self.tlv_type
    }

    /// Whether this is an implicit SHA-256 digest component.
    pub fn is_implicit_digest(&self) -> bool {
        self.tlv_type == tlv::TLV_IMPLICIT_DIGEST
    }

    /// Encodes this name component as a TLV element.
    pub fn to_tlv(&self) -> TlvElement {
        TlvElement::new(self.tlv_type, self.value.clone())
    }

    /// Decodes a name component from a TLV element.
    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        match element.tlv_type {
            tlv::TLV_COMPONENT => Ok(Self::new(element.value.clone())),
            tlv::TLV_IMPLICIT_DIGEST if element.value.len() == IMPLICIT_DIGEST_LENGTH => Ok(Self {
                tlv_type: tlv::TLV_IMPLICIT_DIGEST,
                value: element.value.clone(),
            }),
            tlv::TLV_IMPLICIT_DIGEST => Err(Error::NdnPacket(format!(
                "Implicit digest component must be {} bytes, got {}",
                IMPLICIT_DIGEST_LENGTH,
                element.value.len()
            ))),
            other => Err(Error::NdnPacket(format!(
                "Expected name component TLV type {}, got {}",
                tlv::TLV_COMPONENT, other
            ))),
        }
    }

    fn parse_uri(comp: &str) -> Self {
        if let Some(hex) = comp.strip_prefix(DIGEST_URI_PREFIX) {
            if let Some(digest) = parse_digest_hex(hex) {
                return Self::implicit_digest(digest);
            }
        }
        Self::new(comp.as_bytes().to_vec())
    }
}

fn parse_digest_hex(hex: &str) -> Option<[u8; IMPLICIT_DIGEST_LENGTH]> {
    if hex.len() != IMPLICIT_DIGEST_LENGTH * 2 {
        return None;
    }
    let mut out = [0u8; IMPLICIT_DIGEST_LENGTH];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let s = std::str::from_utf8(chunk).ok()?;
        out[i] = u8::from_str_radix(s, 16).ok()?;
    }
    Some(out)
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_implicit_digest() {
            write!(f, "{}", DIGEST_URI_PREFIX)?;
            for &b in self.value.iter() {
                write!(f, "{:02x}", b)?;
            }
            return Ok(());
        }

        // Print printable ASCII characters directly, otherwise use hex
        let printable = self.value.iter().all(|&b| b.is_ascii_graphic() || b == b' ');
        if printable {
            write!(f, "{}", String::from_utf8_lossy(&self.value))
        } else {
            write!(f, "0x")?;
            for &b in self.value.iter() {
                write!(f, "{:02x}", b)?;
            }
            Ok(())
        }
    }
}

/// Represents an NDN name, which is a sequence of name components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
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
    ///
    /// A component written as `sha256digest=<64 hex digits>` becomes an
    /// implicit digest component.
    pub fn from_string(s: &str) -> Self {
        let components = s
            .split('/')
            .filter(|comp| !comp.is_empty())
            .map(NameComponent::parse_uri)
            .collect();

        Self { components }
    }

    /// Adds a component to the name.
    pub fn push(&mut self, component: NameComponent) -> &mut Self {
        self.components.push(component);
        self
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
        self.len() <= other.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| a == b)
    }

    /// Whether the last component is an implicit digest component.
    pub fn has_digest_comp(&self) -> bool {
        self.components
            .last()
            .map(NameComponent::is_implicit_digest)
            .unwrap_or(false)
    }

    /// Returns a copy of this name with the implicit digest appended.
    pub fn with_digest(&self, digest: [u8; IMPLICIT_DIGEST_LENGTH]) -> Self {
        let mut name = self.clone();
        name.push(NameComponent::implicit_digest(digest));
        name
    }

    /// Encodes the components without the outer Name TLV header.
    pub fn encode_value(&self) -> Bytes {
        let mut buf = BytesMut::new();
        for component in &self.components {
            component.to_tlv().encode(&mut buf);
        }
        buf.freeze()
    }

    /// Encodes this name as a TLV element.
    pub fn to_tlv(&self) -> TlvElement {
        TlvElement::new(tlv::TLV_NAME, self.encode_value())
    }

    /// Decodes a name from a TLV element.
    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_NAME {
            return Err(Error::NdnPacket(format!(
                "Expected name TLV type {}, got {}",
                tlv::TLV_NAME, element.tlv_type
            )));
        }

        let mut components = Vec::new();
        let mut buf = element.value.clone();

        while buf.has_remaining() {
            let element = TlvElement::decode(&mut buf)?;
            components.push(NameComponent::from_tlv(&element)?);
        }

        Ok(Self { components })
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

impl Default for Name {
    fn default() -> Self {
        Self::new()
    }
}

/// Represents an NDN Interest packet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interest {
    /// The name requested in the Interest.
    pub name: Name,

    /// A nonce value to prevent looping.
    pub nonce: u32,

    /// Interest lifetime in milliseconds.
    pub lifetime_ms: u32,

    /// Hop limit (similar to IP TTL).
    pub hop_limit: Option<u8>,

    /// Whether a Data whose name extends the Interest name may satisfy it.
    pub can_be_prefix: bool,

    /// Whether only fresh Data may satisfy the Interest.
    pub must_be_fresh: bool,

    /// Forwarding hint, part of the PIT key when present.
    pub forwarding_hint: Option<Name>,
}

impl Interest {
    /// Creates a new Interest packet.
    pub fn new(name: Name) -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_secs(0));

        let nonce = (now.as_millis() % u32::MAX as u128) as u32;

        Self {
            name,
            nonce,
            lifetime_ms: 4000, // Default 4 seconds
            hop_limit: Some(32),
            can_be_prefix: false,
            must_be_fresh: false,
            forwarding_hint: None,
        }
    }

    /// Sets the Interest lifetime.
    pub fn with_lifetime(mut self, lifetime_ms: u32) -> Self {
        self.lifetime_ms = lifetime_ms;
        self
    }

    /// Sets the nonce value.
    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = nonce;
        self
    }

    /// Sets the can_be_prefix flag.
    pub fn with_can_be_prefix(mut self, can_be_prefix: bool) -> Self {
        self.can_be_prefix = can_be_prefix;
        self
    }

    /// Sets the must_be_fresh flag.
    pub fn with_must_be_fresh(mut self, must_be_fresh: bool) -> Self {
        self.must_be_fresh = must_be_fresh;
        self
    }

    /// Sets the forwarding hint.
    pub fn with_forwarding_hint(mut self, hint: Name) -> Self {
        self.forwarding_hint = Some(hint);
        self
    }
}

/// Outcome of matching a Data packet against an Interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSatisfy {
    /// The Data satisfies the Interest.
    Yes,
    /// The Data cannot satisfy the Interest.
    No,
    /// The answer depends on the implicit digest, which is not computed yet.
    NeedDigest,
}

/// The parts of a Data packet needed to match it against Interests.
///
/// A CS entry keeps this even after its payload has been moved to disk.
#[derive(Debug, Clone)]
pub struct DataMeta {
    pub name: Name,
    pub freshness_period_ms: u32,
    pub digest: Option<[u8; IMPLICIT_DIGEST_LENGTH]>,
    pub arrival: Instant,
    pub wire_len: usize,
}

impl DataMeta {
    /// Decide whether a Data with this metadata can satisfy `interest`.
    ///
    /// Freshness here is only the static FreshnessPeriod=0 rule; staleness
    /// against the clock is [`DataMeta::is_fresh`].
    pub fn can_satisfy(&self, interest: &Interest) -> DataSatisfy {
        if interest.must_be_fresh && self.freshness_period_ms == 0 {
            return DataSatisfy::No;
        }

        if interest.name.has_digest_comp() {
            return self.can_satisfy_digest(interest);
        }

        let matched = if interest.can_be_prefix {
            interest.name.is_prefix_of(&self.name)
        } else {
            interest.name == self.name
        };
        if matched {
            DataSatisfy::Yes
        } else {
            DataSatisfy::No
        }
    }

    fn can_satisfy_digest(&self, interest: &Interest) -> DataSatisfy {
        if interest.name.len() != self.name.len() + 1 || !self.name.is_prefix_of(&interest.name) {
            return DataSatisfy::No;
        }

        let Some(digest) = self.digest else {
            return DataSatisfy::NeedDigest;
        };

        match interest.name.get(self.name.len()) {
            Some(comp) if comp.as_bytes().as_ref() == digest.as_slice() => DataSatisfy::Yes,
            _ => DataSatisfy::No,
        }
    }

    /// Whether the Data is still fresh at `now`.
    pub fn is_fresh(&self, now: Instant) -> bool {
        self.freshness_period_ms > 0
            && now < self.arrival + Duration::from_millis(self.freshness_period_ms as u64)
    }
}

/// Represents an NDN Data packet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Data {
    /// The name of the Data packet.
    pub name: Name,

    /// The content of the Data packet.
    pub content: Bytes,

    /// FreshnessPeriod in milliseconds; zero means never fresh.
    pub freshness_period_ms: u32,

    /// Implicit SHA-256 digest, filled in by the digest pipeline.
    #[serde(skip)]
    pub digest: Option<[u8; IMPLICIT_DIGEST_LENGTH]>,

    /// When this Data packet arrived.
    #[serde(skip, default = "Instant::now")]
    pub arrival: Instant,
}

impl Data {
    /// Creates a new Data packet.
    pub fn new(name: Name, content: impl Into<Bytes>) -> Self {
        Self {
            name,
            content: content.into(),
            freshness_period_ms: 10000, // Default 10 seconds
            digest: None,
            arrival: Instant::now(),
        }
    }

    /// Sets the FreshnessPeriod.
    pub fn with_freshness(mut self, freshness_period_ms: u32) -> Self {
        self.freshness_period_ms = freshness_period_ms;
        self
    }

    /// Sets the implicit digest.
    pub fn with_digest(mut self, digest: [u8; IMPLICIT_DIGEST_LENGTH]) -> Self {
        self.digest = Some(digest);
        self
    }

    /// Sets the arrival time.
    pub fn with_arrival(mut self, arrival: Instant) -> Self {
        self.arrival = arrival;
        self
    }

    /// Matching metadata for this packet.
    pub fn meta(&self) -> DataMeta {
        DataMeta {
            name: self.name.clone(),
            freshness_period_ms: self.freshness_period_ms,
            digest: self.digest,
            arrival: self.arrival,
            wire_len: self.wire_size(),
        }
    }

    /// Decide whether this Data can satisfy `interest`.
    pub fn can_satisfy(&self, interest: &Interest) -> DataSatisfy {
        self.meta().can_satisfy(interest)
    }

    fn body(&self) -> BytesMut {
        let mut body = BytesMut::new();
        self.name.to_tlv().encode(&mut body);

        let mut meta = BytesMut::new();
        TlvElement::new(tlv::TLV_FRESHNESS_PERIOD, tlv::encode_nni(self.freshness_period_ms as u64))
            .encode(&mut meta);
        TlvElement::new(tlv::TLV_META_INFO, meta.freeze()).encode(&mut body);

        TlvElement::new(tlv::TLV_CONTENT, self.content.clone()).encode(&mut body);

        let mut sig_info = BytesMut::new();
        TlvElement::new(tlv::TLV_SIGNATURE_TYPE, tlv::encode_nni(0)).encode(&mut sig_info);
        TlvElement::new(tlv::TLV_SIGNATURE_INFO, sig_info.freeze()).encode(&mut body);
        TlvElement::new(tlv::TLV_SIGNATURE_VALUE, Bytes::from_static(&[0u8; 32])).encode(&mut body);
        body
    }

    /// Encodes this Data packet into its wire format.
    pub fn to_wire(&self) -> Bytes {
        let mut buf = BytesMut::new();
        TlvElement::new(tlv::TLV_DATA, self.body().freeze()).encode(&mut buf);
        buf.freeze()
    }

    /// Returns the exact wire format size of this Data when encoded.
    pub fn wire_size(&self) -> usize {
        let body = self.body().len();
        1 + tlv::tlv_length_size(body) + body
    }

    /// Parses a Data packet that occupies exactly `wire`.
    pub fn from_wire(wire: &[u8]) -> Result<Self, Error> {
        let mut buf = Bytes::copy_from_slice(wire);
        let outer = TlvElement::decode(&mut buf)?;
        if outer.tlv_type != tlv::TLV_DATA {
            return Err(Error::NdnPacket(format!(
                "Expected Data TLV type {}, got {}",
                tlv::TLV_DATA, outer.tlv_type
            )));
        }
        if buf.has_remaining() {
            return Err(Error::NdnPacket(format!(
                "{} trailing bytes after Data packet",
                buf.remaining()
            )));
        }

        let mut name = None;
        let mut content = Bytes::new();
        let mut freshness_period_ms = 0;
        for element in outer.children()? {
            match element.tlv_type {
                tlv::TLV_NAME => name = Some(Name::from_tlv(&element)?),
                tlv::TLV_META_INFO => {
                    for field in element.children()? {
                        if field.tlv_type == tlv::TLV_FRESHNESS_PERIOD {
                            freshness_period_ms = tlv::decode_nni(&field.value)?.min(u32::MAX as u64) as u32;
                        }
                    }
                }
                tlv::TLV_CONTENT => content = element.value,
                tlv::TLV_SIGNATURE_INFO | tlv::TLV_SIGNATURE_VALUE => {}
                other => log::trace!("Skipping unknown Data element type {}", other),
            }
        }

        let name = name.ok_or_else(|| Error::NdnPacket("Data has no Name".into()))?;
        Ok(Self {
            name,
            content,
            freshness_period_ms,
            digest: None,
            arrival: Instant::now(),
        })
    }
}
