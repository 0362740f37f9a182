//! Composite key of a PCC entry.

use bytes::Bytes;
use rust_udcn_common::ndn::{Interest, Name};
use std::fmt;

/// Key of a PCC entry: the encoded name plus the encoded forwarding hint.
///
/// Two keys are equal iff both byte sequences are equal.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PccKey {
    name: Bytes,
    hint: Bytes,
}

impl PccKey {
    /// Key for a name without forwarding hint.
    pub fn from_name(name: &Name) -> Self {
        Self {
            name: name.encode_value(),
            hint: Bytes::new(),
        }
    }

    /// Key for a name qualified by an optional forwarding hint.
    pub fn with_hint(name: &Name, hint: Option<&Name>) -> Self {
        Self {
            name: name.encode_value(),
            hint: hint.map(Name::encode_value).unwrap_or_default(),
        }
    }

    /// Key under which an Interest is tracked.
    pub fn from_interest(interest: &Interest) -> Self {
        Self::with_hint(&interest.name, interest.forwarding_hint.as_ref())
    }

    /// Whether the name part of this key encodes `name`.
    pub fn matches_name(&self, name: &Name) -> bool {
        self.name == name.encode_value()
    }

    /// Whether the key carries a forwarding hint.
    pub fn has_hint(&self) -> bool {
        !self.hint.is_empty()
    }
}

impl fmt::Debug for PccKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PccKey(name={}B", self.name.len())?;
        if self.has_hint() {
            write!(f, ", hint={}B", self.hint.len())?;
        }
        write!(f, ")")
    }
}
