//! Two-part identities naming maps: an owning entity plus a purpose.
//!
//! Equality is exact string equality per part. Two absent parts compare
//! equal; an absent part never equals a present one.

use std::fmt;

#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Identity {
    owner: Option<Box<str>>,
    purpose: Option<Box<str>>,
}

impl Identity {
    /// Composite identity, e.g. `Identity::new("nvme0n1", "start_time")`.
    pub fn new(owner: impl Into<String>, purpose: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into().into_boxed_str()),
            purpose: Some(purpose.into().into_boxed_str()),
        }
    }

    /// Single-string identity; only the first part is present.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            owner: Some(name.into().into_boxed_str()),
            purpose: None,
        }
    }

    /// Build from optional parts.
    pub fn from_parts(owner: Option<&str>, purpose: Option<&str>) -> Self {
        Self {
            owner: owner.map(Into::into),
            purpose: purpose.map(Into::into),
        }
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn purpose(&self) -> Option<&str> {
        self.purpose.as_deref()
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Identity::named(s)
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Identity::named(s)
    }
}

impl From<(&str, &str)> for Identity {
    fn from((owner, purpose): (&str, &str)) -> Self {
        Identity::new(owner, purpose)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.owner(), self.purpose()) {
            (Some(o), Some(p)) => write!(f, "{o:?}/{p:?}"),
            (Some(o), None) => write!(f, "{o:?}"),
            (None, Some(p)) => write!(f, "-/{p:?}"),
            (None, None) => f.write_str("-"),
        }
    }
}
