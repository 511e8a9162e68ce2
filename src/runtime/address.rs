//! Actor addresses.

use std::fmt;

/// Text used when an optional address is missing.
pub const NIL_ADDRESS: &str = "address nil";

/// An immutable two-part identity of an actor.
///
/// The `area` groups related actors (it is what [broadcasts](super::Registry::broadcast)
/// can be filtered by), while the `id` names a single actor within the area.
/// The canonical string form is `area.id`, which is also the key under which
/// the actor is stored in a [Registry](super::Registry).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    area: String,
    id: String,
}

impl Address {
    /// Builds an address. Empty parts are accepted here but refused by
    /// [Registry::register](super::Registry::register).
    pub fn new(area: impl Into<String>, id: impl Into<String>) -> Address {
        Address {
            area: area.into(),
            id: id.into(),
        }
    }

    /// The group the actor belongs to.
    pub fn area(&self) -> &str {
        &self.area
    }

    /// The actor's name within its area.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the actor lives in `area`.
    pub fn is_same_area(&self, area: &str) -> bool {
        self.area == area
    }

    /// Only addresses with both parts non-empty can be registered.
    pub fn is_valid(&self) -> bool {
        !self.area.is_empty() && !self.id.is_empty()
    }

    /// Registry key of this address.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.area, self.id)
    }
}

/// Formats an optional address, falling back to [NIL_ADDRESS].
pub fn display_address(address: Option<&Address>) -> String {
    match address {
        Some(address) => address.to_string(),
        None => NIL_ADDRESS.to_owned(),
    }
}
