//! Entity identity types.
//!
//! An [`Entity`] is a lightweight `u64` identifier with no inherent data.
//! Ids are dense: the registry mints them `0, 1, 2, …` and recycles
//! destroyed ids most-recently-destroyed first.
//!
//! There is no reserved sentinel value. Wherever the engine needs to say
//! "no entity here" — the registry's entity array, a pool slot's owner tag —
//! it stores an [`EntitySlot`] instead, so every `u64` remains a legal id.

use serde::{Deserialize, Serialize};

/// A unique entity identifier.
///
/// Entities are pure identifiers — they carry no data of their own.
/// Components are attached to entities to give them meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(pub u64);

impl Entity {
    /// Create an entity from a raw `u64` identifier.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }

    /// Returns the id as an index into the registry's entity array.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// One slot of entity identity: either a live entity or a destroyed one.
///
/// This is the registry's entity-array element and the owner tag on every
/// pool slot. A slot is `Destroyed` from the moment its entity (or the
/// component occupying it) is destroyed until the id is recycled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntitySlot {
    /// The slot belongs to a live entity.
    Active(Entity),
    /// The slot's entity was destroyed (or the slot was never occupied).
    Destroyed,
}

impl EntitySlot {
    /// Returns `true` if the slot holds a live entity.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active(_))
    }

    /// Returns the live entity, or `None` for a destroyed slot.
    #[must_use]
    pub const fn entity(self) -> Option<Entity> {
        match self {
            Self::Active(entity) => Some(entity),
            Self::Destroyed => None,
        }
    }
}
