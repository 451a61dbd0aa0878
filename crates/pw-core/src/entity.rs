use std::borrow::Borrow;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::world::{World, WorldIndex};

/// Author-chosen identifier. Unique per [`EntityKind`], not across kinds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Wrap an identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as written by the author.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The kinds of entity a content document can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A spatial container holding locations.
    Venue,
    /// A place inside a venue.
    Location,
    /// A non-player character.
    Npc,
    /// A playable card.
    Card,
    /// A trade offered by a character.
    Exchange,
    /// A task the player can take on.
    Obligation,
    /// A directed travel connection between two locations.
    Route,
}

impl EntityKind {
    /// Every kind, in application order.
    pub const ALL: [EntityKind; 7] = [
        Self::Venue,
        Self::Location,
        Self::Card,
        Self::Npc,
        Self::Exchange,
        Self::Obligation,
        Self::Route,
    ];

    /// Parse a kind name, accepting common aliases.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "venue" | "venues" => Some(Self::Venue),
            "location" | "locations" => Some(Self::Location),
            "npc" | "npcs" | "character" | "characters" => Some(Self::Npc),
            "card" | "cards" => Some(Self::Card),
            "exchange" | "exchanges" => Some(Self::Exchange),
            "obligation" | "obligations" | "request" | "requests" => Some(Self::Obligation),
            "route" | "routes" => Some(Self::Route),
            _ => None,
        }
    }

    /// Whether this kind only connects entities of other kinds.
    pub fn is_relationship(self) -> bool {
        matches!(self, Self::Route)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Venue => write!(f, "venue"),
            Self::Location => write!(f, "location"),
            Self::Npc => write!(f, "npc"),
            Self::Card => write!(f, "card"),
            Self::Exchange => write!(f, "exchange"),
            Self::Obligation => write!(f, "obligation"),
            Self::Route => write!(f, "route"),
        }
    }
}

/// Marks a synthesized placeholder and records which reference created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkeletonInfo {
    /// Human-readable reason, e.g. `location of npc 'smith' in package 'core_people'`.
    pub source: String,
}

impl SkeletonInfo {
    /// Create skeleton info from a reason string.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// A foreign key held by an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Kind of the referenced entity.
    pub kind: EntityKind,
    /// ID of the referenced entity.
    pub id: EntityId,
    /// Field that holds the reference, for error and skeleton messages.
    pub field: &'static str,
}

impl Reference {
    /// Create a reference.
    pub fn new(kind: EntityKind, id: &EntityId, field: &'static str) -> Self {
        Self {
            kind,
            id: id.clone(),
            field,
        }
    }
}

/// Common behaviour of every domain entity stored in a [`World`].
///
/// Each implementor owns one table in the world. `index`/`unindex` keep the
/// world's secondary indexes in sync, `absorb` moves runtime state off a
/// skeleton that is being replaced, and `retire` lets a kind clean up after
/// the replaced skeleton is gone.
pub trait Entity: Clone + fmt::Debug + Sized {
    /// The kind this type represents.
    const KIND: EntityKind;

    /// Author-chosen identifier.
    fn id(&self) -> &EntityId;

    /// Display name.
    fn name(&self) -> &str;

    /// Set when this entity is a placeholder.
    fn skeleton(&self) -> Option<&SkeletonInfo>;

    /// Whether this entity is a placeholder.
    fn is_skeleton(&self) -> bool {
        self.skeleton().is_some()
    }

    /// Every foreign ID this entity points at.
    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }

    /// Take over runtime state accumulated on `placeholder`.
    fn absorb(&mut self, _placeholder: &mut Self) {}

    /// Called after `placeholder` has been replaced and removed.
    fn retire(_placeholder: &Self, _world: &mut World) {}

    /// The world table holding entities of this kind.
    fn table(world: &World) -> &IndexMap<EntityId, Self>;

    /// Mutable access to the world table holding entities of this kind.
    fn table_mut(world: &mut World) -> &mut IndexMap<EntityId, Self>;

    /// Add this entity to the world's secondary indexes.
    fn index(&self, _index: &mut WorldIndex) {}

    /// Remove this entity from the world's secondary indexes.
    fn unindex(&self, _index: &mut WorldIndex) {}
}
