//! Core world model for Pathweaver: entities, placeholders, resolution, and
//! structural validation.
//!
//! This crate knows nothing about content files. Build a [`World`] by hand
//! or let `pw-content` load one from a directory of JSON documents.

/// Cards, exchanges, and obligations.
pub mod card;
/// Categorical attribute types shared by every entity kind.
pub mod component;
/// Identifiers, kinds, and the [`Entity`] trait.
pub mod entity;
/// Error types used throughout the crate.
pub mod error;
/// Venues and locations.
pub mod location;
/// Non-player characters.
pub mod npc;
/// Categorical entity search with deterministic tie-breaks.
pub mod query;
/// Real/skeleton bookkeeping and the fallback report.
pub mod registry;
/// Routes and reverse-route derivation.
pub mod route;
/// Deterministic placeholder synthesis.
pub mod skeleton;
/// Post-load structural checks.
pub mod validate;
/// The central world model.
pub mod world;

/// Re-export entity types.
pub use card::{Card, Exchange, Obligation};
/// Re-export identifier and kind types.
pub use entity::{Entity, EntityId, EntityKind, SkeletonInfo};
/// Re-export error types.
pub use error::{CoreError, CoreResult};
/// Re-export spatial types.
pub use location::{Location, Venue};
/// Re-export character type.
pub use npc::Npc;
/// Re-export resolver types.
pub use query::{EntityResolver, PlacementFilter, SelectionStrategy};
/// Re-export registry types.
pub use registry::{FallbackReport, IdentifierRegistry, SkeletonKey, Status};
/// Re-export route types.
pub use route::{Route, derive_reverse};
/// Re-export validation types.
pub use validate::{StructuralError, ValidationReport, Violation, validate};
/// Re-export world model types.
pub use world::{GameRules, PlayerState, World, WorldMeta};
