use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::component::{HexCoord, LocationProperty, LocationType, VenueType};
use crate::entity::{Entity, EntityId, EntityKind, Reference, SkeletonInfo};
use crate::world::{World, WorldIndex};

// ---------------------------------------------------------------------------
// Venue
// ---------------------------------------------------------------------------

/// A spatial container. Exactly one of its locations is the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    /// Identifier.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Flavour text.
    pub description: String,
    /// Broad character of the venue.
    pub venue_type: VenueType,
    /// District or region the venue belongs to.
    pub district: Option<String>,
    /// Difficulty tier, 1–3.
    pub tier: u8,
    /// Capacity override; the world's rules supply the default.
    pub max_locations: Option<usize>,
    /// Set when this venue is a placeholder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<SkeletonInfo>,
}

impl Venue {
    /// Create a real venue with default attributes.
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>, venue_type: VenueType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            venue_type,
            district: None,
            tier: 1,
            max_locations: None,
            skeleton: None,
        }
    }
}

impl Entity for Venue {
    const KIND: EntityKind = EntityKind::Venue;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn skeleton(&self) -> Option<&SkeletonInfo> {
        self.skeleton.as_ref()
    }

    fn table(world: &World) -> &IndexMap<EntityId, Self> {
        &world.venues
    }

    fn table_mut(world: &mut World) -> &mut IndexMap<EntityId, Self> {
        &mut world.venues
    }
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// Visit bookkeeping accumulated while playing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationState {
    /// How many times the player arrived here.
    pub visit_count: u32,
    /// When the player last arrived.
    pub last_visited: Option<DateTime<Utc>>,
    /// Familiarity earned by investigating, 0–3.
    pub familiarity: u8,
}

/// A place inside a venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Identifier.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Flavour text.
    pub description: String,
    /// The venue containing this location.
    pub venue: EntityId,
    /// What the location physically is.
    pub location_type: LocationType,
    /// Property tags, including the hub marker.
    pub properties: BTreeSet<LocationProperty>,
    /// Difficulty tier, 1–3.
    pub tier: u8,
    /// Position on the travel grid.
    pub position: Option<HexCoord>,
    /// Set when this location is a placeholder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<SkeletonInfo>,
    /// Runtime state.
    #[serde(default)]
    pub state: LocationState,
}

impl Location {
    /// Create a real location with default attributes.
    pub fn new(
        id: impl Into<EntityId>,
        name: impl Into<String>,
        venue: impl Into<EntityId>,
        location_type: LocationType,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            venue: venue.into(),
            location_type,
            properties: BTreeSet::new(),
            tier: 1,
            position: None,
            skeleton: None,
            state: LocationState::default(),
        }
    }

    /// Builder: add a property tag.
    pub fn with_property(mut self, property: LocationProperty) -> Self {
        self.properties.insert(property);
        self
    }

    /// Builder: place on the travel grid.
    pub fn at(mut self, position: HexCoord) -> Self {
        self.position = Some(position);
        self
    }

    /// Whether this location is its venue's hub.
    pub fn is_hub(&self) -> bool {
        self.properties.contains(&LocationProperty::Crossroads)
    }
}

impl Entity for Location {
    const KIND: EntityKind = EntityKind::Location;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn skeleton(&self) -> Option<&SkeletonInfo> {
        self.skeleton.as_ref()
    }

    fn references(&self) -> Vec<Reference> {
        vec![Reference::new(EntityKind::Venue, &self.venue, "venueId")]
    }

    fn absorb(&mut self, placeholder: &mut Self) {
        let earned = std::mem::take(&mut placeholder.state);
        self.state.visit_count += earned.visit_count;
        self.state.familiarity = self.state.familiarity.max(earned.familiarity);
        self.state.last_visited = self.state.last_visited.max(earned.last_visited);
    }

    fn retire(placeholder: &Self, world: &mut World) {
        let venue = &placeholder.venue;
        let orphaned = world.is_skeleton(EntityKind::Venue, venue.as_str())
            && world.locations_in(venue.as_str()).is_empty();
        if orphaned {
            tracing::debug!(venue = %venue, "pruning empty placeholder venue");
            world.remove::<Venue>(venue.as_str());
        }
    }

    fn table(world: &World) -> &IndexMap<EntityId, Self> {
        &world.locations
    }

    fn table_mut(world: &mut World) -> &mut IndexMap<EntityId, Self> {
        &mut world.locations
    }

    fn index(&self, index: &mut WorldIndex) {
        index
            .locations_by_venue
            .entry(self.venue.clone())
            .or_default()
            .push(self.id.clone());
    }

    fn unindex(&self, index: &mut WorldIndex) {
        if let Some(ids) = index.locations_by_venue.get_mut(&self.venue) {
            ids.retain(|id| id != &self.id);
            if ids.is_empty() {
                index.locations_by_venue.remove(&self.venue);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_is_crossroads_property() {
        let square = Location::new("square", "Town Square", "town", LocationType::Square)
            .with_property(LocationProperty::Crossroads);
        let inn = Location::new("inn", "The Inn", "town", LocationType::Inn);
        assert!(square.is_hub());
        assert!(!inn.is_hub());
    }

    #[test]
    fn absorb_moves_visit_state() {
        let mut placeholder = Location::new("forge", "[MISSING: forge]", "x", LocationType::Forge);
        placeholder.state.visit_count = 2;
        placeholder.state.familiarity = 1;

        let mut real = Location::new("forge", "The Forge", "town", LocationType::Forge);
        real.absorb(&mut placeholder);

        assert_eq!(real.state.visit_count, 2);
        assert_eq!(real.state.familiarity, 1);
        assert_eq!(placeholder.state, LocationState::default());
    }
}
