use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::component::{
    Categorical, HexCoord, LocationProperty, LocationType, Personality, Profession, TerrainCategory,
    UnknownVariant, parse_label,
};
use crate::entity::{Entity, EntityId};
use crate::location::{Location, Venue};
use crate::npc::Npc;
use crate::route::Route;
use crate::world::World;

/// Tie-break rule when a filter matches several candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SelectionStrategy {
    /// First by display name.
    #[default]
    First,
    /// Nearest on the hex grid to the reference position.
    Closest,
    /// Strongest relationship bond.
    HighestBond,
    /// Longest since the last interaction; never-met wins.
    LeastRecent,
}

impl Categorical for SelectionStrategy {
    const ALL: &'static [Self] = &[Self::First, Self::Closest, Self::HighestBond, Self::LeastRecent];

    fn label(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Closest => "closest",
            Self::HighestBond => "highest_bond",
            Self::LeastRecent => "least_recent",
        }
    }
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SelectionStrategy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_label(s)
    }
}

impl Serialize for SelectionStrategy {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for SelectionStrategy {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_label(&raw).map_err(serde::de::Error::custom)
    }
}

/// Categorical predicates for finding an entity without naming it.
///
/// Unset fields match everything; set fields are ANDed. List fields match
/// when the candidate has any listed value, except `required_properties`,
/// which needs all of them. Fields describing another kind are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlacementFilter {
    /// Location types (locations).
    pub location_types: Vec<LocationType>,
    /// Properties that must all be present (locations).
    pub required_properties: Vec<LocationProperty>,
    /// Personalities (characters).
    pub personalities: Vec<Personality>,
    /// Professions (characters).
    pub professions: Vec<Profession>,
    /// Terrain crossed (routes).
    pub terrain: Vec<TerrainCategory>,
    /// Minimum tier (locations, characters).
    pub min_tier: Option<u8>,
    /// Maximum tier (locations, characters).
    pub max_tier: Option<u8>,
    /// Minimum bond (characters).
    pub min_bond: Option<i32>,
    /// Maximum bond (characters).
    pub max_bond: Option<i32>,
    /// Minimum danger (routes).
    pub min_danger: Option<u8>,
    /// Maximum danger (routes).
    pub max_danger: Option<u8>,
    /// District of the containing venue.
    pub district: Option<String>,
    /// Tie-break rule.
    pub strategy: SelectionStrategy,
}

impl PlacementFilter {
    /// An empty filter: matches everything, picks the first by name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: accept a location type.
    pub fn location_type(mut self, location_type: LocationType) -> Self {
        self.location_types.push(location_type);
        self
    }

    /// Builder: require a property.
    pub fn require(mut self, property: LocationProperty) -> Self {
        self.required_properties.push(property);
        self
    }

    /// Builder: accept a personality.
    pub fn personality(mut self, personality: Personality) -> Self {
        self.personalities.push(personality);
        self
    }

    /// Builder: accept a profession.
    pub fn profession(mut self, profession: Profession) -> Self {
        self.professions.push(profession);
        self
    }

    /// Builder: accept a terrain.
    pub fn terrain(mut self, terrain: TerrainCategory) -> Self {
        self.terrain.push(terrain);
        self
    }

    /// Builder: restrict tier to `min..=max`.
    pub fn tiers(mut self, min: u8, max: u8) -> Self {
        self.min_tier = Some(min);
        self.max_tier = Some(max);
        self
    }

    /// Builder: restrict bond to `min..=max`.
    pub fn bond(mut self, min: i32, max: i32) -> Self {
        self.min_bond = Some(min);
        self.max_bond = Some(max);
        self
    }

    /// Builder: restrict to one district.
    pub fn district(mut self, district: impl Into<String>) -> Self {
        self.district = Some(district.into());
        self
    }

    /// Builder: set the tie-break rule.
    pub fn strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    fn tier_ok(&self, tier: u8) -> bool {
        self.min_tier.is_none_or(|min| tier >= min) && self.max_tier.is_none_or(|max| tier <= max)
    }

    fn district_ok(&self, world: &World, venue: Option<&EntityId>) -> bool {
        let Some(wanted) = &self.district else {
            return true;
        };
        venue
            .and_then(|v| world.get::<Venue>(v.as_str()))
            .and_then(|v| v.district.as_deref())
            .is_some_and(|d| d.eq_ignore_ascii_case(wanted))
    }
}

fn any_of<T: PartialEq>(wanted: &[T], value: &T) -> bool {
    wanted.is_empty() || wanted.contains(value)
}

/// Entities the resolver can search.
pub trait Placeable: Entity {
    /// Whether this entity passes every predicate of `filter`.
    fn matches(&self, filter: &PlacementFilter, world: &World) -> bool;

    /// The venue containing this entity.
    fn container<'w>(&'w self, world: &'w World) -> Option<&'w EntityId>;

    /// Position on the travel grid.
    fn position(&self, _world: &World) -> Option<HexCoord> {
        None
    }

    /// Relationship strength with the player.
    fn bond(&self) -> i32 {
        0
    }

    /// Last interaction with the player.
    fn last_interaction(&self) -> Option<DateTime<Utc>> {
        None
    }
}

impl Placeable for Location {
    fn matches(&self, filter: &PlacementFilter, world: &World) -> bool {
        any_of(&filter.location_types, &self.location_type)
            && filter
                .required_properties
                .iter()
                .all(|p| self.properties.contains(p))
            && filter.tier_ok(self.tier)
            && filter.district_ok(world, Some(&self.venue))
    }

    fn container<'w>(&'w self, _world: &'w World) -> Option<&'w EntityId> {
        Some(&self.venue)
    }

    fn position(&self, _world: &World) -> Option<HexCoord> {
        self.position
    }

    fn last_interaction(&self) -> Option<DateTime<Utc>> {
        self.state.last_visited
    }
}

impl Placeable for Npc {
    fn matches(&self, filter: &PlacementFilter, world: &World) -> bool {
        any_of(&filter.personalities, &self.personality)
            && any_of(&filter.professions, &self.profession)
            && filter.tier_ok(self.tier)
            && filter.min_bond.is_none_or(|min| self.bond >= min)
            && filter.max_bond.is_none_or(|max| self.bond <= max)
            && filter.district_ok(world, self.container(world))
    }

    fn container<'w>(&'w self, world: &'w World) -> Option<&'w EntityId> {
        let location = self.location.as_ref()?;
        world.get::<Location>(location.as_str()).map(|l| &l.venue)
    }

    fn position(&self, world: &World) -> Option<HexCoord> {
        let location = self.location.as_ref()?;
        world.get::<Location>(location.as_str())?.position
    }

    fn bond(&self) -> i32 {
        self.bond
    }

    fn last_interaction(&self) -> Option<DateTime<Utc>> {
        self.last_interaction
    }
}

impl Placeable for Route {
    fn matches(&self, filter: &PlacementFilter, world: &World) -> bool {
        (filter.terrain.is_empty() || filter.terrain.iter().any(|t| self.terrain.contains(t)))
            && filter.min_danger.is_none_or(|min| self.danger >= min)
            && filter.max_danger.is_none_or(|max| self.danger <= max)
            && filter.district_ok(world, self.container(world))
    }

    fn container<'w>(&'w self, world: &'w World) -> Option<&'w EntityId> {
        world.get::<Location>(self.origin.as_str()).map(|l| &l.venue)
    }

    fn position(&self, world: &World) -> Option<HexCoord> {
        world.get::<Location>(self.origin.as_str())?.position
    }
}

/// Finds entities by categorical filter. Never creates anything and never
/// consults a random source.
pub struct EntityResolver<'w> {
    world: &'w World,
    scope: Option<EntityId>,
    origin: Option<HexCoord>,
}

impl<'w> EntityResolver<'w> {
    /// A global resolver over `world`.
    pub fn new(world: &'w World) -> Self {
        Self {
            world,
            scope: None,
            origin: None,
        }
    }

    /// Restrict candidates to entities contained in `venue`.
    pub fn scoped_to(mut self, venue: impl Into<EntityId>) -> Self {
        self.scope = Some(venue.into());
        self
    }

    /// Measure `Closest` from `position` instead of the player's location.
    pub fn from_position(mut self, position: HexCoord) -> Self {
        self.origin = Some(position);
        self
    }

    /// Every match, ordered by display name ignoring case, then ID.
    pub fn candidates<T: Placeable>(&self, filter: &PlacementFilter) -> Vec<&'w T> {
        let world = self.world;
        let mut results: Vec<&'w T> = world
            .all::<T>()
            .filter(|e| match &self.scope {
                Some(venue) => e.container(world) == Some(venue),
                None => true,
            })
            .filter(|e| e.matches(filter, world))
            .collect();

        results.sort_by(|a, b| {
            a.name()
                .to_lowercase()
                .cmp(&b.name().to_lowercase())
                .then_with(|| a.id().cmp(b.id()))
        });
        results
    }

    /// The single best match under the filter's strategy.
    pub fn find<T: Placeable>(&self, filter: &PlacementFilter) -> Option<&'w T> {
        let candidates = self.candidates::<T>(filter);
        let first = candidates.first().copied()?;

        let picked = match filter.strategy {
            SelectionStrategy::First => Some(first),
            SelectionStrategy::Closest => self.closest(&candidates),
            SelectionStrategy::HighestBond => candidates.iter().copied().fold(None, |best, c| match best {
                Some(b) if T::bond(b) >= T::bond(c) => Some(b),
                _ => Some(c),
            }),
            SelectionStrategy::LeastRecent => candidates
                .iter()
                .copied()
                .find(|c| c.last_interaction().is_none())
                .or_else(|| candidates.iter().copied().min_by_key(|c| c.last_interaction())),
        };
        picked.or(Some(first))
    }

    fn reference_position(&self) -> Option<HexCoord> {
        self.origin.or_else(|| {
            let here = self.world.player.current_location.as_ref()?;
            self.world.get::<Location>(here.as_str())?.position
        })
    }

    fn closest<T: Placeable>(&self, candidates: &[&'w T]) -> Option<&'w T> {
        let reference = self.reference_position()?;
        candidates
            .iter()
            .copied()
            .filter_map(|c| c.position(self.world).map(|p| (c, p.distance(reference))))
            .min_by_key(|(_, distance)| *distance)
            .map(|(c, _)| c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::VenueType;
    use crate::world::WorldMeta;

    fn test_world() -> World {
        let mut world = World::new(WorldMeta::new("Test"));
        let mut town = Venue::new("town", "Town", VenueType::Town);
        town.district = Some("lowlands".to_string());
        world.insert_real(town, None).unwrap();
        world.insert_real(Venue::new("keep", "Keep", VenueType::Outpost), None).unwrap();

        let places = [
            ("square", "Town Square", "town", LocationType::Square, HexCoord::new(0, 0), true),
            ("tavern", "Copper Kettle", "town", LocationType::Inn, HexCoord::new(1, 0), false),
            ("forge", "Anvil Row", "town", LocationType::Forge, HexCoord::new(3, -1), false),
            ("gate", "Keep Gate", "keep", LocationType::Gate, HexCoord::new(6, 0), true),
            ("hall", "Great Hall", "keep", LocationType::Inn, HexCoord::new(7, 0), false),
        ];
        for (id, name, venue, kind, at, hub) in places {
            let mut location = Location::new(id, name, venue, kind).at(at);
            if hub {
                location = location.with_property(LocationProperty::Crossroads);
            }
            world.insert_real(location, None).unwrap();
        }

        let people = [
            ("marta", "Marta", "tavern", Profession::Innkeeper, 4),
            ("garrick", "Garrick", "forge", Profession::Smith, 9),
            ("bren", "Bren", "gate", Profession::Guard, 9),
            ("ines", "Ines", "hall", Profession::Innkeeper, 1),
        ];
        for (id, name, location, profession, bond) in people {
            let mut npc = Npc::new(id, name, Personality::Steadfast, profession).at(location);
            npc.bond = bond;
            world.insert_real(npc, None).unwrap();
        }
        world
    }

    #[test]
    fn candidates_sort_names_ignoring_case() {
        let mut world = test_world();
        world
            .insert_real(Npc::new("aldo", "aldo", Personality::Steadfast, Profession::Guard).at("gate"), None)
            .unwrap();
        let names: Vec<_> = world
            .resolver()
            .candidates::<Npc>(&PlacementFilter::new())
            .iter()
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(names, vec!["aldo", "Bren", "Garrick", "Ines", "Marta"]);
    }

    #[test]
    fn empty_filter_returns_first_by_name() {
        let world = test_world();
        let found = world.resolver().find::<Location>(&PlacementFilter::new());
        assert_eq!(found.map(|l| l.id.as_str()), Some("forge"));
        // Deterministic across calls.
        let again = world.resolver().find::<Location>(&PlacementFilter::new());
        assert_eq!(found.map(|l| &l.id), again.map(|l| &l.id));
    }

    #[test]
    fn scope_restricts_to_venue() {
        let world = test_world();
        let filter = PlacementFilter::new().location_type(LocationType::Inn);
        let all = world.resolver().candidates::<Location>(&filter);
        assert_eq!(all.len(), 2);

        let keep_inn = world.resolver().scoped_to("keep").find::<Location>(&filter);
        assert_eq!(keep_inn.map(|l| l.id.as_str()), Some("hall"));
    }

    #[test]
    fn required_properties_all_match() {
        let world = test_world();
        let filter = PlacementFilter::new().require(LocationProperty::Crossroads);
        let hubs: Vec<_> = world
            .resolver()
            .candidates::<Location>(&filter)
            .into_iter()
            .map(|l| l.id.as_str())
            .collect();
        assert_eq!(hubs, vec!["gate", "square"]);
    }

    #[test]
    fn no_match_returns_none() {
        let world = test_world();
        let filter = PlacementFilter::new().location_type(LocationType::Dock);
        assert!(world.resolver().find::<Location>(&filter).is_none());
    }

    #[test]
    fn npc_scope_follows_location_venue() {
        let world = test_world();
        let filter = PlacementFilter::new().profession(Profession::Innkeeper);
        let found = world.resolver().scoped_to("keep").find::<Npc>(&filter);
        assert_eq!(found.map(|n| n.id.as_str()), Some("ines"));
    }

    #[test]
    fn district_filter_uses_containing_venue() {
        let world = test_world();
        let filter = PlacementFilter::new().district("Lowlands");
        let names: Vec<_> = world
            .resolver()
            .candidates::<Npc>(&filter)
            .into_iter()
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(names, vec!["Garrick", "Marta"]);
    }

    #[test]
    fn closest_uses_hex_distance() {
        let world = test_world();
        let filter = PlacementFilter::new().strategy(SelectionStrategy::Closest);
        let found = world
            .resolver()
            .from_position(HexCoord::new(5, 0))
            .find::<Location>(&filter);
        assert_eq!(found.map(|l| l.id.as_str()), Some("gate"));
    }

    #[test]
    fn closest_without_reference_falls_back_to_first() {
        let world = test_world();
        let filter = PlacementFilter::new().strategy(SelectionStrategy::Closest);
        let found = world.resolver().find::<Location>(&filter);
        assert_eq!(found.map(|l| l.id.as_str()), Some("forge"));
    }

    #[test]
    fn highest_bond_breaks_ties_by_name() {
        let world = test_world();
        let filter = PlacementFilter::new().strategy(SelectionStrategy::HighestBond);
        let found = world.resolver().find::<Npc>(&filter);
        // Bren and Garrick both have bond 9; Bren sorts first.
        assert_eq!(found.map(|n| n.id.as_str()), Some("bren"));
    }

    #[test]
    fn least_recent_prefers_never_met() {
        let mut world = test_world();
        let now = Utc::now();
        for id in ["bren", "garrick", "ines"] {
            world.record_interaction(id, now, 0).unwrap();
        }
        let filter = PlacementFilter::new().strategy(SelectionStrategy::LeastRecent);
        let found = world.resolver().find::<Npc>(&filter);
        assert_eq!(found.map(|n| n.id.as_str()), Some("marta"));
    }

    #[test]
    fn least_recent_picks_oldest_interaction() {
        let mut world = test_world();
        let now = Utc::now();
        world.record_interaction("marta", now, 0).unwrap();
        world.record_interaction("garrick", now - chrono::Duration::hours(3), 0).unwrap();
        world.record_interaction("bren", now - chrono::Duration::hours(1), 0).unwrap();
        world.record_interaction("ines", now, 0).unwrap();

        let filter = PlacementFilter::new().strategy(SelectionStrategy::LeastRecent);
        let found = world.resolver().find::<Npc>(&filter);
        assert_eq!(found.map(|n| n.id.as_str()), Some("garrick"));
    }

    #[test]
    fn filter_deserializes_from_camel_case() {
        let filter: PlacementFilter = serde_json::from_str(
            r#"{ "locationTypes": ["Inn"], "requiredProperties": ["crossroads"], "strategy": "highestBond" }"#,
        )
        .unwrap();
        assert_eq!(filter.location_types, vec![LocationType::Inn]);
        assert_eq!(filter.strategy, SelectionStrategy::HighestBond);
    }
}
