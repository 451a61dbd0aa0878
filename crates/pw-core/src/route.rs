use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::component::{SegmentKind, TerrainCategory, TravelMethod, WeatherCondition};
use crate::entity::{Entity, EntityId, EntityKind, Reference, SkeletonInfo};
use crate::world::{World, WorldIndex};

/// Suffix toggled onto route IDs whose endpoints cannot be swapped in place.
pub const RETURN_SUFFIX: &str = "__return";

/// Extra cost applied to a route under some weather.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherModifier {
    /// Added stamina cost.
    pub stamina: i32,
    /// Added coin cost.
    pub coins: i32,
    /// Added travel time, in minutes.
    pub minutes: i32,
}

/// One leg of a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSegment {
    /// Position along the route, starting at 1.
    pub number: u32,
    /// Where the segment's content comes from.
    pub kind: SegmentKind,
    /// Path or event collection the gameplay layer draws from.
    pub collection: String,
    /// Optional flavour line.
    pub narrative: String,
}

/// A directed travel connection between two hub locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Identifier.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Flavour text.
    pub description: String,
    /// Starting location.
    pub origin: EntityId,
    /// Ending location.
    pub destination: EntityId,
    /// How the route is travelled.
    pub method: TravelMethod,
    /// Coins paid to travel.
    pub coin_cost: u32,
    /// Stamina spent to travel.
    pub stamina_cost: u32,
    /// Travel time in minutes.
    pub travel_minutes: u32,
    /// Danger rating, 0–10.
    pub danger: u8,
    /// Ground covered.
    pub terrain: BTreeSet<TerrainCategory>,
    /// Weather-dependent cost changes.
    pub weather: BTreeMap<WeatherCondition, WeatherModifier>,
    /// Legs, ordered by `number`.
    pub segments: Vec<RouteSegment>,
    /// For derived mirrors, the authored route they reverse.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived_from: Option<EntityId>,
}

impl Route {
    /// Create an authored route with default travel attributes.
    pub fn new(
        id: impl Into<EntityId>,
        origin: impl Into<EntityId>,
        destination: impl Into<EntityId>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            description: String::new(),
            origin: origin.into(),
            destination: destination.into(),
            method: TravelMethod::Walking,
            coin_cost: 0,
            stamina_cost: 0,
            travel_minutes: 0,
            danger: 0,
            terrain: BTreeSet::new(),
            weather: BTreeMap::new(),
            segments: Vec::new(),
            derived_from: None,
        }
    }

    /// Builder: append a segment, numbered after the existing ones.
    pub fn with_segment(mut self, kind: SegmentKind, collection: impl Into<String>) -> Self {
        self.segments.push(RouteSegment {
            number: self.segments.len() as u32 + 1,
            kind,
            collection: collection.into(),
            narrative: String::new(),
        });
        self
    }

    /// Whether this route was derived rather than authored.
    pub fn is_derived(&self) -> bool {
        self.derived_from.is_some()
    }
}

impl Entity for Route {
    const KIND: EntityKind = EntityKind::Route;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn skeleton(&self) -> Option<&SkeletonInfo> {
        None
    }

    fn references(&self) -> Vec<Reference> {
        vec![
            Reference::new(EntityKind::Location, &self.origin, "originLocationId"),
            Reference::new(EntityKind::Location, &self.destination, "destinationLocationId"),
        ]
    }

    fn table(world: &World) -> &IndexMap<EntityId, Self> {
        &world.routes
    }

    fn table_mut(world: &mut World) -> &mut IndexMap<EntityId, Self> {
        &mut world.routes
    }

    fn index(&self, index: &mut WorldIndex) {
        index
            .routes_from
            .entry(self.origin.clone())
            .or_default()
            .push(self.id.clone());
    }

    fn unindex(&self, index: &mut WorldIndex) {
        if let Some(ids) = index.routes_from.get_mut(&self.origin) {
            ids.retain(|id| id != &self.id);
            if ids.is_empty() {
                index.routes_from.remove(&self.origin);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Reverse derivation
// ---------------------------------------------------------------------------

/// Build the mirror of `route`: endpoints swapped, segments reversed and
/// renumbered from 1, every direction-agnostic attribute copied.
///
/// Deriving twice gives back the original route.
pub fn derive_reverse(route: &Route) -> Route {
    let segments = route
        .segments
        .iter()
        .rev()
        .enumerate()
        .map(|(i, segment)| RouteSegment {
            number: i as u32 + 1,
            ..segment.clone()
        })
        .collect();

    Route {
        id: reverse_id(&route.id, &route.origin, &route.destination),
        name: reverse_name(&route.name),
        description: route.description.clone(),
        origin: route.destination.clone(),
        destination: route.origin.clone(),
        method: route.method,
        coin_cost: route.coin_cost,
        stamina_cost: route.stamina_cost,
        travel_minutes: route.travel_minutes,
        danger: route.danger,
        terrain: route.terrain.clone(),
        weather: route.weather.clone(),
        segments,
        derived_from: match &route.derived_from {
            Some(_) => None,
            None => Some(route.id.clone()),
        },
    }
}

/// The ID of the mirror route.
///
/// Swaps the origin and destination tokens when each appears exactly once in
/// the ID and swapping back restores it (`town_to_forest` becomes
/// `forest_to_town`); otherwise toggles [`RETURN_SUFFIX`]. For any ID,
/// `reverse_id(&reverse_id(id, o, d), d, o) == id`.
pub fn reverse_id(id: &EntityId, origin: &EntityId, destination: &EntityId) -> EntityId {
    let raw = id.as_str();
    if let Some(forward) = raw.strip_suffix(RETURN_SUFFIX) {
        let forward = EntityId::new(forward);
        if reverse_id(&forward, destination, origin) == *id {
            return forward;
        }
    }

    match swap_both_ways(raw, origin.as_str(), destination.as_str()) {
        Some(swapped) => EntityId::new(swapped),
        None => EntityId::new(format!("{raw}{RETURN_SUFFIX}")),
    }
}

/// The swapped ID, only if swapping it again gives `id` back.
fn swap_both_ways(id: &str, origin: &str, destination: &str) -> Option<String> {
    if id.ends_with(RETURN_SUFFIX) {
        return None;
    }
    let swapped = swap_tokens(id, origin, destination)?;
    let restores = swap_tokens(&swapped, destination, origin).as_deref() == Some(id);
    (restores && !swapped.ends_with(RETURN_SUFFIX)).then_some(swapped)
}

fn reverse_name(name: &str) -> String {
    const MARK: &str = " (return)";
    match name.strip_suffix(MARK) {
        Some(forward) => forward.to_string(),
        None => format!("{name}{MARK}"),
    }
}

fn unique_occurrence(haystack: &str, needle: &str) -> Option<Range<usize>> {
    if needle.is_empty() {
        return None;
    }
    let mut found = haystack.match_indices(needle);
    let (start, _) = found.next()?;
    if found.next().is_some() {
        return None;
    }
    Some(start..start + needle.len())
}

fn swap_tokens(id: &str, origin: &str, destination: &str) -> Option<String> {
    if origin == destination {
        return None;
    }
    let from = unique_occurrence(id, origin)?;
    let to = unique_occurrence(id, destination)?;
    if from.start < to.end && to.start < from.end {
        return None;
    }

    let (first, first_text, second, second_text) = if from.start < to.start {
        (from, destination, to, origin)
    } else {
        (to, origin, from, destination)
    };
    Some(format!(
        "{}{}{}{}{}",
        &id[..first.start],
        first_text,
        &id[first.end..second.start],
        second_text,
        &id[second.end..],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn town_to_forest() -> Route {
        let mut route = Route::new("town_gate_to_forest_edge", "town_gate", "forest_edge")
            .with_segment(SegmentKind::FixedPath, "old_road")
            .with_segment(SegmentKind::Event, "woodland_encounters")
            .with_segment(SegmentKind::FixedPath, "forest_trail");
        route.name = "Forest Road".to_string();
        route.stamina_cost = 2;
        route.terrain.insert(TerrainCategory::Forest);
        route.weather.insert(
            WeatherCondition::Rain,
            WeatherModifier {
                stamina: 1,
                ..Default::default()
            },
        );
        route
    }

    #[test]
    fn reverse_swaps_endpoints_and_segments() {
        let forward = town_to_forest();
        let back = derive_reverse(&forward);

        assert_eq!(back.id.as_str(), "forest_edge_to_town_gate");
        assert_eq!(back.origin.as_str(), "forest_edge");
        assert_eq!(back.destination.as_str(), "town_gate");
        let legs: Vec<_> = back
            .segments
            .iter()
            .map(|s| (s.number, s.collection.as_str()))
            .collect();
        assert_eq!(
            legs,
            vec![(1, "forest_trail"), (2, "woodland_encounters"), (3, "old_road")]
        );
        assert_eq!(back.derived_from.as_ref(), Some(&forward.id));
    }

    #[test]
    fn reverse_copies_direction_agnostic_attributes() {
        let forward = town_to_forest();
        let back = derive_reverse(&forward);
        assert_eq!(back.stamina_cost, 2);
        assert_eq!(back.terrain, forward.terrain);
        assert_eq!(back.weather, forward.weather);
        assert_eq!(back.name, "Forest Road (return)");
    }

    #[test]
    fn unswappable_id_gets_return_suffix() {
        let route = Route::new("ferry", "north_dock", "south_dock");
        let back = derive_reverse(&route);
        assert_eq!(back.id.as_str(), "ferry__return");
        assert_eq!(derive_reverse(&back).id.as_str(), "ferry");
    }

    #[test]
    fn loop_route_is_reversible() {
        let route = Route::new("pilgrim_circuit", "shrine", "shrine")
            .with_segment(SegmentKind::FixedPath, "a")
            .with_segment(SegmentKind::FixedPath, "b");
        let back = derive_reverse(&route);
        assert_eq!(back.id.as_str(), "pilgrim_circuit__return");
        assert_eq!(back.segments[0].collection, "b");
        assert_eq!(derive_reverse(&back), route);
    }

    #[test]
    fn repeated_token_falls_back_to_suffix() {
        // "a" appears twice in the ID, so it cannot be swapped safely.
        let id = reverse_id(&"a_to_ab".into(), &"a".into(), &"ab".into());
        assert_eq!(id.as_str(), "a_to_ab__return");
    }

    #[test]
    fn swap_that_duplicates_a_token_falls_back_to_suffix() {
        // Swapping gives "ab_xab", where "ab" is no longer unique.
        let forward = reverse_id(&"xa_abb".into(), &"xa".into(), &"ab".into());
        assert_eq!(forward.as_str(), "xa_abb__return");
        let back = reverse_id(&forward, &"ab".into(), &"xa".into());
        assert_eq!(back.as_str(), "xa_abb");
    }

    #[test]
    fn authored_suffix_survives_round_trip() {
        let id: EntityId = "a_to_b__return".into();
        let mirror = reverse_id(&id, &"a".into(), &"b".into());
        assert_eq!(reverse_id(&mirror, &"b".into(), &"a".into()), id);
    }

    fn arb_route() -> impl Strategy<Value = Route> {
        (
            "[a-z]{2,8}",
            "[a-z]{2,8}",
            prop::collection::vec("[a-z]{1,6}", 0..6),
            0u32..20,
        )
            .prop_map(|(origin, destination, legs, cost)| {
                let mut route = Route::new(format!("{origin}_to_{destination}"), origin, destination);
                route.coin_cost = cost;
                for (i, leg) in legs.into_iter().enumerate() {
                    let kind = if i % 2 == 0 {
                        SegmentKind::FixedPath
                    } else {
                        SegmentKind::Event
                    };
                    route = route.with_segment(kind, leg);
                }
                route
            })
    }

    proptest! {
        #[test]
        fn reverse_is_an_involution(route in arb_route()) {
            let back = derive_reverse(&derive_reverse(&route));
            prop_assert_eq!(&back.origin, &route.origin);
            prop_assert_eq!(&back.destination, &route.destination);
            prop_assert_eq!(&back.segments, &route.segments);
            prop_assert_eq!(back, route);
        }

        #[test]
        fn reverse_id_round_trips_for_any_names(
            id in "[ab_]{0,8}(__return){0,2}",
            origin in "[ab_]{1,3}",
            destination in "[ab_]{1,3}",
        ) {
            let (id, origin, destination) = (EntityId::new(id), EntityId::new(origin), EntityId::new(destination));
            let mirror = reverse_id(&id, &origin, &destination);
            prop_assert_eq!(reverse_id(&mirror, &destination, &origin), id);
        }

        #[test]
        fn reverse_keeps_segment_count(route in arb_route()) {
            let back = derive_reverse(&route);
            prop_assert_eq!(back.segments.len(), route.segments.len());
            for (i, segment) in back.segments.iter().enumerate() {
                prop_assert_eq!(segment.number, i as u32 + 1);
            }
        }
    }
}
