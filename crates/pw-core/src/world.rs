use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::card::{Card, Exchange, Obligation};
use crate::component::{LocationProperty, TimeBlock};
use crate::entity::{Entity, EntityId, EntityKind};
use crate::error::{CoreError, CoreResult};
use crate::location::{Location, Venue};
use crate::npc::Npc;
use crate::query::EntityResolver;
use crate::registry::{FallbackReport, IdentifierRegistry};
use crate::route::Route;
use crate::skeleton::Synthesize;

/// Metadata about the loaded world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldMeta {
    /// World name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Package IDs applied so far, in application order.
    pub packages: Vec<String>,
    /// Package whose starting conditions were applied.
    pub starting_package: Option<String>,
    /// When the world was created.
    pub created_at: DateTime<Utc>,
    /// Last time content was applied.
    pub updated_at: DateTime<Utc>,
}

impl WorldMeta {
    /// Metadata for a fresh world.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            description: String::new(),
            packages: Vec::new(),
            starting_package: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Global tuning read from the reserved rules document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameRules {
    /// Locations a venue may hold unless it overrides the limit.
    pub venue_capacity: usize,
    /// Cards drawn when listening, keyed by connection state.
    pub listen_draw_counts: BTreeMap<String, u32>,
    /// Upper bound for relationship bond.
    pub max_bond: i32,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            venue_capacity: 12,
            listen_draw_counts: BTreeMap::from([
                ("disconnected".to_string(), 3),
                ("guarded".to_string(), 4),
                ("neutral".to_string(), 5),
                ("receptive".to_string(), 6),
                ("trusting".to_string(), 7),
            ]),
            max_bond: 20,
        }
    }
}

/// The player's resources and position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Coins carried.
    pub coins: i32,
    /// Health points.
    pub health: i32,
    /// Stamina points.
    pub stamina: i32,
    /// Where the player is.
    pub current_location: Option<EntityId>,
    /// Obligations the player has accepted.
    pub obligations: Vec<EntityId>,
    /// Current day, starting at 1.
    pub day: u32,
    /// Current block of the day.
    pub time_block: TimeBlock,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            coins: 0,
            health: 10,
            stamina: 6,
            current_location: None,
            obligations: Vec::new(),
            day: 1,
            time_block: TimeBlock::Morning,
        }
    }
}

/// Secondary lookups maintained by [`Entity::index`] and [`Entity::unindex`].
#[derive(Debug, Clone, Default)]
pub struct WorldIndex {
    pub(crate) locations_by_venue: HashMap<EntityId, Vec<EntityId>>,
    pub(crate) npcs_by_location: HashMap<EntityId, Vec<EntityId>>,
    pub(crate) routes_from: HashMap<EntityId, Vec<EntityId>>,
}

/// Outcome of [`World::insert_real`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// Nothing with this ID existed.
    Inserted,
    /// A skeleton was replaced and its runtime state carried over.
    ReplacedSkeleton,
    /// A derived route with the same ID was replaced.
    ReplacedDerived,
}

/// Outcome of [`World::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ensured {
    /// The entity already existed, real or skeleton.
    Present,
    /// A skeleton was synthesized.
    Synthesized,
}

/// The central world model. Owns every entity and the identifier registry.
#[derive(Debug, Clone)]
pub struct World {
    /// World metadata.
    pub meta: WorldMeta,
    /// Global tuning.
    pub rules: GameRules,
    /// The player.
    pub player: PlayerState,

    pub(crate) venues: IndexMap<EntityId, Venue>,
    pub(crate) locations: IndexMap<EntityId, Location>,
    pub(crate) npcs: IndexMap<EntityId, Npc>,
    pub(crate) cards: IndexMap<EntityId, Card>,
    pub(crate) exchanges: IndexMap<EntityId, Exchange>,
    pub(crate) obligations: IndexMap<EntityId, Obligation>,
    pub(crate) routes: IndexMap<EntityId, Route>,

    index: WorldIndex,
    registry: IdentifierRegistry,
}

impl World {
    /// An empty world.
    pub fn new(meta: WorldMeta) -> Self {
        Self {
            meta,
            rules: GameRules::default(),
            player: PlayerState::default(),
            venues: IndexMap::new(),
            locations: IndexMap::new(),
            npcs: IndexMap::new(),
            cards: IndexMap::new(),
            exchanges: IndexMap::new(),
            obligations: IndexMap::new(),
            routes: IndexMap::new(),
            index: WorldIndex::default(),
            registry: IdentifierRegistry::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Get an entity by ID.
    pub fn get<T: Entity>(&self, id: &str) -> Option<&T> {
        T::table(self).get(id)
    }

    /// Get a mutable reference to an entity by ID.
    ///
    /// Changing fields that are indexed (a location's venue, a character's
    /// location, a route's origin) through this reference leaves the indexes
    /// stale; remove and re-insert instead.
    pub fn get_mut<T: Entity>(&mut self, id: &str) -> Option<&mut T> {
        T::table_mut(self).get_mut(id)
    }

    /// Every entity of one kind, in insertion order.
    pub fn all<'a, T: Entity + 'a>(&'a self) -> impl Iterator<Item = &'a T> {
        T::table(self).values()
    }

    /// Number of entities of one kind, skeletons included.
    pub fn count<T: Entity>(&self) -> usize {
        T::table(self).len()
    }

    /// Whether an entity of `kind` with this ID exists.
    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        match kind {
            EntityKind::Venue => self.venues.contains_key(id),
            EntityKind::Location => self.locations.contains_key(id),
            EntityKind::Npc => self.npcs.contains_key(id),
            EntityKind::Card => self.cards.contains_key(id),
            EntityKind::Exchange => self.exchanges.contains_key(id),
            EntityKind::Obligation => self.obligations.contains_key(id),
            EntityKind::Route => self.routes.contains_key(id),
        }
    }

    /// Entity counts per kind, skeletons and derived routes included.
    pub fn counts(&self) -> BTreeMap<EntityKind, usize> {
        EntityKind::ALL
            .into_iter()
            .map(|kind| {
                let n = match kind {
                    EntityKind::Venue => self.venues.len(),
                    EntityKind::Location => self.locations.len(),
                    EntityKind::Npc => self.npcs.len(),
                    EntityKind::Card => self.cards.len(),
                    EntityKind::Exchange => self.exchanges.len(),
                    EntityKind::Obligation => self.obligations.len(),
                    EntityKind::Route => self.routes.len(),
                };
                (kind, n)
            })
            .collect()
    }

    /// The identifier registry.
    pub fn registry(&self) -> &IdentifierRegistry {
        &self.registry
    }

    /// Whether `(kind, id)` is currently a skeleton.
    pub fn is_skeleton(&self, kind: EntityKind, id: &str) -> bool {
        self.registry.is_skeleton(kind, id)
    }

    /// Every skeleton still standing in for missing content.
    pub fn fallback_report(&self) -> FallbackReport {
        self.registry.fallback_report()
    }

    /// Start a categorical search over this world.
    pub fn resolver(&self) -> EntityResolver<'_> {
        EntityResolver::new(self)
    }

    // -----------------------------------------------------------------------
    // Spatial lookups
    // -----------------------------------------------------------------------

    /// Locations contained in a venue, in insertion order.
    pub fn locations_in(&self, venue: &str) -> Vec<&Location> {
        self.lookup(self.index.locations_by_venue.get(venue))
    }

    /// Hub locations of a venue.
    pub fn hubs_in(&self, venue: &str) -> Vec<&Location> {
        self.locations_in(venue)
            .into_iter()
            .filter(|l| l.is_hub())
            .collect()
    }

    /// Characters placed at a location.
    pub fn npcs_at(&self, location: &str) -> Vec<&Npc> {
        self.lookup(self.index.npcs_by_location.get(location))
    }

    /// Routes leaving a location, derived mirrors included.
    pub fn routes_from(&self, location: &str) -> Vec<&Route> {
        self.lookup(self.index.routes_from.get(location))
    }

    fn lookup<T: Entity>(&self, ids: Option<&Vec<EntityId>>) -> Vec<&T> {
        ids.map(|ids| {
            ids.iter()
                .filter_map(|id| T::table(self).get(id))
                .collect()
        })
        .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Insert an authored entity.
    ///
    /// A skeleton with the same ID is replaced and its runtime state moved
    /// onto `entity`. A second real definition of the same ID is an error.
    pub fn insert_real<T: Entity>(&mut self, mut entity: T, package: Option<&str>) -> CoreResult<Insertion> {
        let id = entity.id().clone();
        if let Some(entry) = self.registry.get(T::KIND, id.as_str())
            && entry.status == crate::registry::Status::Real
        {
            return Err(CoreError::Duplicate {
                kind: T::KIND,
                id,
                first_package: entry.package.clone(),
            });
        }

        let outcome = match self.take::<T>(id.as_str()) {
            Some(mut previous) if previous.is_skeleton() => {
                entity.absorb(&mut previous);
                self.store(entity);
                T::retire(&previous, self);
                tracing::debug!(kind = %T::KIND, id = %id, "replaced skeleton");
                Insertion::ReplacedSkeleton
            }
            Some(_) => {
                self.store(entity);
                Insertion::ReplacedDerived
            }
            None => {
                self.store(entity);
                Insertion::Inserted
            }
        };
        self.registry.mark_real(T::KIND, id, package);
        Ok(outcome)
    }

    /// Insert a derived route. It gets no registry entry.
    pub fn insert_derived(&mut self, route: Route) {
        if let Some(previous) = self.routes.shift_remove(route.id.as_str()) {
            previous.unindex(&mut self.index);
        }
        self.store(route);
    }

    /// Make sure an entity exists, synthesizing a skeleton if it does not.
    ///
    /// Skeletons pull in skeletons for whatever they reference themselves.
    pub fn ensure<T: Synthesize>(&mut self, id: &EntityId, reason: &str) -> CoreResult<Ensured> {
        if T::table(self).contains_key(id.as_str()) {
            return Ok(Ensured::Present);
        }
        self.insert_skeleton(T::synthesize(id, reason))?;
        Ok(Ensured::Synthesized)
    }

    /// [`World::ensure`] for a kind only known at runtime.
    pub fn ensure_kind(&mut self, kind: EntityKind, id: &EntityId, reason: &str) -> CoreResult<Ensured> {
        match kind {
            EntityKind::Venue => self.ensure::<Venue>(id, reason),
            EntityKind::Location => self.ensure::<Location>(id, reason),
            EntityKind::Npc => self.ensure::<Npc>(id, reason),
            EntityKind::Card => self.ensure::<Card>(id, reason),
            EntityKind::Exchange => self.ensure::<Exchange>(id, reason),
            EntityKind::Obligation => self.ensure::<Obligation>(id, reason),
            EntityKind::Route => Err(CoreError::NotSynthesizable {
                kind,
                id: id.clone(),
            }),
        }
    }

    /// Insert a ready-made skeleton and register it.
    pub fn insert_skeleton<T: Entity>(&mut self, skeleton: T) -> CoreResult<()> {
        let id = skeleton.id().clone();
        let reason = skeleton
            .skeleton()
            .map(|s| s.source.clone())
            .unwrap_or_default();
        let owner = format!("owned by {} skeleton '{}'", T::KIND, id);
        for reference in skeleton.references() {
            self.ensure_kind(reference.kind, &reference.id, &owner)?;
        }
        tracing::debug!(kind = %T::KIND, id = %id, reason = %reason, "synthesized skeleton");
        self.registry.mark_skeleton(T::KIND, id, &reason);
        self.store(skeleton);
        Ok(())
    }

    /// Remove an entity and its registry entry.
    pub fn remove<T: Entity>(&mut self, id: &str) -> Option<T> {
        let entity = self.take::<T>(id)?;
        self.registry.forget(T::KIND, id);
        Some(entity)
    }

    fn take<T: Entity>(&mut self, id: &str) -> Option<T> {
        let entity = T::table_mut(self).shift_remove(id)?;
        entity.unindex(&mut self.index);
        Some(entity)
    }

    fn store<T: Entity>(&mut self, entity: T) {
        entity.index(&mut self.index);
        T::table_mut(self).insert(entity.id().clone(), entity);
    }

    // -----------------------------------------------------------------------
    // Runtime state
    // -----------------------------------------------------------------------

    /// Record the player arriving at a location.
    pub fn record_visit(&mut self, location: &str, at: DateTime<Utc>) -> CoreResult<()> {
        let entry = self
            .locations
            .get_mut(location)
            .ok_or_else(|| CoreError::not_found(EntityKind::Location, location))?;
        entry.state.visit_count += 1;
        entry.state.last_visited = Some(at);
        self.player.current_location = Some(entry.id.clone());
        Ok(())
    }

    /// Record a conversation with a character, adjusting their bond.
    pub fn record_interaction(&mut self, npc: &str, at: DateTime<Utc>, bond_delta: i32) -> CoreResult<()> {
        let max_bond = self.rules.max_bond;
        let entry = self
            .npcs
            .get_mut(npc)
            .ok_or_else(|| CoreError::not_found(EntityKind::Npc, npc))?;
        entry.bond = (entry.bond + bond_delta).clamp(-max_bond, max_bond);
        entry.last_interaction = Some(at);
        Ok(())
    }

    /// Add an earned exchange to a character's deck.
    pub fn grant_exchange(&mut self, npc: &str, exchange: &EntityId) -> CoreResult<()> {
        if !self.npcs.contains_key(npc) {
            return Err(CoreError::not_found(EntityKind::Npc, npc));
        }
        self.ensure::<Exchange>(exchange, &format!("earned by npc '{npc}'"))?;
        if let Some(entry) = self.npcs.get_mut(npc) {
            entry.exchange_deck.push(exchange.clone());
        }
        Ok(())
    }

    /// Give a location the hub role.
    pub fn make_hub(&mut self, location: &str) -> CoreResult<()> {
        let entry = self
            .locations
            .get_mut(location)
            .ok_or_else(|| CoreError::not_found(EntityKind::Location, location))?;
        entry.properties.insert(LocationProperty::Crossroads);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{LocationType, Personality, Profession, VenueType};

    fn town() -> World {
        let mut world = World::new(WorldMeta::new("Test"));
        world
            .insert_real(Venue::new("town", "Town", VenueType::Town), Some("core"))
            .unwrap();
        world
            .insert_real(
                Location::new("square", "Town Square", "town", LocationType::Square)
                    .with_property(LocationProperty::Crossroads),
                Some("core"),
            )
            .unwrap();
        world
    }

    #[test]
    fn insert_and_lookup() {
        let world = town();
        assert_eq!(world.get::<Location>("square").map(|l| l.name.as_str()), Some("Town Square"));
        assert_eq!(world.locations_in("town").len(), 1);
        assert_eq!(world.hubs_in("town").len(), 1);
        assert_eq!(world.count::<Venue>(), 1);
    }

    #[test]
    fn duplicate_real_definition_is_rejected() {
        let mut world = town();
        let err = world
            .insert_real(Location::new("square", "Again", "town", LocationType::Square), Some("expansion"))
            .unwrap_err();
        assert!(matches!(err, CoreError::Duplicate { kind: EntityKind::Location, .. }));
        assert!(err.to_string().contains("core"));
    }

    #[test]
    fn ensure_synthesizes_once() {
        let mut world = town();
        let forge = EntityId::new("forge");
        assert_eq!(world.ensure::<Location>(&forge, "first").unwrap(), Ensured::Synthesized);
        assert_eq!(world.ensure::<Location>(&forge, "second").unwrap(), Ensured::Present);
        assert!(world.is_skeleton(EntityKind::Location, "forge"));
        // The location skeleton brought its placeholder venue along.
        assert!(world.is_skeleton(EntityKind::Venue, "forge:venue"));
        assert_eq!(
            world.registry().get(EntityKind::Location, "forge").and_then(|e| e.reason.as_deref()),
            Some("first")
        );
    }

    #[test]
    fn routes_cannot_be_synthesized() {
        let mut world = town();
        let err = world
            .ensure_kind(EntityKind::Route, &"anywhere".into(), "test")
            .unwrap_err();
        assert!(matches!(err, CoreError::NotSynthesizable { .. }));
    }

    #[test]
    fn replacing_skeleton_prunes_placeholder_venue() {
        let mut world = town();
        world.ensure::<Location>(&"forge".into(), "test").unwrap();
        world.record_visit("forge", Utc::now()).unwrap();

        let outcome = world
            .insert_real(Location::new("forge", "The Forge", "town", LocationType::Forge), Some("core"))
            .unwrap();

        assert_eq!(outcome, Insertion::ReplacedSkeleton);
        assert!(!world.contains(EntityKind::Venue, "forge:venue"));
        assert!(world.registry().get(EntityKind::Venue, "forge:venue").is_none());
        let forge = world.get::<Location>("forge").unwrap();
        assert_eq!(forge.state.visit_count, 1);
        assert_eq!(world.locations_in("town").len(), 2);
    }

    #[test]
    fn replacing_skeleton_npc_keeps_earned_cards() {
        let mut world = town();
        world.ensure::<Npc>(&"smith".into(), "test").unwrap();
        for exchange in ["a", "b", "c"] {
            world.grant_exchange("smith", &exchange.into()).unwrap();
        }

        let mut real = Npc::new("smith", "Garrick", Personality::Steadfast, Profession::Smith).at("square");
        real.exchange_deck.push("forge_blade".into());
        world.insert_real(real, Some("core")).unwrap();

        let smith = world.get::<Npc>("smith").unwrap();
        assert_eq!(smith.exchange_deck.len(), 4);
        assert!(!smith.is_skeleton());
        assert_eq!(world.npcs_at("square").len(), 1);
    }

    #[test]
    fn derived_route_is_not_registered() {
        let mut world = town();
        world.insert_derived(crate::route::derive_reverse(&Route::new("a_to_b", "a", "b")));
        assert!(world.contains(EntityKind::Route, "b_to_a"));
        assert!(world.registry().get(EntityKind::Route, "b_to_a").is_none());
        assert_eq!(world.routes_from("b").len(), 1);

        let authored = Route::new("b_to_a", "b", "a");
        assert_eq!(world.insert_real(authored, None).unwrap(), Insertion::ReplacedDerived);
        assert_eq!(world.routes_from("b").len(), 1);
    }

    #[test]
    fn interaction_bond_is_clamped() {
        let mut world = town();
        world
            .insert_real(Npc::new("elena", "Elena", Personality::Devoted, Profession::Scholar), None)
            .unwrap();
        world.record_interaction("elena", Utc::now(), 50).unwrap();
        assert_eq!(world.get::<Npc>("elena").unwrap().bond, 20);
        assert!(world.record_interaction("nobody", Utc::now(), 1).is_err());
    }
}
