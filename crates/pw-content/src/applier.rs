use std::collections::{BTreeMap, HashSet};
use std::fmt;

use pw_core::world::{Ensured, Insertion};
use pw_core::{
    CoreError, Entity, EntityId, EntityKind, Location, Npc, Route, Venue, World, derive_reverse,
};

use crate::convert::{
    CONVERTERS, DeckComposition, Declared, NpcDeclaration, Placement, StartingConditions,
    convert_deck_compositions, convert_starting_conditions,
};
use crate::document::Document;
use crate::error::LoadError;

/// Counts gathered while applying documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Authored entities applied, per kind.
    pub applied: BTreeMap<EntityKind, usize>,
    /// Mirror routes derived.
    pub derived_routes: usize,
    /// Documents applied.
    pub documents_applied: usize,
    /// Documents skipped because their package was already applied.
    pub documents_skipped: usize,
    /// Documents aborted by an error.
    pub documents_failed: usize,
    /// Placeholders synthesized for missing references.
    pub skeletons_created: usize,
    /// Placeholders replaced by authored definitions.
    pub skeletons_replaced: usize,
}

impl LoadSummary {
    /// Authored entities of one kind.
    pub fn applied_of(&self, kind: EntityKind) -> usize {
        self.applied.get(&kind).copied().unwrap_or(0)
    }

    /// Authored entities of every kind.
    pub fn total_applied(&self) -> usize {
        self.applied.values().sum()
    }
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} documents applied ({} skipped, {} failed), {} entities, {} derived routes, {} skeletons created, {} replaced",
            self.documents_applied,
            self.documents_skipped,
            self.documents_failed,
            self.total_applied(),
            self.derived_routes,
            self.skeletons_created,
            self.skeletons_replaced
        )
    }
}

/// What happened to one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentOutcome {
    /// The document was applied.
    Applied {
        /// Authored entities it added.
        entities: usize,
    },
    /// The package had already been applied.
    Skipped,
}

/// A fully converted document, ready to mutate the world.
struct Plan {
    entities: Vec<Declared>,
    decks: Vec<DeckComposition>,
    starting: Option<StartingConditions>,
}

/// Applies parsed documents to a world, one at a time.
///
/// Keeps the set of applied package IDs and the starting-conditions writer
/// across calls, so the same applier serves the initial load and any later
/// dynamic loads.
#[derive(Debug, Default)]
pub struct PackageApplier {
    applied: HashSet<String>,
    starting_package: Option<String>,
    summary: LoadSummary,
}

impl PackageApplier {
    /// A fresh applier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts so far.
    pub fn summary(&self) -> &LoadSummary {
        &self.summary
    }

    /// Count a document that failed before reaching the applier.
    pub(crate) fn record_failure(&mut self) {
        self.summary.documents_failed += 1;
    }

    /// Whether a package ID has been applied.
    pub fn is_applied(&self, package: &str) -> bool {
        self.applied.contains(package)
    }

    /// Apply one document.
    ///
    /// Every declaration is converted and pre-checked before the world is
    /// touched, so an error leaves the world as it was.
    pub fn apply(&mut self, world: &mut World, document: &Document) -> Result<DocumentOutcome, LoadError> {
        let label = document.label();
        if let Some(package) = &document.package_id
            && self.applied.contains(package)
        {
            tracing::debug!(package = %label, "package already applied, skipping");
            self.summary.documents_skipped += 1;
            return Ok(DocumentOutcome::Skipped);
        }

        let result = self
            .prepare(world, document, &label)
            .and_then(|plan| self.execute(world, document, &label, plan));
        match &result {
            Ok(DocumentOutcome::Applied { entities }) => {
                self.summary.documents_applied += 1;
                tracing::info!(package = %label, entities, "applied document");
            }
            Ok(DocumentOutcome::Skipped) => {}
            Err(_) => self.summary.documents_failed += 1,
        }
        result
    }

    // -----------------------------------------------------------------------
    // Phase: convert and pre-check
    // -----------------------------------------------------------------------

    fn prepare(&self, world: &World, document: &Document, label: &str) -> Result<Plan, LoadError> {
        let mut entities = Vec::new();
        for converter in &CONVERTERS {
            let kind = converter.kind.to_string();
            for declaration in document.declarations(converter.kind) {
                let declared =
                    (converter.convert)(declaration).map_err(|e| e.into_load_error(label, &kind))?;
                entities.push(declared);
            }
        }

        let decks = match &document.content.deck_compositions {
            Some(raw) => convert_deck_compositions(raw).map_err(|e| e.into_load_error(label, "deck composition"))?,
            None => Vec::new(),
        };

        let starting = match &document.starting_conditions {
            Some(_) if self.starting_package.is_some() => {
                tracing::warn!(
                    package = %label,
                    applied_from = self.starting_package.as_deref().unwrap_or_default(),
                    "ignoring starting conditions; they were already set"
                );
                None
            }
            Some(raw) => Some(
                convert_starting_conditions(raw).map_err(|e| e.into_load_error(label, "starting conditions"))?,
            ),
            None => None,
        };

        check_duplicates(world, &entities, label)?;
        check_capacity(world, &entities, label)?;

        Ok(Plan {
            entities,
            decks,
            starting,
        })
    }

    // -----------------------------------------------------------------------
    // Phase: mutate
    // -----------------------------------------------------------------------

    fn execute(
        &mut self,
        world: &mut World,
        document: &Document,
        label: &str,
        plan: Plan,
    ) -> Result<DocumentOutcome, LoadError> {
        let package = document.package_id.as_deref();
        if let Some(id) = package {
            self.applied.insert(id.to_string());
            world.meta.packages.push(id.to_string());
        }

        let entities = plan.entities.len();
        for declared in plan.entities {
            match declared {
                Declared::Venue(venue) => self.place(world, venue, label, package)?,
                Declared::Location(location) => self.place(world, location, label, package)?,
                Declared::Card(card) => self.place(world, card, label, package)?,
                Declared::Npc(decl) => self.place_npc(world, decl, label, package)?,
                Declared::Exchange(exchange) => self.place(world, exchange, label, package)?,
                Declared::Obligation(obligation) => self.place(world, obligation, label, package)?,
                Declared::Route(route) => self.place_route(world, route, label, package)?,
            }
        }

        for deck in plan.decks {
            self.apply_deck(world, deck, label)?;
        }

        if let Some(start) = plan.starting {
            self.apply_starting(world, start, label)?;
        }

        Ok(DocumentOutcome::Applied { entities })
    }

    fn ensure(&mut self, world: &mut World, kind: EntityKind, id: &EntityId, reason: &str, label: &str) -> Result<(), LoadError> {
        let ensured = world
            .ensure_kind(kind, id, reason)
            .map_err(|e| LoadError::from_core(label, e))?;
        if ensured == Ensured::Synthesized {
            self.summary.skeletons_created += 1;
            tracing::debug!(%kind, %id, reason, "synthesized skeleton for missing reference");
        }
        Ok(())
    }

    fn place<T: Entity>(&mut self, world: &mut World, entity: T, label: &str, package: Option<&str>) -> Result<(), LoadError> {
        for reference in entity.references() {
            let reason = format!(
                "{} of {} '{}' in package {}",
                reference.field,
                T::KIND,
                entity.id(),
                label
            );
            self.ensure(world, reference.kind, &reference.id, &reason, label)?;
        }

        let insertion = world
            .insert_real(entity, package)
            .map_err(|e| LoadError::from_core(label, e))?;
        if insertion == Insertion::ReplacedSkeleton {
            self.summary.skeletons_replaced += 1;
        }
        *self.summary.applied.entry(T::KIND).or_default() += 1;
        Ok(())
    }

    fn place_npc(
        &mut self,
        world: &mut World,
        decl: NpcDeclaration,
        label: &str,
        package: Option<&str>,
    ) -> Result<(), LoadError> {
        let NpcDeclaration { mut npc, placement } = decl;
        if npc.location.is_none()
            && let Some(Placement { venue, filter }) = placement
        {
            if let Some(venue) = &venue {
                let reason = format!("placement venue of npc '{}' in package {}", npc.id, label);
                self.ensure(world, EntityKind::Venue, venue, &reason, label)?;
            }
            let resolver = world.resolver();
            let resolver = match venue {
                Some(venue) => resolver.scoped_to(venue),
                None => resolver,
            };
            match resolver.find::<Location>(&filter) {
                Some(location) => npc.location = Some(location.id.clone()),
                None => tracing::warn!(
                    package = %label,
                    npc = %npc.id,
                    "no location matches the placement filter; character left unplaced"
                ),
            }
        }
        self.place(world, npc, label, package)
    }

    fn place_route(&mut self, world: &mut World, route: Route, label: &str, package: Option<&str>) -> Result<(), LoadError> {
        let mirror = derive_reverse(&route);
        self.place(world, route, label, package)?;

        if world.registry().is_real(EntityKind::Route, mirror.id.as_str()) {
            tracing::debug!(route = %mirror.id, "reverse route is authored, not deriving");
            return Ok(());
        }
        world.insert_derived(mirror);
        self.summary.derived_routes += 1;
        Ok(())
    }

    fn apply_deck(&mut self, world: &mut World, deck: DeckComposition, label: &str) -> Result<(), LoadError> {
        let reason = format!("deck composition in package {label}");
        self.ensure(world, EntityKind::Npc, &deck.npc, &reason, label)?;

        let reason = format!("deck of npc '{}' in package {}", deck.npc, label);
        for (exchange, _) in &deck.exchanges {
            self.ensure(world, EntityKind::Exchange, exchange, &reason, label)?;
        }
        for (card, _) in &deck.conversation {
            self.ensure(world, EntityKind::Card, card, &reason, label)?;
        }

        let npc = world
            .get_mut::<Npc>(deck.npc.as_str())
            .ok_or_else(|| LoadError::from_core(label, CoreError::not_found(EntityKind::Npc, deck.npc.as_str())))?;
        for (exchange, copies) in deck.exchanges {
            npc.exchange_deck
                .extend(std::iter::repeat_n(exchange, copies as usize));
        }
        for (card, copies) in deck.conversation {
            npc.conversation_deck
                .extend(std::iter::repeat_n(card, copies as usize));
        }
        Ok(())
    }

    fn apply_starting(&mut self, world: &mut World, start: StartingConditions, label: &str) -> Result<(), LoadError> {
        let reason = format!("starting conditions in package {label}");
        self.ensure(world, EntityKind::Location, &start.starting_location, &reason, label)?;
        for obligation in &start.obligations {
            self.ensure(world, EntityKind::Obligation, obligation, &reason, label)?;
        }
        for (npc, tokens) in &start.tokens {
            self.ensure(world, EntityKind::Npc, npc, &reason, label)?;
            if let Some(entry) = world.get_mut::<Npc>(npc.as_str()) {
                entry.tokens.merge(*tokens);
            }
        }

        let player = &mut world.player;
        player.current_location = Some(start.starting_location);
        player.obligations.extend(start.obligations);
        if let Some(coins) = start.player.coins {
            player.coins = coins;
        }
        if let Some(health) = start.player.health {
            player.health = health;
        }
        if let Some(stamina) = start.player.stamina {
            player.stamina = stamina;
        }
        if let Some(day) = start.day {
            player.day = day;
        }
        if let Some(block) = start.time_block {
            player.time_block = block;
        }

        world.meta.starting_package = Some(label.to_string());
        self.starting_package = Some(label.to_string());
        tracing::info!(package = %label, "applied starting conditions");
        Ok(())
    }
}

/// Reject IDs already real in the world or declared twice in one document.
fn check_duplicates(world: &World, entities: &[Declared], label: &str) -> Result<(), LoadError> {
    let mut seen: HashSet<(EntityKind, &EntityId)> = HashSet::new();
    for declared in entities {
        let (kind, id) = (declared.kind(), declared.id());
        if !seen.insert((kind, id)) {
            return Err(LoadError::Duplicate {
                package: label.to_string(),
                kind,
                id: id.clone(),
                first: format!("package {label}"),
            });
        }
        if let Some(entry) = world.registry().get(kind, id.as_str())
            && world.registry().is_real(kind, id.as_str())
        {
            return Err(LoadError::from_core(
                label,
                CoreError::Duplicate {
                    kind,
                    id: id.clone(),
                    first_package: entry.package.clone(),
                },
            ));
        }
    }
    Ok(())
}

/// Reject documents that would overfill a venue.
fn check_capacity(world: &World, entities: &[Declared], label: &str) -> Result<(), LoadError> {
    let mut per_venue: BTreeMap<&EntityId, Vec<&EntityId>> = BTreeMap::new();
    let mut declared_venues: BTreeMap<&EntityId, &Venue> = BTreeMap::new();
    for declared in entities {
        match declared {
            Declared::Location(location) => per_venue.entry(&location.venue).or_default().push(&location.id),
            Declared::Venue(venue) => {
                declared_venues.insert(&venue.id, venue);
            }
            _ => {}
        }
    }

    for (venue, incoming) in per_venue {
        let existing = world
            .locations_in(venue.as_str())
            .into_iter()
            .filter(|l| !incoming.contains(&&l.id))
            .count();
        let count = existing + incoming.len();
        let capacity = declared_venues
            .get(venue)
            .and_then(|v| v.max_locations)
            .or_else(|| world.get::<Venue>(venue.as_str()).and_then(|v| v.max_locations))
            .unwrap_or(world.rules.venue_capacity);
        if count > capacity {
            return Err(LoadError::Capacity {
                package: label.to_string(),
                venue: venue.clone(),
                count,
                capacity,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pw_core::WorldMeta;

    use super::*;

    fn doc(json: &str) -> Document {
        Document::from_json(json, "test.json").unwrap()
    }

    fn world() -> World {
        World::new(WorldMeta::new("Test"))
    }

    const TOWN: &str = r#"{
        "packageId": "core_town",
        "content": {
            "venues": [ { "id": "town", "name": "Millbrook" } ],
            "locations": [
                { "id": "square", "name": "Town Square", "venueId": "town", "properties": ["crossroads"] },
                { "id": "inn", "name": "Copper Kettle", "venueId": "town", "locationType": "inn" }
            ]
        }
    }"#;

    #[test]
    fn applies_entities_and_records_package() {
        let mut world = world();
        let mut applier = PackageApplier::new();
        let outcome = applier.apply(&mut world, &doc(TOWN)).unwrap();

        assert_eq!(outcome, DocumentOutcome::Applied { entities: 3 });
        assert_eq!(world.meta.packages, vec!["core_town".to_string()]);
        assert_eq!(applier.summary().applied_of(EntityKind::Location), 2);
        assert!(world.registry().is_real(EntityKind::Venue, "town"));
    }

    #[test]
    fn same_package_twice_is_skipped() {
        let mut world = world();
        let mut applier = PackageApplier::new();
        applier.apply(&mut world, &doc(TOWN)).unwrap();
        let outcome = applier.apply(&mut world, &doc(TOWN)).unwrap();

        assert_eq!(outcome, DocumentOutcome::Skipped);
        assert_eq!(applier.summary().documents_skipped, 1);
        assert_eq!(world.count::<Location>(), 2);
    }

    #[test]
    fn anonymous_documents_are_always_applied() {
        let mut world = world();
        let mut applier = PackageApplier::new();
        let card = r#"{ "content": { "cards": [ { "id": "small_talk", "name": "Small Talk", "cardType": "social" } ] } }"#;
        applier.apply(&mut world, &doc(card)).unwrap();
        // The second copy reaches the duplicate check instead of being skipped.
        let err = applier.apply(&mut world, &doc(card)).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("an anonymous package"));
    }

    #[test]
    fn duplicate_within_one_document_is_fatal() {
        let mut world = world();
        let mut applier = PackageApplier::new();
        let err = applier
            .apply(
                &mut world,
                &doc(r#"{ "packageId": "p", "content": { "venues": [
                    { "id": "town", "name": "A" }, { "id": "town", "name": "B" } ] } }"#),
            )
            .unwrap_err();
        assert!(matches!(err, LoadError::Duplicate { kind: EntityKind::Venue, .. }));
        assert_eq!(world.count::<Venue>(), 0);
    }

    #[test]
    fn parse_error_leaves_world_untouched() {
        let mut world = world();
        let mut applier = PackageApplier::new();
        let err = applier
            .apply(
                &mut world,
                &doc(r#"{ "packageId": "broken", "content": {
                    "venues": [ { "id": "town", "name": "Town" } ],
                    "locations": [ { "id": "forge", "name": "Forge" } ] } }"#),
            )
            .unwrap_err();

        assert!(!err.is_fatal());
        assert!(err.to_string().contains("broken"));
        assert!(err.to_string().contains("venueId"));
        assert_eq!(world.count::<Venue>(), 0);
        assert!(!applier.is_applied("broken"));
        assert_eq!(applier.summary().documents_failed, 1);
    }

    #[test]
    fn missing_reference_becomes_hub_skeleton() {
        let mut world = world();
        let mut applier = PackageApplier::new();
        applier
            .apply(
                &mut world,
                &doc(r#"{ "packageId": "people", "content": { "npcs": [
                    { "id": "smith", "name": "Garrick", "personality": "steadfast", "profession": "smith", "locationId": "forge" }
                ] } }"#),
            )
            .unwrap();

        assert!(world.is_skeleton(EntityKind::Location, "forge"));
        assert!(world.get::<Location>("forge").is_some_and(Location::is_hub));
        let reason = world
            .registry()
            .get(EntityKind::Location, "forge")
            .and_then(|e| e.reason.clone())
            .unwrap_or_default();
        assert!(reason.contains("npc 'smith'"), "{reason}");
        assert!(reason.contains("people"), "{reason}");
        assert_eq!(applier.summary().skeletons_created, 1);
    }

    #[test]
    fn routes_get_a_derived_mirror() {
        let mut world = world();
        let mut applier = PackageApplier::new();
        applier.apply(&mut world, &doc(TOWN)).unwrap();
        applier
            .apply(
                &mut world,
                &doc(r#"{ "packageId": "roads", "content": { "routes": [
                    { "id": "square_to_mill", "originLocationId": "square", "destinationLocationId": "mill" }
                ] } }"#),
            )
            .unwrap();

        let mirror = world.get::<Route>("mill_to_square").unwrap();
        assert_eq!(mirror.derived_from.as_ref().map(EntityId::as_str), Some("square_to_mill"));
        assert_eq!(applier.summary().derived_routes, 1);
        assert!(world.is_skeleton(EntityKind::Location, "mill"));
    }

    #[test]
    fn authored_reverse_route_is_not_derived_twice() {
        let mut world = world();
        let mut applier = PackageApplier::new();
        applier.apply(&mut world, &doc(TOWN)).unwrap();
        applier
            .apply(
                &mut world,
                &doc(r#"{ "packageId": "roads", "content": { "routes": [
                    { "id": "square_to_inn", "name": "Short Walk", "originLocationId": "square", "destinationLocationId": "inn" },
                    { "id": "inn_to_square", "name": "Walk Back", "originLocationId": "inn", "destinationLocationId": "square" }
                ] } }"#),
            )
            .unwrap();

        assert_eq!(world.count::<Route>(), 2);
        assert_eq!(world.get::<Route>("inn_to_square").map(|r| r.name.as_str()), Some("Walk Back"));
        assert_eq!(applier.summary().derived_routes, 1);
    }

    #[test]
    fn placement_filter_picks_location_in_venue() {
        let mut world = world();
        let mut applier = PackageApplier::new();
        applier.apply(&mut world, &doc(TOWN)).unwrap();
        applier
            .apply(
                &mut world,
                &doc(r#"{ "packageId": "people", "content": { "npcs": [
                    { "id": "marta", "name": "Marta", "personality": "mercantile", "profession": "innkeeper",
                      "placement": { "venueId": "town", "filter": { "locationTypes": ["inn"] } } }
                ] } }"#),
            )
            .unwrap();

        let marta = world.get::<Npc>("marta").unwrap();
        assert_eq!(marta.location.as_ref().map(EntityId::as_str), Some("inn"));
    }

    #[test]
    fn capacity_is_enforced_before_mutation() {
        let mut world = world();
        let mut applier = PackageApplier::new();
        let err = applier
            .apply(
                &mut world,
                &doc(r#"{ "packageId": "tiny", "content": {
                    "venues": [ { "id": "hut", "name": "Hut", "maxLocations": 1 } ],
                    "locations": [
                        { "id": "a", "name": "A", "venueId": "hut" },
                        { "id": "b", "name": "B", "venueId": "hut" }
                    ] } }"#),
            )
            .unwrap_err();
        assert!(matches!(err, LoadError::Capacity { count: 2, capacity: 1, .. }));
        assert_eq!(world.count::<Venue>(), 0);
    }

    #[test]
    fn starting_conditions_have_a_single_writer() {
        let mut world = world();
        let mut applier = PackageApplier::new();
        applier
            .apply(
                &mut world,
                &doc(r#"{ "packageId": "first", "startingConditions": {
                    "playerConfig": { "coins": 12 }, "startingLocationId": "square",
                    "startingTokens": { "elena": { "trust": 2 } } } }"#),
            )
            .unwrap();
        applier
            .apply(
                &mut world,
                &doc(r#"{ "packageId": "second", "startingConditions": {
                    "playerConfig": { "coins": 99 }, "startingLocationId": "docks" } }"#),
            )
            .unwrap();

        assert_eq!(world.player.coins, 12);
        assert_eq!(world.player.current_location.as_ref().map(EntityId::as_str), Some("square"));
        assert_eq!(world.meta.starting_package.as_deref(), Some("first"));
        assert!(!world.contains(EntityKind::Location, "docks"));
        assert_eq!(world.get::<Npc>("elena").map(|n| n.tokens.trust), Some(2));
    }

    #[test]
    fn earned_cards_survive_replacement_alongside_deck_composition() {
        let mut world = world();
        let mut applier = PackageApplier::new();
        applier
            .apply(
                &mut world,
                &doc(r#"{ "packageId": "trades", "content": { "exchanges": [
                    { "id": "buy_bread", "name": "Buy Bread", "npcId": "baker" } ] } }"#),
            )
            .unwrap();
        assert!(world.is_skeleton(EntityKind::Npc, "baker"));

        for reward in ["sweet_roll", "rye_loaf", "honey_cake"] {
            world.grant_exchange("baker", &reward.into()).unwrap();
        }
        world.record_interaction("baker", Utc::now(), 3).unwrap();

        applier
            .apply(
                &mut world,
                &doc(r#"{ "packageId": "people", "content": {
                    "npcs": [ { "id": "baker", "name": "Hilde", "personality": "devoted", "profession": "merchant" } ],
                    "deckCompositions": { "npcDecks": { "baker": { "exchangeDeck": { "buy_bread": 1 } } } } } }"#),
            )
            .unwrap();

        let baker = world.get::<Npc>("baker").unwrap();
        assert!(!baker.is_skeleton());
        assert_eq!(baker.name, "Hilde");
        assert_eq!(baker.exchange_deck.len(), 4);
        assert_eq!(baker.bond, 3);
        assert_eq!(applier.summary().skeletons_replaced, 1);
    }
}
