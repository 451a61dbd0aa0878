use std::collections::{BTreeMap, BTreeSet};

use pw_core::{EntityId, EntityKind};
use serde_json::Value;

use crate::document::Document;

/// Foreign IDs one document references, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    /// Referenced IDs not declared by the document itself.
    pub references: BTreeMap<EntityKind, BTreeSet<EntityId>>,
    /// Total number of foreign reference occurrences.
    pub score: usize,
}

impl DependencySet {
    /// Whether the document references nothing outside itself.
    pub fn is_empty(&self) -> bool {
        self.score == 0
    }

    /// Foreign IDs of one kind.
    pub fn of(&self, kind: EntityKind) -> impl Iterator<Item = &EntityId> {
        self.references.get(&kind).into_iter().flatten()
    }

    /// Number of distinct foreign IDs.
    pub fn distinct(&self) -> usize {
        self.references.values().map(BTreeSet::len).sum()
    }
}

/// Reference-bearing fields: (declaring kind, field, referenced kind).
const REFERENCE_FIELDS: &[(EntityKind, &str, EntityKind)] = &[
    (EntityKind::Location, "venueId", EntityKind::Venue),
    (EntityKind::Npc, "locationId", EntityKind::Location),
    (EntityKind::Exchange, "npcId", EntityKind::Npc),
    (EntityKind::Obligation, "patronId", EntityKind::Npc),
    (EntityKind::Route, "originLocationId", EntityKind::Location),
    (EntityKind::Route, "destinationLocationId", EntityKind::Location),
];

/// Collect every foreign ID a document references.
///
/// Works on the raw declarations, so it runs before conversion and skips
/// absent or malformed fields instead of failing.
pub fn analyze(document: &Document) -> DependencySet {
    let declared: BTreeMap<EntityKind, BTreeSet<&str>> = EntityKind::ALL
        .into_iter()
        .map(|kind| (kind, document.declared_ids(kind)))
        .collect();
    let mut collector = Collector {
        declared,
        set: DependencySet::default(),
    };

    for &(owner, field, target) in REFERENCE_FIELDS {
        for declaration in document.declarations(owner) {
            collector.note(target, declaration.get(field));
        }
    }

    for npc in document.declarations(EntityKind::Npc) {
        collector.note(EntityKind::Venue, npc.get("placement").and_then(|p| p.get("venueId")));
    }

    if let Some(decks) = document
        .content
        .deck_compositions
        .as_ref()
        .and_then(|d| d.get("npcDecks"))
        .and_then(Value::as_object)
    {
        for (npc, deck) in decks {
            collector.add(EntityKind::Npc, npc);
            collector.keys(EntityKind::Exchange, deck.get("exchangeDeck"));
            collector.keys(EntityKind::Card, deck.get("conversationDeck"));
        }
    }

    if let Some(start) = &document.starting_conditions {
        collector.note(EntityKind::Location, start.get("startingLocationId"));
        if let Some(obligations) = start.get("startingObligations").and_then(Value::as_array) {
            for obligation in obligations {
                collector.note(EntityKind::Obligation, Some(obligation));
            }
        }
        collector.keys(EntityKind::Npc, start.get("startingTokens"));
    }

    collector.set
}

struct Collector<'d> {
    declared: BTreeMap<EntityKind, BTreeSet<&'d str>>,
    set: DependencySet,
}

impl Collector<'_> {
    fn note(&mut self, kind: EntityKind, value: Option<&Value>) {
        if let Some(id) = value.and_then(Value::as_str) {
            self.add(kind, id);
        }
    }

    fn keys(&mut self, kind: EntityKind, value: Option<&Value>) {
        if let Some(map) = value.and_then(Value::as_object) {
            for id in map.keys() {
                self.add(kind, id);
            }
        }
    }

    fn add(&mut self, kind: EntityKind, id: &str) {
        if id.trim().is_empty() || self.declared.get(&kind).is_some_and(|ids| ids.contains(id)) {
            return;
        }
        self.set.references.entry(kind).or_default().insert(EntityId::new(id));
        self.set.score += 1;
    }
}
