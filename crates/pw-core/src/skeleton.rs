//! Deterministic placeholders for entities that are referenced before (or
//! without) being defined.
//!
//! Every attribute of a skeleton is derived from a stable hash of its ID, so
//! the same ID always yields the same placeholder, across runs and machines.

use std::collections::{BTreeMap, BTreeSet};

use crate::card::{Card, Exchange, Obligation};
use crate::component::{
    CardType, Categorical, LocationProperty, LocationType, Personality, Profession, TokenCounts,
};
use crate::entity::{Entity, EntityId, SkeletonInfo};
use crate::location::{Location, LocationState, Venue};
use crate::npc::Npc;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Display name given to every skeleton.
pub fn missing_name(id: &EntityId) -> String {
    format!("[MISSING: {id}]")
}

/// ID of the venue a location skeleton is created in.
pub fn placeholder_venue_id(location: &EntityId) -> EntityId {
    EntityId::new(format!("{location}:venue"))
}

/// ID of the hub synthesized for a placeholder venue that lacks one.
pub fn placeholder_hub_id(venue: &EntityId) -> EntityId {
    EntityId::new(format!("{venue}:crossroads"))
}

fn fnv1a_fold(mut hash: u64, bytes: &[u8]) -> u64 {
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// FNV-1a hash of an ID, salted per attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StableHash(u64);

impl StableHash {
    /// Hash an identifier.
    pub fn of(id: &str) -> Self {
        Self(fnv1a_fold(FNV_OFFSET, id.as_bytes()))
    }

    /// The raw hash value.
    pub fn value(self) -> u64 {
        self.0
    }

    /// Hash value for one attribute.
    pub fn salted(self, salt: &str) -> u64 {
        fnv1a_fold(fnv1a_fold(self.0, &[0xff]), salt.as_bytes())
    }

    /// Pick one variant of a categorical type.
    pub fn choose<T: Categorical>(self, salt: &str) -> T {
        let options = T::ALL;
        options[(self.salted(salt) % options.len() as u64) as usize]
    }

    /// Pick an integer in `low..=high`.
    pub fn range(self, salt: &str, low: u32, high: u32) -> u32 {
        if high <= low {
            return low;
        }
        low + (self.salted(salt) % u64::from(high - low + 1)) as u32
    }
}

/// Entities that can stand in for a missing definition.
pub trait Synthesize: Entity {
    /// Build the placeholder for `id`. Pure: same `id`, same result.
    fn synthesize(id: &EntityId, source: &str) -> Self;
}

impl Synthesize for Venue {
    fn synthesize(id: &EntityId, source: &str) -> Self {
        let hash = StableHash::of(id.as_str());
        Venue {
            id: id.clone(),
            name: missing_name(id),
            description: "A place nobody has written about yet.".to_string(),
            venue_type: hash.choose("venue_type"),
            district: None,
            tier: hash.range("tier", 1, 3) as u8,
            max_locations: None,
            skeleton: Some(SkeletonInfo::new(source)),
        }
    }
}

/// Properties a location skeleton may carry besides the hub marker.
const FLAVOUR_PROPERTIES: [LocationProperty; 5] = [
    LocationProperty::Public,
    LocationProperty::Quiet,
    LocationProperty::Busy,
    LocationProperty::Indoor,
    LocationProperty::Outdoor,
];

impl Synthesize for Location {
    fn synthesize(id: &EntityId, source: &str) -> Self {
        hub_location(id, &placeholder_venue_id(id), source)
    }
}

/// A location skeleton with the hub role, placed in `venue`.
pub fn hub_location(id: &EntityId, venue: &EntityId, source: &str) -> Location {
    let hash = StableHash::of(id.as_str());
    let flavour = FLAVOUR_PROPERTIES[(hash.salted("property") % FLAVOUR_PROPERTIES.len() as u64) as usize];
    let location_type: LocationType = hash.choose("location_type");
    Location {
        id: id.clone(),
        name: missing_name(id),
        description: format!("An unremarkable {location_type} awaiting its description."),
        venue: venue.clone(),
        location_type,
        properties: BTreeSet::from([LocationProperty::Crossroads, flavour]),
        tier: hash.range("tier", 1, 3) as u8,
        position: None,
        skeleton: Some(SkeletonInfo::new(source)),
        state: LocationState::default(),
    }
}

impl Synthesize for Npc {
    fn synthesize(id: &EntityId, source: &str) -> Self {
        let hash = StableHash::of(id.as_str());
        let profession: Profession = hash.choose("profession");
        let personality: Personality = hash.choose("personality");
        Npc {
            id: id.clone(),
            name: missing_name(id),
            description: format!("A {personality} {profession} with no story yet."),
            location: None,
            personality,
            profession,
            tier: hash.range("tier", 1, 3) as u8,
            role: format!("Placeholder {profession}"),
            exchange_deck: Vec::new(),
            conversation_deck: Vec::new(),
            tokens: TokenCounts::default(),
            bond: 0,
            last_interaction: None,
            skeleton: Some(SkeletonInfo::new(source)),
        }
    }
}

const CARD_EFFECTS: [&str; 3] = ["draw_one", "gain_momentum", "ease_doubt"];

impl Synthesize for Card {
    fn synthesize(id: &EntityId, source: &str) -> Self {
        let hash = StableHash::of(id.as_str());
        let card_type: CardType = hash.choose("card_type");
        Card {
            id: id.clone(),
            name: missing_name(id),
            description: format!("A generic {card_type} card."),
            card_type,
            depth: hash.range("depth", 1, 3) as u8,
            focus: hash.range("focus", 0, 2) as u8,
            effect: CARD_EFFECTS[(hash.salted("effect") % CARD_EFFECTS.len() as u64) as usize]
                .to_string(),
            skeleton: Some(SkeletonInfo::new(source)),
        }
    }
}

const EXCHANGE_REWARDS: [&str; 3] = ["food", "rest", "information"];

impl Synthesize for Exchange {
    fn synthesize(id: &EntityId, source: &str) -> Self {
        let hash = StableHash::of(id.as_str());
        let reward = EXCHANGE_REWARDS[(hash.salted("reward") % EXCHANGE_REWARDS.len() as u64) as usize];
        Exchange {
            id: id.clone(),
            name: missing_name(id),
            description: "A modest trade.".to_string(),
            npc: None,
            cost: BTreeMap::from([("coins".to_string(), hash.range("cost", 1, 5))]),
            reward: BTreeMap::from([(reward.to_string(), 1)]),
            uses: 0,
            skeleton: Some(SkeletonInfo::new(source)),
        }
    }
}

impl Synthesize for Obligation {
    fn synthesize(id: &EntityId, source: &str) -> Self {
        let hash = StableHash::of(id.as_str());
        Obligation {
            id: id.clone(),
            name: missing_name(id),
            description: "Someone needs something done.".to_string(),
            patron: None,
            deadline: Some(hash.range("deadline", 6, 24)),
            reward_coins: hash.range("reward", 2, 10),
            progress: 0,
            skeleton: Some(SkeletonInfo::new(source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fnv_matches_reference_values() {
        assert_eq!(StableHash::of("").value(), 0xcbf2_9ce4_8422_2325);
        assert_eq!(StableHash::of("a").value(), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn location_skeleton_is_hub_in_own_venue() {
        let forge = Location::synthesize(&"forge".into(), "location of npc 'smith'");
        assert!(forge.is_hub());
        assert_eq!(forge.venue.as_str(), "forge:venue");
        assert_eq!(forge.name, "[MISSING: forge]");
        assert_eq!(
            forge.skeleton.as_ref().map(|s| s.source.as_str()),
            Some("location of npc 'smith'")
        );
        assert_eq!(forge.properties.len(), 2);
    }

    #[test]
    fn npc_skeleton_is_playable() {
        let npc = Npc::synthesize(&"stranger".into(), "patron of obligation 'x'");
        assert!((1..=3).contains(&npc.tier));
        assert!(!npc.name.is_empty());
        assert!(!npc.description.is_empty());
        assert!(npc.is_skeleton());
    }

    #[test]
    fn exchange_skeleton_has_cost_and_reward() {
        let exchange = Exchange::synthesize(&"buy_bread".into(), "test");
        assert_eq!(exchange.cost.len(), 1);
        assert_eq!(exchange.reward.len(), 1);
        assert!((1..=5).contains(&exchange.cost["coins"]));
    }

    #[test]
    fn range_collapses_empty_interval() {
        assert_eq!(StableHash::of("x").range("r", 4, 4), 4);
        assert_eq!(StableHash::of("x").range("r", 5, 2), 5);
    }

    proptest! {
        #[test]
        fn same_id_same_skeleton(id in "[a-z_]{1,24}") {
            let id = EntityId::new(id);
            prop_assert_eq!(Npc::synthesize(&id, "a"), Npc::synthesize(&id, "a"));
            prop_assert_eq!(Location::synthesize(&id, "a"), Location::synthesize(&id, "a"));
            prop_assert_eq!(Venue::synthesize(&id, "a"), Venue::synthesize(&id, "a"));
            prop_assert_eq!(Card::synthesize(&id, "a"), Card::synthesize(&id, "a"));
            prop_assert_eq!(Exchange::synthesize(&id, "a"), Exchange::synthesize(&id, "a"));
            prop_assert_eq!(Obligation::synthesize(&id, "a"), Obligation::synthesize(&id, "a"));
        }

        #[test]
        fn attributes_do_not_depend_on_reason(id in "[a-z_]{1,24}") {
            let id = EntityId::new(id);
            let first = Npc::synthesize(&id, "first reason");
            let second = Npc::synthesize(&id, "another reason");
            prop_assert_eq!(first.personality, second.personality);
            prop_assert_eq!(first.profession, second.profession);
            prop_assert_eq!(first.tier, second.tier);
        }

        #[test]
        fn tiers_stay_in_range(id in ".{0,32}") {
            let id = EntityId::new(id);
            let npc = Npc::synthesize(&id, "r");
            let location = Location::synthesize(&id, "r");
            prop_assert!((1..=3).contains(&npc.tier));
            prop_assert!((1..=3).contains(&location.tier));
            prop_assert!(location.is_hub());
        }
    }
}
