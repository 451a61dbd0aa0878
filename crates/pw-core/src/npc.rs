use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::component::{Personality, Profession, TokenCounts};
use crate::entity::{Entity, EntityId, EntityKind, Reference, SkeletonInfo};
use crate::world::{World, WorldIndex};

/// A non-player character.
///
/// `exchange_deck` and `conversation_deck` hold both authored entries (from
/// deck compositions) and cards earned during play. Together with `tokens`,
/// `bond` and `last_interaction` they survive skeleton replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Npc {
    /// Identifier.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Flavour text.
    pub description: String,
    /// Where the character spends their time, if placed.
    pub location: Option<EntityId>,
    /// Conversational temperament.
    pub personality: Personality,
    /// Occupation.
    pub profession: Profession,
    /// Difficulty tier, 1–3.
    pub tier: u8,
    /// Short role line, e.g. "Blacksmith of the lower ward".
    pub role: String,
    /// Exchange IDs this character offers.
    pub exchange_deck: Vec<EntityId>,
    /// Card IDs available in conversations with this character.
    pub conversation_deck: Vec<EntityId>,
    /// Relationship tokens with the player.
    pub tokens: TokenCounts,
    /// Relationship strength with the player.
    pub bond: i32,
    /// When the player last spoke with this character.
    pub last_interaction: Option<DateTime<Utc>>,
    /// Set when this character is a placeholder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<SkeletonInfo>,
}

impl Npc {
    /// Create a real, unplaced character with neutral state.
    pub fn new(
        id: impl Into<EntityId>,
        name: impl Into<String>,
        personality: Personality,
        profession: Profession,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            location: None,
            personality,
            profession,
            tier: 1,
            role: String::new(),
            exchange_deck: Vec::new(),
            conversation_deck: Vec::new(),
            tokens: TokenCounts::default(),
            bond: 0,
            last_interaction: None,
            skeleton: None,
        }
    }

    /// Builder: place at a location.
    pub fn at(mut self, location: impl Into<EntityId>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl Entity for Npc {
    const KIND: EntityKind = EntityKind::Npc;

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
        let mut refs = Vec::new();
        if let Some(location) = &self.location {
            refs.push(Reference::new(EntityKind::Location, location, "locationId"));
        }
        refs.extend(
            self.exchange_deck
                .iter()
                .map(|id| Reference::new(EntityKind::Exchange, id, "exchangeDeck")),
        );
        refs.extend(
            self.conversation_deck
                .iter()
                .map(|id| Reference::new(EntityKind::Card, id, "conversationDeck")),
        );
        refs
    }

    fn absorb(&mut self, placeholder: &mut Self) {
        // Authored entries first, then whatever was earned on the placeholder.
        self.exchange_deck.append(&mut placeholder.exchange_deck);
        self.conversation_deck.append(&mut placeholder.conversation_deck);
        self.tokens.merge(std::mem::take(&mut placeholder.tokens));
        self.bond += std::mem::take(&mut placeholder.bond);
        self.last_interaction = self.last_interaction.max(placeholder.last_interaction.take());
    }

    fn table(world: &World) -> &IndexMap<EntityId, Self> {
        &world.npcs
    }

    fn table_mut(world: &mut World) -> &mut IndexMap<EntityId, Self> {
        &mut world.npcs
    }

    fn index(&self, index: &mut WorldIndex) {
        if let Some(location) = &self.location {
            index
                .npcs_by_location
                .entry(location.clone())
                .or_default()
                .push(self.id.clone());
        }
    }

    fn unindex(&self, index: &mut WorldIndex) {
        if let Some(location) = &self.location
            && let Some(ids) = index.npcs_by_location.get_mut(location)
        {
            ids.retain(|id| id != &self.id);
            if ids.is_empty() {
                index.npcs_by_location.remove(location);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_cover_location_and_decks() {
        let mut elena = Npc::new("elena", "Elena", Personality::Devoted, Profession::Scholar).at("library");
        elena.exchange_deck.push(EntityId::new("copy_manuscript"));
        elena.conversation_deck.push(EntityId::new("small_talk"));

        let kinds: Vec<_> = elena.references().into_iter().map(|r| (r.kind, r.id.to_string())).collect();
        assert_eq!(
            kinds,
            vec![
                (EntityKind::Location, "library".to_string()),
                (EntityKind::Exchange, "copy_manuscript".to_string()),
                (EntityKind::Card, "small_talk".to_string()),
            ]
        );
    }

    #[test]
    fn absorb_keeps_authored_cards_first() {
        let mut placeholder = Npc::new("smith", "[MISSING: smith]", Personality::Proud, Profession::Smith);
        placeholder.exchange_deck = vec!["a".into(), "b".into(), "c".into()];
        placeholder.tokens.trust = 2;
        placeholder.bond = 3;

        let mut real = Npc::new("smith", "Garrick", Personality::Steadfast, Profession::Smith);
        real.exchange_deck.push("forge_blade".into());
        real.absorb(&mut placeholder);

        let deck: Vec<_> = real.exchange_deck.iter().map(EntityId::as_str).collect();
        assert_eq!(deck, vec!["forge_blade", "a", "b", "c"]);
        assert_eq!(real.tokens.trust, 2);
        assert_eq!(real.bond, 3);
        assert!(placeholder.exchange_deck.is_empty());
    }
}
