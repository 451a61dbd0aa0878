use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::component::CardType;
use crate::entity::{Entity, EntityId, EntityKind, Reference, SkeletonInfo};
use crate::world::World;

// ---------------------------------------------------------------------------
// Card
// ---------------------------------------------------------------------------

/// A playable card. Effects are opaque strings interpreted by the card engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Identifier.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Flavour text.
    pub description: String,
    /// Which challenge system the card is played in.
    pub card_type: CardType,
    /// Depth, 1–10. Deeper cards need more understanding to play.
    pub depth: u8,
    /// Focus spent to play it.
    pub focus: u8,
    /// Effect identifier for the card engine.
    pub effect: String,
    /// Set when this card is a placeholder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<SkeletonInfo>,
}

impl Card {
    /// Create a real card.
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>, card_type: CardType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            card_type,
            depth: 1,
            focus: 0,
            effect: String::new(),
            skeleton: None,
        }
    }
}

impl Entity for Card {
    const KIND: EntityKind = EntityKind::Card;

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
        &world.cards
    }

    fn table_mut(world: &mut World) -> &mut IndexMap<EntityId, Self> {
        &mut world.cards
    }
}

// ---------------------------------------------------------------------------
// Exchange
// ---------------------------------------------------------------------------

/// A trade a character offers: pay `cost`, receive `reward`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    /// Identifier.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Flavour text.
    pub description: String,
    /// The character offering the trade.
    pub npc: Option<EntityId>,
    /// Resources paid, by resource name.
    pub cost: BTreeMap<String, u32>,
    /// Resources gained, by resource name.
    pub reward: BTreeMap<String, u32>,
    /// How many times the player completed this trade.
    #[serde(default)]
    pub uses: u32,
    /// Set when this exchange is a placeholder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<SkeletonInfo>,
}

impl Exchange {
    /// Create a real exchange with no cost or reward.
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            npc: None,
            cost: BTreeMap::new(),
            reward: BTreeMap::new(),
            uses: 0,
            skeleton: None,
        }
    }
}

impl Entity for Exchange {
    const KIND: EntityKind = EntityKind::Exchange;

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
        self.npc
            .iter()
            .map(|npc| Reference::new(EntityKind::Npc, npc, "npcId"))
            .collect()
    }

    fn absorb(&mut self, placeholder: &mut Self) {
        self.uses += std::mem::take(&mut placeholder.uses);
    }

    fn table(world: &World) -> &IndexMap<EntityId, Self> {
        &world.exchanges
    }

    fn table_mut(world: &mut World) -> &mut IndexMap<EntityId, Self> {
        &mut world.exchanges
    }
}

// ---------------------------------------------------------------------------
// Obligation
// ---------------------------------------------------------------------------

/// A task a patron asks of the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obligation {
    /// Identifier.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Flavour text.
    pub description: String,
    /// The character who asked.
    pub patron: Option<EntityId>,
    /// Time segments until it lapses.
    pub deadline: Option<u32>,
    /// Coins paid on completion.
    pub reward_coins: u32,
    /// Steps completed so far.
    #[serde(default)]
    pub progress: u32,
    /// Set when this obligation is a placeholder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<SkeletonInfo>,
}

impl Obligation {
    /// Create a real obligation.
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            patron: None,
            deadline: None,
            reward_coins: 0,
            progress: 0,
            skeleton: None,
        }
    }
}

impl Entity for Obligation {
    const KIND: EntityKind = EntityKind::Obligation;

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
        self.patron
            .iter()
            .map(|npc| Reference::new(EntityKind::Npc, npc, "patronId"))
            .collect()
    }

    fn absorb(&mut self, placeholder: &mut Self) {
        self.progress = self.progress.max(placeholder.progress);
    }

    fn table(world: &World) -> &IndexMap<EntityId, Self> {
        &world.obligations
    }

    fn table_mut(world: &mut World) -> &mut IndexMap<EntityId, Self> {
        &mut world.obligations
    }
}
