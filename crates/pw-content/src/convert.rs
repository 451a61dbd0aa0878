//! Conversion of raw JSON declarations into domain entities.
//!
//! Each entity kind has one row in [`CONVERTERS`]. A converter is a pure
//! function from a declaration to a [`Declared`] value; it never touches the
//! world, so a document can be converted completely before anything is
//! applied.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use pw_core::component::{
    CardType, Categorical, HexCoord, LocationProperty, LocationType, Personality, Profession,
    SegmentKind, TerrainCategory, TimeBlock, TokenCounts, TokenType, TravelMethod, VenueType,
    WeatherCondition, parse_label,
};
use pw_core::route::{RouteSegment, WeatherModifier};
use pw_core::{
    Card, EntityId, EntityKind, Exchange, Location, Npc, Obligation, PlacementFilter, Route, Venue,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::LoadError;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// What is wrong with a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    /// Required but absent (or null).
    Missing,
    /// A categorical label outside the accepted set.
    Invalid {
        /// The label as written.
        value: String,
        /// Accepted labels.
        expected: Vec<&'static str>,
    },
    /// Wrong JSON type or out of range.
    Malformed(String),
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "is missing"),
            Self::Invalid { value, .. } => write!(f, "has unknown value \"{value}\""),
            Self::Malformed(reason) => write!(f, "is malformed: {reason}"),
        }
    }
}

/// A declaration that could not be converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Declared ID, when it could be read.
    pub entity: Option<String>,
    /// Offending field.
    pub field: String,
    /// What is wrong with it.
    pub problem: Problem,
}

impl FieldError {
    /// Attach package and kind context.
    pub fn into_load_error(self, package: &str, kind: &str) -> LoadError {
        let help = match &self.problem {
            Problem::Invalid { expected, .. } => Some(format!("expected one of: {}", expected.join(", "))),
            Problem::Missing => Some(format!("add a `{}` field to the declaration", self.field)),
            Problem::Malformed(_) => None,
        };
        LoadError::Parse {
            package: package.to_string(),
            kind: kind.to_string(),
            entity: self.entity,
            field: self.field,
            problem: self.problem.to_string(),
            help,
        }
    }
}

type Converted<T> = Result<T, FieldError>;

// ---------------------------------------------------------------------------
// Field reader
// ---------------------------------------------------------------------------

/// Typed access to the fields of one JSON object. Null counts as absent.
struct Fields<'a> {
    map: &'a Map<String, Value>,
    entity: Option<String>,
}

impl<'a> Fields<'a> {
    fn new(value: &'a Value) -> Converted<Self> {
        let map = value.as_object().ok_or_else(|| FieldError {
            entity: None,
            field: "<declaration>".to_string(),
            problem: Problem::Malformed("expected a JSON object".to_string()),
        })?;
        let entity = map.get("id").and_then(Value::as_str).map(str::to_string);
        Ok(Self { map, entity })
    }

    fn fail(&self, field: &str, problem: Problem) -> FieldError {
        FieldError {
            entity: self.entity.clone(),
            field: field.to_string(),
            problem,
        }
    }

    fn malformed(&self, field: &str, reason: impl Into<String>) -> FieldError {
        self.fail(field, Problem::Malformed(reason.into()))
    }

    fn raw(&self, field: &str) -> Option<&'a Value> {
        self.map.get(field).filter(|v| !v.is_null())
    }

    fn id(&self) -> Converted<EntityId> {
        match self.required_str("id")? {
            id if id.trim().is_empty() => Err(self.malformed("id", "must not be empty")),
            id => Ok(EntityId::new(id)),
        }
    }

    fn optional_str(&self, field: &str) -> Converted<Option<String>> {
        match self.raw(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.malformed(field, "expected a string")),
        }
    }

    fn required_str(&self, field: &str) -> Converted<String> {
        self.optional_str(field)?
            .ok_or_else(|| self.fail(field, Problem::Missing))
    }

    fn str_or(&self, field: &str, default: &str) -> Converted<String> {
        Ok(self
            .optional_str(field)?
            .unwrap_or_else(|| default.to_string()))
    }

    fn optional_id(&self, field: &str) -> Converted<Option<EntityId>> {
        match self.optional_str(field)? {
            Some(id) if id.trim().is_empty() => Err(self.malformed(field, "must not be empty")),
            other => Ok(other.map(EntityId::new)),
        }
    }

    fn required_id(&self, field: &str) -> Converted<EntityId> {
        self.optional_id(field)?
            .ok_or_else(|| self.fail(field, Problem::Missing))
    }

    fn parse<T: Categorical>(&self, field: &str, raw: &str) -> Converted<T> {
        parse_label(raw).map_err(|e| {
            self.fail(
                field,
                Problem::Invalid {
                    value: e.value,
                    expected: e.expected,
                },
            )
        })
    }

    fn label<T: Categorical>(&self, field: &str) -> Converted<T> {
        let raw = self.required_str(field)?;
        self.parse(field, &raw)
    }

    fn label_or<T: Categorical>(&self, field: &str, default: T) -> Converted<T> {
        match self.optional_str(field)? {
            Some(raw) => self.parse(field, &raw),
            None => Ok(default),
        }
    }

    fn labels<T: Categorical + Ord>(&self, field: &str) -> Converted<BTreeSet<T>> {
        let Some(raw) = self.raw(field) else {
            return Ok(BTreeSet::new());
        };
        let items = raw
            .as_array()
            .ok_or_else(|| self.malformed(field, "expected a list of labels"))?;
        items
            .iter()
            .map(|item| {
                let label = item
                    .as_str()
                    .ok_or_else(|| self.malformed(field, "expected a list of labels"))?;
                self.parse(field, label)
            })
            .collect()
    }

    fn number<T: TryFrom<i64>>(&self, field: &str, default: T) -> Converted<T> {
        let Some(raw) = self.raw(field) else {
            return Ok(default);
        };
        let n = raw
            .as_i64()
            .ok_or_else(|| self.malformed(field, "expected an integer"))?;
        T::try_from(n).map_err(|_| self.malformed(field, format!("{n} is out of range")))
    }

    fn optional_number<T: TryFrom<i64>>(&self, field: &str) -> Converted<Option<T>> {
        let Some(raw) = self.raw(field) else {
            return Ok(None);
        };
        let n = raw
            .as_i64()
            .ok_or_else(|| self.malformed(field, "expected an integer"))?;
        T::try_from(n)
            .map(Some)
            .map_err(|_| self.malformed(field, format!("{n} is out of range")))
    }

    fn ids(&self, field: &str) -> Converted<Vec<EntityId>> {
        let Some(raw) = self.raw(field) else {
            return Ok(Vec::new());
        };
        let items = raw
            .as_array()
            .ok_or_else(|| self.malformed(field, "expected a list of ids"))?;
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .filter(|s| !s.trim().is_empty())
                    .map(EntityId::new)
                    .ok_or_else(|| self.malformed(field, "expected a list of ids"))
            })
            .collect()
    }

    /// Non-negative counts keyed by ID, collected in document order.
    fn counts<C>(&self, field: &str) -> Converted<C>
    where
        C: Default + FromIterator<(String, u32)>,
    {
        let Some(raw) = self.raw(field) else {
            return Ok(C::default());
        };
        let map = raw
            .as_object()
            .ok_or_else(|| self.malformed(field, "expected an object of counts"))?;
        map.iter()
            .map(|(key, value)| {
                value
                    .as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .map(|n| (key.clone(), n))
                    .ok_or_else(|| self.malformed(field, format!("count for `{key}` must be a non-negative integer")))
            })
            .collect()
    }

    fn object<T: DeserializeOwned>(&self, field: &str) -> Converted<Option<T>> {
        self.raw(field)
            .map(|raw| T::deserialize(raw).map_err(|e| self.malformed(field, e.to_string())))
            .transpose()
    }

    fn nested(&self, field: &str) -> Converted<Option<Fields<'a>>> {
        match self.raw(field) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(Fields {
                map,
                entity: self.entity.clone(),
            })),
            Some(_) => Err(self.malformed(field, "expected an object")),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversion table
// ---------------------------------------------------------------------------

/// A character declaration plus its deferred placement.
#[derive(Debug, Clone, PartialEq)]
pub struct NpcDeclaration {
    /// The character, placed if `locationId` was given.
    pub npc: Npc,
    /// Filter-based placement resolved at apply time.
    pub placement: Option<Placement>,
}

/// "Put this character somewhere matching the filter."
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Placement {
    /// Venue the search is scoped to.
    pub venue: Option<EntityId>,
    /// Location predicates.
    pub filter: PlacementFilter,
}

/// One converted declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Declared {
    /// A venue.
    Venue(Venue),
    /// A location.
    Location(Location),
    /// A card.
    Card(Card),
    /// A character.
    Npc(NpcDeclaration),
    /// An exchange.
    Exchange(Exchange),
    /// An obligation.
    Obligation(Obligation),
    /// A route.
    Route(Route),
}

impl Declared {
    /// Kind of the declared entity.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Venue(_) => EntityKind::Venue,
            Self::Location(_) => EntityKind::Location,
            Self::Card(_) => EntityKind::Card,
            Self::Npc(_) => EntityKind::Npc,
            Self::Exchange(_) => EntityKind::Exchange,
            Self::Obligation(_) => EntityKind::Obligation,
            Self::Route(_) => EntityKind::Route,
        }
    }

    /// ID of the declared entity.
    pub fn id(&self) -> &EntityId {
        match self {
            Self::Venue(v) => &v.id,
            Self::Location(l) => &l.id,
            Self::Card(c) => &c.id,
            Self::Npc(n) => &n.npc.id,
            Self::Exchange(e) => &e.id,
            Self::Obligation(o) => &o.id,
            Self::Route(r) => &r.id,
        }
    }
}

/// One row of the conversion table.
pub struct Converter {
    /// Kind this row converts.
    pub kind: EntityKind,
    /// The conversion function.
    pub convert: fn(&Value) -> Result<Declared, FieldError>,
}

/// Every converter, in application order.
pub const CONVERTERS: [Converter; 7] = [
    Converter {
        kind: EntityKind::Venue,
        convert: convert_venue,
    },
    Converter {
        kind: EntityKind::Location,
        convert: convert_location,
    },
    Converter {
        kind: EntityKind::Card,
        convert: convert_card,
    },
    Converter {
        kind: EntityKind::Npc,
        convert: convert_npc,
    },
    Converter {
        kind: EntityKind::Exchange,
        convert: convert_exchange,
    },
    Converter {
        kind: EntityKind::Obligation,
        convert: convert_obligation,
    },
    Converter {
        kind: EntityKind::Route,
        convert: convert_route,
    },
];

fn convert_venue(value: &Value) -> Converted<Declared> {
    let f = Fields::new(value)?;
    let mut venue = Venue::new(f.id()?, f.required_str("name")?, f.label_or("venueType", VenueType::Town)?);
    venue.description = f.str_or("description", "")?;
    venue.district = f.optional_str("district")?;
    venue.tier = f.number("tier", 1)?;
    venue.max_locations = f.optional_number("maxLocations")?;
    Ok(Declared::Venue(venue))
}

fn convert_location(value: &Value) -> Converted<Declared> {
    let f = Fields::new(value)?;
    let mut location = Location::new(
        f.id()?,
        f.required_str("name")?,
        f.required_id("venueId")?,
        f.label_or("locationType", LocationType::Square)?,
    );
    location.description = f.str_or("description", "")?;
    location.properties = f.labels::<LocationProperty>("properties")?;
    location.tier = f.number("tier", 1)?;
    location.position = f.object::<HexCoord>("hex")?;
    Ok(Declared::Location(location))
}

fn convert_card(value: &Value) -> Converted<Declared> {
    let f = Fields::new(value)?;
    let mut card = Card::new(f.id()?, f.required_str("name")?, f.label::<CardType>("cardType")?);
    card.description = f.str_or("description", "")?;
    card.depth = f.number("depth", 1)?;
    card.focus = f.number("focus", 0)?;
    card.effect = f.str_or("effect", "")?;
    Ok(Declared::Card(card))
}

fn convert_npc(value: &Value) -> Converted<Declared> {
    let f = Fields::new(value)?;
    let mut npc = Npc::new(
        f.id()?,
        f.required_str("name")?,
        f.label::<Personality>("personality")?,
        f.label::<Profession>("profession")?,
    );
    npc.description = f.str_or("description", "")?;
    npc.location = f.optional_id("locationId")?;
    npc.tier = f.number("tier", 1)?;
    npc.role = f.str_or("role", "")?;
    npc.bond = f.number("bond", 0)?;

    let placement = match f.nested("placement")? {
        Some(p) => Some(Placement {
            venue: p.optional_id("venueId")?,
            filter: p.object::<PlacementFilter>("filter")?.unwrap_or_default(),
        }),
        None => None,
    };
    Ok(Declared::Npc(NpcDeclaration { npc, placement }))
}

fn convert_exchange(value: &Value) -> Converted<Declared> {
    let f = Fields::new(value)?;
    let mut exchange = Exchange::new(f.id()?, f.required_str("name")?);
    exchange.description = f.str_or("description", "")?;
    exchange.npc = f.optional_id("npcId")?;
    exchange.cost = f.counts("cost")?;
    exchange.reward = f.counts("reward")?;
    Ok(Declared::Exchange(exchange))
}

fn convert_obligation(value: &Value) -> Converted<Declared> {
    let f = Fields::new(value)?;
    let mut obligation = Obligation::new(f.id()?, f.required_str("name")?);
    obligation.description = f.str_or("description", "")?;
    obligation.patron = f.optional_id("patronId")?;
    obligation.deadline = f.optional_number("deadline")?;
    obligation.reward_coins = f.number("rewardCoins", 0)?;
    Ok(Declared::Obligation(obligation))
}

fn convert_route(value: &Value) -> Converted<Declared> {
    let f = Fields::new(value)?;
    let id = f.id()?;
    let mut route = Route::new(
        id.clone(),
        f.required_id("originLocationId")?,
        f.required_id("destinationLocationId")?,
    );
    route.name = f.str_or("name", id.as_str())?;
    route.description = f.str_or("description", "")?;
    route.method = f.label_or("method", TravelMethod::Walking)?;
    route.coin_cost = f.number("coinCost", 0)?;
    route.stamina_cost = f.number("staminaCost", 0)?;
    route.travel_minutes = f.number("travelMinutes", 0)?;
    route.danger = f.number("danger", 0)?;
    route.terrain = f.labels::<TerrainCategory>("terrain")?;
    route.weather = convert_weather(&f)?;
    route.segments = convert_segments(&f)?;
    Ok(Declared::Route(route))
}

fn convert_weather(f: &Fields<'_>) -> Converted<BTreeMap<WeatherCondition, WeatherModifier>> {
    let Some(weather) = f.nested("weather")? else {
        return Ok(BTreeMap::new());
    };
    let mut result = BTreeMap::new();
    for (label, raw) in weather.map {
        let condition: WeatherCondition = f.parse("weather", label)?;
        let modifier = match raw {
            Value::Object(map) => Fields {
                map,
                entity: f.entity.clone(),
            },
            _ => return Err(f.malformed("weather", format!("`{label}` must be an object"))),
        };
        result.insert(
            condition,
            WeatherModifier {
                stamina: modifier.number("staminaModifier", 0)?,
                coins: modifier.number("coinModifier", 0)?,
                minutes: modifier.number("timeModifier", 0)?,
            },
        );
    }
    Ok(result)
}

fn convert_segments(f: &Fields<'_>) -> Converted<Vec<RouteSegment>> {
    let Some(raw) = f.raw("segments") else {
        return Ok(Vec::new());
    };
    let items = raw
        .as_array()
        .ok_or_else(|| f.malformed("segments", "expected a list of segments"))?;

    let mut segments = Vec::with_capacity(items.len());
    for item in items {
        let Value::Object(map) = item else {
            return Err(f.malformed("segments", "each segment must be an object"));
        };
        let s = Fields {
            map,
            entity: f.entity.clone(),
        };
        segments.push(RouteSegment {
            number: s.number("number", 0)?,
            kind: s.label_or("type", SegmentKind::FixedPath)?,
            collection: s.required_str("collectionId")?,
            narrative: s.str_or("narrative", "")?,
        });
    }

    // Explicit numbers order the segments; unnumbered ones keep their place.
    if segments.iter().any(|s| s.number > 0) {
        segments.sort_by_key(|s| s.number);
    }
    for (i, segment) in segments.iter_mut().enumerate() {
        segment.number = i as u32 + 1;
    }
    Ok(segments)
}

// ---------------------------------------------------------------------------
// Deck compositions and starting conditions
// ---------------------------------------------------------------------------

/// Authored deck contents for one character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckComposition {
    /// The character.
    pub npc: EntityId,
    /// Exchanges and how many copies of each.
    pub exchanges: Vec<(EntityId, u32)>,
    /// Conversation cards and how many copies of each.
    pub conversation: Vec<(EntityId, u32)>,
}

/// Convert `deckCompositions.npcDecks`, in declaration order.
pub fn convert_deck_compositions(value: &Value) -> Result<Vec<DeckComposition>, FieldError> {
    let root = Fields::new(value)?;
    let Some(decks) = root.nested("npcDecks")? else {
        return Ok(Vec::new());
    };

    let mut result = Vec::new();
    for (npc, raw) in decks.map {
        let Value::Object(map) = raw else {
            return Err(FieldError {
                entity: Some(npc.clone()),
                field: "npcDecks".to_string(),
                problem: Problem::Malformed("expected an object".to_string()),
            });
        };
        let deck = Fields {
            map,
            entity: Some(npc.clone()),
        };
        let entries = |field: &str| -> Converted<Vec<(EntityId, u32)>> {
            Ok(deck
                .counts::<Vec<(String, u32)>>(field)?
                .into_iter()
                .map(|(id, n)| (EntityId::new(id), n))
                .collect())
        };
        result.push(DeckComposition {
            npc: EntityId::new(npc.as_str()),
            exchanges: entries("exchangeDeck")?,
            conversation: entries("conversationDeck")?,
        });
    }
    Ok(result)
}

/// Initial player resources. Unset values keep the world default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerConfig {
    /// Starting coins.
    pub coins: Option<i32>,
    /// Starting health.
    pub health: Option<i32>,
    /// Starting stamina.
    pub stamina: Option<i32>,
}

/// Initial player setup declared by a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartingConditions {
    /// Player resources.
    pub player: PlayerConfig,
    /// Where the player starts.
    pub starting_location: EntityId,
    /// Obligations the player starts with.
    pub obligations: Vec<EntityId>,
    /// Initial relationship tokens per character.
    pub tokens: BTreeMap<EntityId, TokenCounts>,
    /// Starting day.
    pub day: Option<u32>,
    /// Starting block of the day.
    pub time_block: Option<TimeBlock>,
}

/// Convert a `startingConditions` block.
pub fn convert_starting_conditions(value: &Value) -> Result<StartingConditions, FieldError> {
    let f = Fields::new(value)?;

    let player = match f.nested("playerConfig")? {
        Some(p) => PlayerConfig {
            coins: p.optional_number("coins")?,
            health: p.optional_number("health")?,
            stamina: p.optional_number("stamina")?,
        },
        None => PlayerConfig::default(),
    };

    let mut tokens = BTreeMap::new();
    if let Some(per_npc) = f.nested("startingTokens")? {
        for (npc, raw) in per_npc.map {
            let counters = Fields::new(raw).map_err(|_| f.malformed("startingTokens", format!("`{npc}` must be an object")))?;
            let mut counts = TokenCounts::default();
            for label in counters.map.keys() {
                let token: TokenType = f.parse("startingTokens", label)?;
                counts.add(token, counters.number(label, 0)?);
            }
            tokens.insert(EntityId::new(npc.as_str()), counts);
        }
    }

    let time_block = match f.optional_str("startingTimeBlock")? {
        Some(raw) => Some(f.parse::<TimeBlock>("startingTimeBlock", &raw)?),
        None => None,
    };

    Ok(StartingConditions {
        player,
        starting_location: f.required_id("startingLocationId")?,
        obligations: f.ids("startingObligations")?,
        tokens,
        day: f.optional_number("startingDay")?,
        time_block,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn convert(kind: EntityKind, value: Value) -> Result<Declared, FieldError> {
        let row = CONVERTERS.iter().find(|c| c.kind == kind).unwrap();
        (row.convert)(&value)
    }

    #[test]
    fn table_is_in_application_order() {
        let kinds: Vec<_> = CONVERTERS.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, EntityKind::ALL.to_vec());
    }

    #[test]
    fn every_row_produces_its_own_kind() {
        for row in &CONVERTERS {
            let declared = (row.convert)(&json!({
                "id": "x", "name": "X", "venueId": "v", "cardType": "social",
                "personality": "devoted", "profession": "guard",
                "originLocationId": "a", "destinationLocationId": "b"
            }))
            .unwrap();
            assert_eq!(declared.kind(), row.kind);
        }
    }

    #[test]
    fn location_converts_with_defaults() {
        let declared = convert(
            EntityKind::Location,
            json!({ "id": "forge", "name": "The Forge", "venueId": "town", "locationType": "Forge",
                    "properties": ["Indoor", "commercial"], "hex": { "q": 2, "r": -1 } }),
        )
        .unwrap();
        let Declared::Location(location) = declared else {
            panic!("expected a location");
        };
        assert_eq!(location.venue.as_str(), "town");
        assert_eq!(location.location_type, LocationType::Forge);
        assert!(location.properties.contains(&LocationProperty::Commercial));
        assert!(!location.is_hub());
        assert_eq!(location.position, Some(HexCoord::new(2, -1)));
        assert_eq!(location.tier, 1);
    }

    #[test]
    fn missing_required_field_names_entity_and_field() {
        let err = convert(EntityKind::Location, json!({ "id": "forge", "name": "The Forge" })).unwrap_err();
        assert_eq!(err.entity.as_deref(), Some("forge"));
        assert_eq!(err.field, "venueId");
        assert_eq!(err.problem, Problem::Missing);
    }

    #[test]
    fn unknown_label_lists_choices() {
        let err = convert(
            EntityKind::Npc,
            json!({ "id": "elena", "name": "Elena", "personality": "Grumpy", "profession": "scholar" }),
        )
        .unwrap_err();
        assert_eq!(err.field, "personality");
        match err.problem {
            Problem::Invalid { value, expected } => {
                assert_eq!(value, "Grumpy");
                assert!(expected.contains(&"devoted"));
            }
            other => panic!("expected invalid label, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_tier_is_malformed() {
        let err = convert(
            EntityKind::Venue,
            json!({ "id": "town", "name": "Town", "tier": 900 }),
        )
        .unwrap_err();
        assert_eq!(err.field, "tier");
        assert!(matches!(err.problem, Problem::Malformed(_)));
    }

    #[test]
    fn npc_placement_block_is_kept_for_apply_time() {
        let declared = convert(
            EntityKind::Npc,
            json!({ "id": "marta", "name": "Marta", "personality": "Mercantile", "profession": "Innkeeper",
                    "placement": { "venueId": "town", "filter": { "locationTypes": ["inn"] } } }),
        )
        .unwrap();
        let Declared::Npc(decl) = declared else {
            panic!("expected an npc");
        };
        assert!(decl.npc.location.is_none());
        let placement = decl.placement.unwrap();
        assert_eq!(placement.venue.as_ref().map(EntityId::as_str), Some("town"));
        assert_eq!(placement.filter.location_types, vec![LocationType::Inn]);
    }

    #[test]
    fn route_segments_are_ordered_and_renumbered() {
        let declared = convert(
            EntityKind::Route,
            json!({ "id": "town_to_mill", "originLocationId": "town_gate", "destinationLocationId": "mill",
                    "terrain": ["road", "forest"],
                    "weather": { "rain": { "staminaModifier": 1 } },
                    "segments": [
                        { "number": 5, "type": "event", "collectionId": "bandits" },
                        { "number": 2, "type": "FixedPath", "collectionId": "old_road" }
                    ] }),
        )
        .unwrap();
        let Declared::Route(route) = declared else {
            panic!("expected a route");
        };
        assert_eq!(route.name, "town_to_mill");
        let order: Vec<_> = route
            .segments
            .iter()
            .map(|s| (s.number, s.collection.as_str()))
            .collect();
        assert_eq!(order, vec![(1, "old_road"), (2, "bandits")]);
        assert_eq!(route.weather[&WeatherCondition::Rain].stamina, 1);
        assert_eq!(route.terrain.len(), 2);
    }

    #[test]
    fn null_counts_as_absent() {
        let declared = convert(
            EntityKind::Exchange,
            json!({ "id": "buy_bread", "name": "Buy Bread", "npcId": null, "cost": { "coins": 2 } }),
        )
        .unwrap();
        let Declared::Exchange(exchange) = declared else {
            panic!("expected an exchange");
        };
        assert!(exchange.npc.is_none());
        assert_eq!(exchange.cost["coins"], 2);
    }

    #[test]
    fn non_object_declaration_is_malformed() {
        let err = convert(EntityKind::Card, json!("small_talk")).unwrap_err();
        assert!(err.entity.is_none());
        assert!(matches!(err.problem, Problem::Malformed(_)));
    }

    #[test]
    fn deck_compositions_keep_declaration_order_per_npc() {
        let decks = convert_deck_compositions(
            &serde_json::from_str(
                r#"{ "npcDecks": {
                    "viktor": { "exchangeDeck": { "sell_sword": 1, "buy_ore": 3 } },
                    "elena": {
                        "exchangeDeck": { "buy_bread": 2 },
                        "conversationDeck": { "small_talk": 1, "gossip": 2 }
                    }
                } }"#,
            )
            .unwrap(),
        )
        .unwrap();
        let npcs: Vec<_> = decks.iter().map(|d| d.npc.as_str()).collect();
        assert_eq!(npcs, vec!["viktor", "elena"]);
        assert_eq!(
            decks[0].exchanges,
            vec![(EntityId::new("sell_sword"), 1), (EntityId::new("buy_ore"), 3)]
        );
        assert_eq!(decks[1].exchanges, vec![(EntityId::new("buy_bread"), 2)]);
        assert_eq!(
            decks[1].conversation,
            vec![(EntityId::new("small_talk"), 1), (EntityId::new("gossip"), 2)]
        );
    }

    #[test]
    fn starting_conditions_convert() {
        let start = convert_starting_conditions(&json!({
            "playerConfig": { "coins": 10 },
            "startingLocationId": "square",
            "startingObligations": ["deliver_letter"],
            "startingTokens": { "elena": { "Trust": 2, "shadow": 1 } },
            "startingTimeBlock": "evening"
        }))
        .unwrap();
        assert_eq!(start.player.coins, Some(10));
        assert_eq!(start.player.health, None);
        assert_eq!(start.starting_location.as_str(), "square");
        assert_eq!(start.tokens[&EntityId::new("elena")].total(), 3);
        assert_eq!(start.time_block, Some(TimeBlock::Evening));
    }

    #[test]
    fn starting_location_is_required() {
        let err = convert_starting_conditions(&json!({ "startingDay": 2 })).unwrap_err();
        assert_eq!(err.field, "startingLocationId");
    }
}
