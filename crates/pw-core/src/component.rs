use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A closed set of labelled values that content authors pick from.
///
/// Labels are snake_case. Parsing is case-insensitive and ignores
/// underscores, so `"FixedPath"`, `"fixed_path"` and `"fixedpath"` are the
/// same value.
pub trait Categorical: Copy + Eq + 'static {
    /// Every variant, in declaration order. Never empty.
    const ALL: &'static [Self];

    /// Canonical snake_case label.
    fn label(self) -> &'static str;
}

/// A label that did not match any variant of a categorical type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown value \"{value}\", expected one of: {}", .expected.join(", "))]
pub struct UnknownVariant {
    /// The label as written by the author.
    pub value: String,
    /// Every accepted label.
    pub expected: Vec<&'static str>,
}

fn normalize(label: &str) -> String {
    label
        .chars()
        .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Parse a label into any categorical type.
pub fn parse_label<T: Categorical>(value: &str) -> Result<T, UnknownVariant> {
    let wanted = normalize(value);
    T::ALL
        .iter()
        .copied()
        .find(|v| normalize(v.label()) == wanted)
        .ok_or_else(|| UnknownVariant {
            value: value.to_string(),
            expected: T::ALL.iter().map(|v| v.label()).collect(),
        })
}

macro_rules! categorical {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Canonical snake_case label.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $label ),+
                }
            }
        }

        impl Categorical for $name {
            const ALL: &'static [Self] = &[$( Self::$variant ),+];

            fn label(self) -> &'static str {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_label(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                parse_label(&raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Places
// ---------------------------------------------------------------------------

categorical! {
    /// Broad character of a venue.
    VenueType {
        /// A market town.
        Town => "town",
        /// A walled city district.
        City => "city",
        /// A small rural settlement.
        Village => "village",
        /// Untamed land between settlements.
        Wilderness => "wilderness",
        /// A fortified waypoint.
        Outpost => "outpost",
        /// A private holding.
        Estate => "estate",
    }
}

categorical! {
    /// What a location physically is.
    LocationType {
        /// An open square or plaza.
        Square => "square",
        /// An inn or tavern.
        Inn => "inn",
        /// A market or shop.
        Market => "market",
        /// A smithy.
        Forge => "forge",
        /// A temple or shrine.
        Temple => "temple",
        /// A gate or checkpoint.
        Gate => "gate",
        /// A dock or landing.
        Dock => "dock",
        /// A private dwelling.
        Residence => "residence",
        /// Open countryside.
        Wilds => "wilds",
    }
}

categorical! {
    /// Tags a location carries. `Crossroads` marks the venue's hub.
    LocationProperty {
        /// Travel anchor of its venue; route endpoints must carry it.
        Crossroads => "crossroads",
        /// Open to anyone.
        Public => "public",
        /// Restricted access.
        Private => "private",
        /// Under a roof.
        Indoor => "indoor",
        /// Under the sky.
        Outdoor => "outdoor",
        /// Few people around.
        Quiet => "quiet",
        /// Crowded.
        Busy => "busy",
        /// Guarded or otherwise secure.
        Safe => "safe",
        /// Risky to linger in.
        Dangerous => "dangerous",
        /// Trade happens here.
        Commercial => "commercial",
        /// Somewhere to recover.
        Restful => "restful",
    }
}

/// Axial coordinates on the travel hex grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HexCoord {
    /// Column axis.
    pub q: i32,
    /// Row axis.
    pub r: i32,
}

impl HexCoord {
    /// Create a coordinate.
    pub fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// Number of hex steps between two coordinates.
    pub fn distance(self, other: HexCoord) -> u32 {
        let dq = (self.q - other.q).unsigned_abs();
        let dr = (self.r - other.r).unsigned_abs();
        let ds = ((self.q + self.r) - (other.q + other.r)).unsigned_abs();
        (dq + dr + ds) / 2
    }
}

// ---------------------------------------------------------------------------
// Characters
// ---------------------------------------------------------------------------

categorical! {
    /// Conversational temperament of a character.
    Personality {
        /// Loyal to people and causes.
        Devoted => "devoted",
        /// Everything has a price.
        Mercantile => "mercantile",
        /// Status matters above all.
        Proud => "proud",
        /// Reads between the lines.
        Cunning => "cunning",
        /// Slow to move, hard to shake.
        Steadfast => "steadfast",
    }
}

categorical! {
    /// What a character does for a living.
    Profession {
        /// Buys and sells.
        Merchant => "merchant",
        /// Keeps the peace.
        Guard => "guard",
        /// Runs an inn.
        Innkeeper => "innkeeper",
        /// Studies and records.
        Scholar => "scholar",
        /// Works with their hands.
        Laborer => "laborer",
        /// Holds a title.
        Noble => "noble",
        /// Tends a shrine.
        Priest => "priest",
        /// Works metal.
        Smith => "smith",
        /// Always on the road.
        Traveler => "traveler",
    }
}

categorical! {
    /// The four kinds of relationship token a character can hold.
    TokenType {
        /// Personal trust.
        Trust => "trust",
        /// Willingness to negotiate.
        Diplomacy => "diplomacy",
        /// Standing and respect.
        Status => "status",
        /// Shared secrets.
        Shadow => "shadow",
    }
}

/// Relationship token counters between the player and one character.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenCounts {
    /// Trust tokens.
    pub trust: i32,
    /// Diplomacy tokens.
    pub diplomacy: i32,
    /// Status tokens.
    pub status: i32,
    /// Shadow tokens.
    pub shadow: i32,
}

impl TokenCounts {
    /// Read one counter.
    pub fn get(&self, token: TokenType) -> i32 {
        match token {
            TokenType::Trust => self.trust,
            TokenType::Diplomacy => self.diplomacy,
            TokenType::Status => self.status,
            TokenType::Shadow => self.shadow,
        }
    }

    /// Add `amount` to one counter.
    pub fn add(&mut self, token: TokenType, amount: i32) {
        match token {
            TokenType::Trust => self.trust += amount,
            TokenType::Diplomacy => self.diplomacy += amount,
            TokenType::Status => self.status += amount,
            TokenType::Shadow => self.shadow += amount,
        }
    }

    /// Add every counter of `other` onto `self`.
    pub fn merge(&mut self, other: TokenCounts) {
        for token in TokenType::ALL {
            self.add(*token, other.get(*token));
        }
    }

    /// Sum of all counters.
    pub fn total(&self) -> i32 {
        self.trust + self.diplomacy + self.status + self.shadow
    }
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

categorical! {
    /// Which challenge system a card is played in.
    CardType {
        /// Conversations.
        Social => "social",
        /// Investigations.
        Mental => "mental",
        /// Physical obstacles.
        Physical => "physical",
    }
}

// ---------------------------------------------------------------------------
// Travel
// ---------------------------------------------------------------------------

categorical! {
    /// How a route is travelled.
    TravelMethod {
        /// On foot.
        Walking => "walking",
        /// By cart or wagon.
        Cart => "cart",
        /// By boat.
        Boat => "boat",
        /// On horseback.
        Horseback => "horseback",
    }
}

categorical! {
    /// Ground a route passes through.
    TerrainCategory {
        /// Maintained road.
        Road => "road",
        /// Woodland.
        Forest => "forest",
        /// High ground.
        Mountain => "mountain",
        /// Along or across water.
        River => "river",
        /// Open grassland.
        Plains => "plains",
        /// Wetland.
        Swamp => "swamp",
        /// Streets.
        Urban => "urban",
    }
}

categorical! {
    /// Weather that can modify a route.
    WeatherCondition {
        /// Fair weather.
        Clear => "clear",
        /// Rain.
        Rain => "rain",
        /// Snow.
        Snow => "snow",
        /// Fog.
        Fog => "fog",
        /// Storm.
        Storm => "storm",
    }
}

categorical! {
    /// Where a route segment draws its content from.
    SegmentKind {
        /// A fixed sequence of path cards.
        FixedPath => "fixed_path",
        /// A pool of random encounters, drawn by the gameplay layer.
        Event => "event",
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

categorical! {
    /// The four blocks of an in-game day.
    #[derive(Default)]
    TimeBlock {
        /// Morning.
        #[default]
        Morning => "morning",
        /// Midday.
        Midday => "midday",
        /// Afternoon.
        Afternoon => "afternoon",
        /// Evening.
        Evening => "evening",
    }
}
