use std::path::Path;
use std::str::FromStr;

use colored::Colorize;
use pw_core::component::{LocationProperty, LocationType, Personality, Profession};
use pw_core::query::Placeable;
use pw_core::{EntityKind, EntityResolver, Location, Npc, PlacementFilter, Route, SelectionStrategy, World};

/// Filter flags as given on the command line.
pub struct FindArgs {
    /// Venue to scope the search to.
    pub venue: Option<String>,
    /// Accepted location types.
    pub location_types: Vec<String>,
    /// Properties a location must all have.
    pub properties: Vec<String>,
    /// Accepted professions.
    pub professions: Vec<String>,
    /// Accepted personalities.
    pub personalities: Vec<String>,
    /// Tie-break strategy label.
    pub strategy: String,
}

impl FindArgs {
    fn filter(&self) -> Result<PlacementFilter, String> {
        Ok(PlacementFilter {
            location_types: parse_all::<LocationType>(&self.location_types)?,
            required_properties: parse_all::<LocationProperty>(&self.properties)?,
            professions: parse_all::<Profession>(&self.professions)?,
            personalities: parse_all::<Personality>(&self.personalities)?,
            strategy: SelectionStrategy::from_str(&self.strategy).map_err(|e| e.to_string())?,
            ..PlacementFilter::default()
        })
    }
}

fn parse_all<T>(values: &[String]) -> Result<Vec<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    values
        .iter()
        .map(|v| T::from_str(v).map_err(|e| e.to_string()))
        .collect()
}

pub fn run(dir: &Path, kind: &str, args: &FindArgs) -> Result<(), String> {
    let kind = EntityKind::parse(kind).ok_or_else(|| format!("unknown entity kind: \"{kind}\""))?;
    let filter = args.filter()?;
    let (world, _) = super::load(dir, false)?;

    match kind {
        EntityKind::Location => report::<Location>(&world, args.venue.as_deref(), &filter),
        EntityKind::Npc => report::<Npc>(&world, args.venue.as_deref(), &filter),
        EntityKind::Route => report::<Route>(&world, args.venue.as_deref(), &filter),
        other => Err(format!("cannot search {other}s by filter; use location, npc or route")),
    }
}

fn report<T: Placeable>(world: &World, venue: Option<&str>, filter: &PlacementFilter) -> Result<(), String> {
    let mut resolver = EntityResolver::new(world);
    if let Some(venue) = venue {
        resolver = resolver.scoped_to(venue);
    }

    let Some(found) = resolver.find::<T>(filter) else {
        println!("  No {} matches.", T::KIND);
        return Ok(());
    };

    let marker = if found.is_skeleton() { " [skeleton]" } else { "" };
    println!("  {} ({}){}", found.name().bold(), found.id(), marker.dimmed());
    let candidates = resolver.candidates::<T>(filter).len();
    println!("  {candidates} candidate{}, picked by {}", if candidates == 1 { "" } else { "s" }, filter.strategy);

    Ok(())
}
