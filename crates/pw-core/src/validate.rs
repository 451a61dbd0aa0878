use std::fmt;

use crate::entity::{Entity, EntityId, EntityKind};
use crate::location::{Location, Venue};
use crate::registry::SkeletonKey;
use crate::route::Route;
use crate::skeleton::{self, placeholder_hub_id};
use crate::world::World;

/// One broken structural rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A venue has no hub location.
    VenueWithoutHub {
        /// The venue.
        venue: EntityId,
    },
    /// A venue has more than one hub location.
    VenueWithMultipleHubs {
        /// The venue.
        venue: EntityId,
        /// Every hub location it contains.
        hubs: Vec<EntityId>,
    },
    /// A route starts or ends somewhere that is not a hub.
    RouteEndpointNotHub {
        /// The route.
        route: EntityId,
        /// The offending endpoint.
        location: EntityId,
    },
    /// A placeholder could not be created.
    Unresolvable {
        /// What went wrong.
        message: String,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VenueWithoutHub { venue } => {
                write!(f, "venue '{venue}' has no hub location (crossroads)")
            }
            Self::VenueWithMultipleHubs { venue, hubs } => {
                let names: Vec<&str> = hubs.iter().map(EntityId::as_str).collect();
                write!(
                    f,
                    "venue '{venue}' has {} hub locations: {}",
                    hubs.len(),
                    names.join(", ")
                )
            }
            Self::RouteEndpointNotHub { route, location } => {
                write!(f, "route '{route}' uses '{location}', which is not a hub location")
            }
            Self::Unresolvable { message } => write!(f, "{message}"),
        }
    }
}

/// Every structural violation found by [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("world failed structural validation:\n{}", render(.violations))]
pub struct StructuralError {
    /// Violations in venue order, then route order.
    pub violations: Vec<Violation>,
}

fn render(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// What [`validate`] repaired on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Skeletons synthesized to satisfy hub rules.
    pub synthesized: Vec<SkeletonKey>,
    /// Skeleton locations given the hub role.
    pub upgraded: Vec<EntityId>,
    /// Venues checked.
    pub venues_checked: usize,
    /// Routes checked.
    pub routes_checked: usize,
}

/// Check global invariants after loading.
///
/// Missing content is healed first: undefined route endpoints get skeleton
/// hubs, skeleton endpoints get the hub role, and placeholder venues without
/// a hub get one. Authored content is only checked. Every venue must then
/// hold exactly one hub and every route endpoint must be a hub.
pub fn validate(world: &mut World) -> Result<ValidationReport, StructuralError> {
    let mut report = ValidationReport::default();
    let mut violations = Vec::new();

    heal_route_endpoints(world, &mut report, &mut violations);
    heal_placeholder_venues(world, &mut report, &mut violations);

    let mut venue_ids: Vec<EntityId> = world.all::<Venue>().map(|v| v.id.clone()).collect();
    venue_ids.sort();
    for venue in &venue_ids {
        let mut hubs: Vec<EntityId> = world
            .hubs_in(venue.as_str())
            .into_iter()
            .map(|l| l.id.clone())
            .collect();
        hubs.sort();
        match hubs.len() {
            0 => violations.push(Violation::VenueWithoutHub {
                venue: venue.clone(),
            }),
            1 => {}
            _ => violations.push(Violation::VenueWithMultipleHubs {
                venue: venue.clone(),
                hubs,
            }),
        }
    }
    report.venues_checked = venue_ids.len();

    let mut routes: Vec<&Route> = world.all::<Route>().collect();
    routes.sort_by(|a, b| a.id.cmp(&b.id));
    for route in &routes {
        for endpoint in [&route.origin, &route.destination] {
            let is_hub = world
                .get::<Location>(endpoint.as_str())
                .is_some_and(Location::is_hub);
            if !is_hub {
                violations.push(Violation::RouteEndpointNotHub {
                    route: route.id.clone(),
                    location: endpoint.clone(),
                });
            }
        }
    }
    report.routes_checked = routes.len();

    if violations.is_empty() {
        tracing::debug!(
            venues = report.venues_checked,
            routes = report.routes_checked,
            "structural validation passed"
        );
        Ok(report)
    } else {
        Err(StructuralError { violations })
    }
}

fn heal_route_endpoints(world: &mut World, report: &mut ValidationReport, violations: &mut Vec<Violation>) {
    let mut endpoints: Vec<(EntityId, EntityId)> = world
        .all::<Route>()
        .flat_map(|r| [(r.id.clone(), r.origin.clone()), (r.id.clone(), r.destination.clone())])
        .collect();
    endpoints.sort();

    for (route, location) in endpoints {
        if !world.contains(EntityKind::Location, location.as_str()) {
            let reason = format!("endpoint of route '{route}'");
            match world.ensure::<Location>(&location, &reason) {
                Ok(_) => report.synthesized.push(SkeletonKey {
                    kind: EntityKind::Location,
                    id: location,
                }),
                Err(e) => violations.push(Violation::Unresolvable {
                    message: e.to_string(),
                }),
            }
            continue;
        }

        let needs_upgrade = world
            .get::<Location>(location.as_str())
            .is_some_and(|l| l.is_skeleton() && !l.is_hub());
        if needs_upgrade && world.make_hub(location.as_str()).is_ok() {
            tracing::debug!(location = %location, "gave skeleton endpoint the hub role");
            report.upgraded.push(location);
        }
    }
}

fn heal_placeholder_venues(world: &mut World, report: &mut ValidationReport, violations: &mut Vec<Violation>) {
    let mut hubless: Vec<EntityId> = world
        .all::<Venue>()
        .filter(|v| v.is_skeleton())
        .filter(|v| world.hubs_in(v.id.as_str()).is_empty())
        .map(|v| v.id.clone())
        .collect();
    hubless.sort();

    for venue in hubless {
        let hub = placeholder_hub_id(&venue);
        if world.contains(EntityKind::Location, hub.as_str()) {
            continue;
        }
        let location = skeleton::hub_location(&hub, &venue, &format!("hub of placeholder venue '{venue}'"));
        match world.insert_skeleton(location) {
            Ok(()) => report.synthesized.push(SkeletonKey {
                kind: EntityKind::Location,
                id: hub,
            }),
            Err(e) => violations.push(Violation::Unresolvable {
                message: e.to_string(),
            }),
        }
    }
}
