use pw_core::EntityKind;

use crate::analyzer::{DependencySet, analyze};
use crate::config::PriorityRules;
use crate::document::Document;

/// A document with its place in the load order.
#[derive(Debug, Clone)]
pub struct ScheduledDocument {
    /// The parsed document.
    pub document: Document,
    /// What it references outside itself.
    pub dependencies: DependencySet,
    /// Load priority, lower first.
    pub priority: i32,
    /// Position in discovery order.
    pub discovery: usize,
}

/// Words a document's priority is derived from: package ID tokens first,
/// then path components from the file upward.
fn convention_tokens(document: &Document) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    if let Some(id) = &document.package_id {
        sources.push(id.clone());
    }
    if let Some(path) = &document.origin {
        if let Some(stem) = path.file_stem() {
            sources.push(stem.to_string_lossy().into_owned());
        }
        if let Some(parent) = path.parent() {
            let mut dirs: Vec<String> = parent
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            dirs.reverse();
            sources.extend(dirs);
        }
    }

    sources
        .iter()
        .flat_map(|s| s.split(|c: char| !c.is_ascii_alphanumeric()))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whether a document only declares connections between things it does
/// not declare itself.
pub fn is_relationship_only(document: &Document) -> bool {
    let orphan_routes = document.declares(EntityKind::Route)
        && !document.declares(EntityKind::Location)
        && !document.declares(EntityKind::Venue);
    let orphan_decks = document.has_deck_compositions() && !document.declares(EntityKind::Npc);
    orphan_routes || orphan_decks
}

/// Load priority of one document.
pub fn priority(document: &Document, rules: &PriorityRules) -> i32 {
    let tier = convention_tokens(document)
        .iter()
        .find_map(|token| rules.tier_of(token))
        .unwrap_or(rules.default_tier);
    if is_relationship_only(document) {
        tier + rules.relationship_penalty
    } else {
        tier
    }
}

/// Order documents for application.
///
/// Sorts by (priority, dependency score); the sort is stable, so ties keep
/// discovery order. The order only reduces forward references; skeletons
/// cover whatever remains.
pub fn schedule(documents: Vec<Document>, rules: &PriorityRules) -> Vec<ScheduledDocument> {
    let mut scheduled: Vec<ScheduledDocument> = documents
        .into_iter()
        .enumerate()
        .map(|(discovery, document)| ScheduledDocument {
            dependencies: analyze(&document),
            priority: priority(&document, rules),
            discovery,
            document,
        })
        .collect();

    scheduled.sort_by_key(|s| (s.priority, s.dependencies.score));

    for (position, entry) in scheduled.iter().enumerate() {
        tracing::debug!(
            position,
            package = %entry.document.label(),
            priority = entry.priority,
            score = entry.dependencies.score,
            "scheduled document"
        );
    }
    scheduled
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn doc(json: &str, path: &str) -> Document {
        let mut document = Document::from_json(json, path).unwrap();
        document.origin = Some(PathBuf::from(path));
        document
    }

    fn order(scheduled: &[ScheduledDocument]) -> Vec<String> {
        scheduled.iter().map(|s| s.document.label()).collect()
    }

    #[test]
    fn tier_comes_from_package_id_before_path() {
        let rules = PriorityRules::default();
        let document = doc(r#"{ "packageId": "expansion_harbor" }"#, "content/core/harbor.json");
        assert_eq!(priority(&document, &rules), 200);
    }

    #[test]
    fn tier_falls_back_to_path_then_default() {
        let rules = PriorityRules::default();
        assert_eq!(priority(&doc("{}", "content/generated/npcs.json"), &rules), 300);
        assert_eq!(priority(&doc("{}", "content/misc/npcs.json"), &rules), 100);
    }

    #[test]
    fn routes_without_places_are_penalized() {
        let rules = PriorityRules::default();
        let routes = doc(
            r#"{ "packageId": "core_roads", "content": { "routes": [ { "id": "a_to_b" } ] } }"#,
            "roads.json",
        );
        assert!(is_relationship_only(&routes));
        assert_eq!(priority(&routes, &rules), 50);

        let with_places = doc(
            r#"{ "packageId": "core_roads", "content": {
                "locations": [ { "id": "a" } ], "routes": [ { "id": "a_to_b" } ] } }"#,
            "roads.json",
        );
        assert!(!is_relationship_only(&with_places));
    }

    #[test]
    fn orders_by_priority_then_score_then_discovery() {
        let documents = vec![
            doc(r#"{ "packageId": "expansion_a" }"#, "a.json"),
            doc(
                r#"{ "packageId": "core_people", "content": { "npcs": [ { "id": "smith", "locationId": "forge" } ] } }"#,
                "b.json",
            ),
            doc(r#"{ "packageId": "core_town" }"#, "c.json"),
            doc(r#"{ "packageId": "core_more" }"#, "d.json"),
        ];
        let scheduled = schedule(documents, &PriorityRules::default());
        assert_eq!(
            order(&scheduled),
            vec!["core_town", "core_more", "core_people", "expansion_a"]
        );
        assert_eq!(scheduled[0].discovery, 2);
    }

    #[test]
    fn scheduling_is_deterministic() {
        let make = || {
            vec![
                doc(r#"{ "packageId": "x" }"#, "x.json"),
                doc(r#"{ "packageId": "y" }"#, "y.json"),
            ]
        };
        let rules = PriorityRules::default();
        assert_eq!(order(&schedule(make(), &rules)), order(&schedule(make(), &rules)));
    }
}
