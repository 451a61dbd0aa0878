use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, EntityKind};

/// Whether an identifier has been authored or only synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Defined by an applied document.
    Real,
    /// Synthesized as a placeholder.
    Skeleton,
}

/// One registry row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Current status.
    pub status: Status,
    /// Package that defined a real entry, if it was named.
    pub package: Option<String>,
    /// Why a skeleton entry was synthesized.
    pub reason: Option<String>,
}

/// A (kind, id) pair naming one skeleton.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SkeletonKey {
    /// Entity kind.
    pub kind: EntityKind,
    /// Entity ID.
    pub id: EntityId,
}

impl fmt::Display for SkeletonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Tracks, per kind, which IDs are real and which are skeletons.
///
/// Once an entry is real it stays real.
#[derive(Debug, Clone, Default)]
pub struct IdentifierRegistry {
    entries: BTreeMap<(EntityKind, EntityId), RegistryEntry>,
}

impl IdentifierRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entry.
    pub fn get(&self, kind: EntityKind, id: &str) -> Option<&RegistryEntry> {
        self.entries.get(&(kind, EntityId::new(id)))
    }

    /// Status of an entry, if registered.
    pub fn status(&self, kind: EntityKind, id: &str) -> Option<Status> {
        self.get(kind, id).map(|e| e.status)
    }

    /// Whether the entry is real.
    pub fn is_real(&self, kind: EntityKind, id: &str) -> bool {
        self.status(kind, id) == Some(Status::Real)
    }

    /// Whether the entry is a skeleton.
    pub fn is_skeleton(&self, kind: EntityKind, id: &str) -> bool {
        self.status(kind, id) == Some(Status::Skeleton)
    }

    /// Record a real definition.
    pub fn mark_real(&mut self, kind: EntityKind, id: EntityId, package: Option<&str>) {
        self.entries.insert(
            (kind, id),
            RegistryEntry {
                status: Status::Real,
                package: package.map(str::to_string),
                reason: None,
            },
        );
    }

    /// Record a skeleton. Does nothing if the entry is already real.
    pub fn mark_skeleton(&mut self, kind: EntityKind, id: EntityId, reason: &str) {
        let key = (kind, id);
        if self.entries.get(&key).is_some_and(|e| e.status == Status::Real) {
            return;
        }
        self.entries.insert(
            key,
            RegistryEntry {
                status: Status::Skeleton,
                package: None,
                reason: Some(reason.to_string()),
            },
        );
    }

    /// Drop an entry entirely.
    pub fn forget(&mut self, kind: EntityKind, id: &str) -> Option<RegistryEntry> {
        self.entries.remove(&(kind, EntityId::new(id)))
    }

    /// Every outstanding skeleton, ordered by kind then ID.
    pub fn skeletons(&self) -> impl Iterator<Item = (SkeletonKey, &RegistryEntry)> {
        self.entries
            .iter()
            .filter(|(_, e)| e.status == Status::Skeleton)
            .map(|((kind, id), e)| {
                (
                    SkeletonKey {
                        kind: *kind,
                        id: id.clone(),
                    },
                    e,
                )
            })
    }

    /// Number of entries with `status`, per kind.
    pub fn counts(&self, status: Status) -> BTreeMap<EntityKind, usize> {
        let mut counts = BTreeMap::new();
        for ((kind, _), entry) in &self.entries {
            if entry.status == status {
                *counts.entry(*kind).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Build the human-readable list of outstanding skeletons.
    pub fn fallback_report(&self) -> FallbackReport {
        FallbackReport {
            entries: self
                .skeletons()
                .map(|(key, entry)| FallbackEntry {
                    kind: key.kind,
                    id: key.id,
                    reason: entry.reason.clone().unwrap_or_default(),
                })
                .collect(),
        }
    }
}

/// One outstanding skeleton in a [`FallbackReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackEntry {
    /// Entity kind.
    pub kind: EntityKind,
    /// Entity ID.
    pub id: EntityId,
    /// Which reference created it.
    pub reason: String,
}

/// Every skeleton still standing in for missing content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackReport {
    /// Outstanding skeletons, ordered by kind then ID.
    pub entries: Vec<FallbackEntry>,
}

impl FallbackReport {
    /// Whether nothing is missing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of outstanding skeletons.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Display for FallbackReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return writeln!(f, "No outstanding skeletons.");
        }
        let n = self.entries.len();
        writeln!(f, "{n} outstanding skeleton{}:", if n == 1 { "" } else { "s" })?;
        for entry in &self.entries {
            writeln!(f, "  {}: {} ({})", entry.kind, entry.id, entry.reason)?;
        }
        Ok(())
    }
}
