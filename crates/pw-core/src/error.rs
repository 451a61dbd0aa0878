use crate::entity::{EntityId, EntityKind};

/// Alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur when manipulating a world.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The requested entity does not exist.
    #[error("{kind} not found: \"{id}\"")]
    NotFound {
        /// Kind that was searched.
        kind: EntityKind,
        /// ID that was searched.
        id: EntityId,
    },

    /// A second real definition for the same (kind, id).
    #[error(
        "duplicate {kind} definition: \"{id}\" was already defined by {}",
        .first_package.as_deref().map_or("an anonymous package".to_string(), |p| format!("package '{p}'"))
    )]
    Duplicate {
        /// Kind of the duplicated entity.
        kind: EntityKind,
        /// The duplicated ID.
        id: EntityId,
        /// Package holding the first definition, if named.
        first_package: Option<String>,
    },

    /// No placeholder can stand in for this kind.
    #[error("cannot synthesize a placeholder {kind} for \"{id}\"")]
    NotSynthesizable {
        /// Kind that was requested.
        kind: EntityKind,
        /// ID that was requested.
        id: EntityId,
    },
}

impl CoreError {
    /// Shorthand for [`CoreError::NotFound`].
    pub fn not_found(kind: EntityKind, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: EntityId::new(id),
        }
    }
}
