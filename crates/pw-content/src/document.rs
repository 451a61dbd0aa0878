use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use pw_core::EntityKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LoadError;

/// Descriptive header of a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Metadata {
    /// Human-readable package name.
    pub name: Option<String>,
    /// What the package adds.
    pub description: Option<String>,
    /// Who wrote it.
    pub author: Option<String>,
}

/// Declarations grouped by kind, kept as raw JSON until conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentContent {
    /// Venue declarations.
    pub venues: Vec<Value>,
    /// Location declarations.
    pub locations: Vec<Value>,
    /// Card declarations.
    pub cards: Vec<Value>,
    /// Character declarations.
    pub npcs: Vec<Value>,
    /// Exchange declarations.
    pub exchanges: Vec<Value>,
    /// Obligation declarations.
    pub obligations: Vec<Value>,
    /// Route declarations.
    pub routes: Vec<Value>,
    /// Deck contents per character.
    pub deck_compositions: Option<Value>,
}

/// One parsed content document. Immutable once parsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Document {
    /// Package identity; anonymous documents always apply.
    pub package_id: Option<String>,
    /// Descriptive header.
    pub metadata: Metadata,
    /// Initial player setup, raw until applied.
    pub starting_conditions: Option<Value>,
    /// Declared entities.
    pub content: DocumentContent,
    /// File the document was read from. `ContentLoader::load_dir` makes it
    /// relative to the content root.
    #[serde(skip)]
    pub origin: Option<PathBuf>,
}

impl Document {
    /// Parse a document from JSON text. `name` labels errors.
    pub fn from_json(source: &str, name: &str) -> Result<Self, LoadError> {
        serde_json::from_str(source).map_err(|e| LoadError::syntax(name, source, &e))
    }

    /// Read and parse one file.
    pub fn read(path: &Path) -> Result<Self, LoadError> {
        let source = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut document = Self::from_json(&source, &path.display().to_string())?;
        document.origin = Some(path.to_path_buf());
        Ok(document)
    }

    /// Name used in logs and errors: the package ID, else the file, else
    /// `<anonymous>`.
    pub fn label(&self) -> String {
        match (&self.package_id, &self.origin) {
            (Some(id), _) => id.clone(),
            (None, Some(path)) => format!("<anonymous: {}>", path.display()),
            (None, None) => "<anonymous>".to_string(),
        }
    }

    /// Raw declarations of one kind.
    pub fn declarations(&self, kind: EntityKind) -> &[Value] {
        let content = &self.content;
        match kind {
            EntityKind::Venue => &content.venues,
            EntityKind::Location => &content.locations,
            EntityKind::Card => &content.cards,
            EntityKind::Npc => &content.npcs,
            EntityKind::Exchange => &content.exchanges,
            EntityKind::Obligation => &content.obligations,
            EntityKind::Route => &content.routes,
        }
    }

    /// Whether any entity of `kind` is declared.
    pub fn declares(&self, kind: EntityKind) -> bool {
        !self.declarations(kind).is_empty()
    }

    /// IDs declared for `kind`, skipping declarations without a string `id`.
    pub fn declared_ids(&self, kind: EntityKind) -> BTreeSet<&str> {
        self.declarations(kind)
            .iter()
            .filter_map(|v| v.get("id").and_then(Value::as_str))
            .collect()
    }

    /// Whether the document carries non-empty deck compositions.
    pub fn has_deck_compositions(&self) -> bool {
        self.content
            .deck_compositions
            .as_ref()
            .and_then(|d| d.get("npcDecks"))
            .and_then(Value::as_object)
            .is_some_and(|decks| !decks.is_empty())
    }

    /// Total number of declarations, all kinds together.
    pub fn declaration_count(&self) -> usize {
        EntityKind::ALL
            .into_iter()
            .map(|k| self.declarations(k).len())
            .sum()
    }
}
