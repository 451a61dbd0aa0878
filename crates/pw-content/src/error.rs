use std::path::PathBuf;

use miette::{Diagnostic, NamedSource, SourceSpan};
use pw_core::{CoreError, EntityId, EntityKind, StructuralError};

/// Errors raised while loading content.
///
/// Only [`LoadError::is_fatal`] errors stop a load; the rest abort the one
/// document they came from.
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum LoadError {
    /// A file or directory could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    #[diagnostic(code(pw::io))]
    Io {
        /// The path being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A document is not valid JSON, or not a JSON object.
    #[error("invalid document {name}: {message}")]
    #[diagnostic(code(pw::syntax))]
    Syntax {
        /// File name or label of the document.
        name: String,
        /// Parser message.
        message: String,
        /// The document text.
        #[source_code]
        src: NamedSource<String>,
        /// Where parsing failed.
        #[label("here")]
        span: SourceSpan,
    },

    /// A declaration is missing a required field or has an invalid value.
    #[error("package {package}: {kind} {}: field `{field}` {problem}", .entity.as_deref().map_or("<no id>".to_string(), |e| format!("'{e}'")))]
    #[diagnostic(code(pw::parse))]
    Parse {
        /// Package label.
        package: String,
        /// Kind of the declaration.
        kind: String,
        /// Declared ID, when it could be read.
        entity: Option<String>,
        /// Offending field.
        field: String,
        /// What is wrong with it.
        problem: String,
        /// Suggested fix.
        #[help]
        help: Option<String>,
    },

    /// A (kind, id) was defined for real twice.
    #[error("package {package}: duplicate {kind} '{id}', already defined by {first}")]
    #[diagnostic(
        code(pw::duplicate),
        help("each id may be defined once per kind; remove one definition or rename it")
    )]
    Duplicate {
        /// Package holding the second definition.
        package: String,
        /// Kind of the duplicated entity.
        kind: EntityKind,
        /// The duplicated ID.
        id: EntityId,
        /// Where the first definition came from.
        first: String,
    },

    /// A venue would hold more locations than it allows.
    #[error(
        "package {package}: venue '{venue}' would hold {count} locations, above its capacity of {capacity}"
    )]
    #[diagnostic(code(pw::capacity), help("raise `maxLocations` on the venue or move locations to another venue"))]
    Capacity {
        /// Package that overflowed the venue.
        package: String,
        /// The venue.
        venue: EntityId,
        /// Locations the venue would hold.
        count: usize,
        /// Allowed locations.
        capacity: usize,
    },

    /// Global invariants failed after loading.
    #[error(transparent)]
    #[diagnostic(code(pw::structure), help("every venue needs exactly one location with the `crossroads` property"))]
    Structural(#[from] StructuralError),

    /// The world model rejected an operation.
    #[error("package {package}: {source}")]
    #[diagnostic(code(pw::world))]
    Core {
        /// Package being applied.
        package: String,
        /// Underlying error.
        #[source]
        source: CoreError,
    },
}

impl LoadError {
    /// Whether this error stops the whole load rather than one document.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Duplicate { .. } | Self::Structural(_))
    }

    /// Build a syntax error from a `serde_json` failure.
    pub fn syntax(name: &str, source: &str, err: &serde_json::Error) -> Self {
        let offset = byte_offset(source, err.line(), err.column());
        let len = usize::from(offset < source.len());
        Self::Syntax {
            name: name.to_string(),
            message: err.to_string(),
            src: NamedSource::new(name, source.to_string()),
            span: (offset, len).into(),
        }
    }

    /// Wrap a world error raised while applying `package`.
    pub fn from_core(package: &str, err: CoreError) -> Self {
        match err {
            CoreError::Duplicate {
                kind,
                id,
                first_package,
            } => Self::Duplicate {
                package: package.to_string(),
                kind,
                id,
                first: first_package.map_or("an anonymous package".to_string(), |p| format!("package {p}")),
            },
            other => Self::Core {
                package: package.to_string(),
                source: other,
            },
        }
    }
}

/// Byte offset of a 1-based line/column position, clamped to the source.
fn byte_offset(source: &str, line: usize, column: usize) -> usize {
    if line == 0 {
        return 0;
    }
    let line_start: usize = source
        .split_inclusive('\n')
        .take(line - 1)
        .map(str::len)
        .sum();
    (line_start + column.saturating_sub(1)).min(source.len())
}
