//! Content loading for Pathweaver.
//!
//! Documents are parsed in full before any of them touches the world. The
//! parsed set is then ordered so that documents defining things come before
//! documents that only reference them, applied one by one, and finally
//! checked for structural soundness. References that no document satisfies
//! are covered by skeletons from `pw-core`.

/// Dependency analysis over raw declarations.
pub mod analyzer;
/// Applying converted documents to a world.
pub mod applier;
/// Loader configuration and priority conventions.
pub mod config;
/// Declaration-to-entity conversion table.
pub mod convert;
/// The parsed document model.
pub mod document;
/// Load errors with diagnostics.
pub mod error;
/// Directory discovery and the two-phase load.
pub mod loader;
/// Load ordering.
pub mod scheduler;

use std::path::Path;

use pw_core::{World, WorldMeta};

pub use analyzer::{DependencySet, analyze};
pub use applier::{DocumentOutcome, LoadSummary, PackageApplier};
pub use config::{LoaderConfig, PriorityRules};
pub use document::Document;
pub use error::LoadError;
pub use loader::{ContentLoader, LoadReport, ScheduleEntry};
pub use scheduler::{ScheduledDocument, schedule};

/// Load a content directory into a fresh world with the default config.
pub fn load_dir(dir: &Path) -> Result<(World, LoadReport), LoadError> {
    let name = dir
        .file_name()
        .map_or_else(|| "Untitled".to_string(), |n| n.to_string_lossy().into_owned());
    let mut world = World::new(WorldMeta::new(name));
    let report = ContentLoader::default().load_dir(&mut world, dir)?;
    Ok((world, report))
}
