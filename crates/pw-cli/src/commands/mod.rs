pub mod build;
pub mod check;
pub mod export;
pub mod find;
pub mod order;
pub mod skeletons;

use std::path::Path;

use colored::Colorize;
use pw_content::{ContentLoader, LoadReport, LoaderConfig};
use pw_core::{World, WorldMeta};

/// Load a content directory and print any recoverable failures.
/// Fatal errors are rendered as diagnostics and turned into a short message.
fn load(dir: &Path, strict: bool) -> Result<(World, LoadReport), String> {
    let name = dir
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "Untitled".to_string());
    let mut world = World::new(WorldMeta::new(name));

    let mut loader = ContentLoader::new(LoaderConfig::new().with_strict(strict));
    let report = match loader.load_dir(&mut world, dir) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            return Err("loading failed".into());
        }
    };

    if !report.failures.is_empty() {
        for failure in &report.failures {
            eprintln!("{} {failure}", "warning:".yellow().bold());
        }
        let n = report.failures.len();
        eprintln!("  {n} recoverable failure{}", if n == 1 { "" } else { "s" });
    }

    Ok((world, report))
}
