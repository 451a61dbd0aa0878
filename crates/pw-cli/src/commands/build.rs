use std::path::Path;

use colored::Colorize;
use pw_core::EntityKind;

pub fn run(dir: &Path, strict: bool) -> Result<(), String> {
    let (world, report) = super::load(dir, strict)?;
    let summary = &report.summary;

    println!("  Loaded '{}' successfully.", world.meta.name);
    println!();
    println!(
        "  {} packages applied, {} skipped",
        summary.documents_applied, summary.documents_skipped
    );

    let counts = world.counts();
    for kind in EntityKind::ALL {
        let total = counts.get(&kind).copied().unwrap_or(0);
        if total == 0 {
            continue;
        }
        let skeletons = world.registry().skeletons().filter(|(key, _)| key.kind == kind).count();
        if skeletons > 0 {
            println!("    {total:>4} {kind} ({skeletons} missing)");
        } else {
            println!("    {total:>4} {kind}");
        }
    }
    println!("  {} derived routes", summary.derived_routes);

    let fallback = world.fallback_report();
    if fallback.is_empty() {
        println!("  No outstanding skeletons.");
    } else {
        println!(
            "  {} outstanding skeletons (run `pw skeletons` for details)",
            fallback.len().to_string().yellow()
        );
    }

    Ok(())
}
