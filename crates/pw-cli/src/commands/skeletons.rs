use std::path::Path;

use comfy_table::{ContentArrangement, Table};

pub fn run(dir: &Path) -> Result<(), String> {
    let (world, _) = super::load(dir, false)?;
    let fallback = world.fallback_report();

    if fallback.is_empty() {
        println!("  No outstanding skeletons.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Kind", "ID", "Created for"]);
    for entry in &fallback.entries {
        table.add_row(vec![entry.kind.to_string(), entry.id.to_string(), entry.reason.clone()]);
    }

    println!("{table}");
    println!();
    let n = fallback.len();
    println!("  {n} outstanding skeleton{}", if n == 1 { "" } else { "s" });

    Ok(())
}
