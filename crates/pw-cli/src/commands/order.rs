use std::path::Path;

use comfy_table::{ContentArrangement, Table};

pub fn run(dir: &Path) -> Result<(), String> {
    let (_, report) = super::load(dir, false)?;

    if report.schedule.is_empty() {
        println!("  No content documents found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["#", "Package", "File", "Priority", "Dependencies"]);

    for (position, entry) in report.schedule.iter().enumerate() {
        let file = entry
            .origin
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "—".to_string());
        table.add_row(vec![
            (position + 1).to_string(),
            entry.package.clone(),
            file,
            entry.priority.to_string(),
            entry.score.to_string(),
        ]);
    }

    println!("{table}");
    println!();
    println!("  {} documents", report.schedule.len());

    Ok(())
}
