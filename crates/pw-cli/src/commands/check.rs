use std::path::Path;

pub fn run(dir: &Path) -> Result<(), String> {
    let (world, report) = super::load(dir, false)?;

    println!("  All checks passed for '{}'.", world.meta.name);
    println!("  {}", report.summary);
    if let Some(validation) = &report.validation {
        println!(
            "  {} venues, {} routes checked",
            validation.venues_checked, validation.routes_checked
        );
    }

    Ok(())
}
