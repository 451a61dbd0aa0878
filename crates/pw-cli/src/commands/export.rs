use std::path::Path;

use pw_core::{Card, Exchange, Location, Npc, Obligation, Route, Venue, World};

pub fn run(dir: &Path, output: Option<&Path>) -> Result<(), String> {
    let (world, _) = super::load(dir, false)?;
    let content = export_json(&world)?;

    if let Some(path) = output {
        std::fs::write(path, &content).map_err(|e| format!("cannot write to {}: {e}", path.display()))?;
        println!("  Exported to {}", path.display());
    } else {
        println!("{content}");
    }

    Ok(())
}

fn export_json(world: &World) -> Result<String, String> {
    let export = serde_json::json!({
        "world": world.meta,
        "rules": world.rules,
        "player": world.player,
        "venues": world.all::<Venue>().collect::<Vec<_>>(),
        "locations": world.all::<Location>().collect::<Vec<_>>(),
        "cards": world.all::<Card>().collect::<Vec<_>>(),
        "npcs": world.all::<Npc>().collect::<Vec<_>>(),
        "exchanges": world.all::<Exchange>().collect::<Vec<_>>(),
        "obligations": world.all::<Obligation>().collect::<Vec<_>>(),
        "routes": world.all::<Route>().collect::<Vec<_>>(),
        "skeletons": world.fallback_report().entries,
    });

    serde_json::to_string_pretty(&export).map_err(|e| format!("JSON serialization error: {e}"))
}
