//! `fieldgraph check` — Load a scene and report what it contains.

use std::path::Path;

use fieldgraph_config::AppConfig;

pub fn run(path: &Path, config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let scene = super::load_scene(path, config)?;

    println!("✅ Scene '{}' loaded", scene.module.name());
    println!("  Fields:        {}", scene.module.len());
    println!("  Nodes:         {}", scene.mesh.node_count());
    println!("  Elements:      {}", scene.mesh.element_count());
    println!("  Curves:        {}", scene.curves.len());
    println!("  Time keepers:  {}", scene.time_keepers.len());

    let mut kinds: Vec<&str> = scene.module.fields().iter().map(|f| f.core_type()).collect();
    kinds.sort_unstable();
    kinds.dedup();
    if !kinds.is_empty() {
        println!("  Field types:   {}", kinds.join(", "));
    }
    Ok(())
}
