//! `fieldgraph describe` — Print the commands that rebuild a scene's fields.

use std::path::Path;

use fieldgraph_config::AppConfig;

pub fn run(path: &Path, field: Option<&str>, config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let scene = super::load_scene(path, config)?;
    match field {
        Some(name) => {
            let field = scene
                .module
                .find_field_by_name(name)
                .ok_or_else(|| format!("No field named '{name}' in the scene"))?;
            println!("{}", field.describe());
        }
        None => {
            for field in scene.module.fields() {
                println!("{}", field.describe());
            }
        }
    }
    Ok(())
}
