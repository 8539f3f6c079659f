pub mod check;
pub mod config_cmd;
pub mod describe;
pub mod eval;

use std::path::Path;

use fieldgraph_command::{LoadedScene, Scene};
use fieldgraph_config::AppConfig;

/// Read and build a scene with the configured engine settings.
pub fn load_scene(path: &Path, config: &AppConfig) -> Result<LoadedScene, Box<dyn std::error::Error>> {
    let scene = Scene::load(path).map_err(|e| format!("Failed to load scene {}: {e}", path.display()))?;
    Ok(scene.build(config.engine.clone())?)
}
