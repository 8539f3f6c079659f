//! `fieldgraph config` — Configuration management commands.

use fieldgraph_config::{AppConfig, ConfigError};

pub fn validate(config: Result<AppConfig, ConfigError>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match config {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();

            if !AppConfig::config_path().exists() {
                warnings.push("No config file found; built-in defaults are in use");
            }

            if !config.engine.record_statistics {
                warnings.push("Evaluation statistics are disabled");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Log level:       {}", config.logging.level);
            println!("   Precision:       {}", config.output.precision);
            println!("   JSON output:     {}", config.output.json);
            println!("   Find tolerance:  {:e}", config.engine.find_tolerance);
            println!("   Find iterations: {}", config.engine.find_max_iterations);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub fn show(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

pub fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_path().display());
    Ok(())
}
