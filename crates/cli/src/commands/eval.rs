//! `fieldgraph eval` — Evaluate a field at a node or element location.

use std::path::Path;

use fieldgraph_config::AppConfig;
use fieldgraph_core::{ElementId, FieldValue, Location, MeshProvider, NodeId};
use fieldgraph_engine::Field;

/// Where to evaluate.
pub enum Target {
    Node(u32),
    Element { element: u32, xi: Vec<f64> },
}

pub struct Request {
    pub field: String,
    pub target: Target,
    pub time: f64,
    pub derivatives: bool,
    pub json: bool,
}

pub fn run(path: &Path, request: &Request, config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let scene = super::load_scene(path, config)?;
    let field = scene
        .module
        .find_field_by_name(&request.field)
        .ok_or_else(|| format!("No field named '{}' in the scene", request.field))?;

    let location = match &request.target {
        Target::Node(node) => Location::node(NodeId(*node), request.time),
        Target::Element { element, xi } => {
            let element = scene
                .mesh
                .element(ElementId(*element))
                .ok_or_else(|| format!("No element {element} in the scene"))?;
            Location::element_xi(element, xi, request.time)?
        }
    }
    .with_derivatives(request.derivatives);

    let value = field.evaluate(&location)?;
    tracing::debug!(stats = ?scene.module.statistics(), "Evaluation finished");

    if request.json || config.output.json {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print!("{}", format_value(&field, &value, config.output.precision));
    }
    Ok(())
}

/// Human-readable rendering: one line of values, then one line of
/// derivatives per component.
fn format_value(field: &Field, value: &FieldValue, precision: usize) -> String {
    let join = |numbers: &[f64]| {
        numbers
            .iter()
            .map(|v| format!("{v:.precision$}"))
            .collect::<Vec<_>>()
            .join(" ")
    };
    let mut out = format!("{} = {}\n", field.name(), join(&value.values));
    if value.has_derivatives() {
        for component in 0..value.len() {
            if let Some(row) = value.component_derivatives(component) {
                out.push_str(&format!("  d[{component}]/dxi = {}\n", join(row)));
            }
        }
    }
    out
}
