//! TOML scene files: a mesh, external resources and field commands.
//!
//! ```toml
//! name = "bar"
//! nodes = [1, 2]
//! fields = [
//!     "node_value field x component_count 1 node 1 0 node 2 10",
//!     "curve_lookup field k curve stiffness source_field x",
//! ]
//!
//! [[elements]]
//! id = 1
//! nodes = [1, 2]
//!
//! [[curves]]
//! name = "stiffness"
//! components = 1
//! knots = [[0.0, 1.0], [10.0, 3.0]]
//!
//! [[time_keepers]]
//! name = "default"
//! time = 0.0
//! ```

use std::path::Path;
use std::rc::Rc;

use fieldgraph_core::{
    Curve, Element, ElementId, EngineSettings, Knot, Manager, Mesh, NodeId, TimeKeeper,
};
use fieldgraph_engine::Module;
use serde::Deserialize;
use tracing::info;

use crate::error::CommandError;
use crate::parser::CommandParser;

/// A scene as written in TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scene {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub nodes: Vec<u32>,

    #[serde(default)]
    pub elements: Vec<ElementSpec>,

    #[serde(default)]
    pub curves: Vec<CurveSpec>,

    #[serde(default)]
    pub time_keepers: Vec<TimeKeeperSpec>,

    /// Field commands, executed in order.
    #[serde(default)]
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElementSpec {
    pub id: u32,
    pub nodes: Vec<u32>,
    /// Set for faces and lines of another element.
    #[serde(default)]
    pub parent: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CurveSpec {
    pub name: String,
    pub components: usize,
    /// Rows of `[parameter, value_1, ..., value_n]`.
    #[serde(default)]
    pub knots: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeKeeperSpec {
    pub name: String,
    #[serde(default)]
    pub time: f64,
}

fn default_name() -> String {
    "scene".into()
}

/// Everything a scene builds. The managers must outlive the fields that
/// read their resources.
pub struct LoadedScene {
    pub module: Module,
    pub curves: Manager<Curve>,
    pub time_keepers: Manager<TimeKeeper>,
    pub mesh: Rc<Mesh>,
}

impl Scene {
    pub fn from_toml(text: &str) -> Result<Self, CommandError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, CommandError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Build the mesh, resources and fields.
    pub fn build(&self, settings: EngineSettings) -> Result<LoadedScene, CommandError> {
        let mesh = Rc::new(self.build_mesh()?);
        let module = Module::with_settings(&self.name, settings);
        module.set_mesh(mesh.clone());

        let curves = Manager::new();
        for spec in &self.curves {
            let knots = spec
                .knots
                .iter()
                .map(|row| match row.split_first() {
                    Some((parameter, values)) => Ok(Knot {
                        parameter: *parameter,
                        values: values.to_vec(),
                    }),
                    None => Err(CommandError::parse(format!("empty knot row in curve '{}'", spec.name))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            curves.add(Curve::from_knots(&spec.name, spec.components, knots)?)?;
        }

        let time_keepers = Manager::new();
        for spec in &self.time_keepers {
            time_keepers.add(TimeKeeper::new(&spec.name, spec.time))?;
        }

        CommandParser::new(&module, &curves, &time_keepers).execute_all(&self.fields)?;
        info!(
            scene = %self.name,
            fields = module.len(),
            elements = self.elements.len(),
            curves = curves.len(),
            "Loaded scene"
        );
        Ok(LoadedScene {
            module,
            curves,
            time_keepers,
            mesh,
        })
    }

    fn build_mesh(&self) -> Result<Mesh, CommandError> {
        let mut mesh = Mesh::new();
        for node in &self.nodes {
            mesh.add_node(NodeId(*node));
        }
        for spec in &self.elements {
            let nodes = spec.nodes.iter().copied().map(NodeId).collect();
            let element = match spec.parent {
                Some(parent) => Element::face_of(ElementId(spec.id), nodes, ElementId(parent))?,
                None => Element::new(ElementId(spec.id), nodes)?,
            };
            mesh.add_element(element)?;
        }
        Ok(mesh)
    }
}
