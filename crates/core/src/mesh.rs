//! Mesh collaborator — element and node handles consumed by the engine.
//!
//! Mesh storage and topology belong to the host application. The engine
//! only needs element dimension, the element's nodes for interpolation and
//! a way to enumerate elements when searching for a location. [`Mesh`] is a
//! small in-memory provider used by scenes and tests.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::ConstructionError;

/// Identifier of a mesh node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Identifier of a mesh element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
struct ElementData {
    id: ElementId,
    dimension: usize,
    nodes: Vec<NodeId>,
    parent: Option<ElementId>,
}

/// A linear Lagrange element: line, square or cube.
///
/// Nodes are listed in tensor order, the first xi direction varying
/// fastest. Cloning shares the underlying element; equality is by id.
#[derive(Debug, Clone)]
pub struct Element(Rc<ElementData>);

impl Element {
    /// Create a top-level element from its nodes (2, 4 or 8 of them).
    pub fn new(id: ElementId, nodes: Vec<NodeId>) -> Result<Self, ConstructionError> {
        Self::build(id, nodes, None)
    }

    /// Create a face or line element belonging to `parent`.
    pub fn face_of(id: ElementId, nodes: Vec<NodeId>, parent: ElementId) -> Result<Self, ConstructionError> {
        Self::build(id, nodes, Some(parent))
    }

    fn build(id: ElementId, nodes: Vec<NodeId>, parent: Option<ElementId>) -> Result<Self, ConstructionError> {
        let dimension = match nodes.len() {
            2 => 1,
            4 => 2,
            8 => 3,
            n => {
                return Err(ConstructionError::InvalidArgument(format!(
                    "element {id} has {n} nodes; linear elements need 2, 4 or 8"
                )));
            }
        };
        Ok(Self(Rc::new(ElementData {
            id,
            dimension,
            nodes,
            parent,
        })))
    }

    pub fn id(&self) -> ElementId {
        self.0.id
    }

    /// Number of local (xi) coordinates.
    pub fn dimension(&self) -> usize {
        self.0.dimension
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.0.nodes
    }

    /// The element this one is a face of, if any.
    pub fn parent(&self) -> Option<ElementId> {
        self.0.parent
    }

    /// Multilinear basis functions and their xi derivatives at `xi`.
    ///
    /// Returns `(phi, dphi)` where `dphi[k * dimension + d]` is the
    /// derivative of the basis function of node `k` with respect to `xi[d]`.
    pub fn basis(&self, xi: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let dimension = self.dimension();
        let count = self.0.nodes.len();
        let mut phi = vec![1.0; count];
        let mut dphi = vec![1.0; count * dimension];
        for (k, value) in phi.iter_mut().enumerate() {
            for d in 0..dimension {
                let upper = (k >> d) & 1 == 1;
                let factor = if upper { xi[d] } else { 1.0 - xi[d] };
                let slope = if upper { 1.0 } else { -1.0 };
                *value *= factor;
                for e in 0..dimension {
                    dphi[k * dimension + e] *= if e == d { slope } else { factor };
                }
            }
        }
        (phi, dphi)
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

/// Source of elements and nodes for the engine.
pub trait MeshProvider {
    /// All elements, in a stable order.
    fn elements(&self) -> Vec<Element>;

    /// Look up an element by id.
    fn element(&self, id: ElementId) -> Option<Element>;

    /// Whether a node with this id exists.
    fn has_node(&self, id: NodeId) -> bool;
}

/// In-memory mesh.
#[derive(Debug, Default)]
pub struct Mesh {
    nodes: BTreeSet<NodeId>,
    elements: BTreeMap<ElementId, Element>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Adding an existing node is a no-op.
    pub fn add_node(&mut self, id: NodeId) {
        self.nodes.insert(id);
    }

    /// Add an element; every node it references must already exist.
    pub fn add_element(&mut self, element: Element) -> Result<(), ConstructionError> {
        if self.elements.contains_key(&element.id()) {
            return Err(ConstructionError::InvalidArgument(format!(
                "element {} already exists",
                element.id()
            )));
        }
        if let Some(missing) = element.nodes().iter().find(|n| !self.nodes.contains(*n)) {
            return Err(ConstructionError::NotFound(format!(
                "node {missing} used by element {}",
                element.id()
            )));
        }
        if let Some(parent) = element.parent() {
            if !self.elements.contains_key(&parent) {
                return Err(ConstructionError::NotFound(format!("parent element {parent}")));
            }
        }
        self.elements.insert(element.id(), element);
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }
}

impl MeshProvider for Mesh {
    fn elements(&self) -> Vec<Element> {
        self.elements.values().cloned().collect()
    }

    fn element(&self, id: ElementId) -> Option<Element> {
        self.elements.get(&id).cloned()
    }

    fn has_node(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }
}
