//! Node value fields: parameters stored per node, interpolated inside elements.

use std::collections::BTreeMap;

use fieldgraph_core::{ConstructionError, EvaluationError, FieldValue, Location, NodeId};

use super::Evaluation;
use crate::describe::CommandBuilder;

/// Parameters of one node.
#[derive(Debug, Clone, PartialEq)]
enum NodeParameters {
    /// The same values at every time.
    Fixed(Vec<f64>),
    /// Samples at strictly increasing times.
    Timed(Vec<(f64, Vec<f64>)>),
}

impl NodeParameters {
    /// Values at `time`: linear between samples, end samples held outside.
    fn at(&self, time: f64) -> Vec<f64> {
        let samples = match self {
            Self::Fixed(values) => return values.clone(),
            Self::Timed(samples) => samples,
        };
        let index = samples.partition_point(|(t, _)| *t <= time);
        match (index.checked_sub(1).map(|i| &samples[i]), samples.get(index)) {
            (Some((_, before)), None) => before.clone(),
            (None, Some((_, after))) => after.clone(),
            (Some((t0, before)), Some((t1, after))) => {
                let s = (time - t0) / (t1 - t0);
                before.iter().zip(after).map(|(a, b)| a + s * (b - a)).collect()
            }
            (None, None) => Vec::new(),
        }
    }
}

/// Per-node parameters of a fixed number of components.
///
/// A node holds either fixed values or a time series sampled at increasing
/// times and interpolated linearly at the location's time. At a node the
/// parameters are returned. Inside an element the parameters of the
/// element's nodes are blended with the element's multilinear basis; the
/// field is not defined where any of those nodes has no parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeValueCore {
    number_of_components: usize,
    nodes: BTreeMap<NodeId, NodeParameters>,
}

impl NodeValueCore {
    pub fn new(number_of_components: usize) -> Result<Self, ConstructionError> {
        if number_of_components == 0 {
            return Err(ConstructionError::InvalidArgument(
                "node_value field needs at least one component".into(),
            ));
        }
        Ok(Self {
            number_of_components,
            nodes: BTreeMap::new(),
        })
    }

    pub fn number_of_components(&self) -> usize {
        self.number_of_components
    }

    fn check(&self, node: NodeId, values: &[f64]) -> Result<(), ConstructionError> {
        if values.len() != self.number_of_components {
            return Err(ConstructionError::mismatch(
                format!("values at node {node}"),
                self.number_of_components,
                values.len(),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ConstructionError::InvalidArgument(format!(
                "values at node {node} must be finite"
            )));
        }
        Ok(())
    }

    /// Give `node` the same parameters at every time, dropping any time series.
    pub fn set(&mut self, node: NodeId, values: Vec<f64>) -> Result<(), ConstructionError> {
        self.check(node, &values)?;
        self.nodes.insert(node, NodeParameters::Fixed(values));
        Ok(())
    }

    /// Add or replace the sample of `node` at `time`. Fixed parameters of
    /// the node are replaced by the series.
    pub fn set_at_time(&mut self, node: NodeId, time: f64, values: Vec<f64>) -> Result<(), ConstructionError> {
        self.check(node, &values)?;
        if !time.is_finite() {
            return Err(ConstructionError::InvalidArgument(format!(
                "sample time at node {node} must be finite"
            )));
        }
        let time = if time == 0.0 { 0.0 } else { time };
        let entry = self
            .nodes
            .entry(node)
            .or_insert_with(|| NodeParameters::Timed(Vec::new()));
        if let NodeParameters::Fixed(_) = entry {
            *entry = NodeParameters::Timed(Vec::new());
        }
        if let NodeParameters::Timed(samples) = entry {
            match samples.binary_search_by(|(t, _)| t.total_cmp(&time)) {
                Ok(index) => samples[index].1 = values,
                Err(index) => samples.insert(index, (time, values)),
            }
        }
        Ok(())
    }

    /// Store values assigned at `time`: into the series when the node has
    /// one, otherwise as fixed parameters.
    pub(crate) fn assign(&mut self, node: NodeId, time: f64, values: Vec<f64>) -> Result<(), ConstructionError> {
        match self.nodes.get(&node) {
            Some(NodeParameters::Timed(_)) => self.set_at_time(node, time, values),
            _ => self.set(node, values),
        }
    }

    /// Builder form of [`set`](Self::set).
    pub fn with_node(mut self, node: NodeId, values: Vec<f64>) -> Result<Self, ConstructionError> {
        self.set(node, values)?;
        Ok(self)
    }

    /// Builder form of [`set_at_time`](Self::set_at_time).
    pub fn with_sample(mut self, node: NodeId, time: f64, values: Vec<f64>) -> Result<Self, ConstructionError> {
        self.set_at_time(node, time, values)?;
        Ok(self)
    }

    /// Parameters of `node` at `time`.
    pub fn value_at(&self, node: NodeId, time: f64) -> Option<Vec<f64>> {
        self.nodes.get(&node).map(|p| p.at(time))
    }

    /// Whether `node` holds a time series.
    pub fn is_time_varying(&self, node: NodeId) -> bool {
        matches!(self.nodes.get(&node), Some(NodeParameters::Timed(_)))
    }

    /// Nodes with parameters, in ascending order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub(crate) fn evaluate(&self, eval: &Evaluation<'_>, location: &Location) -> Result<FieldValue, EvaluationError> {
        let time = location.time();
        match location {
            Location::Node(at) => self
                .value_at(at.node(), time)
                .map(FieldValue::values_only)
                .ok_or_else(|| eval.not_defined()),
            Location::ElementXi(at) => {
                let element = at.element();
                let mut parameters = Vec::with_capacity(element.nodes().len());
                for node in element.nodes() {
                    parameters.push(self.value_at(*node, time).ok_or_else(|| eval.not_defined())?);
                }
                let (phi, dphi) = element.basis(at.xi());
                let components = self.number_of_components;
                let mut values = vec![0.0; components];
                for (k, node_values) in parameters.iter().enumerate() {
                    for (c, value) in values.iter_mut().enumerate() {
                        *value += phi[k] * node_values[c];
                    }
                }
                let n = location.number_of_derivatives();
                if n == 0 {
                    return Ok(FieldValue::values_only(values));
                }
                let dimension = element.dimension();
                let mut derivatives = vec![0.0; components * n];
                for (k, node_values) in parameters.iter().enumerate() {
                    for c in 0..components {
                        for d in 0..n {
                            derivatives[c * n + d] += dphi[k * dimension + d] * node_values[c];
                        }
                    }
                }
                Ok(FieldValue::with_derivatives(values, derivatives, n))
            }
            Location::FieldCoordinate(_) => Err(eval.unsupported(location)),
        }
    }

    pub(crate) fn describe(&self, cmd: &mut CommandBuilder) {
        cmd.keyword("component_count").value(self.number_of_components);
        for (node, parameters) in &self.nodes {
            match parameters {
                NodeParameters::Fixed(values) => {
                    cmd.keyword("node").value(node);
                    for v in values {
                        cmd.value(v);
                    }
                }
                NodeParameters::Timed(samples) => {
                    for (time, values) in samples {
                        cmd.keyword("node").value(node).keyword("time").value(time);
                        for v in values {
                            cmd.value(v);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_checks_component_count() {
        let mut core = NodeValueCore::new(2).unwrap();
        assert!(core.set(NodeId(1), vec![1.0]).is_err());
        core.set(NodeId(1), vec![1.0, 2.0]).unwrap();
        assert_eq!(core.value_at(NodeId(1), 5.0), Some(vec![1.0, 2.0]));
        assert!(NodeValueCore::new(0).is_err());
    }

    #[test]
    fn series_interpolates_in_time() {
        let mut core = NodeValueCore::new(1)
            .unwrap()
            .with_sample(NodeId(1), 2.0, vec![10.0])
            .unwrap()
            .with_sample(NodeId(1), 0.0, vec![0.0])
            .unwrap();
        assert_eq!(core.value_at(NodeId(1), 0.5), Some(vec![2.5]));
        assert_eq!(core.value_at(NodeId(1), 2.0), Some(vec![10.0]));
        assert_eq!(core.value_at(NodeId(1), -3.0), Some(vec![0.0]));
        assert_eq!(core.value_at(NodeId(1), 9.0), Some(vec![10.0]));
        assert!(core.is_time_varying(NodeId(1)));
        assert!(core.set_at_time(NodeId(1), f64::NAN, vec![1.0]).is_err());
        core.set_at_time(NodeId(1), -0.0, vec![4.0]).unwrap();
        assert_eq!(core.value_at(NodeId(1), 0.0), Some(vec![4.0]));
    }

    #[test]
    fn assignment_follows_node_kind() {
        let mut core = NodeValueCore::new(1)
            .unwrap()
            .with_node(NodeId(1), vec![1.0])
            .unwrap()
            .with_sample(NodeId(2), 0.0, vec![0.0])
            .unwrap();
        core.assign(NodeId(1), 4.0, vec![7.0]).unwrap();
        assert_eq!(core.value_at(NodeId(1), 0.0), Some(vec![7.0]));
        core.assign(NodeId(2), 4.0, vec![8.0]).unwrap();
        assert_eq!(core.value_at(NodeId(2), 0.0), Some(vec![0.0]));
        assert_eq!(core.value_at(NodeId(2), 2.0), Some(vec![4.0]));
        core.set(NodeId(2), vec![1.0]).unwrap();
        assert!(!core.is_time_varying(NodeId(2)));
    }

    #[test]
    fn describes_nodes_in_order() {
        let core = NodeValueCore::new(1)
            .unwrap()
            .with_node(NodeId(2), vec![0.5])
            .unwrap()
            .with_node(NodeId(1), vec![-1.0])
            .unwrap()
            .with_sample(NodeId(3), 1.0, vec![2.0])
            .unwrap()
            .with_sample(NodeId(3), 0.0, vec![1.0])
            .unwrap();
        let mut cmd = CommandBuilder::new("node_value", "u");
        core.describe(&mut cmd);
        assert_eq!(
            cmd.finish(),
            "node_value field u component_count 1 node 1 -1 node 2 0.5 node 3 time 0 1 node 3 time 1 2"
        );
        assert_eq!(core.nodes().collect::<Vec<_>>(), vec![NodeId(1), NodeId(2), NodeId(3)]);
    }
}
