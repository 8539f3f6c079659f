//! Curves — piecewise-linear lookup tables read by curve lookup fields.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use crate::error::ConstructionError;
use crate::resource::Resource;

/// One row of a curve table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Knot {
    pub parameter: f64,
    pub values: Vec<f64>,
}

/// A named table of `number_of_components` values over a strictly
/// increasing parameter, interpolated linearly.
///
/// Outside the table the end values are held and the slope is zero. At an
/// interior knot the segment to its right is used; at the last knot the
/// last segment.
#[derive(Debug)]
pub struct Curve {
    name: RefCell<String>,
    number_of_components: usize,
    knots: RefCell<Vec<Knot>>,
}

impl Curve {
    pub fn new(name: &str, number_of_components: usize) -> Result<Self, ConstructionError> {
        if number_of_components == 0 {
            return Err(ConstructionError::InvalidArgument(
                "a curve needs at least one component".into(),
            ));
        }
        Ok(Self {
            name: RefCell::new(name.to_string()),
            number_of_components,
            knots: RefCell::new(Vec::new()),
        })
    }

    /// Build a curve from `(parameter, values)` rows in any order.
    pub fn from_knots(name: &str, number_of_components: usize, knots: Vec<Knot>) -> Result<Self, ConstructionError> {
        let curve = Self::new(name, number_of_components)?;
        for knot in knots {
            curve.set_knot(knot.parameter, knot.values)?;
        }
        Ok(curve)
    }

    pub fn number_of_components(&self) -> usize {
        self.number_of_components
    }

    /// Insert a knot, replacing any knot at the same parameter.
    pub fn set_knot(&self, parameter: f64, values: Vec<f64>) -> Result<(), ConstructionError> {
        if values.len() != self.number_of_components {
            return Err(ConstructionError::mismatch(
                format!("curve '{}' knot", self.name.borrow()),
                self.number_of_components,
                values.len(),
            ));
        }
        if !parameter.is_finite() {
            return Err(ConstructionError::InvalidArgument(
                "curve parameters must be finite".into(),
            ));
        }
        let parameter = canonical(parameter);
        let mut knots = self.knots.borrow_mut();
        match knots.binary_search_by(|k| k.parameter.total_cmp(&parameter)) {
            Ok(index) => knots[index].values = values,
            Err(index) => knots.insert(index, Knot { parameter, values }),
        }
        Ok(())
    }

    /// Remove the knot at `parameter`. Returns whether one existed.
    pub fn remove_knot(&self, parameter: f64) -> bool {
        let parameter = canonical(parameter);
        let mut knots = self.knots.borrow_mut();
        match knots.binary_search_by(|k| k.parameter.total_cmp(&parameter)) {
            Ok(index) => {
                knots.remove(index);
                true
            }
            Err(_) => false,
        }
    }

    pub fn knots(&self) -> Vec<Knot> {
        self.knots.borrow().clone()
    }

    /// Smallest and largest parameter, if the table is not empty.
    pub fn parameter_range(&self) -> Option<(f64, f64)> {
        let knots = self.knots.borrow();
        Some((knots.first()?.parameter, knots.last()?.parameter))
    }

    /// Values and slopes `d(value)/d(parameter)` at `parameter`.
    ///
    /// Returns `None` for an empty table.
    pub fn evaluate(&self, parameter: f64) -> Option<(Vec<f64>, Vec<f64>)> {
        let knots = self.knots.borrow();
        let first = knots.first()?;
        let last = knots.last()?;
        let flat = vec![0.0; self.number_of_components];
        if knots.len() == 1 || parameter < first.parameter {
            return Some((first.values.clone(), flat));
        }
        if parameter > last.parameter {
            return Some((last.values.clone(), flat));
        }
        let index = knots
            .partition_point(|k| k.parameter <= parameter)
            .saturating_sub(1)
            .min(knots.len() - 2);
        let (left, right) = (&knots[index], &knots[index + 1]);
        let span = right.parameter - left.parameter;
        let s = (parameter - left.parameter) / span;
        let mut values = Vec::with_capacity(self.number_of_components);
        let mut slopes = Vec::with_capacity(self.number_of_components);
        for (a, b) in left.values.iter().zip(&right.values) {
            values.push(a + s * (b - a));
            slopes.push((b - a) / span);
        }
        Some((values, slopes))
    }
}

/// `-0.0` and `0.0` are the same parameter.
fn canonical(parameter: f64) -> f64 {
    if parameter == 0.0 { 0.0 } else { parameter }
}

impl Resource for Curve {
    fn name(&self) -> String {
        self.name.borrow().clone()
    }

    fn set_name(&self, name: &str) {
        *self.name.borrow_mut() = name.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Curve {
        Curve::from_knots(
            "ramp",
            1,
            vec![
                Knot { parameter: 2.0, values: vec![4.0] },
                Knot { parameter: 0.0, values: vec![0.0] },
                Knot { parameter: 1.0, values: vec![1.0] },
            ],
        )
        .unwrap()
    }

    #[test]
    fn knots_are_sorted() {
        let params: Vec<f64> = ramp().knots().iter().map(|k| k.parameter).collect();
        assert_eq!(params, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn interpolates_with_segment_slope() {
        let curve = ramp();
        let (v, s) = curve.evaluate(0.5).unwrap();
        assert_eq!((v[0], s[0]), (0.5, 1.0));
        let (v, s) = curve.evaluate(1.5).unwrap();
        assert_eq!((v[0], s[0]), (2.5, 3.0));
    }

    #[test]
    fn interior_knot_uses_right_segment() {
        let (v, s) = ramp().evaluate(1.0).unwrap();
        assert_eq!((v[0], s[0]), (1.0, 3.0));
        let (v, s) = ramp().evaluate(2.0).unwrap();
        assert_eq!((v[0], s[0]), (4.0, 3.0));
    }

    #[test]
    fn holds_end_values_outside_table() {
        let curve = ramp();
        assert_eq!(curve.evaluate(-1.0), Some((vec![0.0], vec![0.0])));
        assert_eq!(curve.evaluate(9.0), Some((vec![4.0], vec![0.0])));
        assert_eq!(curve.parameter_range(), Some((0.0, 2.0)));
    }

    #[test]
    fn empty_curve_has_no_value() {
        let curve = Curve::new("empty", 2).unwrap();
        assert!(curve.evaluate(0.0).is_none());
        assert!(curve.set_knot(0.0, vec![1.0]).is_err());
    }

    #[test]
    fn replacing_and_removing_knots() {
        let curve = ramp();
        curve.set_knot(1.0, vec![2.0]).unwrap();
        assert_eq!(curve.evaluate(0.5).unwrap().1[0], 2.0);
        assert!(curve.remove_knot(1.0));
        assert!(!curve.remove_knot(1.0));
        assert_eq!(curve.evaluate(1.0).unwrap().0[0], 2.0);
    }

    #[test]
    fn negative_zero_is_the_same_knot() {
        let curve = ramp();
        curve.set_knot(-0.0, vec![0.5]).unwrap();
        assert_eq!(curve.knots().len(), 3);
        let (v, s) = curve.evaluate(0.0).unwrap();
        assert_eq!(v[0], 0.5);
        assert!(s[0].is_finite());
        assert!(curve.remove_knot(-0.0));
        assert_eq!(curve.parameter_range(), Some((1.0, 2.0)));
    }
}
