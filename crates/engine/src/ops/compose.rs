//! Compose fields: look a value up by searching the mesh.
//!
//! The texture coordinates field gives a target value. The mesh is searched
//! for the element and xi where the find-element-xi field takes that value,
//! and the calculate-values field is evaluated there. Derivatives are never
//! valid; the field is not defined where no element contains the target.

use fieldgraph_core::{ConstructionError, Element, EngineSettings, EvaluationError, FieldValue, Location};
use nalgebra::{DMatrix, DVector};
use tracing::trace;

use super::Evaluation;
use crate::field::Field;

pub(crate) fn validate(texture: &Field, find: &Field, calculate: &Field) -> Result<usize, ConstructionError> {
    let (t, f) = (texture.number_of_components(), find.number_of_components());
    if t != f {
        return Err(ConstructionError::mismatch("compose find_element_xi field", t, f));
    }
    Ok(calculate.number_of_components())
}

pub(crate) fn evaluate(eval: &Evaluation<'_>, location: &Location) -> Result<FieldValue, EvaluationError> {
    let texture = eval.source(0)?;
    let find = eval.source(1)?;
    let calculate = eval.source(2)?;
    let module = eval.module();
    let mesh = module
        .mesh()
        .ok_or_else(|| eval.resource_unavailable("mesh".to_string()))?;

    let target = texture.evaluate(&location.clone().with_derivatives(false))?.values;
    let time = location.time();
    for element in mesh.elements().into_iter().filter(|e| e.parent().is_none()) {
        if let Some(xi) = find_xi(find, &element, &target, time, module.settings())? {
            trace!(field = %eval.field_name(), element = %element.id(), ?xi, "Found element xi");
            let at = Location::element_xi(element, &xi, time)?;
            return Ok(calculate.evaluate(&at)?.without_derivatives());
        }
    }
    Err(eval.not_defined())
}

/// Newton search for the xi in `element` where `find` equals `target`.
///
/// Returns `None` when the iteration does not converge or converges
/// outside the element.
pub(crate) fn find_xi(
    find: &Field,
    element: &Element,
    target: &[f64],
    time: f64,
    settings: &EngineSettings,
) -> Result<Option<Vec<f64>>, EvaluationError> {
    let dimension = element.dimension();
    let scale = target.iter().fold(1.0_f64, |m, v| m.max(v.abs()));
    let tolerance = settings.find_tolerance * scale;
    let mut xi = vec![0.5; dimension];

    for _ in 0..settings.find_max_iterations {
        let at = Location::element_xi(element.clone(), &xi, time)?.with_derivatives(true);
        let value = match find.evaluate(&at) {
            Ok(value) => value,
            Err(e) if e.is_not_defined() => return Ok(None),
            Err(e) => return Err(e),
        };
        let residual: Vec<f64> = target.iter().zip(&value.values).map(|(t, v)| t - v).collect();
        let norm = residual.iter().map(|r| r * r).sum::<f64>().sqrt();
        if norm <= tolerance {
            return Ok(within_element(xi, settings.find_xi_bounds_tolerance));
        }
        let Some(jacobian) = value.derivatives.as_deref() else {
            return Ok(None);
        };
        let Some(step) = least_squares_step(jacobian, &residual, dimension) else {
            return Ok(None);
        };
        for (x, dx) in xi.iter_mut().zip(&step) {
            // keep the iterate near the element so linear extrapolation stays sane
            *x = (*x + dx).clamp(-1.0, 2.0);
        }
    }
    Ok(None)
}

fn within_element(xi: Vec<f64>, bounds_tolerance: f64) -> Option<Vec<f64>> {
    let inside = xi
        .iter()
        .all(|x| *x >= -bounds_tolerance && *x <= 1.0 + bounds_tolerance);
    inside.then(|| xi.into_iter().map(|x| x.clamp(0.0, 1.0)).collect())
}

/// Solve `(JᵀJ) Δ = Jᵀ r` for a component-major `J` of `rows × dimension`.
///
/// `None` when the normal matrix is singular.
fn least_squares_step(jacobian: &[f64], residual: &[f64], dimension: usize) -> Option<Vec<f64>> {
    let rows = residual.len();
    let j = DMatrix::from_row_slice(rows, dimension, jacobian.get(..rows * dimension)?);
    let r = DVector::from_column_slice(residual);
    let jt = j.transpose();
    let step = (&jt * &j).lu().solve(&(&jt * &r))?;
    step.iter().all(|x| x.is_finite()).then(|| step.iter().copied().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_jacobian_gives_newton_step() {
        // J = [[2, 1], [1, 3]], r = [3, 5]
        let step = least_squares_step(&[2.0, 1.0, 1.0, 3.0], &[3.0, 5.0], 2).unwrap();
        assert!((step[0] - 0.8).abs() < 1e-12);
        assert!((step[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn singular_jacobian_gives_no_step() {
        assert!(least_squares_step(&[1.0, 2.0, 2.0, 4.0], &[1.0, 1.0], 2).is_none());
        assert!(least_squares_step(&[0.0, 0.0], &[1.0], 2).is_none());
    }

    #[test]
    fn least_squares_on_overdetermined_line() {
        // three components, one xi: J = [1, 2, 2]ᵀ, r = J · 0.25
        let step = least_squares_step(&[1.0, 2.0, 2.0], &[0.25, 0.5, 0.5], 1).unwrap();
        assert!((step[0] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn bounds_check_clamps_near_misses() {
        assert_eq!(within_element(vec![1.0 + 1e-9, 0.5], 1e-6), Some(vec![1.0, 0.5]));
        assert_eq!(within_element(vec![1.1], 1e-6), None);
    }
}
