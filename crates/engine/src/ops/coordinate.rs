//! Coordinate system conversion of three-component fields.
//!
//! Conversions go through rectangular cartesian. Cylindrical polar is
//! `(r, θ, z)`; spherical polar is `(r, θ, φ)` with `φ` the elevation above
//! the x-y plane:
//!
//! ```text
//! x = r cos θ cos φ    y = r sin θ cos φ    z = r sin φ
//! ```
//!
//! Derivatives are carried through the Jacobians of both conversions. On the
//! polar axis the inverse Jacobian does not exist and derivatives are dropped.

use fieldgraph_core::{ConstructionError, EvaluationError, FieldValue, Location};
use nalgebra::{DMatrix, Matrix3, Vector3};

use super::Evaluation;
use crate::field::Field;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateSystem {
    RectangularCartesian,
    CylindricalPolar,
    SphericalPolar,
}

impl CoordinateSystem {
    pub const ALL: [CoordinateSystem; 3] = [
        Self::RectangularCartesian,
        Self::CylindricalPolar,
        Self::SphericalPolar,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Self::RectangularCartesian => "rectangular_cartesian",
            Self::CylindricalPolar => "cylindrical_polar",
            Self::SphericalPolar => "spherical_polar",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.token() == token)
    }

    /// Cartesian position of `v` and `∂(x, y, z)/∂v`.
    fn to_cartesian(self, v: Vector3<f64>) -> (Vector3<f64>, Matrix3<f64>) {
        match self {
            Self::RectangularCartesian => (v, Matrix3::identity()),
            Self::CylindricalPolar => {
                let (r, theta, z) = (v[0], v[1], v[2]);
                let (s, c) = theta.sin_cos();
                (
                    Vector3::new(r * c, r * s, z),
                    Matrix3::new(c, -r * s, 0.0, s, r * c, 0.0, 0.0, 0.0, 1.0),
                )
            }
            Self::SphericalPolar => {
                let (r, theta, phi) = (v[0], v[1], v[2]);
                let (st, ct) = theta.sin_cos();
                let (sp, cp) = phi.sin_cos();
                (
                    Vector3::new(r * ct * cp, r * st * cp, r * sp),
                    Matrix3::new(
                        ct * cp,
                        -r * st * cp,
                        -r * ct * sp,
                        st * cp,
                        r * ct * cp,
                        -r * st * sp,
                        sp,
                        0.0,
                        r * cp,
                    ),
                )
            }
        }
    }

    /// Coordinates of cartesian `x` in this system and `∂v/∂(x, y, z)`,
    /// the latter absent on the polar axis.
    fn of_cartesian(self, x: Vector3<f64>) -> (Vector3<f64>, Option<Matrix3<f64>>) {
        let (px, py, pz) = (x[0], x[1], x[2]);
        match self {
            Self::RectangularCartesian => (x, Some(Matrix3::identity())),
            Self::CylindricalPolar => {
                let r2 = px * px + py * py;
                let r = r2.sqrt();
                let value = Vector3::new(r, py.atan2(px), pz);
                if r2 == 0.0 {
                    return (value, None);
                }
                (
                    value,
                    Some(Matrix3::new(
                        px / r,
                        py / r,
                        0.0,
                        -py / r2,
                        px / r2,
                        0.0,
                        0.0,
                        0.0,
                        1.0,
                    )),
                )
            }
            Self::SphericalPolar => {
                let rho2 = px * px + py * py;
                let rho = rho2.sqrt();
                let r2 = rho2 + pz * pz;
                let r = r2.sqrt();
                let value = Vector3::new(r, py.atan2(px), pz.atan2(rho));
                if rho2 == 0.0 {
                    return (value, None);
                }
                (
                    value,
                    Some(Matrix3::new(
                        px / r,
                        py / r,
                        pz / r,
                        -py / rho2,
                        px / rho2,
                        0.0,
                        -pz * px / (r2 * rho),
                        -pz * py / (r2 * rho),
                        rho / r2,
                    )),
                )
            }
        }
    }
}

/// Convert `v` from one coordinate system to another.
pub fn convert(from: CoordinateSystem, to: CoordinateSystem, v: Vector3<f64>) -> Vector3<f64> {
    to.of_cartesian(from.to_cartesian(v).0).0
}

/// The first three entries of `values`, zero padded.
fn as_vector(values: &[f64]) -> Vector3<f64> {
    Vector3::from_iterator(values.iter().copied().chain(std::iter::repeat(0.0)))
}

pub(crate) fn validate(source: &Field) -> Result<usize, ConstructionError> {
    let components = source.number_of_components();
    if components != 3 {
        return Err(ConstructionError::mismatch("coordinate_transformation source field", 3, components));
    }
    Ok(3)
}

/// Re-expresses a three-component source given in `from` coordinates in
/// `to` coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateTransformationCore {
    from: CoordinateSystem,
    to: CoordinateSystem,
}

impl CoordinateTransformationCore {
    pub fn new(from: CoordinateSystem, to: CoordinateSystem) -> Self {
        Self { from, to }
    }

    pub fn source_system(&self) -> CoordinateSystem {
        self.from
    }

    pub fn target_system(&self) -> CoordinateSystem {
        self.to
    }

    pub(crate) fn evaluate(&self, eval: &Evaluation<'_>, location: &Location) -> Result<FieldValue, EvaluationError> {
        let source = eval.source(0)?.evaluate(location)?;
        let (cartesian, outward) = self.from.to_cartesian(as_vector(&source.values));
        let (value, inward) = self.to.of_cartesian(cartesian);
        let values: Vec<f64> = value.iter().copied().collect();

        let n = source.number_of_derivatives;
        let (Some(block), Some(inward)) = (source.derivatives.as_deref(), inward) else {
            return Ok(FieldValue::values_only(values));
        };
        if n == 0 {
            return Ok(FieldValue::values_only(values));
        }
        // rows are components, columns xi directions
        let block = DMatrix::from_row_slice(3, n, block);
        let chained = DMatrix::from_iterator(3, 3, (inward * outward).iter().copied()) * block;
        let derivatives: Vec<f64> = chained.transpose().iter().copied().collect();
        Ok(FieldValue::with_derivatives(values, derivatives, n))
    }

    /// Source values that transform to `values`.
    pub(crate) fn inverse(&self, values: &[f64]) -> Vec<f64> {
        convert(self.to, self.from, as_vector(values)).iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    fn close(a: Vector3<f64>, b: Vector3<f64>) -> bool {
        (a - b).amax() < 1e-12
    }

    #[test]
    fn cylindrical_to_cartesian() {
        let x = convert(
            CoordinateSystem::CylindricalPolar,
            CoordinateSystem::RectangularCartesian,
            Vector3::new(2.0, FRAC_PI_2, 5.0),
        );
        assert!(close(x, Vector3::new(0.0, 2.0, 5.0)));
    }

    #[test]
    fn spherical_round_trip() {
        let v = Vector3::new(3.0, FRAC_PI_4, 0.3);
        let x = convert(CoordinateSystem::SphericalPolar, CoordinateSystem::RectangularCartesian, v);
        let back = convert(CoordinateSystem::RectangularCartesian, CoordinateSystem::SphericalPolar, x);
        assert!(close(v, back));
        assert!((x.norm() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn jacobians_are_inverse() {
        for system in [CoordinateSystem::CylindricalPolar, CoordinateSystem::SphericalPolar] {
            let (x, outward) = system.to_cartesian(Vector3::new(1.5, 0.7, 0.4));
            let (_, inward) = system.of_cartesian(x);
            let error = (inward.unwrap() * outward - Matrix3::identity()).amax();
            assert!(error < 1e-12, "{system:?} off identity by {error}");
        }
    }

    #[test]
    fn axis_has_no_inverse_jacobian() {
        let (value, jacobian) = CoordinateSystem::CylindricalPolar.of_cartesian(Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(value, Vector3::new(0.0, 0.0, 1.0));
        assert!(jacobian.is_none());
    }

    #[test]
    fn short_values_are_zero_padded() {
        assert_eq!(as_vector(&[1.0, 2.0]), Vector3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn tokens_round_trip() {
        for system in CoordinateSystem::ALL {
            assert_eq!(CoordinateSystem::from_token(system.token()), Some(system));
        }
    }
}
