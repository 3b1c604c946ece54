use crate::{ForceVector, MotionVector};
use nalgebra::{Matrix3, Matrix6, Vector3};
use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// Rigid-body spatial inertia about the body-frame origin.
///
/// Stored as mass, center of mass, and the 3x3 rotational inertia about
/// the center of mass; `matrix()` assembles the symmetric 6x6 form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialInertia {
    pub mass: f64,
    pub center_of_mass: Vector3<f64>,
    pub inertia: Matrix3<f64>,
}

impl SpatialInertia {
    pub fn new(mass: f64, center_of_mass: Vector3<f64>, inertia: Matrix3<f64>) -> Self {
        Self {
            mass,
            center_of_mass,
            inertia,
        }
    }

    pub fn zeros() -> Self {
        Self::new(0.0, Vector3::zeros(), Matrix3::zeros())
    }

    pub fn point_mass(mass: f64, position: Vector3<f64>) -> Self {
        Self::new(mass, position, Matrix3::zeros())
    }

    /// Uniform thin rod of the given mass and length, centered at
    /// `center_of_mass` and aligned with `axis`.
    pub fn rod(mass: f64, length: f64, center_of_mass: Vector3<f64>, axis: Vector3<f64>) -> Self {
        let i = mass * length * length / 12.0;
        let a = axis.normalize();
        // Full inertia perpendicular to the rod axis, none about it.
        let inertia = (Matrix3::identity() - a * a.transpose()) * i;
        Self::new(mass, center_of_mass, inertia)
    }

    pub fn sphere(mass: f64, radius: f64) -> Self {
        let i = 0.4 * mass * radius * radius;
        Self::new(mass, Vector3::zeros(), Matrix3::identity() * i)
    }

    /// Featherstone 2.63:
    /// `I = [Ībar + m c× c×ᵀ, m c×; m c×ᵀ, m E]`.
    pub fn matrix(&self) -> Matrix6<f64> {
        let cx = self.center_of_mass.cross_matrix();
        let cxt = cx.transpose();
        let m = self.mass;

        let quad11 = self.inertia + cx * cxt * m;
        let quad12 = cx * m;
        let quad21 = cxt * m;
        let quad22 = Matrix3::identity() * m;

        let mut out = Matrix6::zeros();
        out.fixed_view_mut::<3, 3>(0, 0).copy_from(&quad11);
        out.fixed_view_mut::<3, 3>(0, 3).copy_from(&quad12);
        out.fixed_view_mut::<3, 3>(3, 0).copy_from(&quad21);
        out.fixed_view_mut::<3, 3>(3, 3).copy_from(&quad22);
        out
    }
}

impl Mul<MotionVector> for SpatialInertia {
    type Output = ForceVector;
    fn mul(self, m: MotionVector) -> ForceVector {
        let w = m.angular();
        let v = m.linear();
        let c = self.center_of_mass;
        let cx = c.cross_matrix();
        ForceVector::new(
            (self.inertia + cx * cx.transpose() * self.mass) * w + self.mass * c.cross(&v),
            self.mass * v - self.mass * c.cross(&w),
        )
    }
}
