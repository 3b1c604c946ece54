//! 6D spatial vector algebra (Featherstone convention, `[angular; linear]`).
//!
//! Motion vectors (velocity, acceleration) and force vectors transform
//! differently between frames and carry distinct cross-product operators,
//! so they are kept as separate newtypes over the shared [`SpatialVector`].

mod inertia;
mod transform;

pub use inertia::SpatialInertia;
pub use transform::SpatialTransform;

use nalgebra::{Matrix6, Vector3, Vector6};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialVector {
    pub rotation: Vector3<f64>,
    pub translation: Vector3<f64>,
}

impl SpatialVector {
    pub fn new(rotation: Vector3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn zeros() -> Self {
        Self::new(Vector3::zeros(), Vector3::zeros())
    }

    pub fn vector(&self) -> Vector6<f64> {
        Vector6::new(
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
            self.translation.x,
            self.translation.y,
            self.translation.z,
        )
    }

    /// Featherstone 2.33
    pub fn cross_motion(self, rhs: SpatialVector) -> SpatialVector {
        let new_rotation = self.rotation.cross(&rhs.rotation);
        let new_translation =
            self.rotation.cross(&rhs.translation) + self.translation.cross(&rhs.rotation);
        SpatialVector::new(new_rotation, new_translation)
    }

    /// Featherstone 2.34
    pub fn cross_force(self, rhs: SpatialVector) -> SpatialVector {
        let new_rotation =
            self.rotation.cross(&rhs.rotation) + self.translation.cross(&rhs.translation);
        let new_translation = self.rotation.cross(&rhs.translation);
        SpatialVector::new(new_rotation, new_translation)
    }

    pub fn dot(&self, rhs: &SpatialVector) -> f64 {
        self.rotation.dot(&rhs.rotation) + self.translation.dot(&rhs.translation)
    }
}

impl From<Vector6<f64>> for SpatialVector {
    fn from(v: Vector6<f64>) -> SpatialVector {
        SpatialVector::new(Vector3::new(v[0], v[1], v[2]), Vector3::new(v[3], v[4], v[5]))
    }
}

impl Add for SpatialVector {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(
            self.rotation + rhs.rotation,
            self.translation + rhs.translation,
        )
    }
}

impl Sub for SpatialVector {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(
            self.rotation - rhs.rotation,
            self.translation - rhs.translation,
        )
    }
}

impl Neg for SpatialVector {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.rotation, -self.translation)
    }
}

impl Mul<f64> for SpatialVector {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.rotation * rhs, self.translation * rhs)
    }
}

/// A spatial motion vector (twist): velocity or acceleration of a body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionVector(pub SpatialVector);

impl MotionVector {
    pub fn new(rotation: Vector3<f64>, translation: Vector3<f64>) -> Self {
        Self(SpatialVector::new(rotation, translation))
    }

    pub fn zeros() -> Self {
        Self(SpatialVector::zeros())
    }

    pub fn angular(&self) -> Vector3<f64> {
        self.0.rotation
    }

    pub fn linear(&self) -> Vector3<f64> {
        self.0.translation
    }

    pub fn vector(&self) -> Vector6<f64> {
        self.0.vector()
    }

    pub fn cross_motion(self, rhs: MotionVector) -> MotionVector {
        MotionVector(self.0.cross_motion(rhs.0))
    }

    pub fn cross_force(self, rhs: ForceVector) -> ForceVector {
        ForceVector(self.0.cross_force(rhs.0))
    }

    /// Power pairing with a force vector.
    pub fn dot(&self, rhs: &ForceVector) -> f64 {
        self.0.dot(&rhs.0)
    }
}

impl From<Vector6<f64>> for MotionVector {
    fn from(v: Vector6<f64>) -> MotionVector {
        MotionVector(SpatialVector::from(v))
    }
}

impl Add for MotionVector {
    type Output = MotionVector;
    #[inline]
    fn add(self, rhs: MotionVector) -> MotionVector {
        MotionVector(self.0 + rhs.0)
    }
}

impl Sub for MotionVector {
    type Output = MotionVector;
    #[inline]
    fn sub(self, rhs: MotionVector) -> MotionVector {
        MotionVector(self.0 - rhs.0)
    }
}

impl Neg for MotionVector {
    type Output = MotionVector;
    #[inline]
    fn neg(self) -> MotionVector {
        MotionVector(-self.0)
    }
}

impl Mul<f64> for MotionVector {
    type Output = MotionVector;
    #[inline]
    fn mul(self, rhs: f64) -> MotionVector {
        MotionVector(self.0 * rhs)
    }
}

/// A spatial force vector (wrench): `[torque; force]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ForceVector(pub SpatialVector);

impl ForceVector {
    pub fn new(rotation: Vector3<f64>, translation: Vector3<f64>) -> Self {
        Self(SpatialVector::new(rotation, translation))
    }

    pub fn zeros() -> Self {
        Self(SpatialVector::zeros())
    }

    pub fn angular(&self) -> Vector3<f64> {
        self.0.rotation
    }

    pub fn linear(&self) -> Vector3<f64> {
        self.0.translation
    }

    pub fn vector(&self) -> Vector6<f64> {
        self.0.vector()
    }

    pub fn dot(&self, rhs: &MotionVector) -> f64 {
        self.0.dot(&rhs.0)
    }
}

impl From<Vector6<f64>> for ForceVector {
    fn from(v: Vector6<f64>) -> ForceVector {
        ForceVector(SpatialVector::from(v))
    }
}

impl Add for ForceVector {
    type Output = ForceVector;
    #[inline]
    fn add(self, rhs: ForceVector) -> ForceVector {
        ForceVector(self.0 + rhs.0)
    }
}

impl Sub for ForceVector {
    type Output = ForceVector;
    #[inline]
    fn sub(self, rhs: ForceVector) -> ForceVector {
        ForceVector(self.0 - rhs.0)
    }
}

impl Neg for ForceVector {
    type Output = ForceVector;
    #[inline]
    fn neg(self) -> ForceVector {
        ForceVector(-self.0)
    }
}

impl Mul<f64> for ForceVector {
    type Output = ForceVector;
    #[inline]
    fn mul(self, rhs: f64) -> ForceVector {
        ForceVector(self.0 * rhs)
    }
}

/// 6x6 operator form of the motion cross product: `crm(v) w = v ×ₘ w`.
pub fn motion_cross_matrix(v: &Vector6<f64>) -> Matrix6<f64> {
    let w = Vector3::new(v[0], v[1], v[2]).cross_matrix();
    let u = Vector3::new(v[3], v[4], v[5]).cross_matrix();
    let mut m = Matrix6::zeros();
    m.fixed_view_mut::<3, 3>(0, 0).copy_from(&w);
    m.fixed_view_mut::<3, 3>(3, 0).copy_from(&u);
    m.fixed_view_mut::<3, 3>(3, 3).copy_from(&w);
    m
}

/// 6x6 operator form of the force cross product: `crf(v) f = v ×f f`.
///
/// Dual to the motion operator: `crf(v) = -crm(v)ᵀ` (Featherstone 2.35).
pub fn force_cross_matrix(v: &Vector6<f64>) -> Matrix6<f64> {
    -motion_cross_matrix(v).transpose()
}
