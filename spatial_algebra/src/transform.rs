use crate::{ForceVector, MotionVector};
use nalgebra::{Matrix3, Matrix6, Rotation3, Unit, Vector3};
use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// Plücker coordinate transform between adjacent frames.
///
/// Maps spatial quantities expressed in frame A (the "parent") into frame B.
/// `rotation` takes A coordinates to B coordinates; `translation` is the
/// origin of B expressed in A.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpatialTransform {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl SpatialTransform {
    pub fn new(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity(), Vector3::zeros())
    }

    /// Pure rotation by `angle` about `axis`.
    pub fn rotation_about(axis: &Unit<Vector3<f64>>, angle: f64) -> Self {
        Self::new(
            Rotation3::from_axis_angle(axis, angle).into_inner(),
            Vector3::zeros(),
        )
    }

    /// Pure translation by `distance` along `axis`.
    pub fn translation_along(axis: &Unit<Vector3<f64>>, distance: f64) -> Self {
        Self::new(Matrix3::identity(), axis.into_inner() * distance)
    }

    pub fn translation_of(translation: Vector3<f64>) -> Self {
        Self::new(Matrix3::identity(), translation)
    }

    /// Featherstone 2.26: motion vectors map as `[Rw; R(v - p×w)]`.
    pub fn apply_motion(&self, m: &MotionVector) -> MotionVector {
        let w = m.angular();
        let v = m.linear();
        MotionVector::new(
            self.rotation * w,
            self.rotation * (v - self.translation.cross(&w)),
        )
    }

    /// Featherstone 2.25: force vectors map as `[R(n - p×f); Rf]`.
    pub fn apply_force(&self, f: &ForceVector) -> ForceVector {
        let n = f.angular();
        let fl = f.linear();
        ForceVector::new(
            self.rotation * (n - self.translation.cross(&fl)),
            self.rotation * fl,
        )
    }

    /// Maps a motion vector from frame B back into frame A.
    pub fn inv_apply_motion(&self, m: &MotionVector) -> MotionVector {
        let rt = self.rotation.transpose();
        let w = rt * m.angular();
        MotionVector::new(w, rt * m.linear() + self.translation.cross(&w))
    }

    /// Maps a force vector from frame B back into frame A (the `Xᵀ f`
    /// used when folding child forces into a parent).
    pub fn inv_apply_force(&self, f: &ForceVector) -> ForceVector {
        let rt = self.rotation.transpose();
        let fl = rt * f.linear();
        ForceVector::new(rt * f.angular() + self.translation.cross(&fl), fl)
    }

    pub fn inverse(&self) -> SpatialTransform {
        SpatialTransform::new(self.rotation.transpose(), -(self.rotation * self.translation))
    }

    /// 6x6 realization acting on motion vectors:
    /// `X = [R, 0; -R p×, R]`.
    pub fn motion_matrix(&self) -> Matrix6<f64> {
        let neg_rpx = -self.rotation * self.translation.cross_matrix();
        let mut m = Matrix6::zeros();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.rotation);
        m.fixed_view_mut::<3, 3>(3, 0).copy_from(&neg_rpx);
        m.fixed_view_mut::<3, 3>(3, 3).copy_from(&self.rotation);
        m
    }

    /// 6x6 realization acting on force vectors: `X* = [R, -R p×; 0, R]`.
    pub fn force_matrix(&self) -> Matrix6<f64> {
        let neg_rpx = -self.rotation * self.translation.cross_matrix();
        let mut m = Matrix6::zeros();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.rotation);
        m.fixed_view_mut::<3, 3>(0, 3).copy_from(&neg_rpx);
        m.fixed_view_mut::<3, 3>(3, 3).copy_from(&self.rotation);
        m
    }

    /// Expresses a frame-B 6x6 inertia in frame A (`Xᵀ I X`).
    pub fn shift_inertia(&self, inertia: &Matrix6<f64>) -> Matrix6<f64> {
        let x = self.motion_matrix();
        x.transpose() * inertia * x
    }

    /// Maps a point expressed in frame B into frame A coordinates.
    pub fn point_to_parent(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.translation + self.rotation.transpose() * point
    }
}

impl Default for SpatialTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Composition: `(a * b)` applies `b` first, matching the matrix product
/// of the 6x6 realizations.
impl Mul<SpatialTransform> for SpatialTransform {
    type Output = SpatialTransform;
    fn mul(self, rhs: SpatialTransform) -> SpatialTransform {
        SpatialTransform::new(
            self.rotation * rhs.rotation,
            rhs.translation + rhs.rotation.transpose() * self.translation,
        )
    }
}

impl Mul<MotionVector> for SpatialTransform {
    type Output = MotionVector;
    #[inline]
    fn mul(self, rhs: MotionVector) -> MotionVector {
        self.apply_motion(&rhs)
    }
}

impl Mul<ForceVector> for SpatialTransform {
    type Output = ForceVector;
    #[inline]
    fn mul(self, rhs: ForceVector) -> ForceVector {
        self.apply_force(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector6;

    fn sample_transform() -> SpatialTransform {
        let axis = Unit::new_normalize(Vector3::new(0.2, -0.5, 0.8));
        let rot = SpatialTransform::rotation_about(&axis, 0.7);
        let trans = SpatialTransform::translation_of(Vector3::new(1.0, -2.0, 0.5));
        rot * trans
    }

    #[test]
    fn apply_motion_matches_matrix() {
        let x = sample_transform();
        let m = MotionVector::from(Vector6::new(0.3, -1.2, 0.7, 0.5, 2.0, -0.1));
        assert_relative_eq!(
            x.apply_motion(&m).vector(),
            x.motion_matrix() * m.vector(),
            epsilon = 1e-13
        );
    }

    #[test]
    fn apply_force_matches_matrix() {
        let x = sample_transform();
        let f = ForceVector::from(Vector6::new(0.3, -1.2, 0.7, 0.5, 2.0, -0.1));
        assert_relative_eq!(
            x.apply_force(&f).vector(),
            x.force_matrix() * f.vector(),
            epsilon = 1e-13
        );
    }

    #[test]
    fn inv_apply_force_is_transpose() {
        let x = sample_transform();
        let f = ForceVector::from(Vector6::new(0.3, -1.2, 0.7, 0.5, 2.0, -0.1));
        assert_relative_eq!(
            x.inv_apply_force(&f).vector(),
            x.motion_matrix().transpose() * f.vector(),
            epsilon = 1e-13
        );
    }

    #[test]
    fn motion_round_trip() {
        let x = sample_transform();
        let m = MotionVector::from(Vector6::new(0.3, -1.2, 0.7, 0.5, 2.0, -0.1));
        let back = x.inv_apply_motion(&x.apply_motion(&m));
        assert_relative_eq!(back.vector(), m.vector(), epsilon = 1e-13);
    }

    #[test]
    fn composition_matches_matrix_product() {
        let axis = Unit::new_normalize(Vector3::new(-0.3, 0.9, 0.1));
        let a = SpatialTransform::rotation_about(&axis, -1.1)
            * SpatialTransform::translation_of(Vector3::new(0.4, 0.0, -0.7));
        let b = sample_transform();
        assert_relative_eq!(
            (a * b).motion_matrix(),
            a.motion_matrix() * b.motion_matrix(),
            epsilon = 1e-13
        );
    }

    #[test]
    fn inverse_composes_to_identity() {
        let x = sample_transform();
        let id = x * x.inverse();
        assert_relative_eq!(id.rotation, Matrix3::identity(), epsilon = 1e-13);
        assert_relative_eq!(id.translation, Vector3::zeros(), epsilon = 1e-13);
    }

    #[test]
    fn force_matrix_is_inverse_transpose_of_motion() {
        let x = sample_transform();
        let xm = x.motion_matrix();
        let xf = x.force_matrix();
        assert_relative_eq!(
            xf,
            xm.try_inverse().unwrap().transpose(),
            epsilon = 1e-12
        );
    }
}
