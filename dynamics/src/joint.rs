use nalgebra::{Matrix6xX, Quaternion, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use spatial_algebra::{MotionVector, SpatialTransform};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JointType {
    Revolute,
    Prismatic,
    Fixed,
    /// Quaternion-parameterized 6-DOF base joint.
    Floating,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Joint {
    pub joint_type: JointType,
    /// Motion axis in the joint frame; ignored for fixed and floating joints.
    pub axis: Unit<Vector3<f64>>,
}

impl Joint {
    pub fn revolute(axis: Unit<Vector3<f64>>) -> Self {
        Self {
            joint_type: JointType::Revolute,
            axis,
        }
    }

    pub fn prismatic(axis: Unit<Vector3<f64>>) -> Self {
        Self {
            joint_type: JointType::Prismatic,
            axis,
        }
    }

    pub fn fixed() -> Self {
        Self {
            joint_type: JointType::Fixed,
            axis: Vector3::z_axis(),
        }
    }

    pub fn floating() -> Self {
        Self {
            joint_type: JointType::Floating,
            axis: Vector3::z_axis(),
        }
    }

    /// Velocity-space width of the joint.
    pub fn dof(&self) -> usize {
        match self.joint_type {
            JointType::Revolute | JointType::Prismatic => 1,
            JointType::Fixed => 0,
            JointType::Floating => 6,
        }
    }

    /// Configuration-space width; exceeds `dof()` for the floating joint
    /// because of the quaternion parameterization.
    pub fn nq(&self) -> usize {
        match self.joint_type {
            JointType::Revolute | JointType::Prismatic => 1,
            JointType::Fixed => 0,
            JointType::Floating => 7,
        }
    }

    /// Joint transform (predecessor frame to successor frame) for the
    /// given configuration slice. The successor frame moves by +q, so the
    /// coordinate transform uses the negated displacement.
    pub fn transform(&self, q: &[f64]) -> SpatialTransform {
        match self.joint_type {
            JointType::Revolute => SpatialTransform::rotation_about(&self.axis, -q[0]),
            JointType::Prismatic => SpatialTransform::translation_along(&self.axis, q[0]),
            JointType::Fixed => SpatialTransform::identity(),
            JointType::Floating => {
                // q = [qx, qy, qz, qw, x, y, z]; the quaternion rotates
                // body coordinates into world coordinates.
                let rotation = UnitQuaternion::from_quaternion(Quaternion::new(
                    q[3], q[0], q[1], q[2],
                ))
                .to_rotation_matrix()
                .into_inner();
                let position = Vector3::new(q[4], q[5], q[6]);
                SpatialTransform::new(rotation.transpose(), position)
            }
        }
    }

    /// Motion subspace S as a 6 x dof matrix.
    pub fn motion_subspace(&self) -> Matrix6xX<f64> {
        let mut s = Matrix6xX::zeros(self.dof());
        match self.joint_type {
            JointType::Revolute => {
                s.fixed_view_mut::<3, 1>(0, 0).copy_from(&self.axis);
            }
            JointType::Prismatic => {
                s.fixed_view_mut::<3, 1>(3, 0).copy_from(&self.axis);
            }
            JointType::Fixed => {}
            JointType::Floating => {
                s.fill_with_identity();
            }
        }
        s
    }

    /// `S · qd` without forming the subspace matrix.
    pub fn subspace_velocity(&self, qd: &[f64]) -> MotionVector {
        match self.joint_type {
            JointType::Revolute => MotionVector::new(self.axis.into_inner() * qd[0], Vector3::zeros()),
            JointType::Prismatic => {
                MotionVector::new(Vector3::zeros(), self.axis.into_inner() * qd[0])
            }
            JointType::Fixed => MotionVector::zeros(),
            JointType::Floating => MotionVector::new(
                Vector3::new(qd[0], qd[1], qd[2]),
                Vector3::new(qd[3], qd[4], qd[5]),
            ),
        }
    }

    /// Neutral configuration slice (identity quaternion for the floating
    /// joint, zeros otherwise).
    pub fn neutral_configuration(&self) -> Vec<f64> {
        match self.joint_type {
            JointType::Floating => vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
            _ => vec![0.0; self.nq()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn revolute_transform_counter_rotates_coordinates() {
        let joint = Joint::revolute(Vector3::z_axis());
        let q = std::f64::consts::FRAC_PI_2;
        let x = joint.transform(&[q]);
        // A vector fixed along parent-x appears along -y in the rotated body frame.
        let v = x.rotation * Vector3::x();
        assert_relative_eq!(v, -Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn subspace_velocity_matches_matrix_product() {
        let joint = Joint::floating();
        let qd = [0.3, -0.1, 0.2, 1.0, -2.0, 0.5];
        let s = joint.motion_subspace();
        let direct = joint.subspace_velocity(&qd).vector();
        let via_matrix = s * nalgebra::DVector::from_row_slice(&qd);
        assert_relative_eq!(direct, via_matrix.fixed_rows::<6>(0).into_owned(), epsilon = 1e-14);
    }

    #[test]
    fn floating_transform_round_trips_a_point() {
        let joint = Joint::floating();
        let angle: f64 = 0.8;
        // Rotation about z by `angle`, translated to (1, 2, 3).
        let q = [
            0.0,
            0.0,
            (angle / 2.0).sin(),
            (angle / 2.0).cos(),
            1.0,
            2.0,
            3.0,
        ];
        let x = joint.transform(&q);
        // Body origin expressed in world coordinates is the translation.
        assert_relative_eq!(
            x.point_to_parent(&Vector3::zeros()),
            Vector3::new(1.0, 2.0, 3.0),
            epsilon = 1e-12
        );
    }
}
