use crate::error::DynamicsError;
use crate::kinematics::{propagate, Kinematics};
use crate::model::RobotModel;
use nalgebra::DVector;
use spatial_algebra::ForceVector;

/// Inverse-dynamics output together with the intermediate sweeps, which
/// several downstream algorithms reuse.
#[derive(Clone, Debug)]
pub struct RneaResult {
    /// Generalized forces realizing the requested motion.
    pub tau: DVector<f64>,
    pub kinematics: Kinematics,
    /// Spatial force each body transmits across its joint, with the
    /// whole subtree already folded in.
    pub forces: Vec<ForceVector>,
}

/// Recursive Newton-Euler: the generalized forces that realize `qdd` at
/// state `(q, qd)` under gravity.
///
/// Outward pass propagates velocities and accelerations, inward pass
/// accumulates `f = I a + v ×f I v` and projects through each joint's
/// motion subspace.
pub fn rnea(
    model: &RobotModel,
    q: &DVector<f64>,
    qd: &DVector<f64>,
    qdd: &DVector<f64>,
) -> Result<RneaResult, DynamicsError> {
    let kinematics = propagate(model, q, qd, qdd)?;

    let mut forces: Vec<ForceVector> = model
        .bodies()
        .iter()
        .enumerate()
        .map(|(i, body)| {
            let v = kinematics.velocities[i];
            body.inertia * kinematics.accelerations[i] + v.cross_force(body.inertia * v)
        })
        .collect();

    let mut tau = DVector::zeros(model.nv());
    for i in (0..model.n_bodies()).rev() {
        let body = &model.bodies()[i];
        let s = body.joint.motion_subspace();
        let f = forces[i].vector();
        for (d, col) in s.column_iter().enumerate() {
            tau[body.qd_index + d] = col.dot(&f);
        }
        if let Some(p) = body.parent {
            let folded = kinematics.transforms[i].inv_apply_force(&forces[i]);
            forces[p] = forces[p] + folded;
        }
    }

    Ok(RneaResult {
        tau,
        kinematics,
        forces,
    })
}

/// Bias forces `c(q, qd)`: inverse dynamics at zero joint acceleration.
pub fn bias_forces(
    model: &RobotModel,
    q: &DVector<f64>,
    qd: &DVector<f64>,
) -> Result<DVector<f64>, DynamicsError> {
    Ok(rnea(model, q, qd, &DVector::zeros(model.nv()))?.tau)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RobotModel, RobotModelBuilder};
    use approx::assert_relative_eq;
    use nalgebra::{dvector, Matrix3, Vector3};
    use spatial_algebra::{SpatialInertia, SpatialTransform};

    fn pendulum(mass: f64, com: f64) -> RobotModel {
        let mut b = RobotModelBuilder::new();
        b.add_revolute(
            "link",
            None,
            Vector3::y_axis(),
            SpatialTransform::identity(),
            SpatialInertia::new(mass, Vector3::new(com, 0.0, 0.0), Matrix3::identity() * 0.1),
        );
        b.build().unwrap()
    }

    #[test]
    fn gravity_torque_of_a_pendulum() {
        // Rotation about +y with the arm along +x lowers the tip as q
        // grows, so the holding torque is tau = -m g c cos(q).
        let model = pendulum(2.0, 0.4);
        for q in [-1.2, 0.0, 0.3, 1.5] {
            let out = rnea(&model, &dvector![q], &dvector![0.0], &dvector![0.0]).unwrap();
            assert_relative_eq!(out.tau[0], -2.0 * 9.81 * 0.4 * q.cos(), epsilon = 1e-10);
        }
    }

    #[test]
    fn inertia_scales_acceleration_torque_without_gravity() {
        let mut b = RobotModelBuilder::new().gravity(Vector3::zeros());
        b.add_revolute(
            "link",
            None,
            Vector3::y_axis(),
            SpatialTransform::identity(),
            SpatialInertia::new(2.0, Vector3::new(0.4, 0.0, 0.0), Matrix3::identity() * 0.1),
        );
        let model = b.build().unwrap();
        // About the joint: Iyy + m c^2.
        let expected = (0.1 + 2.0 * 0.4 * 0.4) * 3.0;
        let out = rnea(&model, &dvector![0.7], &dvector![0.0], &dvector![3.0]).unwrap();
        assert_relative_eq!(out.tau[0], expected, epsilon = 1e-10);
    }

    #[test]
    fn two_link_gravity_matches_closed_form() {
        // Planar double pendulum of point masses on massless rods,
        // rotating about y with links along +x.
        let (m1, m2, l1, l2) = (1.5, 0.8, 1.0, 0.7);
        let mut b = RobotModelBuilder::new();
        let first = b.add_revolute(
            "first",
            None,
            Vector3::y_axis(),
            SpatialTransform::identity(),
            SpatialInertia::point_mass(m1, Vector3::new(l1, 0.0, 0.0)),
        );
        b.add_revolute(
            "second",
            Some(first),
            Vector3::y_axis(),
            SpatialTransform::translation_of(Vector3::new(l1, 0.0, 0.0)),
            SpatialInertia::point_mass(m2, Vector3::new(l2, 0.0, 0.0)),
        );
        let model = b.build().unwrap();

        let (q1, q2) = (0.35_f64, -0.6_f64);
        let g = 9.81;
        let tau2 = -m2 * g * l2 * (q1 + q2).cos();
        let tau1 = -(m1 + m2) * g * l1 * q1.cos() + tau2;

        let out = rnea(
            &model,
            &dvector![q1, q2],
            &dvector![0.0, 0.0],
            &dvector![0.0, 0.0],
        )
        .unwrap();
        assert_relative_eq!(out.tau[0], tau1, epsilon = 1e-9);
        assert_relative_eq!(out.tau[1], tau2, epsilon = 1e-9);
    }

    #[test]
    fn straight_arm_coriolis_vanishes_for_a_base_only_rate() {
        // With the elbow straight, spinning only the shoulder produces no
        // Coriolis torque, so the bias equals the pure gravity torque.
        let (m1, m2, l1, l2) = (1.5, 0.8, 1.0, 0.7);
        let mut b = RobotModelBuilder::new();
        let first = b.add_revolute(
            "first",
            None,
            Vector3::y_axis(),
            SpatialTransform::identity(),
            SpatialInertia::point_mass(m1, Vector3::new(l1, 0.0, 0.0)),
        );
        b.add_revolute(
            "second",
            Some(first),
            Vector3::y_axis(),
            SpatialTransform::translation_of(Vector3::new(l1, 0.0, 0.0)),
            SpatialInertia::point_mass(m2, Vector3::new(l2, 0.0, 0.0)),
        );
        let model = b.build().unwrap();

        let q = dvector![0.0, 0.0];
        let zeros = dvector![0.0, 0.0];
        let at_rest = rnea(&model, &q, &zeros, &zeros).unwrap().tau;
        let spinning = rnea(&model, &q, &dvector![1.0, 0.0], &zeros).unwrap().tau;
        assert_relative_eq!(spinning, at_rest, epsilon = 1e-10);
    }

    #[test]
    fn free_fall_of_a_floating_base_needs_no_force() {
        let mut b = RobotModelBuilder::new();
        b.add_floating_base("base", SpatialInertia::sphere(3.0, 0.5));
        let model = b.build().unwrap();

        // Body acceleration equal to gravity, expressed in the body frame.
        let q = model.neutral_configuration();
        let qd = dvector![0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let qdd = dvector![0.0, 0.0, 0.0, 0.0, 0.0, -9.81];
        let out = rnea(&model, &q, &qd, &qdd).unwrap();
        assert_relative_eq!(out.tau.norm(), 0.0, epsilon = 1e-10);
    }
}
