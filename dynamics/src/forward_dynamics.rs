use crate::derivatives::first_order::rnea_derivatives;
use crate::error::DynamicsError;
use crate::minv::minv;
use crate::model::RobotModel;
use crate::rnea::bias_forces;
use nalgebra::{DMatrix, DVector};

/// Forward dynamics through the inverted mass matrix:
/// `qdd = H⁻¹ (u - c(q, qd))`.
///
/// The O(n) articulated-body route is [`crate::aba`]; this form is the
/// one whose factors are reused by the derivative propagation below.
pub fn forward_dynamics(
    model: &RobotModel,
    q: &DVector<f64>,
    qd: &DVector<f64>,
    u: &DVector<f64>,
) -> Result<DVector<f64>, DynamicsError> {
    model.check_velocity_space("applied force", u)?;
    let c = bias_forces(model, q, qd)?;
    let hinv = minv(model, q)?;
    Ok(hinv * (u - c))
}

/// Jacobians of the forward-dynamics acceleration.
#[derive(Clone, Debug)]
pub struct ForwardDynamicsDerivatives {
    pub qdd: DVector<f64>,
    pub dqdd_dq: DMatrix<f64>,
    pub dqdd_dqd: DMatrix<f64>,
    /// Also `H⁻¹` itself.
    pub dqdd_du: DMatrix<f64>,
}

/// Differentiates `qdd = H⁻¹ (u - c)` by chaining the inverse-dynamics
/// partials evaluated at the achieved acceleration:
/// `∂qdd/∂x = -H⁻¹ ∂tau/∂x`.
pub fn forward_dynamics_derivatives(
    model: &RobotModel,
    q: &DVector<f64>,
    qd: &DVector<f64>,
    u: &DVector<f64>,
) -> Result<ForwardDynamicsDerivatives, DynamicsError> {
    model.check_velocity_space("applied force", u)?;
    let c = bias_forces(model, q, qd)?;
    let hinv = minv(model, q)?;
    let qdd = &hinv * (u - c);

    let partials = rnea_derivatives(model, q, qd, &qdd)?;
    Ok(ForwardDynamicsDerivatives {
        qdd,
        dqdd_dq: -(&hinv * partials.dtau_dq),
        dqdd_dqd: -(&hinv * partials.dtau_dqd),
        dqdd_du: hinv,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aba::aba;
    use crate::model::RobotModelBuilder;
    use approx::assert_relative_eq;
    use nalgebra::{dvector, Matrix3, Vector3};
    use spatial_algebra::{SpatialInertia, SpatialTransform};

    fn arm() -> crate::model::RobotModel {
        let mut b = RobotModelBuilder::new();
        let first = b.add_revolute(
            "shoulder",
            None,
            Vector3::y_axis(),
            SpatialTransform::identity(),
            SpatialInertia::new(1.5, Vector3::new(0.5, 0.0, 0.0), Matrix3::identity() * 0.08),
        );
        b.add_revolute(
            "elbow",
            Some(first),
            Vector3::z_axis(),
            SpatialTransform::translation_of(Vector3::new(1.0, 0.0, 0.0)),
            SpatialInertia::new(0.9, Vector3::new(0.35, 0.0, 0.0), Matrix3::identity() * 0.05),
        );
        b.build().unwrap()
    }

    #[test]
    fn agrees_with_the_articulated_body_route() {
        let model = arm();
        let q = dvector![0.4, -1.1];
        let qd = dvector![0.6, -0.2];
        let u = dvector![0.3, -0.9];
        let via_minv = forward_dynamics(&model, &q, &qd, &u).unwrap();
        let via_aba = aba(&model, &q, &qd, &u).unwrap();
        assert_relative_eq!(via_minv, via_aba, epsilon = 1e-8);
    }

    #[test]
    fn acceleration_jacobians_match_finite_differences() {
        let model = arm();
        let q = dvector![0.4, -1.1];
        let qd = dvector![0.6, -0.2];
        let u = dvector![0.3, -0.9];
        let out = forward_dynamics_derivatives(&model, &q, &qd, &u).unwrap();
        assert_relative_eq!(out.qdd, aba(&model, &q, &qd, &u).unwrap(), epsilon = 1e-8);

        let step = 1e-7;
        for j in 0..2 {
            let mut qp = q.clone();
            let mut qm = q.clone();
            qp[j] += step;
            qm[j] -= step;
            let fd = (aba(&model, &qp, &qd, &u).unwrap()
                - aba(&model, &qm, &qd, &u).unwrap())
                / (2.0 * step);
            assert_relative_eq!(out.dqdd_dq.column(j).into_owned(), fd, epsilon = 1e-5);

            let mut vp = qd.clone();
            let mut vm = qd.clone();
            vp[j] += step;
            vm[j] -= step;
            let fd = (aba(&model, &q, &vp, &u).unwrap()
                - aba(&model, &q, &vm, &u).unwrap())
                / (2.0 * step);
            assert_relative_eq!(out.dqdd_dqd.column(j).into_owned(), fd, epsilon = 1e-5);
        }
    }
}
