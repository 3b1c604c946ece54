use crate::derivatives::{FirstOrder, Propagation};
use crate::error::DynamicsError;
use crate::model::RobotModel;
use nalgebra::{DMatrix, DVector};

/// Jacobians of the inverse-dynamics torque with respect to position and
/// velocity, both `nv x nv` in tangent coordinates.
#[derive(Clone, Debug)]
pub struct RneaPartials {
    pub dtau_dq: DMatrix<f64>,
    pub dtau_dqd: DMatrix<f64>,
}

/// Analytic first-order partials of `tau = rnea(q, qd, qdd)`.
///
/// One outward sweep differentiates the velocity and acceleration
/// recursions, one inward sweep differentiates the force accumulation
/// including the configuration dependence of the joint transforms.
pub fn rnea_derivatives(
    model: &RobotModel,
    q: &DVector<f64>,
    qd: &DVector<f64>,
    qdd: &DVector<f64>,
) -> Result<RneaPartials, DynamicsError> {
    let prop = Propagation::new(model, q, qd, qdd)?;
    let first = FirstOrder::new(model, &prop);
    Ok(RneaPartials {
        dtau_dq: first.dtau_dq,
        dtau_dqd: first.dtau_dqd,
    })
}
