use crate::error::DynamicsError;
use crate::kinematics::{propagate, world_transforms};
use crate::model::RobotModel;
use nalgebra::DVector;

/// Total kinetic energy `½ Σ vᵢᵀ Iᵢ vᵢ`.
pub fn kinetic_energy(
    model: &RobotModel,
    q: &DVector<f64>,
    qd: &DVector<f64>,
) -> Result<f64, DynamicsError> {
    let kin = propagate(model, q, qd, &DVector::zeros(model.nv()))?;
    Ok(model
        .bodies()
        .iter()
        .zip(&kin.velocities)
        .map(|(body, v)| 0.5 * v.dot(&(body.inertia * *v)))
        .sum())
}

/// Total gravitational potential energy, `-Σ mᵢ g · xᵢ` with `xᵢ` the
/// world position of body i's center of mass. Zero level is the world
/// origin.
pub fn potential_energy(model: &RobotModel, q: &DVector<f64>) -> Result<f64, DynamicsError> {
    let world = world_transforms(model, q)?;
    let g = model.gravity();
    Ok(model
        .bodies()
        .iter()
        .zip(&world)
        .map(|(body, x)| {
            let com = x.point_to_parent(&body.inertia.center_of_mass);
            -body.inertia.mass * g.dot(&com)
        })
        .sum())
}
