use crate::error::DynamicsError;
use crate::kinematics::body_transforms;
use crate::model::RobotModel;
use nalgebra::{DVector, Matrix6, Vector3, Vector6};
use spatial_algebra::MotionVector;

/// Articulated-body algorithm: forward dynamics `qdd(q, qd, u)` in O(n)
/// without forming the mass matrix.
///
/// Three sweeps. Outward: velocities and velocity-product terms. Inward:
/// articulated inertias `Iᴬ` and bias forces `pᴬ`, reduced through each
/// joint. Outward again: accelerations and joint rates.
pub fn aba(
    model: &RobotModel,
    q: &DVector<f64>,
    qd: &DVector<f64>,
    u: &DVector<f64>,
) -> Result<DVector<f64>, DynamicsError> {
    model.check_velocity_space("velocity", qd)?;
    model.check_velocity_space("applied force", u)?;
    let transforms = body_transforms(model, q)?;
    let n = model.n_bodies();
    let qds = qd.as_slice();

    let mut velocities = vec![MotionVector::zeros(); n];
    // Velocity-product acceleration v ×ₘ S qd per body.
    let mut coriolis = vec![Vector6::zeros(); n];
    let mut ia: Vec<Matrix6<f64>> = Vec::with_capacity(n);
    let mut pa: Vec<Vector6<f64>> = Vec::with_capacity(n);

    for (i, body) in model.bodies().iter().enumerate() {
        let vp = match body.parent {
            Some(p) => velocities[p],
            None => MotionVector::zeros(),
        };
        let vj = body.joint.subspace_velocity(model.qd_slice(i, qds));
        let v = transforms[i].apply_motion(&vp) + vj;
        velocities[i] = v;
        coriolis[i] = v.cross_motion(vj).vector();
        ia.push(body.inertia.matrix());
        pa.push(v.cross_force(body.inertia * v).vector());
    }

    // (U, D⁻¹, u - Sᵀ pᴬ) per movable joint, reused in the last sweep.
    let mut factors = vec![None; n];
    for i in (0..n).rev() {
        let body = &model.bodies()[i];
        let k = body.joint.dof();
        let xm = transforms[i].motion_matrix();

        if k == 0 {
            if let Some(p) = body.parent {
                let xmt = xm.transpose();
                let folded_ia = xmt * ia[i] * xm;
                let folded_pa = xmt * (pa[i] + ia[i] * coriolis[i]);
                ia[p] += folded_ia;
                pa[p] += folded_pa;
            }
            continue;
        }

        let vi = body.qd_index;
        let s = body.joint.motion_subspace();
        let big_u = ia[i] * &s;
        let d = s.transpose() * &big_u;
        let dinv = d
            .try_inverse()
            .ok_or(DynamicsError::SingularMassMatrix { body: i })?;
        let torque_residual =
            DVector::from_fn(k, |r, _| u[vi + r]) - s.transpose() * pa[i];

        if let Some(p) = body.parent {
            let ia_reduced = ia[i] - (&big_u * &dinv) * big_u.transpose();
            let pa_reduced =
                pa[i] + ia_reduced * coriolis[i] + &big_u * (&dinv * &torque_residual);
            let xmt = xm.transpose();
            ia[p] += xmt * ia_reduced * xm;
            pa[p] += xmt * pa_reduced;
        }

        factors[i] = Some((big_u, dinv, torque_residual));
    }

    let mut qdd = DVector::zeros(model.nv());
    let mut accelerations = vec![Vector6::zeros(); n];
    let base_acceleration = MotionVector::new(Vector3::zeros(), -model.gravity()).vector();

    for (i, body) in model.bodies().iter().enumerate() {
        let ap = match body.parent {
            Some(p) => accelerations[p],
            None => base_acceleration,
        };
        let carried = transforms[i].motion_matrix() * ap + coriolis[i];

        match &factors[i] {
            Some((big_u, dinv, torque_residual)) => {
                let k = body.joint.dof();
                let vi = body.qd_index;
                let s = body.joint.motion_subspace();
                let rates = dinv * (torque_residual - big_u.transpose() * carried);
                for r in 0..k {
                    qdd[vi + r] = rates[r];
                }
                accelerations[i] = carried + &s * rates;
            }
            None => accelerations[i] = carried,
        }
    }

    Ok(qdd)
}
