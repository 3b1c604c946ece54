use crate::error::DynamicsError;
use crate::model::RobotModel;
use nalgebra::{DVector, Matrix3xX, Vector3};
use spatial_algebra::{MotionVector, SpatialTransform};

/// Per-body transforms, velocities, and accelerations from one forward
/// sweep of the tree.
///
/// Accelerations carry the gravity offset: the virtual base accelerates
/// at `-g`, so a body in free fall reads zero spatial force downstream.
#[derive(Clone, Debug)]
pub struct Kinematics {
    /// Parent-frame to body-frame transform for each body.
    pub transforms: Vec<SpatialTransform>,
    pub velocities: Vec<MotionVector>,
    pub accelerations: Vec<MotionVector>,
}

/// Joint transforms composed with the fixed parent offsets, one per body.
pub fn body_transforms(
    model: &RobotModel,
    q: &DVector<f64>,
) -> Result<Vec<SpatialTransform>, DynamicsError> {
    model.check_configuration(q)?;
    let qs = q.as_slice();
    Ok(model
        .bodies()
        .iter()
        .enumerate()
        .map(|(i, body)| body.joint.transform(model.q_slice(i, qs)) * body.parent_to_joint)
        .collect())
}

/// Cumulative world-frame to body-frame transforms.
pub fn world_transforms(
    model: &RobotModel,
    q: &DVector<f64>,
) -> Result<Vec<SpatialTransform>, DynamicsError> {
    let local = body_transforms(model, q)?;
    let mut world: Vec<SpatialTransform> = Vec::with_capacity(local.len());
    for (i, body) in model.bodies().iter().enumerate() {
        let x = match body.parent {
            Some(p) => local[i] * world[p],
            None => local[i],
        };
        world.push(x);
    }
    Ok(world)
}

/// World positions of the leaf-body frame origins, in the order returned
/// by [`RobotModel::end_effectors`].
pub fn end_effector_positions(
    model: &RobotModel,
    q: &DVector<f64>,
) -> Result<Vec<Vector3<f64>>, DynamicsError> {
    let world = world_transforms(model, q)?;
    Ok(model
        .end_effectors()
        .into_iter()
        .map(|i| world[i].point_to_parent(&Vector3::zeros()))
        .collect())
}

/// Analytic position Jacobians of the leaf-body origins, 3 x nv each in
/// tangent coordinates.
///
/// Column j is the world-frame point velocity of the end effector for a
/// unit rate on coordinate j: each ancestor dof axis is re-expressed at
/// the world origin and evaluated at the end-effector position.
pub fn end_effector_position_jacobians(
    model: &RobotModel,
    q: &DVector<f64>,
) -> Result<Vec<Matrix3xX<f64>>, DynamicsError> {
    let world = world_transforms(model, q)?;
    let mut jacobians = Vec::new();
    for leaf in model.end_effectors() {
        let position = world[leaf].point_to_parent(&Vector3::zeros());
        let mut jac = Matrix3xX::zeros(model.nv());
        let mut walk = Some(leaf);
        while let Some(i) = walk {
            let body = &model.bodies()[i];
            let s = body.joint.motion_subspace();
            for c in 0..body.joint.dof() {
                let axis_world =
                    world[i].inv_apply_motion(&MotionVector::from(s.column(c).into_owned()));
                let dp = axis_world.linear() + axis_world.angular().cross(&position);
                jac.set_column(body.qd_index + c, &dp);
            }
            walk = body.parent;
        }
        jacobians.push(jac);
    }
    Ok(jacobians)
}

/// Outward recursion for velocities and accelerations:
/// `v = X v_p + S qd`, `a = X a_p + S qdd + v ×ₘ S qd`.
pub fn propagate(
    model: &RobotModel,
    q: &DVector<f64>,
    qd: &DVector<f64>,
    qdd: &DVector<f64>,
) -> Result<Kinematics, DynamicsError> {
    model.check_velocity_space("velocity", qd)?;
    model.check_velocity_space("acceleration", qdd)?;
    let transforms = body_transforms(model, q)?;

    let n = model.n_bodies();
    let mut velocities = vec![MotionVector::zeros(); n];
    let mut accelerations = vec![MotionVector::zeros(); n];
    let base_acceleration = MotionVector::new(Vector3::zeros(), -model.gravity());

    let qds = qd.as_slice();
    let qdds = qdd.as_slice();
    for (i, body) in model.bodies().iter().enumerate() {
        let (vp, ap) = match body.parent {
            Some(p) => (velocities[p], accelerations[p]),
            None => (MotionVector::zeros(), base_acceleration),
        };
        let vj = body.joint.subspace_velocity(model.qd_slice(i, qds));
        let aj = body.joint.subspace_velocity(model.qd_slice(i, qdds));
        let v = transforms[i].apply_motion(&vp) + vj;
        accelerations[i] = transforms[i].apply_motion(&ap) + aj + v.cross_motion(vj);
        velocities[i] = v;
    }

    Ok(Kinematics {
        transforms,
        velocities,
        accelerations,
    })
}
