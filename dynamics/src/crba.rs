use crate::error::DynamicsError;
use crate::kinematics::body_transforms;
use crate::model::RobotModel;
use nalgebra::{DMatrix, DVector, Matrix6};

/// Composite-rigid-body algorithm: the joint-space mass matrix `H(q)`.
///
/// Backward sweep accumulates subtree inertias, then each body's
/// `Ic S` column block is carried up the ancestor chain to fill the
/// off-diagonal couplings. The result is symmetric positive definite for
/// a well-posed model.
pub fn crba(model: &RobotModel, q: &DVector<f64>) -> Result<DMatrix<f64>, DynamicsError> {
    let transforms = body_transforms(model, q)?;
    let n = model.n_bodies();
    let nv = model.nv();

    let mut composite: Vec<Matrix6<f64>> = model
        .bodies()
        .iter()
        .map(|b| b.inertia.matrix())
        .collect();
    for i in (0..n).rev() {
        if let Some(p) = model.bodies()[i].parent {
            let folded = transforms[i].shift_inertia(&composite[i]);
            composite[p] += folded;
        }
    }

    let mut h = DMatrix::zeros(nv, nv);
    for i in 0..n {
        let body = &model.bodies()[i];
        let k = body.joint.dof();
        if k == 0 {
            continue;
        }
        let vi = body.qd_index;
        let s = body.joint.motion_subspace();

        // F starts as Ic S in this body's frame and is re-expressed in
        // each ancestor frame on the way up.
        let mut f = composite[i] * &s;
        let diag = s.transpose() * &f;
        h.view_mut((vi, vi), (k, k)).copy_from(&diag);

        let mut j = i;
        while let Some(p) = model.bodies()[j].parent {
            f = transforms[j].motion_matrix().transpose() * f;
            j = p;

            let other = &model.bodies()[j];
            if other.joint.dof() == 0 {
                continue;
            }
            let sj = other.joint.motion_subspace();
            let block = sj.transpose() * &f;
            let vj = other.qd_index;
            h.view_mut((vj, vi), (other.joint.dof(), k)).copy_from(&block);
            h.view_mut((vi, vj), (k, other.joint.dof()))
                .copy_from(&block.transpose());
        }
    }

    Ok(h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RobotModelBuilder;
    use crate::rnea::rnea;
    use approx::assert_relative_eq;
    use nalgebra::{dvector, Matrix3, Vector3};
    use spatial_algebra::{SpatialInertia, SpatialTransform};

    #[test]
    fn pendulum_mass_matrix_is_inertia_about_the_joint() {
        let mut b = RobotModelBuilder::new();
        b.add_revolute(
            "link",
            None,
            Vector3::y_axis(),
            SpatialTransform::identity(),
            SpatialInertia::new(2.0, Vector3::new(0.4, 0.0, 0.0), Matrix3::identity() * 0.1),
        );
        let model = b.build().unwrap();
        let h = crba(&model, &dvector![0.9]).unwrap();
        assert_relative_eq!(h[(0, 0)], 0.1 + 2.0 * 0.4 * 0.4, epsilon = 1e-12);
    }

    #[test]
    fn columns_match_unit_acceleration_inverse_dynamics() {
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

        let q = dvector![0.35, -0.6];
        let qd = dvector![0.0, 0.0];
        let h = crba(&model, &q).unwrap();
        let gravity_tau = rnea(&model, &q, &qd, &dvector![0.0, 0.0]).unwrap().tau;

        for j in 0..2 {
            let mut e = dvector![0.0, 0.0];
            e[j] = 1.0;
            let col = rnea(&model, &q, &qd, &e).unwrap().tau - &gravity_tau;
            assert_relative_eq!(h.column(j).into_owned(), col, epsilon = 1e-10);
        }

        assert_relative_eq!(h.clone(), h.transpose(), epsilon = 1e-12);
    }

    #[test]
    fn floating_base_block_is_the_spatial_inertia() {
        let inertia = SpatialInertia::new(
            3.0,
            Vector3::new(0.1, -0.2, 0.05),
            Matrix3::from_diagonal(&Vector3::new(0.4, 0.5, 0.6)),
        );
        let mut b = RobotModelBuilder::new();
        b.add_floating_base("base", inertia);
        let model = b.build().unwrap();
        let h = crba(&model, &model.neutral_configuration()).unwrap();
        assert_relative_eq!(
            DMatrix::from_iterator(6, 6, inertia.matrix().iter().copied()),
            h,
            epsilon = 1e-12
        );
    }
}
