use crate::error::DynamicsError;
use crate::kinematics::body_transforms;
use crate::model::RobotModel;
use nalgebra::{DMatrix, DVector, Matrix6, Matrix6xX};

/// Structure-exploiting inverse of the mass matrix, `H(q)⁻¹`, without
/// ever forming or factorizing `H` itself.
///
/// Runs the articulated-body backward sweep to build per-joint inverses
/// `D⁻¹ = (Sᵀ Iᴬ S)⁻¹`, then a forward completion that propagates the
/// off-diagonal couplings down the tree. Only the upper triangle is
/// computed; the result is symmetrized before returning.
pub fn minv(model: &RobotModel, q: &DVector<f64>) -> Result<DMatrix<f64>, DynamicsError> {
    let transforms = body_transforms(model, q)?;
    let n = model.n_bodies();
    let nv = model.nv();

    let mut articulated: Vec<Matrix6<f64>> = model
        .bodies()
        .iter()
        .map(|b| b.inertia.matrix())
        .collect();
    let mut f: Vec<Matrix6xX<f64>> = (0..n).map(|_| Matrix6xX::zeros(nv)).collect();
    // (U, D⁻¹) per movable joint, consumed again by the forward pass.
    let mut factors: Vec<Option<(Matrix6xX<f64>, DMatrix<f64>)>> = vec![None; n];
    let mut out = DMatrix::zeros(nv, nv);

    for i in (0..n).rev() {
        let body = &model.bodies()[i];
        let k = body.joint.dof();
        let xm = transforms[i].motion_matrix();

        if k == 0 {
            if let Some(p) = body.parent {
                let folded_ia = transforms[i].shift_inertia(&articulated[i]);
                articulated[p] += folded_ia;
                let xmt = xm.transpose();
                for &j in model.subtree_dofs(i) {
                    let col = xmt * f[i].column(j);
                    let mut target = f[p].column_mut(j);
                    target += col;
                }
            }
            continue;
        }

        let vi = body.qd_index;
        let s = body.joint.motion_subspace();
        let u = articulated[i] * &s;
        let d = s.transpose() * &u;
        let dinv = d
            .try_inverse()
            .ok_or(DynamicsError::SingularMassMatrix { body: i })?;

        out.view_mut((vi, vi), (k, k)).copy_from(&dinv);
        for &j in model.subtree_dofs(i) {
            let correction = &dinv * (s.transpose() * f[i].column(j));
            for r in 0..k {
                out[(vi + r, j)] -= correction[r];
            }
        }

        if let Some(p) = body.parent {
            for &j in model.subtree_dofs(i) {
                let rows = DVector::from_fn(k, |d, _| out[(vi + d, j)]);
                let extra = &u * rows;
                let mut target = f[i].column_mut(j);
                target += extra;
            }
            let xmt = xm.transpose();
            for &j in model.subtree_dofs(i) {
                let col = xmt * f[i].column(j);
                let mut target = f[p].column_mut(j);
                target += col;
            }
            let ia_reduced = articulated[i] - (&u * &dinv) * u.transpose();
            articulated[p] += xmt * ia_reduced * xm;
        }

        factors[i] = Some((u, dinv));
    }

    for i in 0..n {
        let body = &model.bodies()[i];
        let k = body.joint.dof();
        let vi = body.qd_index;
        let width = nv - vi;
        let xm = transforms[i].motion_matrix();

        if k == 0 {
            if let Some(p) = body.parent {
                let from_parent = xm * f[p].columns(vi, width);
                f[i].columns_mut(vi, width).copy_from(&from_parent);
            } else {
                f[i].columns_mut(vi, width).fill(0.0);
            }
            continue;
        }

        let (u, dinv) = match &factors[i] {
            Some(pair) => pair,
            None => continue,
        };
        let s = body.joint.motion_subspace();

        if let Some(p) = body.parent {
            let parent_f = xm * f[p].columns(vi, width);
            let correction = (dinv * u.transpose()) * &parent_f;
            let mut block = out.view_mut((vi, vi), (k, width));
            block -= &correction;
            let own = &s * out.view((vi, vi), (k, width));
            f[i].columns_mut(vi, width).copy_from(&(own + parent_f));
        } else {
            let own = &s * out.view((vi, vi), (k, width));
            f[i].columns_mut(vi, width).copy_from(&own);
        }
    }

    for r in 1..nv {
        for c in 0..r {
            out[(r, c)] = out[(c, r)];
        }
    }

    Ok(out)
}
