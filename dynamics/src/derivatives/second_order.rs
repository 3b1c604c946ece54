use crate::derivatives::{force_bias_matrix, FirstOrder, Propagation};
use crate::error::DynamicsError;
use crate::model::RobotModel;
use nalgebra::{DMatrix, DVector, Matrix6xX, Vector6};
use rayon::prelude::*;
use spatial_algebra::{force_cross_matrix, motion_cross_matrix};

/// Second-order partials of inverse dynamics, one `nv x nv` slice per
/// differentiation coordinate `k`.
///
/// `d2tau_dq2[k][(i, l)] = ∂²tau_i / ∂q_k ∂q_l`, and likewise for the
/// velocity and mixed tensors; `dm_dq[k]` is the configuration gradient
/// of the mass matrix, symmetric in `(i, l)` and independent of the
/// supplied velocities and accelerations.
#[derive(Clone, Debug)]
pub struct SecondOrderDerivatives {
    pub d2tau_dq2: Vec<DMatrix<f64>>,
    pub d2tau_dqd2: Vec<DMatrix<f64>>,
    pub d2tau_cross: Vec<DMatrix<f64>>,
    pub dm_dq: Vec<DMatrix<f64>>,
}

/// All four second-order tensors at state `(q, qd, qdd)`.
///
/// The primal and first-order sweeps run once; the per-coordinate slices
/// are independent of each other and evaluated in parallel.
pub fn rnea_second_derivatives(
    model: &RobotModel,
    q: &DVector<f64>,
    qd: &DVector<f64>,
    qdd: &DVector<f64>,
) -> Result<SecondOrderDerivatives, DynamicsError> {
    let prop = Propagation::new(model, q, qd, qdd)?;
    let first = FirstOrder::new(model, &prop);
    let (da_dqdd, df_dqdd) = acceleration_partials(model, &prop);
    let nv = model.nv();

    let d2tau_dq2 = (0..nv)
        .into_par_iter()
        .map(|k| position_slice(model, &prop, &first, k))
        .collect();
    let d2tau_cross = (0..nv)
        .into_par_iter()
        .map(|k| cross_slice(model, &prop, &first, k))
        .collect();
    let d2tau_dqd2 = (0..nv)
        .into_par_iter()
        .map(|k| velocity_slice(model, &prop, &first, k))
        .collect();
    let dm_dq = (0..nv)
        .into_par_iter()
        .map(|k| mass_matrix_slice(model, &prop, &da_dqdd, &df_dqdd, k))
        .collect();

    Ok(SecondOrderDerivatives {
        d2tau_dq2,
        d2tau_dqd2,
        d2tau_cross,
        dm_dq,
    })
}

/// Acceleration partials with respect to `qdd`: the motion-subspace
/// columns propagated outward, and their inertia-weighted forces folded
/// back in. Shared by every mass-matrix gradient slice.
fn acceleration_partials(
    model: &RobotModel,
    prop: &Propagation,
) -> (Vec<Matrix6xX<f64>>, Vec<Matrix6xX<f64>>) {
    let n = model.n_bodies();
    let nv = model.nv();
    let mut da: Vec<Matrix6xX<f64>> = Vec::with_capacity(n);
    let mut df: Vec<Matrix6xX<f64>> = Vec::with_capacity(n);

    for (i, body) in model.bodies().iter().enumerate() {
        let mut da_i = match body.parent {
            Some(p) => &prop.xm[i] * &da[p],
            None => Matrix6xX::zeros(nv),
        };
        let vi = body.qd_index;
        for c in 0..body.joint.dof() {
            let extra = prop.s[i].column(c).into_owned();
            let mut col = da_i.column_mut(vi + c);
            col += extra;
        }
        df.push(prop.inertia[i] * &da_i);
        da.push(da_i);
    }

    for i in (0..n).rev() {
        if let Some(p) = model.bodies()[i].parent {
            let fold = prop.xm[i].transpose() * &df[i];
            df[p] += fold;
        }
    }

    (da, df)
}

/// Column `k` of the differentiating joint's motion subspace.
fn own_column(model: &RobotModel, prop: &Propagation, k: usize) -> (usize, Vector6<f64>) {
    let jk = prop.dof_body[k];
    let local = k - model.bodies()[jk].qd_index;
    (jk, prop.s[jk].column(local).into_owned())
}

fn position_slice(
    model: &RobotModel,
    prop: &Propagation,
    first: &FirstOrder,
    k: usize,
) -> DMatrix<f64> {
    let n = model.n_bodies();
    let nv = model.nv();
    let (jk, s_k) = own_column(model, prop, k);
    let crm_sk = motion_cross_matrix(&s_k);

    let mut d2v: Vec<Matrix6xX<f64>> = Vec::with_capacity(n);
    let mut d2a: Vec<Matrix6xX<f64>> = Vec::with_capacity(n);
    let mut d2f: Vec<Matrix6xX<f64>> = Vec::with_capacity(n);

    for (i, body) in model.bodies().iter().enumerate() {
        let xm = &prop.xm[i];
        let s = &prop.s[i];
        let vi = body.qd_index;

        let (mut d2v_i, mut d2a_i, pre_vk, pre_ak) = match body.parent {
            Some(p) => (
                xm * &d2v[p],
                xm * &d2a[p],
                xm * first.dv_dq[p].column(k),
                xm * first.da_dq[p].column(k),
            ),
            None => (
                Matrix6xX::zeros(nv),
                Matrix6xX::zeros(nv),
                Vector6::zeros(),
                Vector6::zeros(),
            ),
        };
        if i == jk {
            if let Some(p) = body.parent {
                d2v_i -= crm_sk * (xm * &first.dv_dq[p]);
                d2a_i -= crm_sk * (xm * &first.da_dq[p]);
            }
        }

        let own_v = if i == jk {
            pre_vk + motion_cross_matrix(&prop.x_vp[i]) * s_k
        } else {
            pre_vk
        };
        let own_a = if i == jk {
            pre_ak + motion_cross_matrix(&prop.x_ap[i]) * s_k
        } else {
            pre_ak
        };
        let crm_own_v = motion_cross_matrix(&own_v);
        let crm_own_a = motion_cross_matrix(&own_a);
        for c in 0..body.joint.dof() {
            let dv_extra = crm_own_v * s.column(c);
            let da_extra = crm_own_a * s.column(c);
            let mut dv_col = d2v_i.column_mut(vi + c);
            dv_col += dv_extra;
            let mut da_col = d2a_i.column_mut(vi + c);
            da_col += da_extra;
        }
        d2a_i -= motion_cross_matrix(&prop.vj[i]) * &d2v_i;

        let u_k = first.dv_dq[i].column(k).into_owned();
        let h_k = prop.inertia[i] * u_k;
        let d2f_i = prop.inertia[i] * &d2a_i
            + force_bias_matrix(&prop.momentum[i]) * &d2v_i
            + force_cross_matrix(&prop.v[i]) * (prop.inertia[i] * &d2v_i)
            + force_bias_matrix(&h_k) * &first.dv_dq[i]
            + force_cross_matrix(&u_k) * (prop.inertia[i] * &first.dv_dq[i]);

        d2v.push(d2v_i);
        d2a.push(d2a_i);
        d2f.push(d2f_i);
    }

    let mut out = DMatrix::zeros(nv, nv);
    for i in (0..n).rev() {
        let body = &model.bodies()[i];
        let s = &prop.s[i];
        let vi = body.qd_index;
        for d in 0..body.joint.dof() {
            let row = s.column(d).transpose() * &d2f[i];
            out.row_mut(vi + d).copy_from(&row);
        }
        if let Some(p) = body.parent {
            let xmt = prop.xm[i].transpose();
            let fold = &xmt * &d2f[i];
            d2f[p] += fold;
            if i == jk {
                let extra = &xmt * (force_cross_matrix(&s_k) * &first.df_dq[i]);
                d2f[p] += extra;
            }
            let dfk = first.df_dq[i].column(k).into_owned();
            for c in 0..body.joint.dof() {
                let s_c = s.column(c).into_owned();
                let crf_sc = force_cross_matrix(&s_c);
                let mut extra = xmt * (crf_sc * dfk);
                if i == jk {
                    extra += xmt * (force_cross_matrix(&s_k) * (crf_sc * prop.force[i]));
                }
                let mut col = d2f[p].column_mut(vi + c);
                col += extra;
            }
        }
    }
    out
}

fn cross_slice(
    model: &RobotModel,
    prop: &Propagation,
    first: &FirstOrder,
    k: usize,
) -> DMatrix<f64> {
    let n = model.n_bodies();
    let nv = model.nv();
    let (jk, s_k) = own_column(model, prop, k);
    let crm_sk = motion_cross_matrix(&s_k);

    let mut d2v: Vec<Matrix6xX<f64>> = Vec::with_capacity(n);
    let mut d2a: Vec<Matrix6xX<f64>> = Vec::with_capacity(n);
    let mut d2f: Vec<Matrix6xX<f64>> = Vec::with_capacity(n);

    for (i, body) in model.bodies().iter().enumerate() {
        let xm = &prop.xm[i];
        let s = &prop.s[i];
        let vi = body.qd_index;

        let (mut d2v_i, mut d2a_i) = match body.parent {
            Some(p) => (xm * &d2v[p], xm * &d2a[p]),
            None => (Matrix6xX::zeros(nv), Matrix6xX::zeros(nv)),
        };
        if i == jk {
            if let Some(p) = body.parent {
                d2v_i -= crm_sk * (xm * &first.dv_dqd[p]);
                d2a_i -= crm_sk * (xm * &first.da_dqd[p]);
            }
        }

        let u_k = first.dv_dq[i].column(k).into_owned();
        let crm_uk = motion_cross_matrix(&u_k);
        for c in 0..body.joint.dof() {
            let extra = crm_uk * s.column(c);
            let mut col = d2a_i.column_mut(vi + c);
            col += extra;
        }
        d2a_i -= motion_cross_matrix(&prop.vj[i]) * &d2v_i;

        let h_k = prop.inertia[i] * u_k;
        let d2f_i = prop.inertia[i] * &d2a_i
            + force_bias_matrix(&prop.momentum[i]) * &d2v_i
            + force_cross_matrix(&prop.v[i]) * (prop.inertia[i] * &d2v_i)
            + force_bias_matrix(&h_k) * &first.dv_dqd[i]
            + force_cross_matrix(&u_k) * (prop.inertia[i] * &first.dv_dqd[i]);

        d2v.push(d2v_i);
        d2a.push(d2a_i);
        d2f.push(d2f_i);
    }

    let mut out = DMatrix::zeros(nv, nv);
    for i in (0..n).rev() {
        let body = &model.bodies()[i];
        let s = &prop.s[i];
        let vi = body.qd_index;
        for d in 0..body.joint.dof() {
            let row = s.column(d).transpose() * &d2f[i];
            out.row_mut(vi + d).copy_from(&row);
        }
        if let Some(p) = body.parent {
            let xmt = prop.xm[i].transpose();
            let fold = &xmt * &d2f[i];
            d2f[p] += fold;
            if i == jk {
                let extra = &xmt * (force_cross_matrix(&s_k) * &first.df_dqd[i]);
                d2f[p] += extra;
            }
        }
    }
    out
}

fn velocity_slice(
    model: &RobotModel,
    prop: &Propagation,
    first: &FirstOrder,
    k: usize,
) -> DMatrix<f64> {
    let n = model.n_bodies();
    let nv = model.nv();
    let (jk, s_k) = own_column(model, prop, k);
    let crm_sk = motion_cross_matrix(&s_k);

    let mut d2a: Vec<Matrix6xX<f64>> = Vec::with_capacity(n);
    let mut d2f: Vec<Matrix6xX<f64>> = Vec::with_capacity(n);

    for (i, body) in model.bodies().iter().enumerate() {
        let s = &prop.s[i];
        let vi = body.qd_index;

        let mut d2a_i = match body.parent {
            Some(p) => &prop.xm[i] * &d2a[p],
            None => Matrix6xX::zeros(nv),
        };
        if i == jk {
            d2a_i -= crm_sk * &first.dv_dqd[i];
        }
        let w_k = first.dv_dqd[i].column(k).into_owned();
        let crm_wk = motion_cross_matrix(&w_k);
        for c in 0..body.joint.dof() {
            let extra = crm_wk * s.column(c);
            let mut col = d2a_i.column_mut(vi + c);
            col += extra;
        }

        let h_k = prop.inertia[i] * w_k;
        let d2f_i = prop.inertia[i] * &d2a_i
            + force_bias_matrix(&h_k) * &first.dv_dqd[i]
            + force_cross_matrix(&w_k) * (prop.inertia[i] * &first.dv_dqd[i]);

        d2a.push(d2a_i);
        d2f.push(d2f_i);
    }

    let mut out = DMatrix::zeros(nv, nv);
    for i in (0..n).rev() {
        let body = &model.bodies()[i];
        let vi = body.qd_index;
        for d in 0..body.joint.dof() {
            let row = prop.s[i].column(d).transpose() * &d2f[i];
            out.row_mut(vi + d).copy_from(&row);
        }
        if let Some(p) = body.parent {
            let fold = prop.xm[i].transpose() * &d2f[i];
            d2f[p] += fold;
        }
    }
    out
}

fn mass_matrix_slice(
    model: &RobotModel,
    prop: &Propagation,
    da_dqdd: &[Matrix6xX<f64>],
    df_dqdd: &[Matrix6xX<f64>],
    k: usize,
) -> DMatrix<f64> {
    let n = model.n_bodies();
    let nv = model.nv();
    let (jk, s_k) = own_column(model, prop, k);
    let crm_sk = motion_cross_matrix(&s_k);

    let mut d2f: Vec<Matrix6xX<f64>> = Vec::with_capacity(n);
    let mut d2a: Vec<Matrix6xX<f64>> = Vec::with_capacity(n);

    for (i, body) in model.bodies().iter().enumerate() {
        let mut d2a_i = match body.parent {
            Some(p) => &prop.xm[i] * &d2a[p],
            None => Matrix6xX::zeros(nv),
        };
        if i == jk {
            if let Some(p) = body.parent {
                d2a_i -= crm_sk * (&prop.xm[i] * &da_dqdd[p]);
            }
        }
        d2f.push(prop.inertia[i] * &d2a_i);
        d2a.push(d2a_i);
    }

    let mut out = DMatrix::zeros(nv, nv);
    for i in (0..n).rev() {
        let body = &model.bodies()[i];
        let s = &prop.s[i];
        let vi = body.qd_index;
        for d in 0..body.joint.dof() {
            let row = s.column(d).transpose() * &d2f[i];
            out.row_mut(vi + d).copy_from(&row);
        }
        if let Some(p) = body.parent {
            let xmt = prop.xm[i].transpose();
            let fold = &xmt * &d2f[i];
            d2f[p] += fold;
            // The qdd columns are untouched by q; the only transform
            // derivative in the fold sits at the joint owning k.
            if i == jk {
                let extra = &xmt * (force_cross_matrix(&s_k) * &df_dqdd[i]);
                d2f[p] += extra;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RobotModelBuilder;
    use approx::assert_relative_eq;
    use nalgebra::{dvector, Matrix3, Vector3};
    use spatial_algebra::{SpatialInertia, SpatialTransform};

    #[test]
    fn pendulum_curvature_of_the_gravity_torque() {
        let (m, c) = (2.0, 0.4);
        let mut b = RobotModelBuilder::new();
        b.add_revolute(
            "link",
            None,
            Vector3::y_axis(),
            SpatialTransform::identity(),
            SpatialInertia::new(m, Vector3::new(c, 0.0, 0.0), Matrix3::identity() * 0.1),
        );
        let model = b.build().unwrap();

        // tau = -m g c cos(q) at rest, so d2tau/dq2 = m g c cos(q).
        let q = 0.6_f64;
        let out = rnea_second_derivatives(
            &model,
            &dvector![q],
            &dvector![0.0],
            &dvector![0.0],
        )
        .unwrap();
        assert_relative_eq!(
            out.d2tau_dq2[0][(0, 0)],
            m * 9.81 * c * q.cos(),
            epsilon = 1e-10
        );
        assert_relative_eq!(out.d2tau_dqd2[0][(0, 0)], 0.0, epsilon = 1e-12);
        assert_relative_eq!(out.dm_dq[0][(0, 0)], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn velocity_hessian_is_symmetric_in_the_two_rates() {
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
        let model = b.build().unwrap();

        let out = rnea_second_derivatives(
            &model,
            &dvector![0.4, -1.1],
            &dvector![0.6, -0.2],
            &dvector![1.3, 0.8],
        )
        .unwrap();

        for k in 0..2 {
            for l in 0..2 {
                for r in 0..2 {
                    assert_relative_eq!(
                        out.d2tau_dqd2[k][(r, l)],
                        out.d2tau_dqd2[l][(r, k)],
                        epsilon = 1e-10
                    );
                    assert_relative_eq!(
                        out.d2tau_dq2[k][(r, l)],
                        out.d2tau_dq2[l][(r, k)],
                        epsilon = 1e-10
                    );
                }
            }
        }
    }

    #[test]
    fn mass_matrix_gradient_matches_finite_differences_on_a_branched_tree() {
        use crate::crba::crba;

        let mut b = RobotModelBuilder::new();
        let trunk = b.add_revolute(
            "trunk",
            None,
            Vector3::z_axis(),
            SpatialTransform::identity(),
            SpatialInertia::new(1.2, Vector3::new(0.1, 0.05, 0.3), Matrix3::identity() * 0.2),
        );
        for (side, axis) in [("left", Vector3::y_axis()), ("right", Vector3::x_axis())] {
            let mut parent = trunk;
            for i in 0..2 {
                parent = b.add_revolute(
                    &format!("{side}{i}"),
                    Some(parent),
                    axis,
                    SpatialTransform::translation_of(Vector3::new(0.4, 0.1, 0.2)),
                    SpatialInertia::new(
                        0.7,
                        Vector3::new(0.25, 0.0, 0.1),
                        Matrix3::identity() * 0.06,
                    ),
                );
            }
        }
        let model = b.build().unwrap();

        let q = dvector![0.3, -0.7, 0.5, 1.1, -0.4];
        let qd = dvector![0.6, -0.2, 0.9, 0.1, -0.5];
        let qdd = dvector![1.3, 0.8, -0.4, 0.2, 0.7];
        let out = rnea_second_derivatives(&model, &q, &qd, &qdd).unwrap();

        // Moving the root coordinate rotates the whole tree rigidly, so
        // the mass matrix is invariant along it.
        assert_relative_eq!(out.dm_dq[0].norm(), 0.0, epsilon = 1e-12);

        let step = 1e-6;
        for k in 0..model.nv() {
            let mut qp = q.clone();
            let mut qm = q.clone();
            qp[k] += step;
            qm[k] -= step;
            let fd = (crba(&model, &qp).unwrap() - crba(&model, &qm).unwrap()) / (2.0 * step);
            assert_relative_eq!(out.dm_dq[k].clone(), fd, epsilon = 1e-5);
            assert_relative_eq!(
                out.dm_dq[k].clone(),
                out.dm_dq[k].transpose(),
                epsilon = 1e-10
            );
        }
    }

    #[test]
    fn mass_matrix_gradient_slices_are_symmetric() {
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
        let model = b.build().unwrap();

        let out = rnea_second_derivatives(
            &model,
            &dvector![0.4, -1.1],
            &dvector![0.6, -0.2],
            &dvector![1.3, 0.8],
        )
        .unwrap();

        for k in 0..2 {
            assert_relative_eq!(
                out.dm_dq[k].clone(),
                out.dm_dq[k].transpose(),
                epsilon = 1e-10
            );
        }
    }
}
