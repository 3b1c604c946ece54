//! Analytic derivatives of inverse dynamics.
//!
//! Both orders share the same primal sweep, captured once in
//! [`Propagation`] as plain 6-vectors and 6x6 operator matrices so the
//! derivative recursions can stay in flat matrix form.

pub mod first_order;
pub mod second_order;

use crate::error::DynamicsError;
use crate::model::RobotModel;
use nalgebra::{DMatrix, DVector, Matrix6, Matrix6xX, Vector3, Vector6};
use spatial_algebra::{force_cross_matrix, motion_cross_matrix, MotionVector};

/// Matrix form of `a ↦ a ×f h` for a fixed force vector `h = [n; f]`.
pub(crate) fn force_bias_matrix(h: &Vector6<f64>) -> Matrix6<f64> {
    let n = Vector3::new(h[0], h[1], h[2]).cross_matrix();
    let f = Vector3::new(h[3], h[4], h[5]).cross_matrix();
    let mut m = Matrix6::zeros();
    m.fixed_view_mut::<3, 3>(0, 0).copy_from(&(-n));
    m.fixed_view_mut::<3, 3>(0, 3).copy_from(&(-f));
    m.fixed_view_mut::<3, 3>(3, 0).copy_from(&(-f));
    m
}

/// Primal quantities of one inverse-dynamics evaluation, stored per body
/// in operator form.
pub(crate) struct Propagation {
    /// 6x6 motion-vector form of each parent-to-body transform.
    pub xm: Vec<Matrix6<f64>>,
    pub s: Vec<Matrix6xX<f64>>,
    /// Joint velocity S qd.
    pub vj: Vec<Vector6<f64>>,
    pub v: Vec<Vector6<f64>>,
    /// Parent velocity carried across the joint, X v_p.
    pub x_vp: Vec<Vector6<f64>>,
    /// Parent acceleration carried across the joint, X a_p.
    pub x_ap: Vec<Vector6<f64>>,
    pub inertia: Vec<Matrix6<f64>>,
    /// Spatial momentum I v.
    pub momentum: Vec<Vector6<f64>>,
    /// Subtree-accumulated spatial force.
    pub force: Vec<Vector6<f64>>,
    /// Owning body of each velocity coordinate.
    pub dof_body: Vec<usize>,
}

impl Propagation {
    pub fn new(
        model: &RobotModel,
        q: &DVector<f64>,
        qd: &DVector<f64>,
        qdd: &DVector<f64>,
    ) -> Result<Self, DynamicsError> {
        model.check_configuration(q)?;
        model.check_velocity_space("velocity", qd)?;
        model.check_velocity_space("acceleration", qdd)?;

        let n = model.n_bodies();
        let mut out = Propagation {
            xm: Vec::with_capacity(n),
            s: Vec::with_capacity(n),
            vj: Vec::with_capacity(n),
            v: Vec::with_capacity(n),
            x_vp: Vec::with_capacity(n),
            x_ap: Vec::with_capacity(n),
            inertia: Vec::with_capacity(n),
            momentum: Vec::with_capacity(n),
            force: Vec::with_capacity(n),
            dof_body: vec![0; model.nv()],
        };

        let qs = q.as_slice();
        let qds = qd.as_slice();
        let qdds = qdd.as_slice();
        let base_acceleration =
            MotionVector::new(Vector3::zeros(), -model.gravity()).vector();
        let mut accelerations: Vec<Vector6<f64>> = Vec::with_capacity(n);

        for (i, body) in model.bodies().iter().enumerate() {
            let x = body.joint.transform(model.q_slice(i, qs)) * body.parent_to_joint;
            let xm = x.motion_matrix();
            let s = body.joint.motion_subspace();
            let vj = body.joint.subspace_velocity(model.qd_slice(i, qds)).vector();
            let aj = body
                .joint
                .subspace_velocity(model.qd_slice(i, qdds))
                .vector();

            let (x_vp, x_ap) = match body.parent {
                Some(p) => (xm * out.v[p], xm * accelerations[p]),
                None => (Vector6::zeros(), xm * base_acceleration),
            };
            let v = x_vp + vj;
            let a = x_ap + aj + motion_cross_matrix(&v) * vj;

            let inertia = body.inertia.matrix();
            let momentum = inertia * v;
            out.force
                .push(inertia * a + force_cross_matrix(&v) * momentum);

            for d in 0..body.joint.dof() {
                out.dof_body[body.qd_index + d] = i;
            }
            out.xm.push(xm);
            out.s.push(s);
            out.vj.push(vj);
            out.v.push(v);
            out.x_vp.push(x_vp);
            out.x_ap.push(x_ap);
            out.inertia.push(inertia);
            out.momentum.push(momentum);
            accelerations.push(a);
        }

        for i in (0..n).rev() {
            if let Some(p) = model.bodies()[i].parent {
                let folded = out.xm[i].transpose() * out.force[i];
                out.force[p] += folded;
            }
        }

        Ok(out)
    }
}

/// First-order state of every body: Jacobians of velocity, acceleration,
/// and subtree force with respect to `q` and `qd`, plus the projected
/// torque Jacobians. The per-body arrays feed the second-order sweeps.
pub(crate) struct FirstOrder {
    pub dv_dq: Vec<Matrix6xX<f64>>,
    pub da_dq: Vec<Matrix6xX<f64>>,
    pub df_dq: Vec<Matrix6xX<f64>>,
    pub dv_dqd: Vec<Matrix6xX<f64>>,
    pub da_dqd: Vec<Matrix6xX<f64>>,
    pub df_dqd: Vec<Matrix6xX<f64>>,
    pub dtau_dq: DMatrix<f64>,
    pub dtau_dqd: DMatrix<f64>,
}

impl FirstOrder {
    pub fn new(model: &RobotModel, prop: &Propagation) -> Self {
        let n = model.n_bodies();
        let nv = model.nv();

        let mut dv_dq: Vec<Matrix6xX<f64>> = Vec::with_capacity(n);
        let mut da_dq: Vec<Matrix6xX<f64>> = Vec::with_capacity(n);
        let mut df_dq: Vec<Matrix6xX<f64>> = Vec::with_capacity(n);
        let mut dv_dqd: Vec<Matrix6xX<f64>> = Vec::with_capacity(n);
        let mut da_dqd: Vec<Matrix6xX<f64>> = Vec::with_capacity(n);
        let mut df_dqd: Vec<Matrix6xX<f64>> = Vec::with_capacity(n);

        for (i, body) in model.bodies().iter().enumerate() {
            let xm = &prop.xm[i];
            let s = &prop.s[i];
            let k = body.joint.dof();
            let vi = body.qd_index;

            let mut dv = match body.parent {
                Some(p) => xm * &dv_dq[p],
                None => Matrix6xX::zeros(nv),
            };
            let carried_v = motion_cross_matrix(&prop.x_vp[i]);
            for c in 0..k {
                let extra = carried_v * s.column(c);
                let mut col = dv.column_mut(vi + c);
                col += extra;
            }

            let mut da = match body.parent {
                Some(p) => xm * &da_dq[p],
                None => Matrix6xX::zeros(nv),
            };
            let carried_a = motion_cross_matrix(&prop.x_ap[i]);
            for c in 0..k {
                let extra = carried_a * s.column(c);
                let mut col = da.column_mut(vi + c);
                col += extra;
            }
            da -= motion_cross_matrix(&prop.vj[i]) * &dv;

            let mut dvd = match body.parent {
                Some(p) => xm * &dv_dqd[p],
                None => Matrix6xX::zeros(nv),
            };
            for c in 0..k {
                let extra = s.column(c).into_owned();
                let mut col = dvd.column_mut(vi + c);
                col += extra;
            }

            let mut dad = match body.parent {
                Some(p) => xm * &da_dqd[p],
                None => Matrix6xX::zeros(nv),
            };
            dad -= motion_cross_matrix(&prop.vj[i]) * &dvd;
            let carried_vel = motion_cross_matrix(&prop.v[i]);
            for c in 0..k {
                let extra = carried_vel * s.column(c);
                let mut col = dad.column_mut(vi + c);
                col += extra;
            }

            let force_jacobian = |da: &Matrix6xX<f64>, dv: &Matrix6xX<f64>| {
                prop.inertia[i] * da
                    + force_bias_matrix(&prop.momentum[i]) * dv
                    + force_cross_matrix(&prop.v[i]) * (prop.inertia[i] * dv)
            };
            df_dq.push(force_jacobian(&da, &dv));
            df_dqd.push(force_jacobian(&dad, &dvd));
            dv_dq.push(dv);
            da_dq.push(da);
            dv_dqd.push(dvd);
            da_dqd.push(dad);
        }

        let mut dtau_dq = DMatrix::zeros(nv, nv);
        let mut dtau_dqd = DMatrix::zeros(nv, nv);
        for i in (0..n).rev() {
            let body = &model.bodies()[i];
            let s = &prop.s[i];
            let vi = body.qd_index;
            for d in 0..body.joint.dof() {
                let row_q = s.column(d).transpose() * &df_dq[i];
                let row_qd = s.column(d).transpose() * &df_dqd[i];
                dtau_dq.row_mut(vi + d).copy_from(&row_q);
                dtau_dqd.row_mut(vi + d).copy_from(&row_qd);
            }
            if let Some(p) = body.parent {
                let xmt = prop.xm[i].transpose();
                let fold_q = &xmt * &df_dq[i];
                let fold_qd = &xmt * &df_dqd[i];
                df_dq[p] += fold_q;
                df_dqd[p] += fold_qd;
                // The joint transform itself depends on this body's own
                // coordinates, adding X'ᵀ F = Xᵀ (s ×f F) per column.
                for c in 0..body.joint.dof() {
                    let s_c = s.column(c).into_owned();
                    let extra = xmt * (force_cross_matrix(&s_c) * prop.force[i]);
                    let mut col = df_dq[p].column_mut(vi + c);
                    col += extra;
                }
            }
        }

        FirstOrder {
            dv_dq,
            da_dq,
            df_dq,
            dv_dqd,
            da_dqd,
            df_dqd,
            dtau_dq,
            dtau_dqd,
        }
    }
}
