use crate::error::{DynamicsError, ModelError};
use crate::joint::{Joint, JointType};
use nalgebra::{DVector, Unit, Vector3};
use serde::{Deserialize, Serialize};
use spatial_algebra::{SpatialInertia, SpatialTransform};

/// One link of the kinematic tree together with the joint that connects
/// it to its parent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Body {
    pub name: String,
    /// Index of the parent body; `None` for bodies attached to the fixed
    /// world frame.
    pub parent: Option<usize>,
    pub joint: Joint,
    /// Fixed transform from the parent body frame to the joint frame.
    pub parent_to_joint: SpatialTransform,
    /// Spatial inertia expressed in the body frame.
    pub inertia: SpatialInertia,
    /// First configuration coordinate owned by this body's joint.
    pub q_index: usize,
    /// First velocity coordinate owned by this body's joint.
    pub qd_index: usize,
}

/// An articulated rigid-body system in parent-before-child order.
///
/// Built once through [`RobotModelBuilder`]; every structural invariant
/// (ordering, index layout, mass positivity) is checked at build time so
/// the algorithms can walk the tree without revalidating.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RobotModel {
    bodies: Vec<Body>,
    nq: usize,
    nv: usize,
    gravity: Vector3<f64>,
    /// Velocity coordinates spanned by each body's subtree, ascending.
    subtree_dofs: Vec<Vec<usize>>,
}

impl RobotModel {
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn n_bodies(&self) -> usize {
        self.bodies.len()
    }

    /// Configuration dimension (quaternions count four coordinates).
    pub fn nq(&self) -> usize {
        self.nq
    }

    /// Velocity dimension.
    pub fn nv(&self) -> usize {
        self.nv
    }

    /// Gravitational acceleration in world coordinates.
    pub fn gravity(&self) -> Vector3<f64> {
        self.gravity
    }

    /// Velocity coordinates of the subtree rooted at `body`, ascending.
    pub fn subtree_dofs(&self, body: usize) -> &[usize] {
        &self.subtree_dofs[body]
    }

    /// Indices of the leaf bodies, ascending.
    pub fn end_effectors(&self) -> Vec<usize> {
        let mut has_child = vec![false; self.bodies.len()];
        for body in &self.bodies {
            if let Some(p) = body.parent {
                has_child[p] = true;
            }
        }
        (0..self.bodies.len()).filter(|i| !has_child[*i]).collect()
    }

    /// Configuration slice owned by `body`'s joint.
    pub fn q_slice<'a>(&self, body: usize, q: &'a [f64]) -> &'a [f64] {
        let b = &self.bodies[body];
        &q[b.q_index..b.q_index + b.joint.nq()]
    }

    /// Velocity-space slice owned by `body`'s joint.
    pub fn qd_slice<'a>(&self, body: usize, qd: &'a [f64]) -> &'a [f64] {
        let b = &self.bodies[body];
        &qd[b.qd_index..b.qd_index + b.joint.dof()]
    }

    pub fn check_configuration(&self, q: &DVector<f64>) -> Result<(), DynamicsError> {
        if q.len() != self.nq {
            return Err(DynamicsError::DimensionMismatch {
                what: "configuration",
                expected: self.nq,
                got: q.len(),
            });
        }
        Ok(())
    }

    pub fn check_velocity_space(
        &self,
        what: &'static str,
        v: &DVector<f64>,
    ) -> Result<(), DynamicsError> {
        if v.len() != self.nv {
            return Err(DynamicsError::DimensionMismatch {
                what,
                expected: self.nv,
                got: v.len(),
            });
        }
        Ok(())
    }

    /// Zero configuration, with identity quaternions where needed.
    pub fn neutral_configuration(&self) -> DVector<f64> {
        let mut q = DVector::zeros(self.nq);
        for body in &self.bodies {
            for (k, value) in body.joint.neutral_configuration().iter().enumerate() {
                q[body.q_index + k] = *value;
            }
        }
        q
    }
}

/// Incremental construction of a [`RobotModel`].
///
/// Bodies must be added parent-first; `build` assigns the coordinate
/// layout and validates the tree.
#[derive(Clone, Debug)]
pub struct RobotModelBuilder {
    bodies: Vec<(String, Option<usize>, Joint, SpatialTransform, SpatialInertia)>,
    gravity: Vector3<f64>,
}

impl RobotModelBuilder {
    pub fn new() -> Self {
        Self {
            bodies: Vec::new(),
            gravity: Vector3::new(0.0, 0.0, -9.81),
        }
    }

    pub fn gravity(mut self, gravity: Vector3<f64>) -> Self {
        self.gravity = gravity;
        self
    }

    fn push(
        &mut self,
        name: &str,
        parent: Option<usize>,
        joint: Joint,
        parent_to_joint: SpatialTransform,
        inertia: SpatialInertia,
    ) -> usize {
        self.bodies
            .push((name.to_string(), parent, joint, parent_to_joint, inertia));
        self.bodies.len() - 1
    }

    /// Adds a body on a revolute joint; returns its index.
    pub fn add_revolute(
        &mut self,
        name: &str,
        parent: Option<usize>,
        axis: Unit<Vector3<f64>>,
        parent_to_joint: SpatialTransform,
        inertia: SpatialInertia,
    ) -> usize {
        self.push(name, parent, Joint::revolute(axis), parent_to_joint, inertia)
    }

    /// Adds a body on a prismatic joint; returns its index.
    pub fn add_prismatic(
        &mut self,
        name: &str,
        parent: Option<usize>,
        axis: Unit<Vector3<f64>>,
        parent_to_joint: SpatialTransform,
        inertia: SpatialInertia,
    ) -> usize {
        self.push(name, parent, Joint::prismatic(axis), parent_to_joint, inertia)
    }

    /// Adds a rigidly attached body; returns its index.
    pub fn add_fixed(
        &mut self,
        name: &str,
        parent: Option<usize>,
        parent_to_joint: SpatialTransform,
        inertia: SpatialInertia,
    ) -> usize {
        self.push(name, parent, Joint::fixed(), parent_to_joint, inertia)
    }

    /// Adds a free-floating root body; must be the first body added.
    pub fn add_floating_base(&mut self, name: &str, inertia: SpatialInertia) -> usize {
        self.push(
            name,
            None,
            Joint::floating(),
            SpatialTransform::identity(),
            inertia,
        )
    }

    pub fn build(self) -> Result<RobotModel, ModelError> {
        if self.bodies.is_empty() {
            return Err(ModelError::Empty);
        }

        let mut bodies = Vec::with_capacity(self.bodies.len());
        let mut nq = 0;
        let mut nv = 0;
        for (i, (name, parent, joint, parent_to_joint, inertia)) in
            self.bodies.into_iter().enumerate()
        {
            if name.is_empty() {
                return Err(ModelError::EmptyName);
            }
            if let Some(p) = parent {
                if p >= i {
                    return Err(ModelError::ParentOutOfOrder(name, p));
                }
            }
            if joint.joint_type == JointType::Floating && i != 0 {
                return Err(ModelError::FloatingBaseNotRoot(name));
            }
            if joint.dof() > 0 && inertia.mass <= 0.0 {
                return Err(ModelError::NonPositiveMass(name));
            }

            bodies.push(Body {
                name,
                parent,
                joint,
                parent_to_joint,
                inertia,
                q_index: nq,
                qd_index: nv,
            });
            nq += bodies[i].joint.nq();
            nv += bodies[i].joint.dof();
        }

        // Each body's subtree velocity coordinates, gathered by folding
        // children into their parents in reverse order.
        let mut subtree_dofs: Vec<Vec<usize>> = bodies
            .iter()
            .map(|b| (b.qd_index..b.qd_index + b.joint.dof()).collect())
            .collect();
        for i in (0..bodies.len()).rev() {
            if let Some(p) = bodies[i].parent {
                let child = subtree_dofs[i].clone();
                subtree_dofs[p].extend(child);
            }
        }
        for dofs in &mut subtree_dofs {
            dofs.sort_unstable();
        }

        Ok(RobotModel {
            bodies,
            nq,
            nv,
            gravity: self.gravity,
            subtree_dofs,
        })
    }
}
