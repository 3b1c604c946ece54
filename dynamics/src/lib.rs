//! Rigid-body dynamics for articulated kinematic trees.
//!
//! Every algorithm is a pure function of a read-only [`RobotModel`] and the
//! supplied joint state `(q, qd, qdd, u)`; nothing is retained between
//! calls. Per-body quantities live in flat arrays indexed by the body's
//! topological position.

pub mod aba;
pub mod crba;
pub mod derivatives;
pub mod energy;
pub mod error;
pub mod forward_dynamics;
pub mod joint;
pub mod kinematics;
pub mod minv;
pub mod model;
pub mod rnea;

pub use aba::aba;
pub use crba::crba;
pub use derivatives::first_order::{rnea_derivatives, RneaPartials};
pub use derivatives::second_order::{rnea_second_derivatives, SecondOrderDerivatives};
pub use energy::{kinetic_energy, potential_energy};
pub use error::{DynamicsError, ModelError};
pub use forward_dynamics::{forward_dynamics, forward_dynamics_derivatives, ForwardDynamicsDerivatives};
pub use joint::{Joint, JointType};
pub use kinematics::{
    body_transforms, end_effector_position_jacobians, end_effector_positions, propagate,
    world_transforms, Kinematics,
};
pub use minv::minv;
pub use model::{Body, RobotModel, RobotModelBuilder};
pub use rnea::{bias_forces, rnea, RneaResult};
