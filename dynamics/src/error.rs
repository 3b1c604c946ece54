use thiserror::Error;

/// Model-construction failures. Detected once when a [`crate::RobotModel`]
/// is built; a successfully built model never fails these checks per call.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("name cannot be empty for body")]
    EmptyName,
    #[error("body '{0}' references parent {1}, which does not precede it")]
    ParentOutOfOrder(String, usize),
    #[error("floating joint on body '{0}' is only supported at the root")]
    FloatingBaseNotRoot(String),
    #[error("body '{0}' has a movable joint but non-positive mass")]
    NonPositiveMass(String),
    #[error("model has no bodies")]
    Empty,
}

/// Per-call failures of the dynamics algorithms.
#[derive(Debug, Error)]
pub enum DynamicsError {
    #[error("{what} has length {got}, model expects {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("mass matrix is singular at body {body}")]
    SingularMassMatrix { body: usize },
}
