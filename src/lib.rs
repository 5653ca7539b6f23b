//! Sparse AC power-flow solver core.
//!
//! Given a bus admittance matrix, ZIP power injections and a
//! slack/PV/PQ bus classification, the crate solves the nonlinear AC power
//! balance equations for the complex voltage phasor at every bus, with
//! either full Newton-Raphson ([`newton_pf`]) or the damped
//! Levenberg-Marquardt variant ([`levenberg_marquardt_pf`]), and optional
//! in-loop enforcement of generator reactive-power limits.
//!
//! Building the admittance matrix, splitting a network into electrical
//! islands and formatting results are the caller's concern; each solve is a
//! self-contained synchronous loop over one snapshot, so independent
//! snapshots can be dispatched across threads freely.

pub mod config;
pub mod error;
pub mod indices;
pub mod model;
pub mod result;
pub mod solver;

pub(crate) mod dsbus_dv;
pub(crate) mod jacobian;
pub(crate) mod lm;
pub(crate) mod mismatch;
pub(crate) mod newton;
pub(crate) mod qlim;
pub(crate) mod sparse;

pub use lm::levenberg_marquardt_pf;
pub use newton::newton_pf;

pub mod prelude {
    pub use crate::config::{PowerFlowConfig, QControlMode};
    pub use crate::error::PowerFlowError;
    pub use crate::indices::SimulationIndices;
    pub use crate::model::{BusType, PowerFlowModel};
    pub use crate::result::PowerFlowResult;
    pub use crate::solver::{DefaultSolver, Solve};
    pub use crate::{levenberg_marquardt_pf, newton_pf};
}
