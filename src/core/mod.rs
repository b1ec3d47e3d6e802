mod engine;
mod error;
mod solver;
mod summary;
mod types;

pub use engine::project;
pub use error::InputError;
pub use solver::{CONVERGENCE_TOLERANCE, MAX_ITERATIONS, SOLVENCY_THRESHOLD, solve};
pub use summary::summarize;
pub use types::{
    HORIZON_AGE, ProjectionSample, RetirementSummary, SOLVENCY_CHECK_AGE, SearchDirection,
    SimulationParams, SolveOutcome, SolveRequest, SolveTrial, SolveVariable,
};
