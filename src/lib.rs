//! # MADS-ENGINE: Mesh and Blackbox Evaluation Core for MADS
//!
//! The two building blocks of a Mesh Adaptive Direct Search (MADS) solver:
//! the mesh that discretizes the search space, and the engine that evaluates
//! candidate points with a blackbox, possibly in parallel.
//!
//! ## Overview
//!
//! MADS optimizes a function known only through a blackbox. Each iteration
//! proposes trial points on a mesh around the current best point, evaluates
//! them, then enlarges the frame after a success or refines it after a
//! failure. This crate provides:
//!
//! 1. **Meshes** ([`mesh`]): per-variable mesh and frame sizes, projection of
//!    points onto the mesh, enlargement and refinement, and detection of
//!    terminal mesh conditions. Two policies: [`GMesh`] (granular,
//!    anisotropic, sizes of the form `{1, 2, 5}·10^b`) and [`SMesh`]
//!    (isotropic, powers of an update basis).
//!
//! 2. **Evaluation** ([`evaluator`]): blocks of [`EvalPoint`]s are evaluated
//!    by an external executable or an in-process [`Blackbox`], on worker slots
//!    that each own a scratch file. Every point ends in one of `EVAL_OK`,
//!    `EVAL_FAILED`, `EVAL_ERROR` or `EVAL_CONS_H_OVER`.
//!
//! The search loop itself (poll directions, barrier, cache, stopping on
//! evaluation budgets) is not part of this crate.
//!
//! ## Example
//!
//! ```no_run
//! use mads_engine::{new_mesh, Evaluator, EvalParameters, EvalPoint, EvalType, MeshParameters};
//! use mads_engine::{BBOutput, Mesh, Point};
//!
//! # fn main() -> mads_engine::Result<()> {
//! let mut mesh = new_mesh(&MeshParameters::with_frame_size(2, 1.0))?;
//! mesh.refine_frame_size();
//!
//! let evaluator = Evaluator::with_blackbox(
//!     EvalParameters::default(),
//!     EvalType::Bb,
//!     |x: &Point, _h_max: f64| BBOutput::from_values(&[x[0] * x[0] + x[1] * x[1]]),
//! )?;
//! let center = Point::from([0.3, -0.7]);
//! let trial = mesh.project_on_mesh(&Point::from([0.33, -0.62]), &center)?;
//! let mut point = EvalPoint::new(trial);
//! evaluator.evaluate_one(0, &mut point, f64::INFINITY)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## References
//!
//! - Audet, C. & Dennis, J.E. "Mesh Adaptive Direct Search Algorithms for
//!   Constrained Optimization." SIAM J Optim 17(1), 188–217 (2006).
//! - Audet, C., Le Digabel, S. & Tribes, C. "Dynamic scaling in the Mesh
//!   Adaptive Direct Search algorithm for blackbox optimization." Optim Eng
//!   17, 333–358 (2016).

pub mod diagnostics;
pub mod error;
pub mod evaluator;
pub mod mesh;
pub mod point;
pub mod types;

// Re-export main types
pub use diagnostics::DiagnosticLog;
pub use error::{MadsError, Result};
pub use evaluator::{Blackbox, BlockOutcome, Evaluator, EvaluatorMode};
pub use mesh::{new_mesh, GMesh, Mesh, MeshState, SMesh};
pub use point::{BBOutput, Direction, Eval, EvalPoint, Point};
pub use types::{
    is_defined, BBOutputType, BBOutputTypeList, EvalParameters, EvalStatus, EvalType,
    MeshParameters, MeshStopType, MeshType, StopReasons, UNDEFINED,
};
