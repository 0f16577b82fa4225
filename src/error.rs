//! Error types for the mesh and evaluation engines.
//!
//! Only configuration-class problems are errors. Per-point evaluation
//! trouble (launch failure, missing output, non-zero exit status) is reported
//! through [`EvalStatus`](crate::types::EvalStatus) and never surfaces here.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the mesh and evaluation engines.
///
/// All variants indicate a setup or caller bug: they abort the call that
/// raised them and are not meant to be retried.
#[derive(Error, Debug)]
pub enum MadsError {
    #[error("Dimension mismatch for {name}: expected {expected}, found {found}")]
    DimensionMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(
        "Inconsistent deltas for variable {index}: mesh size {mesh_size} and frame size {frame_size} \
         are not reachable by this mesh"
    )]
    InconsistentDeltas {
        index: usize,
        mesh_size: f64,
        frame_size: f64,
    },

    #[error("Evaluator: evaluate_block called with an empty block")]
    EmptyBlock,

    #[error("Evaluator: incomplete point {0}")]
    IncompletePoint(String),

    #[error("Evaluator: no blackbox executable defined")]
    NoBlackboxExecutable,

    #[error("Evaluator: worker slot {slot} out of range (evaluator has {nb_slots} slots)")]
    InvalidWorkerSlot { slot: usize, nb_slots: usize },

    #[error("Evaluator: worker slot {0} is already in use by another caller")]
    WorkerSlotBusy(usize),

    #[error("Cannot create scratch file {path:?}: {source}")]
    ScratchFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot parse mesh state: {0}")]
    MeshStateParse(String),
}

impl MadsError {
    /// Shorthand for [`MadsError::DimensionMismatch`].
    pub fn dimension(name: impl Into<String>, expected: usize, found: usize) -> Self {
        MadsError::DimensionMismatch {
            name: name.into(),
            expected,
            found,
        }
    }
}

/// Result type alias for mesh and evaluator operations.
pub type Result<T> = std::result::Result<T, MadsError>;
