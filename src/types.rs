//! Core type definitions shared by the mesh and the evaluator.
//!
//! Evaluation channels and statuses, blackbox output types, mesh variants,
//! engine parameters and the stop-reason aggregator.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{MadsError, Result};

// ──────────────────────────────────────────────────────────────────────────────
// Undefined sentinel
// ──────────────────────────────────────────────────────────────────────────────

/// Sentinel for an undefined real value (coordinate, size or output).
pub const UNDEFINED: f64 = f64::NAN;

/// Returns true if `x` holds a value, i.e. is not the [`UNDEFINED`] sentinel.
#[inline]
pub fn is_defined(x: f64) -> bool {
    !x.is_nan()
}

// ──────────────────────────────────────────────────────────────────────────────
// Evaluation channels and statuses
// ──────────────────────────────────────────────────────────────────────────────

/// Evaluation channel. A point carries an independent evaluation record for
/// each channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvalType {
    /// The true blackbox.
    #[default]
    Bb,
    /// A cheaper proxy of the blackbox.
    Surrogate,
}

impl EvalType {
    /// Number of evaluation channels.
    pub const COUNT: usize = 2;

    /// Position of this channel in per-point storage.
    pub fn index(self) -> usize {
        match self {
            Self::Bb => 0,
            Self::Surrogate => 1,
        }
    }
}

impl fmt::Display for EvalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bb => write!(f, "BB"),
            Self::Surrogate => write!(f, "SURROGATE"),
        }
    }
}

/// Status of one evaluation of a point on one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EvalStatus {
    /// Never submitted.
    #[default]
    NotEvaluated,
    /// Submitted, waiting for the evaluator.
    InProgress,
    /// Blackbox succeeded and the point satisfies the feasibility threshold.
    Ok,
    /// Blackbox ran and reported non-success. Not retried.
    Failed,
    /// The evaluation cannot be trusted (launch failure, missing output,
    /// non-zero exit status). The point may be resubmitted.
    Error,
    /// Blackbox succeeded but the constraint violation exceeds `h_max`.
    ConsHOver,
}

impl EvalStatus {
    /// True if the caller may submit the point again.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Error)
    }

    /// True once the evaluator has classified the point.
    pub fn is_final(self) -> bool {
        matches!(self, Self::Ok | Self::Failed | Self::Error | Self::ConsHOver)
    }
}

impl fmt::Display for EvalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotEvaluated => "EVAL_NOT_STARTED",
            Self::InProgress => "EVAL_IN_PROGRESS",
            Self::Ok => "EVAL_OK",
            Self::Failed => "EVAL_FAILED",
            Self::Error => "EVAL_ERROR",
            Self::ConsHOver => "EVAL_CONS_H_OVER",
        };
        write!(f, "{}", s)
    }
}

/// Declared type of one field of a blackbox output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BBOutputType {
    /// Objective value.
    #[serde(rename = "OBJ")]
    Obj,
    /// Progressive-barrier constraint, feasible when `<= 0`.
    #[serde(rename = "PB")]
    Pb,
    /// Extreme-barrier constraint, feasible when `<= 0`.
    #[serde(rename = "EB")]
    Eb,
    /// Blackbox-reported flag telling whether the evaluation counts.
    #[serde(rename = "CNT_EVAL")]
    CntEval,
    /// Extra output, carried but ignored.
    #[serde(rename = "EXTRA_O")]
    ExtraO,
}

impl BBOutputType {
    /// True for outputs that must be numeric for the record to be usable.
    pub fn is_required_numeric(self) -> bool {
        matches!(self, Self::Obj | Self::Pb | Self::Eb)
    }
}

/// Ordered list of declared output types.
pub type BBOutputTypeList = Vec<BBOutputType>;

// ──────────────────────────────────────────────────────────────────────────────
// Mesh parameters
// ──────────────────────────────────────────────────────────────────────────────

/// Mesh policy selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeshType {
    /// Granular, anisotropic mesh with frame sizes `a * 10^b`, `a` in {1, 2, 5}.
    #[default]
    #[serde(rename = "GMESH")]
    GMesh,
    /// Isotropic mesh indexed by powers of an update basis.
    #[serde(rename = "SMESH")]
    SMesh,
}

impl fmt::Display for MeshType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GMesh => write!(f, "GMESH"),
            Self::SMesh => write!(f, "SMESH"),
        }
    }
}

/// Default anisotropy factor for frame enlargement.
pub const DEFAULT_ANISOTROPY_FACTOR: f64 = 0.1;

/// Default update basis of [`MeshType::SMesh`].
pub const DEFAULT_MESH_UPDATE_BASIS: f64 = 4.0;

/// Parameters of a mesh.
///
/// Per-variable arrays may be left empty, which means undefined for every
/// variable. Call [`MeshParameters::completed`] (the mesh constructors do)
/// to obtain fully sized, validated arrays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshParameters {
    /// Number of variables.
    pub dimension: usize,

    /// Mesh policy.
    pub mesh_type: MeshType,

    /// Initial mesh size δ⁰. Used as is by `SMesh`; `GMesh` derives its own
    /// from the frame size.
    pub initial_mesh_size: Vec<f64>,

    /// Initial frame size Δ⁰. When undefined for a variable it is derived from
    /// the initial mesh size as `δ⁰ * sqrt(n)`.
    pub initial_frame_size: Vec<f64>,

    /// Stopping threshold on the mesh size.
    pub min_mesh_size: Vec<f64>,

    /// Stopping threshold on the frame size.
    pub min_frame_size: Vec<f64>,

    /// Granularity per variable, `0` for a continuous variable. Only `GMesh`
    /// supports granular variables.
    pub granularity: Vec<f64>,

    /// A variable takes part in anisotropic enlargement when the successful
    /// direction component, relative to the frame size, exceeds this factor.
    pub anisotropy_factor: f64,

    /// Enable anisotropic frame enlargement.
    pub anisotropic_mesh: bool,

    /// `SMesh` update basis τ.
    pub mesh_update_basis: f64,
}

impl Default for MeshParameters {
    fn default() -> Self {
        Self {
            dimension: 0,
            mesh_type: MeshType::default(),
            initial_mesh_size: Vec::new(),
            initial_frame_size: Vec::new(),
            min_mesh_size: Vec::new(),
            min_frame_size: Vec::new(),
            granularity: Vec::new(),
            anisotropy_factor: DEFAULT_ANISOTROPY_FACTOR,
            anisotropic_mesh: true,
            mesh_update_basis: DEFAULT_MESH_UPDATE_BASIS,
        }
    }
}

impl MeshParameters {
    /// Parameters for `n` variables sharing one initial frame size.
    pub fn with_frame_size(n: usize, initial_frame_size: f64) -> Self {
        Self {
            dimension: n,
            initial_frame_size: vec![initial_frame_size; n],
            ..Default::default()
        }
    }

    /// Validate and fill in derived values.
    ///
    /// - empty arrays become arrays of [`UNDEFINED`] (granularity: `0`);
    /// - non-empty arrays must have `dimension` entries;
    /// - undefined frame sizes are derived from the mesh size;
    /// - the minimal mesh size is raised to the granularity.
    ///
    /// # Errors
    /// [`MadsError::DimensionMismatch`] or [`MadsError::InvalidParameter`].
    pub fn completed(&self) -> Result<MeshParameters> {
        let n = self.dimension;
        if n == 0 {
            return Err(MadsError::InvalidParameter(
                "mesh dimension must be positive".into(),
            ));
        }

        let fill = |name: &str, values: &[f64], default: f64| -> Result<Vec<f64>> {
            if values.is_empty() {
                Ok(vec![default; n])
            } else if values.len() != n {
                Err(MadsError::dimension(name, n, values.len()))
            } else {
                Ok(values.to_vec())
            }
        };

        let initial_mesh_size = fill("initial_mesh_size", &self.initial_mesh_size, UNDEFINED)?;
        let mut initial_frame_size =
            fill("initial_frame_size", &self.initial_frame_size, UNDEFINED)?;
        let mut min_mesh_size = fill("min_mesh_size", &self.min_mesh_size, UNDEFINED)?;
        let min_frame_size = fill("min_frame_size", &self.min_frame_size, UNDEFINED)?;
        let mut granularity = fill("granularity", &self.granularity, 0.0)?;

        let sqrt_n = (n as f64).sqrt();
        for i in 0..n {
            if !is_defined(granularity[i]) {
                granularity[i] = 0.0;
            }
            if granularity[i] < 0.0 {
                return Err(MadsError::InvalidParameter(format!(
                    "granularity of variable {} must be non-negative, got {}",
                    i, granularity[i]
                )));
            }

            if !is_defined(initial_frame_size[i]) {
                if !is_defined(initial_mesh_size[i]) {
                    return Err(MadsError::InvalidParameter(format!(
                        "initial frame size and initial mesh size are both undefined for variable {}",
                        i
                    )));
                }
                initial_frame_size[i] = initial_mesh_size[i] * sqrt_n;
            }
            if !(initial_frame_size[i] > 0.0) || !initial_frame_size[i].is_finite() {
                return Err(MadsError::InvalidParameter(format!(
                    "initial frame size of variable {} must be positive and finite, got {}",
                    i, initial_frame_size[i]
                )));
            }
            if is_defined(initial_mesh_size[i]) && !(initial_mesh_size[i] > 0.0) {
                return Err(MadsError::InvalidParameter(format!(
                    "initial mesh size of variable {} must be positive, got {}",
                    i, initial_mesh_size[i]
                )));
            }

            if granularity[i] > 0.0
                && (!is_defined(min_mesh_size[i]) || min_mesh_size[i] < granularity[i])
            {
                min_mesh_size[i] = granularity[i];
            }
        }

        if !(self.anisotropy_factor > 0.0) {
            return Err(MadsError::InvalidParameter(format!(
                "anisotropy factor must be positive, got {}",
                self.anisotropy_factor
            )));
        }

        Ok(MeshParameters {
            dimension: n,
            mesh_type: self.mesh_type,
            initial_mesh_size,
            initial_frame_size,
            min_mesh_size,
            min_frame_size,
            granularity,
            anisotropy_factor: self.anisotropy_factor,
            anisotropic_mesh: self.anisotropic_mesh,
            mesh_update_basis: self.mesh_update_basis,
        })
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Evaluator parameters
// ──────────────────────────────────────────────────────────────────────────────

/// Parameters of an [`Evaluator`](crate::evaluator::Evaluator).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalParameters {
    /// Blackbox command: a program optionally followed by fixed arguments,
    /// separated by whitespace. The scratch file path is appended as the
    /// last argument.
    ///
    /// The command is split on whitespace and no shell is involved, so a
    /// program path or argument containing spaces cannot be expressed. Put
    /// such a blackbox behind a wrapper script on a space-free path.
    pub bb_exe: String,

    /// Declared types of the fields of one blackbox output line, in order.
    pub bb_output_type: BBOutputTypeList,

    /// Directory receiving the per-worker scratch files.
    pub tmp_dir: PathBuf,

    /// Number of worker slots. `0` means one slot per rayon worker thread.
    pub nb_threads: usize,
}

impl Default for EvalParameters {
    fn default() -> Self {
        Self {
            bb_exe: String::new(),
            bb_output_type: vec![BBOutputType::Obj],
            tmp_dir: std::env::temp_dir(),
            nb_threads: 0,
        }
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Stop reasons
// ──────────────────────────────────────────────────────────────────────────────

/// Terminal conditions detected by a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshStopType {
    /// A mesh size fell below the numerical precision of the mesh.
    MeshPrecisionReached,
    /// A mesh size fell below its minimum.
    MinMeshSizeReached,
    /// Every frame size with a minimum fell below it.
    MinFrameSizeReached,
    /// Every variable is granular and the mesh cannot be refined further.
    GranularityReached,
}

impl fmt::Display for MeshStopType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MeshPrecisionReached => write!(f, "Mesh precision reached"),
            Self::MinMeshSizeReached => write!(f, "Min mesh size reached"),
            Self::MinFrameSizeReached => write!(f, "Min frame size reached"),
            Self::GranularityReached => write!(f, "Mesh granularity reached"),
        }
    }
}

/// Aggregator of terminal conditions, owned by the search loop.
#[derive(Debug, Clone, Default)]
pub struct StopReasons {
    reasons: Vec<MeshStopType>,
}

impl StopReasons {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a terminal condition. Recording twice has no further effect.
    pub fn set(&mut self, reason: MeshStopType) {
        if !self.reasons.contains(&reason) {
            self.reasons.push(reason);
        }
    }

    /// True if at least one terminal condition was recorded.
    pub fn is_terminal(&self) -> bool {
        !self.reasons.is_empty()
    }

    pub fn contains(&self, reason: MeshStopType) -> bool {
        self.reasons.contains(&reason)
    }

    /// Recorded conditions, in recording order.
    pub fn reasons(&self) -> &[MeshStopType] {
        &self.reasons
    }

    pub fn clear(&mut self) {
        self.reasons.clear();
    }
}

impl fmt::Display for StopReasons {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reasons.is_empty() {
            return write!(f, "No stop reason");
        }
        for (k, reason) in self.reasons.iter().enumerate() {
            if k > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", reason)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_sentinel() {
        assert!(!is_defined(UNDEFINED));
        assert!(is_defined(0.0));
        assert!(is_defined(f64::INFINITY));
    }

    #[test]
    fn test_eval_status_classification() {
        assert!(EvalStatus::Error.is_retryable());
        assert!(!EvalStatus::Failed.is_retryable());
        assert!(!EvalStatus::ConsHOver.is_retryable());

        assert!(EvalStatus::Ok.is_final());
        assert!(EvalStatus::ConsHOver.is_final());
        assert!(!EvalStatus::InProgress.is_final());
        assert!(!EvalStatus::NotEvaluated.is_final());
    }

    #[test]
    fn test_eval_status_display() {
        assert_eq!(EvalStatus::ConsHOver.to_string(), "EVAL_CONS_H_OVER");
        assert_eq!(EvalStatus::Error.to_string(), "EVAL_ERROR");
    }

    #[test]
    fn test_eval_type_index() {
        assert_eq!(EvalType::Bb.index(), 0);
        assert_eq!(EvalType::Surrogate.index(), 1);
        assert!(EvalType::Surrogate.index() < EvalType::COUNT);
    }

    #[test]
    fn test_completed_fills_arrays() {
        let params = MeshParameters::with_frame_size(3, 1.0).completed().unwrap();
        assert_eq!(params.initial_frame_size, vec![1.0; 3]);
        assert_eq!(params.granularity, vec![0.0; 3]);
        assert!(params.min_mesh_size.iter().all(|v| !is_defined(*v)));
        assert!(params.min_frame_size.iter().all(|v| !is_defined(*v)));
    }

    #[test]
    fn test_completed_derives_frame_from_mesh() {
        let params = MeshParameters {
            dimension: 4,
            initial_mesh_size: vec![0.5; 4],
            ..Default::default()
        }
        .completed()
        .unwrap();
        assert_eq!(params.initial_frame_size, vec![1.0; 4]);
    }

    #[test]
    fn test_completed_raises_min_mesh_to_granularity() {
        let params = MeshParameters {
            granularity: vec![0.0, 0.01],
            min_mesh_size: vec![1e-6, 1e-6],
            ..MeshParameters::with_frame_size(2, 1.0)
        }
        .completed()
        .unwrap();
        assert_eq!(params.min_mesh_size, vec![1e-6, 0.01]);
    }

    #[test]
    fn test_completed_rejects_bad_input() {
        assert!(matches!(
            MeshParameters::default().completed(),
            Err(MadsError::InvalidParameter(_))
        ));

        let wrong_len = MeshParameters {
            min_frame_size: vec![1e-3; 2],
            ..MeshParameters::with_frame_size(3, 1.0)
        };
        assert!(matches!(
            wrong_len.completed(),
            Err(MadsError::DimensionMismatch { expected: 3, found: 2, .. })
        ));

        let no_size = MeshParameters {
            dimension: 2,
            ..Default::default()
        };
        assert!(matches!(
            no_size.completed(),
            Err(MadsError::InvalidParameter(_))
        ));

        let negative = MeshParameters::with_frame_size(2, -1.0);
        assert!(negative.completed().is_err());

        let negative_granularity = MeshParameters {
            granularity: vec![-1.0, 0.0],
            ..MeshParameters::with_frame_size(2, 1.0)
        };
        assert!(negative_granularity.completed().is_err());
    }

    #[test]
    fn test_default_parameters() {
        let mesh = MeshParameters::default();
        assert_eq!(mesh.mesh_type, MeshType::GMesh);
        assert_eq!(mesh.anisotropy_factor, DEFAULT_ANISOTROPY_FACTOR);
        assert!(mesh.anisotropic_mesh);
        assert_eq!(mesh.mesh_update_basis, DEFAULT_MESH_UPDATE_BASIS);

        let eval = EvalParameters::default();
        assert!(eval.bb_exe.is_empty());
        assert_eq!(eval.bb_output_type, vec![BBOutputType::Obj]);
        assert_eq!(eval.nb_threads, 0);
    }

    #[test]
    fn test_stop_reasons() {
        let mut reasons = StopReasons::new();
        assert!(!reasons.is_terminal());
        assert_eq!(reasons.to_string(), "No stop reason");

        reasons.set(MeshStopType::MinFrameSizeReached);
        reasons.set(MeshStopType::MinFrameSizeReached);
        reasons.set(MeshStopType::MinMeshSizeReached);
        assert!(reasons.is_terminal());
        assert_eq!(reasons.reasons().len(), 2);
        assert!(reasons.contains(MeshStopType::MinMeshSizeReached));
        assert_eq!(
            reasons.to_string(),
            "Min frame size reached; Min mesh size reached"
        );

        reasons.clear();
        assert!(!reasons.is_terminal());
    }
}
