//! Mesh and frame management.
//!
//! A mesh holds, for every variable, a mesh size δ (lattice spacing of
//! candidate points) and a frame size Δ (extent of the region where trial
//! points are generated). Both are updated by the search loop: the frame is
//! enlarged after a success and refined after a failure, and the mesh size
//! follows the frame size through a policy-specific ratio `ρ = Δ / δ`.
//!
//! | Policy          | Update rule                                          |
//! |-----------------|------------------------------------------------------|
//! | [`GMesh`]       | `Δ = a·10^b`, `a ∈ {1, 2, 5}`, anisotropic, granular |
//! | [`SMesh`]       | powers of an update basis τ, isotropic               |
//!
//! Meshes are mutated only by the single-threaded search loop, between
//! evaluations.

mod gmesh;
mod smesh;
mod state;

pub use gmesh::GMesh;
pub use smesh::SMesh;
pub use state::MeshState;

use crate::error::{MadsError, Result};
use crate::point::{Direction, Point};
use crate::types::{is_defined, MeshParameters, MeshStopType, MeshType, StopReasons};

/// Mesh sizes below this value cannot be resolved reliably.
pub const MESH_PRECISION: f64 = 1e-13;

/// Relative tolerance of [`Mesh::verify_point_is_on_mesh`].
pub const ON_MESH_TOLERANCE: f64 = 1e-12;

/// Relative tolerance used when checking that a mesh/frame pair is reachable.
pub(crate) const DELTAS_TOLERANCE: f64 = 1e-9;

/// Check that an array handed to a mesh has one entry per variable.
///
/// # Errors
/// [`MadsError::DimensionMismatch`] when `found != expected`.
pub fn verify_dimension(name: &str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(MadsError::dimension(name, expected, found));
    }
    Ok(())
}

/// Relative comparison of two finite values. Never true for `inf` or NaN.
pub(crate) fn approx_eq(a: f64, b: f64, rel_tol: f64) -> bool {
    a.is_finite()
        && b.is_finite()
        && (a - b).abs() <= rel_tol * a.abs().max(b.abs()).max(f64::MIN_POSITIVE)
}

// ──────────────────────────────────────────────────────────────────────────────
// Shared immutable data
// ──────────────────────────────────────────────────────────────────────────────

/// Parameters common to every mesh policy, fixed at construction.
#[derive(Debug, Clone)]
pub struct MeshBase {
    n: usize,
    initial_mesh_size: Vec<f64>,
    min_mesh_size: Vec<f64>,
    initial_frame_size: Vec<f64>,
    min_frame_size: Vec<f64>,
}

impl MeshBase {
    /// Build from completed parameters, with the initial sizes the policy
    /// actually starts from.
    pub(crate) fn new(
        params: &MeshParameters,
        initial_mesh_size: Vec<f64>,
        initial_frame_size: Vec<f64>,
    ) -> Self {
        Self {
            n: params.dimension,
            initial_mesh_size,
            min_mesh_size: params.min_mesh_size.clone(),
            initial_frame_size,
            min_frame_size: params.min_frame_size.clone(),
        }
    }

    pub fn size(&self) -> usize {
        self.n
    }

    pub fn initial_mesh_size(&self) -> &[f64] {
        &self.initial_mesh_size
    }

    pub fn min_mesh_size(&self) -> &[f64] {
        &self.min_mesh_size
    }

    pub fn initial_frame_size(&self) -> &[f64] {
        &self.initial_frame_size
    }

    pub fn min_frame_size(&self) -> &[f64] {
        &self.min_frame_size
    }

    pub fn verify_dimension(&self, name: &str, found: usize) -> Result<()> {
        verify_dimension(name, self.n, found)
    }

    /// Stopping tests shared by every policy.
    pub(crate) fn check_sizes_for_stopping(
        &self,
        mesh_size: &[f64],
        frame_size: &[f64],
        stop_reasons: &mut StopReasons,
    ) {
        if mesh_size.iter().any(|&d| d < MESH_PRECISION) {
            stop_reasons.set(MeshStopType::MeshPrecisionReached);
        }

        let below_min_mesh = mesh_size
            .iter()
            .zip(&self.min_mesh_size)
            .any(|(&d, &min)| is_defined(min) && d < min);
        if below_min_mesh {
            stop_reasons.set(MeshStopType::MinMeshSizeReached);
        }

        let mut any_min_frame = false;
        let mut all_below = true;
        for (&frame, &min) in frame_size.iter().zip(&self.min_frame_size) {
            if is_defined(min) {
                any_min_frame = true;
                if frame >= min {
                    all_below = false;
                }
            }
        }
        if any_min_frame && all_below {
            stop_reasons.set(MeshStopType::MinFrameSizeReached);
        }
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Mesh capability
// ──────────────────────────────────────────────────────────────────────────────

/// Operations of a mesh policy.
pub trait Mesh: Send {
    /// Immutable parameters.
    fn base(&self) -> &MeshBase;

    /// Recompute every mesh size from the current frame sizes.
    fn update_mesh_size(&mut self);

    /// Enlarge the frame after a success along `direction`.
    ///
    /// With `anisotropic` set, only variables that took part in the step
    /// (relative to `anisotropy_factor`) are enlarged, plus any variable whose
    /// resolution lags too far behind the others. Returns whether the mesh
    /// changed.
    ///
    /// # Errors
    /// [`MadsError::DimensionMismatch`] if `direction` is not of dimension `n`.
    fn enlarge_frame_size(
        &mut self,
        direction: &Direction,
        anisotropy_factor: f64,
        anisotropic: bool,
    ) -> Result<bool>;

    /// Refine the frame after a failed iteration.
    fn refine_frame_size(&mut self);

    /// Record terminal conditions reached by the current sizes.
    fn check_mesh_for_stopping(&self, stop_reasons: &mut StopReasons);

    /// Mesh size δ of variable `i`.
    fn mesh_size(&self, i: usize) -> f64;

    /// Frame size Δ of variable `i`.
    fn frame_size(&self, i: usize) -> f64;

    /// Frame size of variable `i` after one enlargement step.
    fn frame_size_coarser(&self, i: usize) -> f64;

    /// Set the mesh and frame sizes of variable `i` together.
    ///
    /// # Errors
    /// [`MadsError::InconsistentDeltas`] if the pair is not reachable by the
    /// policy; the mesh is left unchanged.
    fn set_deltas(&mut self, i: usize, mesh_size: f64, frame_size: f64) -> Result<()>;

    /// Set every mesh and frame size. All-or-nothing.
    ///
    /// # Errors
    /// [`MadsError::DimensionMismatch`] or [`MadsError::InconsistentDeltas`];
    /// the mesh is left unchanged.
    fn set_all_deltas(&mut self, mesh_size: &[f64], frame_size: &[f64]) -> Result<()>;

    // ──────────────────────────────────────────────────────────────────
    // Provided
    // ──────────────────────────────────────────────────────────────────

    fn size(&self) -> usize {
        self.base().size()
    }

    fn initial_mesh_size(&self) -> &[f64] {
        self.base().initial_mesh_size()
    }

    fn min_mesh_size(&self) -> &[f64] {
        self.base().min_mesh_size()
    }

    fn initial_frame_size(&self) -> &[f64] {
        self.base().initial_frame_size()
    }

    fn min_frame_size(&self) -> &[f64] {
        self.base().min_frame_size()
    }

    fn mesh_sizes(&self) -> Vec<f64> {
        (0..self.size()).map(|i| self.mesh_size(i)).collect()
    }

    fn frame_sizes(&self) -> Vec<f64> {
        (0..self.size()).map(|i| self.frame_size(i)).collect()
    }

    fn frame_sizes_coarser(&self) -> Vec<f64> {
        (0..self.size()).map(|i| self.frame_size_coarser(i)).collect()
    }

    /// Ratio `Δᵢ / δᵢ`.
    fn rho(&self, i: usize) -> f64 {
        self.frame_size(i) / self.mesh_size(i)
    }

    fn rhos(&self) -> Vec<f64> {
        (0..self.size()).map(|i| self.rho(i)).collect()
    }

    /// Round the offset `l` to the nearest multiple of `δᵢ`.
    ///
    /// Ties are rounded away from zero.
    fn scale_and_project_on_mesh(&self, i: usize, l: f64) -> f64 {
        let delta = self.mesh_size(i);
        (l / delta).round() * delta
    }

    /// Component-wise [`Mesh::scale_and_project_on_mesh`] of a direction.
    fn scale_and_project_direction(&self, dir: &Direction) -> Result<Vec<f64>> {
        self.base().verify_dimension("direction", dir.size())?;
        Ok(dir
            .iter()
            .enumerate()
            .map(|(i, &d)| self.scale_and_project_on_mesh(i, d))
            .collect())
    }

    /// Project `point` on the mesh anchored at `frame_center`.
    ///
    /// # Errors
    /// [`MadsError::DimensionMismatch`] if either point is not of dimension `n`.
    fn project_on_mesh(&self, point: &Point, frame_center: &Point) -> Result<Point> {
        self.base().verify_dimension("point", point.size())?;
        self.base()
            .verify_dimension("frame center", frame_center.size())?;

        let coords = point
            .iter()
            .zip(frame_center.iter())
            .enumerate()
            .map(|(i, (&x, &c))| c + self.scale_and_project_on_mesh(i, x - c))
            .collect::<Vec<_>>();
        Ok(Point::from(coords))
    }

    /// True if `point` lies on the mesh anchored at `frame_center`.
    fn verify_point_is_on_mesh(&self, point: &Point, frame_center: &Point) -> Result<bool> {
        let projected = self.project_on_mesh(point, frame_center)?;
        Ok(point.iter().zip(projected.iter()).all(|(&x, &p)| {
            (x - p).abs() <= ON_MESH_TOLERANCE * x.abs().max(1.0)
        }))
    }

    /// Current sizes, for diagnostics or restart.
    fn state(&self) -> MeshState {
        MeshState {
            mesh_size: self.mesh_sizes(),
            frame_size: self.frame_sizes(),
        }
    }

    /// Restore sizes saved by [`Mesh::state`].
    fn restore_state(&mut self, state: &MeshState) -> Result<()> {
        self.set_all_deltas(&state.mesh_size, &state.frame_size)
    }
}

/// Build the mesh policy selected by `params.mesh_type`.
pub fn new_mesh(params: &MeshParameters) -> Result<Box<dyn Mesh>> {
    let mesh: Box<dyn Mesh> = match params.mesh_type {
        MeshType::GMesh => Box::new(GMesh::new(params)?),
        MeshType::SMesh => Box::new(SMesh::new(params)?),
    };
    tracing::debug!(
        "{} mesh of dimension {} created, frame size {:?}",
        params.mesh_type,
        mesh.size(),
        mesh.frame_sizes()
    );
    Ok(mesh)
}
