//! Isotropic mesh indexed by powers of an update basis.
//!
//! With update basis `τ` and mesh index `r ≤ 0`:
//!
//! - `δ = δ⁰ · τ^r`
//! - `Δ = Δ⁰ · τ^(r/2)`
//! - `ρ = (Δ⁰/δ⁰) · τ^(−r/2)`
//!
//! Every variable moves by one index step on each refinement or
//! enlargement. Enlargement stops at the initial sizes.

use crate::error::{MadsError, Result};
use crate::point::Direction;
use crate::types::{MeshParameters, StopReasons};

use super::{approx_eq, Mesh, MeshBase, DELTAS_TOLERANCE};

/// Isotropic power-of-τ mesh.
#[derive(Debug, Clone)]
pub struct SMesh {
    base: MeshBase,
    update_basis: f64,
    mesh_index: Vec<i32>,
    mesh_size: Vec<f64>,
    frame_size: Vec<f64>,
}

impl SMesh {
    /// Build from mesh parameters.
    ///
    /// # Errors
    /// [`MadsError::InvalidParameter`] for granular variables, an update basis
    /// not greater than 1, or an initial mesh size larger than the initial
    /// frame size; any error of [`MeshParameters::completed`].
    pub fn new(params: &MeshParameters) -> Result<Self> {
        let params = params.completed()?;
        let n = params.dimension;

        if !(params.mesh_update_basis > 1.0) || !params.mesh_update_basis.is_finite() {
            return Err(MadsError::InvalidParameter(format!(
                "mesh update basis must be greater than 1, got {}",
                params.mesh_update_basis
            )));
        }
        if let Some(i) = params.granularity.iter().position(|&g| g > 0.0) {
            return Err(MadsError::InvalidParameter(format!(
                "SMesh does not support granular variables (variable {})",
                i
            )));
        }

        let initial_frame_size = params.initial_frame_size.clone();
        let mut initial_mesh_size = params.initial_mesh_size.clone();
        for i in 0..n {
            if !(initial_mesh_size[i] > 0.0) {
                initial_mesh_size[i] = initial_frame_size[i];
            }
            if initial_mesh_size[i] > initial_frame_size[i] {
                return Err(MadsError::InvalidParameter(format!(
                    "initial mesh size {} exceeds initial frame size {} for variable {}",
                    initial_mesh_size[i], initial_frame_size[i], i
                )));
            }
        }

        let mut mesh = Self {
            base: MeshBase::new(&params, initial_mesh_size, initial_frame_size),
            update_basis: params.mesh_update_basis,
            mesh_index: vec![0; n],
            mesh_size: vec![0.0; n],
            frame_size: vec![0.0; n],
        };
        mesh.update_mesh_size();
        Ok(mesh)
    }

    pub fn update_basis(&self) -> f64 {
        self.update_basis
    }

    /// Mesh index of variable `i`, `0` at the initial sizes.
    pub fn mesh_index(&self, i: usize) -> i32 {
        self.mesh_index[i]
    }

    fn mesh_size_at(&self, i: usize, r: i32) -> f64 {
        self.base.initial_mesh_size()[i] * self.update_basis.powi(r)
    }

    fn frame_size_at(&self, i: usize, r: i32) -> f64 {
        self.base.initial_frame_size()[i] * self.update_basis.powf(f64::from(r) / 2.0)
    }

    /// Mesh index reaching exactly `(mesh_size, frame_size)`.
    fn resolve_deltas(&self, i: usize, mesh_size: f64, frame_size: f64) -> Result<i32> {
        let inconsistent = || MadsError::InconsistentDeltas {
            index: i,
            mesh_size,
            frame_size,
        };
        if i >= self.base.size() {
            return Err(MadsError::dimension("deltas index", self.base.size(), i + 1));
        }
        if !(mesh_size > 0.0)
            || !mesh_size.is_finite()
            || !(frame_size > 0.0)
            || !frame_size.is_finite()
        {
            return Err(inconsistent());
        }

        let ratio = mesh_size / self.base.initial_mesh_size()[i];
        let r = (ratio.ln() / self.update_basis.ln()).round();
        if !(r <= 0.0) || r < f64::from(i32::MIN) {
            return Err(inconsistent());
        }
        let r = r as i32;
        if !approx_eq(self.mesh_size_at(i, r), mesh_size, DELTAS_TOLERANCE)
            || !approx_eq(self.frame_size_at(i, r), frame_size, DELTAS_TOLERANCE)
        {
            return Err(inconsistent());
        }
        Ok(r)
    }
}

impl Mesh for SMesh {
    fn base(&self) -> &MeshBase {
        &self.base
    }

    fn update_mesh_size(&mut self) {
        for i in 0..self.base.size() {
            let r = self.mesh_index[i];
            self.mesh_size[i] = self.mesh_size_at(i, r);
            self.frame_size[i] = self.frame_size_at(i, r);
        }
    }

    /// Isotropic: the direction is only checked for its dimension and the
    /// anisotropy arguments are ignored.
    fn enlarge_frame_size(
        &mut self,
        direction: &Direction,
        _anisotropy_factor: f64,
        _anisotropic: bool,
    ) -> Result<bool> {
        self.base.verify_dimension("direction", direction.size())?;

        let mut changed = false;
        for r in self.mesh_index.iter_mut() {
            if *r < 0 {
                *r += 1;
                changed = true;
            }
        }
        self.update_mesh_size();
        Ok(changed)
    }

    fn refine_frame_size(&mut self) {
        for i in 0..self.base.size() {
            let r = self.mesh_index[i] - 1;
            if self.mesh_size_at(i, r).is_normal() {
                self.mesh_index[i] = r;
            }
        }
        self.update_mesh_size();
    }

    fn check_mesh_for_stopping(&self, stop_reasons: &mut StopReasons) {
        self.base
            .check_sizes_for_stopping(&self.mesh_size, &self.frame_size, stop_reasons);
    }

    fn mesh_size(&self, i: usize) -> f64 {
        self.mesh_size[i]
    }

    fn frame_size(&self, i: usize) -> f64 {
        self.frame_size[i]
    }

    fn frame_size_coarser(&self, i: usize) -> f64 {
        self.frame_size_at(i, (self.mesh_index[i] + 1).min(0))
    }

    fn set_deltas(&mut self, i: usize, mesh_size: f64, frame_size: f64) -> Result<()> {
        let r = self.resolve_deltas(i, mesh_size, frame_size)?;
        self.mesh_index[i] = r;
        self.update_mesh_size();
        Ok(())
    }

    fn set_all_deltas(&mut self, mesh_size: &[f64], frame_size: &[f64]) -> Result<()> {
        self.base.verify_dimension("mesh size", mesh_size.len())?;
        self.base.verify_dimension("frame size", frame_size.len())?;

        let resolved = (0..self.base.size())
            .map(|i| self.resolve_deltas(i, mesh_size[i], frame_size[i]))
            .collect::<Result<Vec<_>>>()?;
        self.mesh_index = resolved;
        self.update_mesh_size();
        Ok(())
    }
}
