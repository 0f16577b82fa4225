//! Granular mesh.
//!
//! Every frame size is written `Δ = ĝ · a · 10^b` with mantissa `a ∈ {1, 2, 5}`,
//! where `ĝ` is the granularity of the variable (1 for a continuous
//! variable). The mesh size is `δ = 10^(b − |b − b⁰|)`, `b⁰` being the initial
//! exponent, so the ratio `ρ = Δ/δ = a · 10^|b − b⁰|` grows as the frame moves
//! away from its initial size in either direction. For a granular variable
//! `δ = g · max(1, 10^(b − |b − b⁰|))` and the frame never goes below `g`.
//!
//! Refinement walks the mantissa `1 → 5 (b−1)`, `2 → 1`, `5 → 2`; enlargement
//! walks it back.

use crate::error::{MadsError, Result};
use crate::point::Direction;
use crate::types::{MeshParameters, MeshStopType, StopReasons};

use super::{approx_eq, Mesh, MeshBase, DELTAS_TOLERANCE};

/// Round `v > 0` to the closest `a · 10^b`, `a ∈ {1, 2, 5}`.
fn mant_exp(v: f64) -> (f64, i32) {
    let exp = v.log10().floor() as i32;
    let mant = v / 10f64.powi(exp);
    if mant < 1.5 {
        (1.0, exp)
    } else if mant < 3.5 {
        (2.0, exp)
    } else if mant < 7.5 {
        (5.0, exp)
    } else {
        (1.0, exp + 1)
    }
}

fn refine_mant_exp(mant: f64, exp: i32) -> (f64, i32) {
    if mant == 1.0 {
        (5.0, exp - 1)
    } else if mant == 2.0 {
        (1.0, exp)
    } else {
        (2.0, exp)
    }
}

fn enlarge_mant_exp(mant: f64, exp: i32) -> (f64, i32) {
    if mant == 1.0 {
        (2.0, exp)
    } else if mant == 2.0 {
        (5.0, exp)
    } else {
        (1.0, exp + 1)
    }
}

fn frame_size_from(granularity: f64, mant: f64, exp: i32) -> f64 {
    let scale = if granularity > 0.0 { granularity } else { 1.0 };
    scale * mant * 10f64.powi(exp)
}

fn mesh_size_from(granularity: f64, exp: i32, init_exp: i32) -> f64 {
    let delta = 10f64.powi(exp - (exp - init_exp).abs());
    if granularity > 0.0 {
        granularity * delta.max(1.0)
    } else {
        delta
    }
}

/// Granular, anisotropic mesh.
#[derive(Debug, Clone)]
pub struct GMesh {
    base: MeshBase,
    granularity: Vec<f64>,
    frame_mant: Vec<f64>,
    frame_exp: Vec<i32>,
    init_frame_exp: Vec<i32>,
    mesh_size: Vec<f64>,
    frame_size: Vec<f64>,
}

impl GMesh {
    /// Build from mesh parameters. `initial_mesh_size` is ignored: the initial
    /// mesh size follows from the rounded initial frame size.
    ///
    /// # Errors
    /// Any error of [`MeshParameters::completed`].
    pub fn new(params: &MeshParameters) -> Result<Self> {
        let params = params.completed()?;
        let n = params.dimension;

        let mut frame_mant = Vec::with_capacity(n);
        let mut frame_exp = Vec::with_capacity(n);
        for i in 0..n {
            let g = params.granularity[i];
            let (mant, exp) = if g > 0.0 {
                match mant_exp(params.initial_frame_size[i] / g) {
                    (_, exp) if exp < 0 => (1.0, 0),
                    me => me,
                }
            } else {
                mant_exp(params.initial_frame_size[i])
            };
            frame_mant.push(mant);
            frame_exp.push(exp);
        }

        let mut mesh = Self {
            base: MeshBase::new(&params, Vec::new(), Vec::new()),
            granularity: params.granularity.clone(),
            frame_mant,
            init_frame_exp: frame_exp.clone(),
            frame_exp,
            mesh_size: vec![0.0; n],
            frame_size: vec![0.0; n],
        };
        mesh.update_mesh_size();
        mesh.base = MeshBase::new(&params, mesh.mesh_size.clone(), mesh.frame_size.clone());
        Ok(mesh)
    }

    /// Granularity of every variable, `0` for continuous ones.
    pub fn granularity(&self) -> &[f64] {
        &self.granularity
    }

    /// Frame mantissa and exponent of variable `i`.
    pub fn frame_mant_exp(&self, i: usize) -> (f64, i32) {
        (self.frame_mant[i], self.frame_exp[i])
    }

    /// Mantissa and exponent reaching exactly `(mesh_size, frame_size)`.
    fn resolve_deltas(&self, i: usize, mesh_size: f64, frame_size: f64) -> Result<(f64, i32)> {
        let inconsistent = || MadsError::InconsistentDeltas {
            index: i,
            mesh_size,
            frame_size,
        };
        if i >= self.base.size() {
            return Err(MadsError::dimension("deltas index", self.base.size(), i + 1));
        }
        if !(frame_size > 0.0)
            || !frame_size.is_finite()
            || !(mesh_size > 0.0)
            || !mesh_size.is_finite()
        {
            return Err(inconsistent());
        }

        let g = self.granularity[i];
        let scale = if g > 0.0 { g } else { 1.0 };
        let (mant, exp) = mant_exp(frame_size / scale);
        if g > 0.0 && exp < 0 {
            return Err(inconsistent());
        }
        if !approx_eq(frame_size_from(g, mant, exp), frame_size, DELTAS_TOLERANCE)
            || !approx_eq(
                mesh_size_from(g, exp, self.init_frame_exp[i]),
                mesh_size,
                DELTAS_TOLERANCE,
            )
        {
            return Err(inconsistent());
        }
        Ok((mant, exp))
    }
}

impl Mesh for GMesh {
    fn base(&self) -> &MeshBase {
        &self.base
    }

    fn update_mesh_size(&mut self) {
        for i in 0..self.base.size() {
            let g = self.granularity[i];
            self.frame_size[i] = frame_size_from(g, self.frame_mant[i], self.frame_exp[i]);
            self.mesh_size[i] = mesh_size_from(g, self.frame_exp[i], self.init_frame_exp[i]);
        }
    }

    fn enlarge_frame_size(
        &mut self,
        direction: &Direction,
        anisotropy_factor: f64,
        anisotropic: bool,
    ) -> Result<bool> {
        self.base.verify_dimension("direction", direction.size())?;

        let min_rho = (0..self.base.size())
            .filter(|&i| self.granularity[i] == 0.0)
            .map(|i| self.rho(i))
            .fold(f64::INFINITY, f64::min);

        let mut changed = false;
        for i in 0..self.base.size() {
            let g = self.granularity[i];
            let took_part = direction[i].abs() / self.frame_size[i] > anisotropy_factor;
            // A continuous variable refined below its initial size whose ratio
            // exceeds the square of the smallest one is enlarged regardless.
            let lagging = g == 0.0
                && self.frame_exp[i] < self.init_frame_exp[i]
                && self.rho(i) > min_rho * min_rho;

            if !anisotropic || took_part || lagging {
                let (mant, exp) = enlarge_mant_exp(self.frame_mant[i], self.frame_exp[i]);
                if !frame_size_from(g, mant, exp).is_finite() {
                    continue;
                }
                self.frame_mant[i] = mant;
                self.frame_exp[i] = exp;
                changed = true;
            }
        }

        self.update_mesh_size();
        Ok(changed)
    }

    fn refine_frame_size(&mut self) {
        for i in 0..self.base.size() {
            let g = self.granularity[i];
            let (mant, exp) = refine_mant_exp(self.frame_mant[i], self.frame_exp[i]);
            if g > 0.0 && exp < 0 {
                // Δ would fall below the granularity.
                continue;
            }
            if !mesh_size_from(g, exp, self.init_frame_exp[i]).is_normal() {
                continue;
            }
            self.frame_mant[i] = mant;
            self.frame_exp[i] = exp;
        }
        self.update_mesh_size();
    }

    fn check_mesh_for_stopping(&self, stop_reasons: &mut StopReasons) {
        self.base
            .check_sizes_for_stopping(&self.mesh_size, &self.frame_size, stop_reasons);

        let all_granular_at_floor = (0..self.base.size()).all(|i| {
            self.granularity[i] > 0.0 && self.frame_mant[i] == 1.0 && self.frame_exp[i] == 0
        });
        if all_granular_at_floor {
            stop_reasons.set(MeshStopType::GranularityReached);
        }
    }

    fn mesh_size(&self, i: usize) -> f64 {
        self.mesh_size[i]
    }

    fn frame_size(&self, i: usize) -> f64 {
        self.frame_size[i]
    }

    /// `a · 10^|b − b⁰|` for a continuous variable, computed from the
    /// mantissa and exponents so that ratios compare exactly.
    fn rho(&self, i: usize) -> f64 {
        if self.granularity[i] > 0.0 {
            return self.frame_size[i] / self.mesh_size[i];
        }
        self.frame_mant[i] * 10f64.powi((self.frame_exp[i] - self.init_frame_exp[i]).abs())
    }

    fn frame_size_coarser(&self, i: usize) -> f64 {
        let (mant, exp) = enlarge_mant_exp(self.frame_mant[i], self.frame_exp[i]);
        frame_size_from(self.granularity[i], mant, exp)
    }

    fn set_deltas(&mut self, i: usize, mesh_size: f64, frame_size: f64) -> Result<()> {
        let (mant, exp) = self.resolve_deltas(i, mesh_size, frame_size)?;
        self.frame_mant[i] = mant;
        self.frame_exp[i] = exp;
        self.update_mesh_size();
        Ok(())
    }

    fn set_all_deltas(&mut self, mesh_size: &[f64], frame_size: &[f64]) -> Result<()> {
        self.base.verify_dimension("mesh size", mesh_size.len())?;
        self.base.verify_dimension("frame size", frame_size.len())?;

        let resolved = (0..self.base.size())
            .map(|i| self.resolve_deltas(i, mesh_size[i], frame_size[i]))
            .collect::<Result<Vec<_>>>()?;
        for (i, (mant, exp)) in resolved.into_iter().enumerate() {
            self.frame_mant[i] = mant;
            self.frame_exp[i] = exp;
        }
        self.update_mesh_size();
        Ok(())
    }
}
