//! Candidate points and blackbox output records.

use std::fmt;
use std::ops::{Deref, Index};

use crate::types::{is_defined, BBOutputType, EvalStatus, EvalType, UNDEFINED};

// ──────────────────────────────────────────────────────────────────────────────
// Point
// ──────────────────────────────────────────────────────────────────────────────

/// An ordered sequence of real coordinates. Coordinates may be
/// [`UNDEFINED`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Point {
    coords: Vec<f64>,
}

/// A displacement in variable space.
pub type Direction = Point;

impl Point {
    /// A point of dimension `n` with every coordinate undefined.
    pub fn undefined(n: usize) -> Self {
        Self {
            coords: vec![UNDEFINED; n],
        }
    }

    pub fn size(&self) -> usize {
        self.coords.len()
    }

    /// True if every coordinate is defined.
    pub fn is_complete(&self) -> bool {
        self.coords.iter().all(|&x| is_defined(x))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.coords
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.coords
    }
}

impl From<Vec<f64>> for Point {
    fn from(coords: Vec<f64>) -> Self {
        Self { coords }
    }
}

impl From<&[f64]> for Point {
    fn from(coords: &[f64]) -> Self {
        Self {
            coords: coords.to_vec(),
        }
    }
}

impl<const N: usize> From<[f64; N]> for Point {
    fn from(coords: [f64; N]) -> Self {
        Self {
            coords: coords.to_vec(),
        }
    }
}

impl Deref for Point {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.coords
    }
}

impl Index<usize> for Point {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.coords[i]
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for x in &self.coords {
            if is_defined(*x) {
                write!(f, " {}", x)?;
            } else {
                write!(f, " -")?;
            }
        }
        write!(f, " )")
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Blackbox output record
// ──────────────────────────────────────────────────────────────────────────────

/// Raw output of one blackbox evaluation: one line of whitespace-separated
/// fields, interpreted against a declared [`BBOutputType`] list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BBOutput {
    raw: String,
    eval_ok: bool,
}

impl BBOutput {
    /// A record from its raw text and the producer's success flag.
    pub fn new(raw: impl Into<String>, eval_ok: bool) -> Self {
        Self {
            raw: raw.into(),
            eval_ok,
        }
    }

    /// A successful record from numeric values.
    pub fn from_values(values: &[f64]) -> Self {
        let raw = values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        Self::new(raw, true)
    }

    /// A record for an evaluation that did not produce output.
    pub fn failed() -> Self {
        Self::new(String::new(), false)
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whitespace-separated fields.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.raw.split_whitespace()
    }

    /// Numeric values of the fields declared with type `wanted`, in order.
    fn typed_values<'a>(
        &'a self,
        types: &'a [BBOutputType],
        wanted: BBOutputType,
    ) -> impl Iterator<Item = f64> + 'a {
        self.values()
            .zip(types.iter())
            .filter(move |(_, t)| **t == wanted)
            .map(|(v, _)| v.parse::<f64>().unwrap_or(UNDEFINED))
    }

    /// Success flag of the record: the producer reported success, the field
    /// count matches the declared types and every objective or constraint
    /// field is a finite number.
    pub fn eval_ok(&self, types: &[BBOutputType]) -> bool {
        if !self.eval_ok || self.values().count() != types.len() {
            return false;
        }
        self.values().zip(types.iter()).all(|(v, t)| {
            !t.is_required_numeric() || v.parse::<f64>().map_or(false, f64::is_finite)
        })
    }

    /// Whether the evaluation counts against the evaluation budget.
    ///
    /// With a declared `CNT_EVAL` field that parses, the evaluation counts iff
    /// the field is non-zero. Otherwise it always counts.
    pub fn count_eval(&self, types: &[BBOutputType]) -> bool {
        match self.typed_values(types, BBOutputType::CntEval).next() {
            Some(flag) if is_defined(flag) => flag != 0.0,
            _ => true,
        }
    }

    /// First objective value, [`UNDEFINED`] if the record is not ok.
    pub fn objective(&self, types: &[BBOutputType]) -> f64 {
        if !self.eval_ok(types) {
            return UNDEFINED;
        }
        self.typed_values(types, BBOutputType::Obj)
            .next()
            .unwrap_or(UNDEFINED)
    }

    /// Aggregate constraint violation.
    ///
    /// `+inf` when an extreme-barrier constraint is violated, otherwise the sum
    /// of squared positive parts of the progressive-barrier constraints.
    /// [`UNDEFINED`] if the record is not ok.
    pub fn compute_h(&self, types: &[BBOutputType]) -> f64 {
        if !self.eval_ok(types) {
            return UNDEFINED;
        }
        if self.typed_values(types, BBOutputType::Eb).any(|c| c > 0.0) {
            return f64::INFINITY;
        }
        self.typed_values(types, BBOutputType::Pb)
            .filter(|&c| c > 0.0)
            .map(|c| c * c)
            .sum()
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Evaluation record and evaluated point
// ──────────────────────────────────────────────────────────────────────────────

/// Result of evaluating a point on one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Eval {
    pub status: EvalStatus,
    pub bb_output: BBOutput,
    /// Objective value.
    pub f: f64,
    /// Aggregate constraint violation.
    pub h: f64,
}

impl Default for Eval {
    fn default() -> Self {
        Self {
            status: EvalStatus::NotEvaluated,
            bb_output: BBOutput::default(),
            f: UNDEFINED,
            h: UNDEFINED,
        }
    }
}

impl Eval {
    /// Store `output` and recompute `f` and `h` from it.
    pub fn set_bb_output_and_recompute(&mut self, output: BBOutput, types: &[BBOutputType]) {
        self.f = output.objective(types);
        self.h = output.compute_h(types);
        self.bb_output = output;
    }

    /// True if the point is feasible: `h == 0`.
    pub fn is_feasible(&self) -> bool {
        self.h == 0.0
    }
}

/// A candidate point with one evaluation record per [`EvalType`].
///
/// Coordinates are fixed at construction; evaluators only touch the records.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalPoint {
    x: Point,
    evals: [Eval; EvalType::COUNT],
}

impl EvalPoint {
    pub fn new(x: impl Into<Point>) -> Self {
        Self {
            x: x.into(),
            evals: Default::default(),
        }
    }

    pub fn x(&self) -> &Point {
        &self.x
    }

    pub fn size(&self) -> usize {
        self.x.size()
    }

    pub fn is_complete(&self) -> bool {
        self.x.is_complete()
    }

    pub fn eval(&self, eval_type: EvalType) -> &Eval {
        &self.evals[eval_type.index()]
    }

    pub fn eval_mut(&mut self, eval_type: EvalType) -> &mut Eval {
        &mut self.evals[eval_type.index()]
    }

    pub fn status(&self, eval_type: EvalType) -> EvalStatus {
        self.eval(eval_type).status
    }

    pub fn set_status(&mut self, status: EvalStatus, eval_type: EvalType) {
        self.eval_mut(eval_type).status = status;
    }

    pub fn f(&self, eval_type: EvalType) -> f64 {
        self.eval(eval_type).f
    }

    pub fn h(&self, eval_type: EvalType) -> f64 {
        self.eval(eval_type).h
    }

    pub fn set_bb_output_and_recompute(
        &mut self,
        eval_type: EvalType,
        output: BBOutput,
        types: &[BBOutputType],
    ) {
        self.eval_mut(eval_type)
            .set_bb_output_and_recompute(output, types);
    }
}

impl fmt::Display for EvalPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BBOutputType::{CntEval, Eb, ExtraO, Obj, Pb};

    #[test]
    fn test_point_completeness() {
        assert!(Point::from([1.0, 2.0]).is_complete());
        assert!(!Point::undefined(2).is_complete());
        assert!(!Point::from(vec![1.0, UNDEFINED]).is_complete());
        // An empty point has nothing undefined.
        assert!(Point::default().is_complete());
    }

    #[test]
    fn test_point_display() {
        assert_eq!(Point::from([1.0, -2.5, 0.1]).to_string(), "( 1 -2.5 0.1 )");
        assert_eq!(Point::from(vec![1.0, UNDEFINED]).to_string(), "( 1 - )");
    }

    #[test]
    fn test_bb_output_objective_and_h() {
        let types = [Obj, Pb, Pb];
        let out = BBOutput::new("3.5 2 -1", true);
        assert!(out.eval_ok(&types));
        assert_eq!(out.objective(&types), 3.5);
        assert_eq!(out.compute_h(&types), 4.0);

        let feasible = BBOutput::new("1.0 -1 0", true);
        assert_eq!(feasible.compute_h(&types), 0.0);
    }

    #[test]
    fn test_bb_output_extreme_barrier() {
        let types = [Obj, Eb, Pb];
        assert_eq!(BBOutput::new("1 0.1 0", true).compute_h(&types), f64::INFINITY);
        assert_eq!(BBOutput::new("1 0 0.5", true).compute_h(&types), 0.25);
    }

    #[test]
    fn test_bb_output_not_ok() {
        let types = [Obj, Pb];
        // wrong field count
        assert!(!BBOutput::new("1", true).eval_ok(&types));
        // non-numeric objective
        assert!(!BBOutput::new("nan 0", true).eval_ok(&types));
        assert!(!BBOutput::new("FAIL 0", true).eval_ok(&types));
        // producer reported failure
        assert!(!BBOutput::new("1 0", false).eval_ok(&types));

        let out = BBOutput::new("inf 0", true);
        assert!(!out.eval_ok(&types));
        assert!(!is_defined(out.objective(&types)));
        assert!(!is_defined(out.compute_h(&types)));
    }

    #[test]
    fn test_bb_output_extra_field_is_free_text() {
        let types = [Obj, ExtraO];
        let out = BBOutput::new("2.0 some-tag", true);
        assert!(out.eval_ok(&types));
        assert_eq!(out.objective(&types), 2.0);
    }

    #[test]
    fn test_count_eval() {
        let types = [Obj, CntEval];
        assert!(BBOutput::new("1 1", true).count_eval(&types));
        assert!(!BBOutput::new("1 0", true).count_eval(&types));
        // counting is independent of success
        assert!(!BBOutput::new("nan 0", true).count_eval(&types));
        // unparsable flag counts
        assert!(BBOutput::new("1 x", true).count_eval(&types));
        // without a declared CNT_EVAL, every evaluation counts
        assert!(BBOutput::new("1", true).count_eval(&[Obj]));
        assert!(BBOutput::failed().count_eval(&[Obj]));
    }

    #[test]
    fn test_from_values() {
        let out = BBOutput::from_values(&[1.5, -2.0]);
        assert_eq!(out.raw(), "1.5 -2");
        assert!(out.eval_ok(&[Obj, Pb]));
    }

    #[test]
    fn test_eval_point_channels_are_independent() {
        let types = [Obj];
        let mut p = EvalPoint::new([0.0, 1.0]);
        p.set_status(EvalStatus::InProgress, EvalType::Bb);
        p.set_bb_output_and_recompute(EvalType::Bb, BBOutput::new("7", true), &types);

        assert_eq!(p.status(EvalType::Bb), EvalStatus::InProgress);
        assert_eq!(p.status(EvalType::Surrogate), EvalStatus::NotEvaluated);
        assert_eq!(p.f(EvalType::Bb), 7.0);
        assert!(!is_defined(p.f(EvalType::Surrogate)));
        assert!(p.eval(EvalType::Bb).is_feasible());
        assert_eq!(p.x().as_slice(), &[0.0, 1.0]);
    }
}
