//! Blackbox evaluation of blocks of points.
//!
//! An [`Evaluator`] evaluates blocks of [`EvalPoint`]s either by running an
//! external executable or by calling an in-process [`Blackbox`], and
//! classifies every point into one of the final [`EvalStatus`] values:
//!
//! | Status      | Meaning                                            | Retry |
//! |-------------|----------------------------------------------------|-------|
//! | `Ok`        | success, `h <= h_max`                              | no    |
//! | `Failed`    | the blackbox ran and reported non-success          | no    |
//! | `Error`     | launch failure, missing output, non-zero exit      | yes   |
//! | `ConsHOver` | success, but `h > h_max`                           | when `h_max` relaxes |
//!
//! # Worker slots
//!
//! The evaluator owns one scratch file per worker slot. Every call names the
//! slot it runs on, and a slot serves a single caller at a time, so
//! concurrent workers never share a scratch file. Calling with a slot that is
//! already in use is reported as [`MadsError::WorkerSlotBusy`].
//!
//! # Blackbox process protocol
//!
//! `<bb_exe> <scratch file>`; the scratch file holds one line per point,
//! coordinates separated by spaces. The process writes one output line per
//! point, in order, on its standard output. A non-zero exit status
//! invalidates the whole block.
//!
//! A blackbox that never exits blocks its worker: no timeout is applied.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, TryLockError};

use rayon::prelude::*;

use crate::diagnostics::DiagnosticLog;
use crate::error::{MadsError, Result};
use crate::point::{BBOutput, EvalPoint, Point};
use crate::types::{EvalParameters, EvalStatus, EvalType};

// ──────────────────────────────────────────────────────────────────────────────
// Strategy
// ──────────────────────────────────────────────────────────────────────────────

/// How an evaluator produces blackbox outputs. Fixed for its lifetime once
/// resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvaluatorMode {
    /// Run the executable named by [`EvalParameters::bb_exe`].
    ExternalProcess,
    /// Call a [`Blackbox`] supplied at construction.
    UserCallback,
}

/// In-process blackbox.
///
/// Called once per point, sequentially within a block. The returned record
/// is interpreted exactly like one output line of an external blackbox.
pub trait Blackbox: Send + Sync {
    fn eval_x(&self, x: &Point, h_max: f64) -> BBOutput;
}

impl<F> Blackbox for F
where
    F: Fn(&Point, f64) -> BBOutput + Send + Sync,
{
    fn eval_x(&self, x: &Point, h_max: f64) -> BBOutput {
        self(x, h_max)
    }
}

/// Per-point results of a block evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockOutcome {
    /// Success flag reported for each point.
    pub eval_ok: Vec<bool>,
    /// Whether each evaluation counts against the evaluation budget.
    pub count_eval: Vec<bool>,
}

impl BlockOutcome {
    fn new(len: usize) -> Self {
        Self {
            eval_ok: vec![false; len],
            count_eval: vec![false; len],
        }
    }

    pub fn len(&self) -> usize {
        self.eval_ok.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eval_ok.is_empty()
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Scratch files
// ──────────────────────────────────────────────────────────────────────────────

/// Distinguishes the scratch files of evaluators living in one process.
static NEXT_EVALUATOR_ID: AtomicUsize = AtomicUsize::new(0);

/// Blackbox input file of one worker slot. Removed on drop.
#[derive(Debug)]
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    fn create(dir: &Path, evaluator_id: usize, slot: usize) -> Result<Self> {
        let path = dir.join(format!(
            "madstmp.{}.{}.{}",
            std::process::id(),
            evaluator_id,
            slot
        ));
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| MadsError::ScratchFile {
                path: path.clone(),
                source,
            })?;
        Ok(Self { path })
    }

    /// Replace the file contents with one line of coordinates per point.
    fn write_block(&self, block: &[EvalPoint]) -> io::Result<()> {
        let mut w = BufWriter::new(File::create(&self.path)?);
        for point in block {
            for (i, x) in point.x().iter().enumerate() {
                if i > 0 {
                    write!(w, " ")?;
                }
                write!(w, "{}", x)?;
            }
            writeln!(w)?;
        }
        w.flush()
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::debug!("cannot remove scratch file {:?}: {}", self.path, e);
            }
        }
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Evaluator
// ──────────────────────────────────────────────────────────────────────────────

/// Evaluates blocks of points on one evaluation channel.
pub struct Evaluator {
    params: EvalParameters,
    eval_type: EvalType,
    blackbox: Option<Arc<dyn Blackbox>>,
    mode: OnceLock<EvaluatorMode>,
    scratch: Vec<Mutex<ScratchFile>>,
    scratch_paths: Vec<PathBuf>,
    diagnostics: Arc<DiagnosticLog>,
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("params", &self.params)
            .field("eval_type", &self.eval_type)
            .field("has_blackbox", &self.blackbox.is_some())
            .field("mode", &self.mode.get())
            .field("nb_slots", &self.scratch.len())
            .finish()
    }
}

impl Evaluator {
    /// Evaluator running the external executable `params.bb_exe`.
    ///
    /// # Errors
    /// [`MadsError::ScratchFile`] if the scratch directory or a scratch file
    /// cannot be created.
    pub fn new(params: EvalParameters, eval_type: EvalType) -> Result<Self> {
        Self::build(params, eval_type, None)
    }

    /// Evaluator calling `blackbox` in-process.
    ///
    /// # Errors
    /// Same as [`Evaluator::new`].
    pub fn with_blackbox(
        params: EvalParameters,
        eval_type: EvalType,
        blackbox: impl Blackbox + 'static,
    ) -> Result<Self> {
        Self::build(params, eval_type, Some(Arc::new(blackbox)))
    }

    fn build(
        params: EvalParameters,
        eval_type: EvalType,
        blackbox: Option<Arc<dyn Blackbox>>,
    ) -> Result<Self> {
        let nb_slots = if params.nb_threads == 0 {
            rayon::current_num_threads()
        } else {
            params.nb_threads
        };

        std::fs::create_dir_all(&params.tmp_dir).map_err(|source| MadsError::ScratchFile {
            path: params.tmp_dir.clone(),
            source,
        })?;
        let evaluator_id = NEXT_EVALUATOR_ID.fetch_add(1, Ordering::Relaxed);
        let scratch = (0..nb_slots)
            .map(|slot| ScratchFile::create(&params.tmp_dir, evaluator_id, slot))
            .collect::<Result<Vec<_>>>()?;
        let scratch_paths = scratch.iter().map(|s| s.path.clone()).collect();

        Ok(Self {
            params,
            eval_type,
            blackbox,
            mode: OnceLock::new(),
            scratch: scratch.into_iter().map(Mutex::new).collect(),
            scratch_paths,
            diagnostics: Arc::new(DiagnosticLog::new()),
        })
    }

    pub fn params(&self) -> &EvalParameters {
        &self.params
    }

    pub fn eval_type(&self) -> EvalType {
        self.eval_type
    }

    /// Number of worker slots.
    pub fn nb_slots(&self) -> usize {
        self.scratch.len()
    }

    /// Scratch file of `slot`, `None` if out of range.
    pub fn scratch_path(&self, slot: usize) -> Option<&Path> {
        self.scratch_paths.get(slot).map(PathBuf::as_path)
    }

    /// Warnings emitted by this evaluator.
    pub fn diagnostics(&self) -> &Arc<DiagnosticLog> {
        &self.diagnostics
    }

    /// Strategy, `None` until resolved.
    pub fn mode(&self) -> Option<EvaluatorMode> {
        self.mode.get().copied()
    }

    /// Resolve the strategy once; later calls return the same value.
    ///
    /// Safe to call concurrently. Call it before spawning workers to fix the
    /// strategy up front; [`Evaluator::evaluate_block`] calls it otherwise.
    pub fn resolve_mode(&self) -> EvaluatorMode {
        *self.mode.get_or_init(|| {
            let mode = if self.blackbox.is_some() {
                EvaluatorMode::UserCallback
            } else {
                EvaluatorMode::ExternalProcess
            };
            tracing::debug!("evaluator mode resolved to {:?}", mode);
            mode
        })
    }

    /// Evaluate one point. See [`Evaluator::evaluate_block`].
    ///
    /// Returns `(eval_ok, count_eval)`.
    pub fn evaluate_one(
        &self,
        slot: usize,
        point: &mut EvalPoint,
        h_max: f64,
    ) -> Result<(bool, bool)> {
        let outcome = self.evaluate_block(slot, std::slice::from_mut(point), h_max)?;
        Ok((outcome.eval_ok[0], outcome.count_eval[0]))
    }

    /// Evaluate a block of points on worker slot `slot`.
    ///
    /// Points are expected to be [`EvalStatus::InProgress`] on this
    /// evaluator's channel; others are evaluated anyway, with a warning. On
    /// return every point is `Ok`, `Failed`, `Error` or `ConsHOver`.
    ///
    /// # Errors
    /// - [`MadsError::EmptyBlock`] / [`MadsError::IncompletePoint`]: nothing
    ///   is evaluated.
    /// - [`MadsError::NoBlackboxExecutable`], [`MadsError::InvalidWorkerSlot`],
    ///   [`MadsError::WorkerSlotBusy`] in external-process mode.
    ///
    /// Evaluation problems of individual points are statuses, not errors.
    pub fn evaluate_block(
        &self,
        slot: usize,
        block: &mut [EvalPoint],
        h_max: f64,
    ) -> Result<BlockOutcome> {
        if block.is_empty() {
            return Err(MadsError::EmptyBlock);
        }
        if let Some(point) = block.iter().find(|p| !p.is_complete()) {
            return Err(MadsError::IncompletePoint(point.to_string()));
        }

        for point in block.iter() {
            if point.status(self.eval_type) != EvalStatus::InProgress {
                self.diagnostics.warn(format!(
                    "Warning: EVAL should already be IN_PROGRESS for point {}",
                    point
                ));
            }
        }

        match self.resolve_mode() {
            EvaluatorMode::ExternalProcess => self.eval_block_bb_exe(slot, block, h_max),
            EvaluatorMode::UserCallback => Ok(self.eval_block_callback(block, h_max)),
        }
    }

    /// Evaluate several blocks in parallel.
    ///
    /// Blocks are split into at most [`Evaluator::nb_slots`] contiguous
    /// groups; group `k` runs sequentially on slot `k`. Outcomes are returned
    /// in block order.
    ///
    /// # Errors
    /// The first error of any [`Evaluator::evaluate_block`] call.
    pub fn evaluate_blocks(
        &self,
        blocks: &mut [Vec<EvalPoint>],
        h_max: f64,
    ) -> Result<Vec<BlockOutcome>> {
        if blocks.is_empty() {
            return Ok(Vec::new());
        }
        let group_size = blocks.len().div_ceil(self.nb_slots().max(1));

        let groups = blocks
            .par_chunks_mut(group_size)
            .enumerate()
            .map(|(slot, group)| {
                group
                    .iter_mut()
                    .map(|block| self.evaluate_block(slot, block, h_max))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(groups.into_iter().flatten().collect())
    }

    // ──────────────────────────────────────────────────────────────────
    // Classification
    // ──────────────────────────────────────────────────────────────────

    /// Final status of a point whose output was read and whose process (if
    /// any) exited normally.
    fn classify(&self, point: &mut EvalPoint, eval_ok: bool, h_max: f64) {
        let status = if point.h(self.eval_type) > h_max {
            EvalStatus::ConsHOver
        } else if !eval_ok {
            EvalStatus::Failed
        } else {
            EvalStatus::Ok
        };
        point.set_status(status, self.eval_type);
    }

    fn mark_block_error(&self, block: &mut [EvalPoint], reason: &str) {
        for point in block.iter_mut() {
            point.set_status(EvalStatus::Error, self.eval_type);
            self.diagnostics
                .warn(format!("Warning: {} for point {}", reason, point));
        }
    }

    // ──────────────────────────────────────────────────────────────────
    // User callback
    // ──────────────────────────────────────────────────────────────────

    fn eval_block_callback(&self, block: &mut [EvalPoint], h_max: f64) -> BlockOutcome {
        let mut outcome = BlockOutcome::new(block.len());
        let Some(blackbox) = self.blackbox.as_ref() else {
            // resolve_mode only picks UserCallback with a blackbox present
            self.mark_block_error(block, "no blackbox callback");
            return outcome;
        };
        let types = &self.params.bb_output_type;

        for (k, point) in block.iter_mut().enumerate() {
            let output = blackbox.eval_x(point.x(), h_max);
            outcome.eval_ok[k] = output.eval_ok(types);
            outcome.count_eval[k] = output.count_eval(types);
            point.set_bb_output_and_recompute(self.eval_type, output, types);
            self.classify(point, outcome.eval_ok[k], h_max);
        }
        outcome
    }

    // ──────────────────────────────────────────────────────────────────
    // External process
    // ──────────────────────────────────────────────────────────────────

    fn eval_block_bb_exe(
        &self,
        slot: usize,
        block: &mut [EvalPoint],
        h_max: f64,
    ) -> Result<BlockOutcome> {
        let mut words = self.params.bb_exe.split_whitespace();
        let Some(program) = words.next() else {
            return Err(MadsError::NoBlackboxExecutable);
        };
        let args: Vec<&str> = words.collect();

        let scratch = self.scratch.get(slot).ok_or(MadsError::InvalidWorkerSlot {
            slot,
            nb_slots: self.scratch.len(),
        })?;
        let scratch = match scratch.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return Err(MadsError::WorkerSlotBusy(slot)),
        };

        let mut outcome = BlockOutcome::new(block.len());

        if let Err(e) = scratch.write_block(block) {
            self.mark_block_error(
                block,
                &format!("cannot write temporary file {:?} ({})", scratch.path, e),
            );
            return Ok(outcome);
        }

        tracing::debug!(
            "System command: {} {:?}",
            self.params.bb_exe,
            scratch.path
        );
        let spawned = Command::new(program)
            .args(&args)
            .arg(&scratch.path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                self.mark_block_error(block, &format!("Evaluation error ({})", e));
                return Ok(outcome);
            }
        };

        let types = &self.params.bb_output_type;
        let mut missing = vec![false; block.len()];
        if let Some(stdout) = child.stdout.take() {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();
            for (k, point) in block.iter_mut().enumerate() {
                line.clear();
                match reader.read_line(&mut line) {
                    Ok(n) if n > 0 => {
                        let output = BBOutput::new(line.trim_end(), true);
                        outcome.eval_ok[k] = output.eval_ok(types);
                        outcome.count_eval[k] = output.count_eval(types);
                        point.set_bb_output_and_recompute(self.eval_type, output, types);
                    }
                    Ok(_) => {
                        missing[k] = true;
                        point.set_status(EvalStatus::Error, self.eval_type);
                        self.diagnostics.warn(format!(
                            "Warning: Evaluation error with point {}: output is empty",
                            point
                        ));
                    }
                    Err(e) => {
                        missing[k] = true;
                        point.set_status(EvalStatus::Error, self.eval_type);
                        self.diagnostics.warn(format!(
                            "Warning: Evaluation error with point {}: cannot read output ({})",
                            point, e
                        ));
                    }
                }
            }
            // Unread output would keep the process blocked on a full pipe.
            if let Err(e) = io::copy(&mut reader, &mut io::sink()) {
                tracing::debug!("cannot drain blackbox output: {}", e);
            }
        } else {
            missing.fill(true);
            self.mark_block_error(block, "Evaluation error (no output pipe)");
        }

        let exit = child.wait();
        let failure = match &exit {
            Ok(status) if status.success() => None,
            Ok(status) => Some(match status.code() {
                Some(code) => format!("Evaluator returned exit status {}", code),
                None => "Evaluator was terminated by a signal".to_string(),
            }),
            Err(e) => Some(format!("cannot wait for evaluator ({})", e)),
        };

        match failure {
            Some(reason) => {
                outcome.eval_ok.fill(false);
                self.mark_block_error(block, &reason);
            }
            None => {
                for (k, point) in block.iter_mut().enumerate() {
                    if !missing[k] {
                        self.classify(point, outcome.eval_ok[k], h_max);
                    }
                }
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BBOutputType;

    fn params(dir: &Path, nb_threads: usize) -> EvalParameters {
        EvalParameters {
            bb_exe: String::new(),
            bb_output_type: vec![BBOutputType::Obj, BBOutputType::Pb],
            tmp_dir: dir.to_path_buf(),
            nb_threads,
        }
    }

    fn in_progress(coords: &[f64]) -> EvalPoint {
        let mut p = EvalPoint::new(coords);
        p.set_status(EvalStatus::InProgress, EvalType::Bb);
        p
    }

    fn sphere(x: &Point, _h_max: f64) -> BBOutput {
        let f: f64 = x.iter().map(|xi| xi * xi).sum();
        BBOutput::from_values(&[f, x[0] - 1.0])
    }

    #[test]
    fn test_scratch_files_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = {
            let ev = Evaluator::new(params(dir.path(), 3), EvalType::Bb).unwrap();
            assert_eq!(ev.nb_slots(), 3);
            let paths: Vec<_> = (0..3)
                .map(|s| ev.scratch_path(s).unwrap().to_path_buf())
                .collect();
            for p in &paths {
                assert!(p.exists());
            }
            assert_ne!(paths[0], paths[1]);
            assert!(ev.scratch_path(3).is_none());
            paths
        };
        for p in &paths {
            assert!(!p.exists(), "{:?} left behind", p);
        }
    }

    #[test]
    fn test_evaluators_share_tmp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let bb = Evaluator::new(params(dir.path(), 2), EvalType::Bb).unwrap();
        let sgte = Evaluator::new(params(dir.path(), 2), EvalType::Surrogate).unwrap();
        assert_ne!(bb.scratch_path(0), sgte.scratch_path(0));

        let kept = bb.scratch_path(1).unwrap();
        drop(sgte);
        assert!(kept.exists());
    }

    #[test]
    fn test_zero_threads_uses_rayon_pool() {
        let dir = tempfile::tempdir().unwrap();
        let ev = Evaluator::new(params(dir.path(), 0), EvalType::Bb).unwrap();
        assert_eq!(ev.nb_slots(), rayon::current_num_threads());
    }

    #[test]
    fn test_mode_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let ext = Evaluator::new(params(dir.path(), 1), EvalType::Bb).unwrap();
        assert_eq!(ext.mode(), None);
        assert_eq!(ext.resolve_mode(), EvaluatorMode::ExternalProcess);
        assert_eq!(ext.mode(), Some(EvaluatorMode::ExternalProcess));

        let cb = Evaluator::with_blackbox(params(dir.path(), 1), EvalType::Bb, sphere).unwrap();
        assert_eq!(cb.mode(), None);
        let mut p = in_progress(&[2.0]);
        cb.evaluate_one(0, &mut p, f64::INFINITY).unwrap();
        assert_eq!(cb.mode(), Some(EvaluatorMode::UserCallback));
    }

    #[test]
    fn test_callback_classification() {
        let dir = tempfile::tempdir().unwrap();
        let ev = Evaluator::with_blackbox(params(dir.path(), 1), EvalType::Bb, sphere).unwrap();

        // c = x0 - 1: feasible, h = 0.25, h = 4
        let mut block = vec![
            in_progress(&[0.5, 0.0]),
            in_progress(&[1.5, 0.0]),
            in_progress(&[3.0, 0.0]),
        ];
        let outcome = ev.evaluate_block(0, &mut block, 1.0).unwrap();
        assert_eq!(outcome.eval_ok, vec![true, true, true]);
        assert_eq!(outcome.count_eval, vec![true, true, true]);
        assert_eq!(block[0].status(EvalType::Bb), EvalStatus::Ok);
        assert_eq!(block[1].status(EvalType::Bb), EvalStatus::Ok);
        assert_eq!(block[1].h(EvalType::Bb), 0.25);
        assert_eq!(block[2].status(EvalType::Bb), EvalStatus::ConsHOver);
        assert_eq!(block[2].f(EvalType::Bb), 9.0);
        assert!(ev.diagnostics().is_empty());
    }

    #[test]
    fn test_callback_failure_and_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = params(dir.path(), 1);
        p.bb_output_type = vec![BBOutputType::Obj, BBOutputType::CntEval];
        let ev = Evaluator::with_blackbox(p, EvalType::Surrogate, |x: &Point, _h: f64| {
            if x[0] < 0.0 {
                BBOutput::new("FAIL 1", false)
            } else {
                BBOutput::new(format!("{} 0", x[0]), true)
            }
        })
        .unwrap();

        let mut ok = EvalPoint::new([1.0]);
        ok.set_status(EvalStatus::InProgress, EvalType::Surrogate);
        assert_eq!(ev.evaluate_one(0, &mut ok, 0.0).unwrap(), (true, false));
        assert_eq!(ok.status(EvalType::Surrogate), EvalStatus::Ok);
        assert_eq!(ok.status(EvalType::Bb), EvalStatus::NotEvaluated);

        let mut bad = EvalPoint::new([-1.0]);
        bad.set_status(EvalStatus::InProgress, EvalType::Surrogate);
        assert_eq!(ev.evaluate_one(0, &mut bad, 0.0).unwrap(), (false, true));
        assert_eq!(bad.status(EvalType::Surrogate), EvalStatus::Failed);
    }

    #[test]
    fn test_precondition_errors() {
        let dir = tempfile::tempdir().unwrap();
        let ev = Evaluator::with_blackbox(params(dir.path(), 1), EvalType::Bb, sphere).unwrap();

        let mut empty: Vec<EvalPoint> = Vec::new();
        assert!(matches!(
            ev.evaluate_block(0, &mut empty, 0.0),
            Err(MadsError::EmptyBlock)
        ));

        let mut block = vec![in_progress(&[1.0, 2.0]), in_progress(&[1.0, f64::NAN])];
        assert!(matches!(
            ev.evaluate_block(0, &mut block, 0.0),
            Err(MadsError::IncompletePoint(_))
        ));
        assert_eq!(block[0].status(EvalType::Bb), EvalStatus::InProgress);
        assert_eq!(ev.mode(), None);
    }

    #[test]
    fn test_not_in_progress_warns() {
        let dir = tempfile::tempdir().unwrap();
        let ev = Evaluator::with_blackbox(params(dir.path(), 1), EvalType::Bb, sphere).unwrap();
        let mut p = EvalPoint::new([0.0, 0.0]);
        let (ok, _) = ev.evaluate_one(0, &mut p, 0.0).unwrap();
        assert!(ok);
        assert_eq!(p.status(EvalType::Bb), EvalStatus::Ok);
        let lines = ev.diagnostics().lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("IN_PROGRESS"));
    }

    #[test]
    fn test_external_without_executable() {
        let dir = tempfile::tempdir().unwrap();
        let ev = Evaluator::new(params(dir.path(), 1), EvalType::Bb).unwrap();
        let mut p = in_progress(&[0.0]);
        assert!(matches!(
            ev.evaluate_one(0, &mut p, 0.0),
            Err(MadsError::NoBlackboxExecutable)
        ));
    }

    #[test]
    fn test_external_invalid_slot() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = params(dir.path(), 2);
        p.bb_exe = "true".into();
        let ev = Evaluator::new(p, EvalType::Bb).unwrap();
        let mut point = in_progress(&[0.0]);
        assert!(matches!(
            ev.evaluate_one(2, &mut point, 0.0),
            Err(MadsError::InvalidWorkerSlot { slot: 2, nb_slots: 2 })
        ));
    }

    #[test]
    fn test_external_busy_slot() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = params(dir.path(), 1);
        p.bb_exe = "true".into();
        let ev = Evaluator::new(p, EvalType::Bb).unwrap();

        let _held = ev.scratch[0].lock().unwrap();
        let mut point = in_progress(&[0.0]);
        assert!(matches!(
            ev.evaluate_one(0, &mut point, 0.0),
            Err(MadsError::WorkerSlotBusy(0))
        ));
    }

    #[test]
    fn test_evaluate_blocks_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let ev = Evaluator::with_blackbox(params(dir.path(), 2), EvalType::Bb, sphere).unwrap();

        let mut blocks: Vec<Vec<EvalPoint>> = (0..5)
            .map(|b| vec![in_progress(&[b as f64, 0.0]), in_progress(&[0.0, b as f64])])
            .collect();
        let outcomes = ev.evaluate_blocks(&mut blocks, f64::INFINITY).unwrap();
        assert_eq!(outcomes.len(), 5);
        for (b, block) in blocks.iter().enumerate() {
            assert_eq!(outcomes[b].len(), 2);
            let expected = (b * b) as f64;
            assert_eq!(block[0].f(EvalType::Bb), expected);
            assert_eq!(block[1].f(EvalType::Bb), expected);
        }

        assert!(ev.evaluate_blocks(&mut [], 0.0).unwrap().is_empty());
    }
}
