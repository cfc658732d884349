use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::error::{Error, Result};
use crate::model::Model;
use crate::search::{Positions, Updater, Walker};

/// The outcome of evaluating one outer "line" (a fixed `k`-position
/// combination, with its best replacement value tuple already chosen).
pub struct LineOutcome {
    /// Best kappa found for this line.
    pub kappa: f64,
    /// The edits achieving `kappa`.
    pub updaters: Vec<Updater>,
    /// Kappa evaluations performed while scoring this line.
    pub kappa_evaluations: usize,
    /// Per-option model evaluations performed while scoring this line.
    pub function_evaluations: usize,
}

struct Aggregate {
    kappa: f64,
    updaters: Vec<Updater>,
    kappa_evaluations: usize,
    function_evaluations: usize,
}

impl Default for Aggregate {
    fn default() -> Self {
        Self {
            kappa: f64::NEG_INFINITY,
            updaters: Vec::new(),
            kappa_evaluations: 0,
            function_evaluations: 0,
        }
    }
}

/// Runs one `adjustment`/`prediction` step (a fixed edit-tuple size `k`)
/// across `threads` workers, each visiting a disjoint, interleaved slice of
/// the outer-line enumeration: worker `t` starts at line `t` and strides by
/// `threads`. Returns the best `(kappa, updaters)` across every line visited
/// by any worker, plus the evaluation counts summed across all of them.
///
/// `threads = 1` runs the identical walk on the calling thread with no
/// `std::thread::scope` overhead, per the single-worker fast path.
///
/// `line_step` is called once per outer line, with the walker already
/// positioned on it (value enumeration reset to its first candidate); it
/// must not advance the line (outer) enumeration itself.
pub fn run_step<F>(
    model: &Arc<Model>,
    positions: &Positions,
    k: usize,
    threads: usize,
    interrupt: &(dyn Fn() -> bool + Sync),
    line_step: F,
) -> Result<(f64, Vec<Updater>, usize, usize)>
where
    F: Fn(&mut Walker) -> Result<LineOutcome> + Sync,
{
    if threads <= 1 {
        let mut walker = Walker::new(Arc::clone(model), positions.clone(), true);
        walker.init_walkers(k)?;
        let mut aggregate = Aggregate::default();
        loop {
            if interrupt() {
                return Err(Error::Cancelled);
            }
            let outcome = line_step(&mut walker)?;
            aggregate.kappa_evaluations += outcome.kappa_evaluations;
            aggregate.function_evaluations += outcome.function_evaluations;
            if outcome.kappa > aggregate.kappa {
                aggregate.kappa = outcome.kappa;
                aggregate.updaters = outcome.updaters;
            }
            if !walker.next_line() {
                break;
            }
        }
        return Ok((
            aggregate.kappa,
            aggregate.updaters,
            aggregate.kappa_evaluations,
            aggregate.function_evaluations,
        ));
    }

    let aggregate = Mutex::new(Aggregate::default());
    let error: Mutex<Option<Error>> = Mutex::new(None);
    let cancelled = AtomicBool::new(false);

    thread::scope(|scope| {
        for t in 0..threads {
            let positions = positions.clone();
            let aggregate = &aggregate;
            let error = &error;
            let cancelled = &cancelled;
            let line_step = &line_step;
            scope.spawn(move || {
                let mut walker = Walker::new(Arc::clone(model), positions, true);
                if walker.init_walkers(k).is_err() || !walker.skip_lines(t) {
                    return;
                }
                loop {
                    if cancelled.load(Ordering::Relaxed) {
                        return;
                    }
                    if interrupt() {
                        cancelled.store(true, Ordering::Relaxed);
                        return;
                    }
                    match line_step(&mut walker) {
                        Ok(outcome) => {
                            let mut agg = aggregate.lock().expect("aggregate mutex poisoned");
                            agg.kappa_evaluations += outcome.kappa_evaluations;
                            agg.function_evaluations += outcome.function_evaluations;
                            if outcome.kappa > agg.kappa {
                                agg.kappa = outcome.kappa;
                                agg.updaters = outcome.updaters;
                            }
                        }
                        Err(err) => {
                            *error.lock().expect("error mutex poisoned") = Some(err);
                            cancelled.store(true, Ordering::Relaxed);
                            return;
                        }
                    }
                    if !walker.skip_lines(threads) {
                        return;
                    }
                }
            });
        }
    });

    if let Some(err) = error.into_inner().expect("error mutex poisoned") {
        return Err(err);
    }
    if cancelled.load(Ordering::Relaxed) {
        return Err(Error::Cancelled);
    }
    let aggregate = aggregate.into_inner().expect("aggregate mutex poisoned");
    Ok((
        aggregate.kappa,
        aggregate.updaters,
        aggregate.kappa_evaluations,
        aggregate.function_evaluations,
    ))
}
