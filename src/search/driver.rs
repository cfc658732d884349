use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{Evaluator, Model, Tables};
use crate::options::{Options, Subsets};
use crate::parallel::{run_step, LineOutcome};
use crate::stats::Kappa;

use super::positions::Positions;
use super::walker::{Updater, Walker};

/// One `k`-step result from [`adjustment`] or [`prediction`].
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    /// Edit-tuple size for this step; `0` is the unmodified-model baseline.
    pub k: usize,
    /// The winning edit tuple; empty at `k = 0`.
    #[serde(rename = "modifiers")]
    pub updaters: Vec<Updater>,
    /// Best squared weighted kappa found at this step.
    pub kappa: f64,
    /// Wall-clock time spent searching this step.
    pub time_seconds: f64,
    /// Number of kappa evaluations performed while searching this step.
    pub kappa_evaluations: usize,
    /// Number of per-option model evaluations performed while searching this step.
    pub function_evaluations: usize,
}

fn simulate_all(evaluator: &Evaluator, model: &Model, tables: &Tables, options: &Options) -> Result<Vec<u8>> {
    (0..options.len())
        .map(|i| {
            let row: Vec<u8> = options.row(i).to_vec();
            evaluator.evaluate(model, tables, &row)
        })
        .collect()
}

fn simulate_subset(
    evaluator: &Evaluator,
    model: &Model,
    tables: &Tables,
    options: &Options,
    subset: &[usize],
) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut obs = Vec::with_capacity(subset.len());
    let mut sim = Vec::with_capacity(subset.len());
    for &i in subset {
        let row: Vec<u8> = options.row(i).to_vec();
        sim.push(evaluator.evaluate(model, tables, &row)?);
        obs.push(options.observed()[i]);
    }
    Ok((obs, sim))
}

fn resolve_max_k(line_limit: i64, position_count: usize) -> usize {
    if line_limit <= 0 {
        position_count
    } else {
        (line_limit as usize).min(position_count)
    }
}

fn baseline_result(evaluator: &Evaluator, model: &Model, options: &Options) -> Result<SearchResult> {
    let start = Instant::now();
    let tables = model.tables();
    let simulated = simulate_all(evaluator, model, &tables, options)?;
    let kappa = Kappa::squared(model.class_count(), options.observed(), &simulated)?;
    Ok(SearchResult {
        k: 0,
        updaters: Vec::new(),
        kappa,
        time_seconds: start.elapsed().as_secs_f64(),
        kappa_evaluations: 1,
        function_evaluations: options.len(),
    })
}

/// Searches, for each edit-tuple size `k = 1, 2, …`, the tuple that maximizes
/// squared weighted kappa over the full dataset.
///
/// Emits a `k = 0` baseline (unmodified model) first, then one result per
/// step through `progress`; `progress` returning `false` cancels the search,
/// as does `interrupt` returning `true` at an outer-line boundary. `threads`
/// selects the parallel coordinator's worker count; `1` runs sequentially.
pub fn adjustment(
    model: Arc<Model>,
    options: &Options,
    line_limit: i64,
    reduce_mode: bool,
    threads: usize,
    mut progress: impl FnMut(&SearchResult) -> bool,
    interrupt: impl Fn() -> bool + Sync,
) -> Result<Vec<SearchResult>> {
    let evaluator = Evaluator::compile(&model);
    let mut results = vec![baseline_result(&evaluator, &model, options)?];
    if !progress(&results[0]) {
        return Err(Error::Cancelled);
    }

    let positions = if reduce_mode {
        Positions::reduced(&model, options)?
    } else {
        Positions::full(&model)
    };
    if positions.is_empty() {
        return Ok(results);
    }
    let max_k = resolve_max_k(line_limit, positions.len());

    let line_step = |walker: &mut Walker| -> Result<LineOutcome> {
        let mut local_best_kappa = f64::NEG_INFINITY;
        let mut local_best_updaters: Vec<Updater> = Vec::new();
        let mut kappa_evaluations = 0usize;
        let mut function_evaluations = 0usize;
        if walker.has_value() {
            loop {
                walker.apply();
                let simulated = simulate_all(&evaluator, &model, walker.tables(), options)?;
                function_evaluations += options.len();
                let kappa = Kappa::squared(model.class_count(), options.observed(), &simulated)?;
                kappa_evaluations += 1;
                if kappa > local_best_kappa {
                    local_best_kappa = kappa;
                    local_best_updaters = walker.updaters();
                }
                walker.restore();
                if !walker.next_value() {
                    break;
                }
            }
        }
        Ok(LineOutcome {
            kappa: local_best_kappa,
            updaters: local_best_updaters,
            kappa_evaluations,
            function_evaluations,
        })
    };

    for k in 1..=max_k {
        log::debug!("adjustment: searching k={k} over {} positions", positions.len());
        let step_start = Instant::now();
        let (kappa, updaters, kappa_evaluations, function_evaluations) =
            run_step(&model, &positions, k, threads, &interrupt, line_step)?;

        let result = SearchResult {
            k,
            updaters,
            kappa,
            time_seconds: step_start.elapsed().as_secs_f64(),
            kappa_evaluations,
            function_evaluations,
        };
        log::debug!("adjustment: k={k} best kappa={:.4}", result.kappa);
        if !progress(&result) {
            return Err(Error::Cancelled);
        }
        results.push(result);
    }

    Ok(results)
}

/// Leave-subset-out variant of [`adjustment`]: for each option, the edit
/// value tuple is chosen by training on its disjoint-provenance learning
/// subset alone, then used to predict the option's own outcome.
///
/// Options sharing a `reduced_id` (identical provenance key) share their
/// trained tuple, computed once and cached. The step's reported `updaters`
/// mirror the tuple trained for the last option processed on the winning
/// line, matching the reference solver's behavior of reporting whatever
/// tuple its working tables hold once every option has been predicted.
pub fn prediction(
    model: Arc<Model>,
    options: &Options,
    line_limit: i64,
    reduce_mode: bool,
    threads: usize,
    mut progress: impl FnMut(&SearchResult) -> bool,
    interrupt: impl Fn() -> bool + Sync,
) -> Result<Vec<SearchResult>> {
    let subsets = Subsets::build(options);
    if !subsets.all_trainable() {
        return Err(Error::SolverError(
            "unable to train: an option has an empty learning subset".into(),
        ));
    }

    let evaluator = Evaluator::compile(&model);
    let mut results = vec![baseline_result(&evaluator, &model, options)?];
    if !progress(&results[0]) {
        return Err(Error::Cancelled);
    }

    let positions = if reduce_mode {
        Positions::reduced(&model, options)?
    } else {
        Positions::full(&model)
    };
    if positions.is_empty() {
        return Ok(results);
    }
    let max_k = resolve_max_k(line_limit, positions.len());
    let group_count = subsets.group_count();

    let line_step = |walker: &mut Walker| -> Result<LineOutcome> {
        let mut cache: Vec<Option<Vec<u8>>> = vec![None; group_count];
        let mut predicted = vec![0u8; options.len()];
        let mut last_values: Vec<u8> = Vec::new();
        let mut kappa_evaluations = 0usize;
        let mut function_evaluations = 0usize;

        for i in 0..options.len() {
            let group = subsets.reduced_id(i);
            let values = if let Some(cached) = &cache[group] {
                cached.clone()
            } else {
                let training = subsets.subset(i);
                walker.init_next_value();
                let mut local_best_kappa = f64::NEG_INFINITY;
                let mut local_best_values: Vec<u8> = Vec::new();
                if walker.has_value() {
                    loop {
                        walker.apply();
                        let (obs, sim) =
                            simulate_subset(&evaluator, &model, walker.tables(), options, training)?;
                        function_evaluations += training.len();
                        let kappa = Kappa::squared(model.class_count(), &obs, &sim)?;
                        kappa_evaluations += 1;
                        if kappa > local_best_kappa {
                            local_best_kappa = kappa;
                            local_best_values = walker.updaters().into_iter().map(|u| u.value).collect();
                        }
                        walker.restore();
                        if !walker.next_value() {
                            break;
                        }
                    }
                }
                cache[group] = Some(local_best_values.clone());
                local_best_values
            };

            if !values.is_empty() {
                walker.apply_values(&values);
            }
            let row: Vec<u8> = options.row(i).to_vec();
            predicted[i] = evaluator.evaluate(&model, walker.tables(), &row)?;
            function_evaluations += 1;
            if !values.is_empty() {
                walker.restore();
            }
            last_values = values;
        }

        let kappa = Kappa::squared(model.class_count(), options.observed(), &predicted)?;
        kappa_evaluations += 1;
        let updaters = walker.updaters_for(&last_values);

        Ok(LineOutcome {
            kappa,
            updaters,
            kappa_evaluations,
            function_evaluations,
        })
    };

    for k in 1..=max_k {
        log::debug!("prediction: searching k={k} over {group_count} learning groups");
        let step_start = Instant::now();
        let (kappa, updaters, kappa_evaluations, function_evaluations) =
            run_step(&model, &positions, k, threads, &interrupt, line_step)?;

        let result = SearchResult {
            k,
            updaters,
            kappa,
            time_seconds: step_start.elapsed().as_secs_f64(),
            kappa_evaluations,
            function_evaluations,
        };
        log::debug!("prediction: k={k} best kappa={:.4}", result.kappa);
        if !progress(&result) {
            return Err(Error::Cancelled);
        }
        results.push(result);
    }

    Ok(results)
}
