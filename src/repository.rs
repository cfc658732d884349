use std::fs;
use std::path::Path;
use std::sync::Arc;

use itertools::Itertools;
use ndarray::Array2;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::io;
use crate::model::{Evaluator, Model};
use crate::options::Options;
use crate::search::{self, SearchResult};
use crate::stats::{ConfusionMatrix, Kappa};

/// Basic-attribute names and scale cardinalities, in leaf order.
#[derive(Debug, Clone, Serialize)]
pub struct Information {
    /// Basic attribute names, in model leaf order.
    pub basic_attribute_names: Vec<String>,
    /// Basic attribute scale cardinalities, aligned with `basic_attribute_names`.
    pub basic_attribute_scale_sizes: Vec<usize>,
}

/// The outcome of evaluating an options dataset against a model's unmodified tables.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResults {
    /// Basic-value rows, in option order, leaf-column order.
    pub options_matrix: Vec<Vec<u8>>,
    /// Basic attribute names, aligned to `options_matrix` columns.
    pub attributes_matrix: Vec<String>,
    /// Simulated root value per row.
    pub simulations: Vec<u8>,
    /// Observed root value per row.
    pub observations: Vec<u8>,
    /// `C x C` confusion matrix, `confusion[observed][simulated]`.
    pub confusion: Vec<Vec<f64>>,
    /// Linear-weighted Cohen's kappa.
    pub linear_kappa: f64,
    /// Squared-weighted Cohen's kappa.
    pub squared_kappa: f64,
}

/// Owns model and options I/O, validates inputs, and wraps every failure as
/// a typed [`Error`]; the only layer permitted to touch the filesystem.
pub struct Repository {
    model: Arc<Model>,
}

impl Repository {
    /// Parses and validates a model from its file.
    pub fn load_model(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).map_err(|_| Error::FileError(path.display().to_string()))?;
        let model = io::parse_model(&text)?;
        Ok(Self::new(model))
    }

    /// Wraps an already-built, already-validated model.
    pub fn new(model: Model) -> Self {
        Self { model: Arc::new(model) }
    }

    /// The wrapped model.
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Loads an options dataset from its file against this repository's model.
    pub fn load_options(&self, path: impl AsRef<Path>) -> Result<Options> {
        let path = path.as_ref();
        let file =
            fs::File::open(path).map_err(|_| Error::FileError(path.display().to_string()))?;
        io::read_options(file, &self.model)
    }

    /// Writes an options dataset to its file, in the schema [`Repository::load_options`] reads.
    pub fn save_options(&self, path: impl AsRef<Path>, options: &Options) -> Result<()> {
        let path = path.as_ref();
        let file =
            fs::File::create(path).map_err(|_| Error::FileError(path.display().to_string()))?;
        io::write_options(file, &self.model, options)
    }

    /// Basic attribute names and scale cardinalities, in leaf order.
    pub fn information(&self) -> Information {
        let basic_attribute_names = self
            .model
            .leaves()
            .iter()
            .map(|&i| self.model.attributes()[i].name.clone())
            .collect();
        let basic_attribute_scale_sizes = self
            .model
            .leaves()
            .iter()
            .map(|&i| self.model.attributes()[i].scale.len())
            .collect();
        Information { basic_attribute_names, basic_attribute_scale_sizes }
    }

    /// Evaluates `options` against the model's unmodified aggregation tables.
    pub fn evaluate(&self, options: &Options) -> Result<EvaluationResults> {
        let evaluator = Evaluator::compile(&self.model);
        let tables = self.model.tables();

        let mut options_matrix = Vec::with_capacity(options.len());
        let mut simulations = Vec::with_capacity(options.len());
        for i in 0..options.len() {
            let row: Vec<u8> = options.row(i).to_vec();
            simulations.push(evaluator.evaluate(&self.model, &tables, &row)?);
            options_matrix.push(row);
        }
        let observations = options.observed().to_vec();

        let classes = self.model.class_count();
        let confusion = ConfusionMatrix::new(
            classes,
            observations.iter().map(|&v| v as usize),
            simulations.iter().map(|&v| v as usize),
        )?;
        let linear_kappa = Kappa::linear(classes, &observations, &simulations)?;
        let squared_kappa = Kappa::squared(classes, &observations, &simulations)?;

        let attributes_matrix = self
            .model
            .leaves()
            .iter()
            .map(|&i| self.model.attributes()[i].name.clone())
            .collect();

        Ok(EvaluationResults {
            options_matrix,
            attributes_matrix,
            simulations,
            observations,
            confusion: confusion.counts().rows().into_iter().map(|r| r.to_vec()).collect(),
            linear_kappa,
            squared_kappa,
        })
    }

    /// Searches increasing edit-tuple sizes to maximize squared kappa over `options`.
    /// See [`search::adjustment`] for the full contract.
    pub fn adjustment(
        &self,
        options: &Options,
        line_limit: i64,
        reduce_mode: bool,
        threads: usize,
        progress: impl FnMut(&SearchResult) -> bool,
        interrupt: impl Fn() -> bool + Sync,
    ) -> Result<Vec<SearchResult>> {
        search::adjustment(
            Arc::clone(&self.model),
            options,
            line_limit,
            reduce_mode,
            threads,
            progress,
            interrupt,
        )
    }

    /// Leave-subset-out prediction search. See [`search::prediction`] for the full contract.
    pub fn prediction(
        &self,
        options: &Options,
        line_limit: i64,
        reduce_mode: bool,
        threads: usize,
        progress: impl FnMut(&SearchResult) -> bool,
        interrupt: impl Fn() -> bool + Sync,
    ) -> Result<Vec<SearchResult>> {
        search::prediction(
            Arc::clone(&self.model),
            options,
            line_limit,
            reduce_mode,
            threads,
            progress,
            interrupt,
        )
    }

    /// Builds the model's implied option template: one row per combination of
    /// basic values (the full enumeration of model variants), `observed` set
    /// from the model's own evaluation of that row, so `evaluate` on the
    /// result always yields squared kappa = 1.
    pub fn extract_options(&self) -> Result<Options> {
        let evaluator = Evaluator::compile(&self.model);
        let tables = self.model.tables();
        let leaves = self.model.leaves();
        let ranges: Vec<Vec<u8>> = leaves
            .iter()
            .map(|&leaf| (0..self.model.attributes()[leaf].scale.len() as u8).collect())
            .collect();

        let mut values = Vec::new();
        let mut observed = Vec::new();
        let mut simulation = Vec::new();
        let mut department = Vec::new();
        let mut year = Vec::new();

        let variants = ranges.iter().map(|r| r.iter().copied()).multi_cartesian_product();
        for (idx, row) in variants.enumerate() {
            observed.push(evaluator.evaluate(&self.model, &tables, &row)?);
            values.extend_from_slice(&row);
            simulation.push(format!("variant-{idx}"));
            department.push(0i64);
            year.push(0i64);
        }

        let n = observed.len();
        let matrix = Array2::from_shape_vec((n, leaves.len()), values)
            .map_err(|e| Error::InternalError(e.to_string()))?;
        Options::new(matrix, observed, simulation, department, year, None, &self.model)
    }

    /// Concatenates two options datasets row-wise; both must share the
    /// model's leaf count and agree on whether a `place` column is present.
    pub fn merge_options(&self, a: &Options, b: &Options) -> Result<Options> {
        if a.leaf_count() != b.leaf_count() {
            return Err(Error::OptionsInconsistent(
                "cannot merge options with different leaf counts".into(),
            ));
        }
        if a.place().is_some() != b.place().is_some() {
            return Err(Error::OptionsInconsistent(
                "cannot merge options where only one side carries a place column".into(),
            ));
        }

        let mut matrix = Array2::<u8>::zeros((a.len() + b.len(), a.leaf_count()));
        for i in 0..a.len() {
            matrix.row_mut(i).assign(&a.row(i));
        }
        for i in 0..b.len() {
            matrix.row_mut(a.len() + i).assign(&b.row(i));
        }

        let observed = [a.observed(), b.observed()].concat();
        let simulation = [a.simulation(), b.simulation()].concat();
        let department = [a.department(), b.department()].concat();
        let year = [a.year(), b.year()].concat();
        let place = match (a.place(), b.place()) {
            (Some(pa), Some(pb)) => Some([pa, pb].concat()),
            _ => None,
        };

        Options::new(matrix, observed, simulation, department, year, place, &self.model)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array1;

    use super::*;
    use crate::model::{Attribute, Scale};

    fn toy_model() -> Model {
        let a = Attribute::leaf("a", Scale::new(true, ["lo", "hi"]).unwrap());
        let b = Attribute::leaf("b", Scale::new(true, ["lo", "mid", "hi"]).unwrap());
        let root_scale = Scale::new(true, ["bad", "good"]).unwrap();
        let table = Array1::from(vec![0u8, 0, 0, 1, 1, 1]);
        let root = Attribute::inner("root", root_scale, vec![1, 2], vec![2, 3], table).unwrap();
        Model::new(vec![root, a, b]).unwrap()
    }

    #[test]
    fn information_lists_leaves_in_order() {
        let repository = Repository::new(toy_model());
        let info = repository.information();
        assert_eq!(info.basic_attribute_names, vec!["a", "b"]);
        assert_eq!(info.basic_attribute_scale_sizes, vec![2, 3]);
    }

    #[test]
    fn extract_options_round_trips_to_perfect_kappa() {
        let repository = Repository::new(toy_model());
        let options = repository.extract_options().unwrap();
        assert_eq!(options.len(), 2 * 3);
        let results = repository.evaluate(&options).unwrap();
        assert_eq!(results.squared_kappa, 1.0);
    }

    #[test]
    fn merge_options_concatenates_rows() {
        let model = toy_model();
        let repository = Repository::new(model.clone());
        let matrix_a = Array2::from_shape_vec((1, 2), vec![0u8, 0]).unwrap();
        let a = Options::new(
            matrix_a,
            vec![0],
            vec!["s1".into()],
            vec![1],
            vec![2020],
            None,
            &model,
        )
        .unwrap();
        let matrix_b = Array2::from_shape_vec((1, 2), vec![1u8, 2]).unwrap();
        let b = Options::new(
            matrix_b,
            vec![1],
            vec!["s2".into()],
            vec![2],
            vec![2021],
            None,
            &model,
        )
        .unwrap();
        let merged = repository.merge_options(&a, &b).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.row(1)[0], 1);
    }

    #[test]
    fn merge_options_rejects_mismatched_place_presence() {
        let model = toy_model();
        let repository = Repository::new(model.clone());
        let matrix_a = Array2::from_shape_vec((1, 2), vec![0u8, 0]).unwrap();
        let a = Options::new(
            matrix_a,
            vec![0],
            vec!["s1".into()],
            vec![1],
            vec![2020],
            Some(vec!["here".into()]),
            &model,
        )
        .unwrap();
        let matrix_b = Array2::from_shape_vec((1, 2), vec![1u8, 2]).unwrap();
        let b = Options::new(
            matrix_b,
            vec![1],
            vec!["s2".into()],
            vec![2],
            vec![2021],
            None,
            &model,
        )
        .unwrap();
        assert!(repository.merge_options(&a, &b).is_err());
    }
}
