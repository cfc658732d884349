use ndarray::{Array2, ArrayView1};

use crate::error::{Error, Result};
use crate::model::Model;

/// A dense matrix of basic-attribute scale values with per-row observed
/// outcome and provenance.
#[derive(Debug, Clone)]
pub struct Options {
    matrix: Array2<u8>,
    observed: Vec<u8>,
    simulation: Vec<String>,
    department: Vec<i64>,
    year: Vec<i64>,
    place: Option<Vec<String>>,
}

impl Options {
    /// Builds and validates an options dataset against `model`.
    ///
    /// Validates: `matrix` has `model.leaf_count()` columns; every cell is
    /// within its leaf's scale; every `observed` value is within the root
    /// scale; all provenance vectors have matching length `N`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        matrix: Array2<u8>,
        observed: Vec<u8>,
        simulation: Vec<String>,
        department: Vec<i64>,
        year: Vec<i64>,
        place: Option<Vec<String>>,
        model: &Model,
    ) -> Result<Self> {
        let n = matrix.nrows();
        let leaves = model.leaves();

        if matrix.ncols() != leaves.len() {
            return Err(Error::OptionsInconsistent(format!(
                "options matrix has {} columns, model has {} leaves",
                matrix.ncols(),
                leaves.len()
            )));
        }
        for (field, len) in [
            ("observed", observed.len()),
            ("simulation", simulation.len()),
            ("department", department.len()),
            ("year", year.len()),
        ] {
            if len != n {
                return Err(Error::OptionsInconsistent(format!(
                    "{} has length {}, expected {}",
                    field, len, n
                )));
            }
        }
        if let Some(place) = &place {
            if place.len() != n {
                return Err(Error::OptionsInconsistent(format!(
                    "place has length {}, expected {}",
                    place.len(),
                    n
                )));
            }
        }

        for (j, &leaf) in leaves.iter().enumerate() {
            let scale_size = model.attributes()[leaf].scale.len();
            for i in 0..n {
                if matrix[[i, j]] as usize >= scale_size {
                    return Err(Error::OptionsInconsistent(format!(
                        "row {} column {} value {} out of range for scale size {}",
                        i, j, matrix[[i, j]], scale_size
                    )));
                }
            }
        }
        let class_count = model.class_count();
        for (i, &value) in observed.iter().enumerate() {
            if value as usize >= class_count {
                return Err(Error::OptionsInconsistent(format!(
                    "row {} observed value {} out of range for {} classes",
                    i, value, class_count
                )));
            }
        }

        Ok(Self {
            matrix,
            observed,
            simulation,
            department,
            year,
            place,
        })
    }

    /// Number of rows, `N`.
    pub fn len(&self) -> usize {
        self.matrix.nrows()
    }

    /// Whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.matrix.nrows() == 0
    }

    /// Number of leaf columns, `L`.
    pub fn leaf_count(&self) -> usize {
        self.matrix.ncols()
    }

    /// Basic-value row `i`, in model leaf order.
    pub fn row(&self, i: usize) -> ArrayView1<u8> {
        self.matrix.row(i)
    }

    /// Observed root value per row.
    pub fn observed(&self) -> &[u8] {
        &self.observed
    }

    /// Simulation identifier per row.
    pub fn simulation(&self) -> &[String] {
        &self.simulation
    }

    /// Department per row.
    pub fn department(&self) -> &[i64] {
        &self.department
    }

    /// Year per row.
    pub fn year(&self) -> &[i64] {
        &self.year
    }

    /// Place per row, if the dataset carries a place column.
    pub fn place(&self) -> Option<&[String]> {
        self.place.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array1;

    use super::*;
    use crate::model::{Attribute, Scale};

    fn toy_model() -> Model {
        let a = Attribute::leaf("a", Scale::new(true, ["lo", "hi"]).unwrap());
        let root_scale = Scale::new(true, ["bad", "good"]).unwrap();
        let table = Array1::from(vec![0u8, 1]);
        let root = Attribute::inner("root", root_scale, vec![1], vec![2], table).unwrap();
        Model::new(vec![root, a]).unwrap()
    }

    #[test]
    fn rejects_out_of_range_leaf_value() {
        let model = toy_model();
        let matrix = Array2::from_shape_vec((1, 1), vec![5u8]).unwrap();
        let result = Options::new(
            matrix,
            vec![0],
            vec!["s1".into()],
            vec![1],
            vec![2020],
            None,
            &model,
        );
        assert!(result.is_err());
    }

    #[test]
    fn accepts_well_formed_dataset() {
        let model = toy_model();
        let matrix = Array2::from_shape_vec((2, 1), vec![0u8, 1]).unwrap();
        let options = Options::new(
            matrix,
            vec![0, 1],
            vec!["s1".into(), "s2".into()],
            vec![1, 2],
            vec![2020, 2021],
            None,
            &model,
        )
        .unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options.row(1)[0], 1);
    }
}
