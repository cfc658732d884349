use indexmap::IndexMap;

use super::Options;

/// Provenance key: department, year, and optional place.
type Key = (i64, i64, Option<String>);

/// Per-row learning subsets used by the prediction search driver.
///
/// `subset[i]` is the set of rows `j != i` whose provenance is fully disjoint
/// from `i`'s: different department *and* different year (and different
/// place when places are present), the literal "AND of all present
/// provenance fields" reading.
#[derive(Debug, Clone)]
pub struct Subsets {
    subset: Vec<Vec<usize>>,
    reduced_id: Vec<usize>,
}

impl Subsets {
    /// Derives learning subsets from an options dataset's provenance fields.
    pub fn build(options: &Options) -> Self {
        let n = options.len();
        let keys: Vec<Key> = (0..n)
            .map(|i| {
                (
                    options.department()[i],
                    options.year()[i],
                    options.place().map(|p| p[i].clone()),
                )
            })
            .collect();

        // Group rows by identical provenance key: rows sharing a key produce
        // an identical subset, since disjointness only depends on the key.
        let mut groups: IndexMap<Key, Vec<usize>> = IndexMap::new();
        for (i, key) in keys.iter().enumerate() {
            groups.entry(key.clone()).or_default().push(i);
        }
        let group_keys: Vec<&Key> = groups.keys().collect();

        let disjoint = |a: &Key, b: &Key| -> bool {
            let dept_differs = a.0 != b.0;
            let year_differs = a.1 != b.1;
            let place_differs = match (&a.2, &b.2) {
                (Some(x), Some(y)) => x != y,
                _ => true,
            };
            dept_differs && year_differs && place_differs
        };

        let mut reduced_id = vec![0usize; n];
        let mut subset = vec![Vec::new(); n];

        for (gi, &group_key) in group_keys.iter().enumerate() {
            let mut peers = Vec::new();
            for (gj, other_key) in group_keys.iter().enumerate() {
                if gi == gj {
                    continue;
                }
                if disjoint(group_key, other_key) {
                    peers.extend_from_slice(&groups[*other_key]);
                }
            }
            for &i in &groups[*group_key] {
                reduced_id[i] = gi;
                subset[i] = peers.clone();
            }
        }

        Self { subset, reduced_id }
    }

    /// Learning subset for row `i`: other rows with fully disjoint provenance.
    pub fn subset(&self, i: usize) -> &[usize] {
        &self.subset[i]
    }

    /// Canonical group id shared by rows with identical learning subsets.
    pub fn reduced_id(&self, i: usize) -> usize {
        self.reduced_id[i]
    }

    /// Whether every row has a non-empty learning subset.
    pub fn all_trainable(&self) -> bool {
        self.subset.iter().all(|s| !s.is_empty())
    }

    /// Number of distinct provenance groups, one past the highest `reduced_id`.
    pub fn group_count(&self) -> usize {
        self.reduced_id.iter().max().map_or(0, |&m| m + 1)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;
    use crate::model::{Attribute, Model, Scale};
    use ndarray::Array1;

    fn toy_model() -> Model {
        let a = Attribute::leaf("a", Scale::new(true, ["lo", "hi"]).unwrap());
        let root_scale = Scale::new(true, ["bad", "good"]).unwrap();
        let table = Array1::from(vec![0u8, 1]);
        let root = Attribute::inner("root", root_scale, vec![1], vec![2], table).unwrap();
        Model::new(vec![root, a]).unwrap()
    }

    #[test]
    fn excludes_rows_sharing_any_provenance_field() {
        let model = toy_model();
        let matrix = Array2::from_shape_vec((3, 1), vec![0u8, 1, 0]).unwrap();
        let options = Options::new(
            matrix,
            vec![0, 1, 0],
            vec!["s1".into(), "s2".into(), "s3".into()],
            vec![1, 1, 2],
            vec![2020, 2021, 2022],
            None,
            &model,
        )
        .unwrap();
        let subsets = Subsets::build(&options);
        // Row 0 (dept 1, year 2020) vs row 1 (dept 1, year 2021): same dept -> excluded.
        assert!(!subsets.subset(0).contains(&1));
        // Row 0 vs row 2 (dept 2, year 2022): both differ -> included.
        assert!(subsets.subset(0).contains(&2));
    }

    #[test]
    fn rows_with_identical_provenance_share_reduced_id() {
        let model = toy_model();
        let matrix = Array2::from_shape_vec((2, 1), vec![0u8, 1]).unwrap();
        let options = Options::new(
            matrix,
            vec![0, 1],
            vec!["s1".into(), "s2".into()],
            vec![1, 1],
            vec![2020, 2020],
            None,
            &model,
        )
        .unwrap();
        let subsets = Subsets::build(&options);
        assert_eq!(subsets.reduced_id(0), subsets.reduced_id(1));
    }
}
