mod attribute;
mod evaluator;
mod model;
mod scale;

pub use attribute::Attribute;
pub use evaluator::{evaluate_recursive, Evaluator, OpCode};
pub(crate) use evaluator::evaluate_recursive_at;
pub use model::{Model, Tables};
pub use scale::{Scale, MAX_SCALE_SIZE};

/// Encodes a tuple of child values into a flat row index of a mixed-radix table.
///
/// Radix mixing places the last index as the least-significant digit, matching
/// the aggregation table's row-major child-value layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RavelMultiIndex {
    cardinality: Vec<usize>,
    ravel: Vec<usize>,
    size: usize,
}

impl RavelMultiIndex {
    /// Builds a ravel index from the cardinality (scale size) of each digit.
    #[inline]
    pub fn new<I>(cardinality: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let cardinality = Vec::from_iter(cardinality);

        assert!(!cardinality.is_empty(), "ravel multi index must not be empty");
        assert!(
            cardinality.iter().all(|&x| x > 0),
            "ravel multi index digits must be strictly positive"
        );

        let size = cardinality.iter().product();

        let mut ravel = vec![1; cardinality.len()];
        for i in (1..ravel.len()).rev() {
            ravel[i - 1] = ravel[i] * cardinality[i];
        }

        Self {
            cardinality,
            ravel,
            size,
        }
    }

    /// Flattens a multi-index tuple into a row index.
    #[inline]
    pub fn call<I>(&self, multi_index: I) -> usize
    where
        I: IntoIterator<Item = usize>,
    {
        self.ravel.iter().zip(multi_index).map(|(i, j)| i * j).sum()
    }

    /// Per-digit cardinalities, in digit order.
    #[inline]
    pub fn cardinality(&self) -> &[usize] {
        &self.cardinality
    }

    /// Total number of rows, `∏ cardinality`.
    #[allow(clippy::len_without_is_empty)]
    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ravels_last_digit_fastest() {
        // Two children with scale sizes 3 and 2: rows = 6.
        let ravel = RavelMultiIndex::new([3, 2]);
        assert_eq!(ravel.len(), 6);
        assert_eq!(ravel.call([0, 0]), 0);
        assert_eq!(ravel.call([0, 1]), 1);
        assert_eq!(ravel.call([1, 0]), 2);
        assert_eq!(ravel.call([2, 1]), 5);
    }
}
