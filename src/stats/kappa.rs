use ndarray::Array2;

use crate::error::{Error, Result};

/// (C-class) confusion matrix over two equal-length class-index vectors.
#[derive(Clone, Debug)]
pub struct ConfusionMatrix {
    c: Array2<f64>,
}

impl ConfusionMatrix {
    /// Builds the confusion matrix `c[obs_i, sim_i] += 1` over `classes` classes.
    pub fn new<I, J>(classes: usize, obs: I, sim: J) -> Result<Self>
    where
        I: IntoIterator<Item = usize>,
        J: IntoIterator<Item = usize>,
    {
        let mut c = Array2::zeros((classes, classes));
        let mut n = 0usize;
        for (o, s) in obs.into_iter().zip(sim) {
            c[[o, s]] += 1.;
            n += 1;
        }
        if n == 0 {
            return Err(Error::SolverError("kappa computed with N=0".into()));
        }
        Ok(Self { c })
    }

    /// Raw (unnormalized) counts, `C×C`.
    pub fn counts(&self) -> &Array2<f64> {
        &self.c
    }

    /// Total number of observations, `N`.
    pub fn total(&self) -> f64 {
        self.c.sum()
    }

    /// Overall agreement rate (`Σ diagonal / N`).
    pub fn accuracy(&self) -> f64 {
        let n = self.total();
        (0..self.c.nrows()).map(|i| self.c[[i, i]]).sum::<f64>() / n
    }
}

/// Weighting scheme for Cohen's kappa disagreement cost.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Weighting {
    /// `W[i,j] = |i - j|`.
    Linear,
    /// `W[i,j] = (i - j)^2`.
    Squared,
}

/// A reusable weighted Cohen's kappa engine.
///
/// State (`observed`, `expected`, marginals) is recomputed per call but held
/// in one place so callers don't re-derive the confusion-matrix scaffolding.
#[derive(Clone, Debug, Default)]
pub struct Kappa;

impl Kappa {
    /// Linear-weighted Cohen's kappa between two equal-length class vectors.
    pub fn linear(classes: usize, obs: &[u8], sim: &[u8]) -> Result<f64> {
        Self::weighted(classes, obs, sim, Weighting::Linear)
    }

    /// Squared-weighted Cohen's kappa between two equal-length class vectors.
    pub fn squared(classes: usize, obs: &[u8], sim: &[u8]) -> Result<f64> {
        Self::weighted(classes, obs, sim, Weighting::Squared)
    }

    /// Weighted Cohen's kappa with the given weighting scheme.
    pub fn weighted(classes: usize, obs: &[u8], sim: &[u8], weighting: Weighting) -> Result<f64> {
        if obs.len() != sim.len() {
            return Err(Error::InternalError(
                "kappa inputs must have equal length".into(),
            ));
        }
        let n = obs.len();
        if n == 0 {
            return Err(Error::SolverError("kappa computed with N=0".into()));
        }

        let mut observed = Array2::<f64>::zeros((classes, classes));
        let mut m_obs = vec![0f64; classes];
        let mut m_sim = vec![0f64; classes];
        for (&o, &s) in obs.iter().zip(sim) {
            let (o, s) = (o as usize, s as usize);
            observed[[o, s]] += 1.;
            m_obs[o] += 1.;
            m_sim[s] += 1.;
        }
        let n = n as f64;
        observed.mapv_inplace(|v| v / n);
        m_obs.iter_mut().for_each(|v| *v /= n);
        m_sim.iter_mut().for_each(|v| *v /= n);

        let weight = |i: usize, j: usize| -> f64 {
            match weighting {
                Weighting::Linear => (i as f64 - j as f64).abs(),
                Weighting::Squared => (i as f64 - j as f64).powi(2),
            }
        };

        let mut weighted_observed = 0.0;
        let mut weighted_expected = 0.0;
        for i in 0..classes {
            for j in 0..classes {
                let w = weight(i, j);
                weighted_observed += w * observed[[i, j]];
                weighted_expected += w * m_obs[i] * m_sim[j];
            }
        }

        if weighted_expected == 0.0 {
            // Both vectors constant and identical: perfect, undefined-free agreement.
            return Ok(1.0);
        }
        Ok(1.0 - weighted_observed / weighted_expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_agreement_is_one() {
        let obs = [0u8, 1, 2, 1, 0];
        assert_eq!(Kappa::squared(3, &obs, &obs).unwrap(), 1.0);
    }

    #[test]
    fn constant_identical_vectors_return_one() {
        let obs = [1u8, 1, 1, 1];
        assert_eq!(Kappa::squared(3, &obs, &obs).unwrap(), 1.0);
    }

    #[test]
    fn kappa_never_exceeds_one() {
        let obs = [0u8, 1, 2, 0, 1, 2];
        let sim = [0u8, 2, 1, 1, 0, 2];
        let kappa = Kappa::squared(3, &obs, &sim).unwrap();
        assert!(kappa <= 1.0);
    }

    #[test]
    fn weight_matrix_is_symmetric() {
        for classes in [2usize, 3, 5] {
            for i in 0..classes {
                for j in 0..classes {
                    let wij = (i as f64 - j as f64).powi(2);
                    let wji = (j as f64 - i as f64).powi(2);
                    assert_eq!(wij, wji);
                }
            }
        }
    }

    #[test]
    fn rejects_empty_input() {
        let empty: [u8; 0] = [];
        assert!(Kappa::squared(3, &empty, &empty).is_err());
    }

    #[test]
    fn confusion_matrix_accuracy_matches_diagonal_fraction() {
        let obs = [0usize, 1, 1, 0];
        let sim = [0usize, 1, 0, 0];
        let matrix = ConfusionMatrix::new(2, obs, sim).unwrap();
        assert_eq!(matrix.accuracy(), 0.75);
    }
}
