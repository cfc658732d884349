mod kappa;

pub use kappa::{ConfusionMatrix, Kappa, Weighting};
