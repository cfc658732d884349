mod dataset;
mod subsets;

pub use dataset::Options;
pub use subsets::Subsets;
