mod driver;
mod positions;
mod walker;

pub use driver::{adjustment, prediction, SearchResult};
pub use positions::{Position, Positions};
pub use walker::{Updater, Walker};
