mod coordinator;

pub use coordinator::{run_step, LineOutcome};
