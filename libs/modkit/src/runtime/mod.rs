mod runner;
pub mod shutdown;

pub use runner::{run, run_phases, RunOptions, ShutdownOptions};
