//! Schema module - Configuration, progress and result types for the search.

mod evolution;
mod run;

pub use evolution::*;
pub use run::*;
