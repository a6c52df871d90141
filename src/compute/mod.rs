//! Compute module - Effect rendering, similarity scoring and evolutionary search.

mod cabinet;
mod chain;
mod effects;
mod similarity;

pub mod evolution;

pub use cabinet::*;
pub use chain::*;
pub use effects::*;
pub use similarity::*;
