//! Interval domain
//!
//! Numeric values are approximated by ranges `[a, b]` over the extended
//! reals. Containers are summarized by length, key and value ranges.

pub mod evaluation;
pub mod lattice;
pub mod state;

pub use evaluation::{evaluate, length, refine, NumericEnvironment, Refinement, View};
pub use lattice::IntervalLattice;
pub use state::IntervalState;
