//! # Ranger Analysis
//!
//! Concrete abstract domains built on `ranger-core`.
//!
//! ## Modules
//!
//! - **[`interval`]** - Interval lattice and the forward interval analysis
//! - **[`fulara`]** - Segmented container domain mapping disjoint key
//!   segments to value summaries
//! - **[`liveness`]** - Backward strongly live variable analysis
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ranger_analysis::prelude::*;
//!
//! let state = IntervalState::new(cfg.variables());
//! let result = Interpreter::forward(&cfg, InterpreterConfig::default()).analyze(state)?;
//! ```

pub mod fulara;
pub mod interval;
pub mod liveness;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::fulara::{FularaLattice, FularaState, IntervalKeyWrapper, IntervalValueWrapper, KeyWrapper, ValueWrapper};
    pub use crate::interval::{IntervalLattice, IntervalState};
    pub use crate::liveness::LivenessState;
    pub use ranger_core::{Interpreter, InterpreterConfig, Lattice, State};
}
