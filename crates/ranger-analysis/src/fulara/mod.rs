//! Fulara segmented container domain
//!
//! Containers are abstracted as disjoint `(key region, value)` segments over
//! pluggable key and value lattices. See [`FularaLattice`] for the segment
//! operations and [`FularaState`] for the forward analysis built on them.

pub mod lattice;
pub mod state;
pub mod wrappers;

pub use lattice::FularaLattice;
pub use state::{FularaState, IntervalFulara};
pub use wrappers::{IntervalKeyWrapper, IntervalValueWrapper, KeyWrapper, ValueWrapper};
