//! Strongly live variable analysis
//!
//! A backward analysis: a variable is strongly live when its current value may
//! flow into a condition, an output, or the definition of another strongly
//! live variable. Assignments to dead variables do not make their operands
//! live.

pub mod state;

pub use state::LivenessState;
