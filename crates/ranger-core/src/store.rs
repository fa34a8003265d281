//! Lifting of a lattice to a variable environment
//!
//! A [`Store`] maps every tracked [`VariableIdentifier`] (including the
//! length/keys/values identifiers of containers) to one lattice element and
//! orders, joins, meets and widens pointwise. Entries keep insertion order so
//! that results and their rendering are deterministic.

use crate::expressions::{Role, VariableIdentifier};
use crate::lattice::{EnvironmentLattice, Lattice};
use indexmap::IndexMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Store<L> {
    entries: IndexMap<VariableIdentifier, L>,
}

impl<L: Lattice> Store<L> {
    /// Create a store with one entry per variable, built by `lattice`.
    pub fn new<I, F>(variables: I, mut lattice: F) -> Self
    where
        I: IntoIterator<Item = VariableIdentifier>,
        F: FnMut(&VariableIdentifier) -> L,
    {
        let entries = variables
            .into_iter()
            .map(|variable| {
                let element = lattice(&variable);
                (variable, element)
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, variable: &VariableIdentifier) -> Option<&L> {
        self.entries.get(variable)
    }

    pub fn set(&mut self, variable: VariableIdentifier, element: L) {
        self.entries.insert(variable, element);
    }

    pub fn contains(&self, variable: &VariableIdentifier) -> bool {
        self.entries.contains_key(variable)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VariableIdentifier, &L)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn map(self, f: impl Fn(L) -> L) -> Self {
        Self {
            entries: self.entries.into_iter().map(|(k, v)| (k, f(v))).collect(),
        }
    }

    fn zip_with(self, other: Self, f: impl Fn(L, L) -> L) -> Self {
        debug_assert!(
            self.entries.keys().eq(other.entries.keys()),
            "pointwise operation on stores with different variables"
        );
        let mut other = other.entries;
        let entries = self
            .entries
            .into_iter()
            .map(|(k, v)| {
                let combined = match other.swap_remove(&k) {
                    Some(w) => f(v, w),
                    None => v,
                };
                (k, combined)
            })
            .collect();
        Self { entries }
    }
}

impl<L: Lattice> Lattice for Store<L> {
    fn bottom(&self) -> Self {
        self.clone().map(|v| v.bottom())
    }

    fn top(&self) -> Self {
        self.clone().map(|v| v.top())
    }

    /// Bottom as soon as one entry other than a length is bottom.
    fn is_bottom(&self) -> bool {
        self.entries
            .iter()
            .any(|(k, v)| k.role != Role::Length && v.is_bottom())
    }

    fn is_top(&self) -> bool {
        self.entries.values().all(Lattice::is_top)
    }

    fn do_less_equal(&self, other: &Self) -> bool {
        self.entries.iter().all(|(k, v)| match other.entries.get(k) {
            Some(w) => v.less_equal(w),
            None => false,
        })
    }

    fn do_join(self, other: Self) -> Self {
        self.zip_with(other, Lattice::join)
    }

    fn do_meet(self, other: Self) -> Self {
        self.zip_with(other, Lattice::meet)
    }

    fn do_widening(self, other: Self) -> Self {
        self.zip_with(other, Lattice::widening)
    }
}

impl<L: Lattice> EnvironmentLattice for Store<L> {
    type Element = L;

    fn variables(&self) -> Vec<&VariableIdentifier> {
        self.entries.keys().collect()
    }

    fn add_variable(&mut self, variable: VariableIdentifier, element: L) {
        self.entries.insert(variable, element);
    }

    fn remove_variable(&mut self, variable: &VariableIdentifier) -> Option<L> {
        self.entries.shift_remove(variable)
    }
}

impl<L: fmt::Display> fmt::Display for Store<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k} -> {v}")?;
        }
        Ok(())
    }
}
