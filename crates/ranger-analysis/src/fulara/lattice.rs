//! Fulara segmented container lattice
//!
//! A container is abstracted by a set of segments `(key, value)`: every key
//! the container holds inside a segment's key region maps to a value described
//! by the segment's value. Keys outside every segment are absent.
//!
//! - Bottom (⊥) = no container is possible
//! - Empty = no segments, the empty container
//! - Top (⊤) = a single segment `(⊤, ⊤)`
//!
//! Segment keys are pairwise disjoint and no segment has a bottom component.

use super::wrappers::{KeyWrapper, ValueWrapper};
use ranger_core::Lattice;
use std::fmt;
use tracing::trace;

fn overlaps<K: Lattice>(a: &K, b: &K) -> bool {
    !a.clone().meet(b.clone()).is_bottom()
}

#[derive(Debug, Clone)]
pub struct FularaLattice<K, V> {
    key_proto: K,
    value_proto: V,
    /// `None` is bottom.
    segments: Option<Vec<(K, V)>>,
}

impl<K: KeyWrapper, V: ValueWrapper> FularaLattice<K, V> {
    /// Any container: the single segment `(⊤, ⊤)`.
    pub fn new(key_proto: K, value_proto: V) -> Self {
        let segments = vec![(key_proto.top(), value_proto.top())];
        Self {
            key_proto,
            value_proto,
            segments: Some(segments),
        }
    }

    /// The empty container.
    pub fn empty(key_proto: K, value_proto: V) -> Self {
        Self {
            key_proto,
            value_proto,
            segments: Some(Vec::new()),
        }
    }

    /// Build from segments, merging overlapping ones.
    pub fn from_segments(key_proto: K, value_proto: V, segments: Vec<(K, V)>) -> Self {
        let segments = Self::d_norm(Vec::new(), segments);
        Self {
            key_proto,
            value_proto,
            segments: Some(segments),
        }
    }

    pub fn segments(&self) -> Option<&[(K, V)]> {
        self.segments.as_deref()
    }

    /// Known to hold no keys.
    pub fn is_empty(&self) -> bool {
        self.segments.as_ref().is_some_and(Vec::is_empty)
    }

    fn with_segments(&self, segments: Vec<(K, V)>) -> Self {
        let result = Self {
            key_proto: self.key_proto.clone(),
            value_proto: self.value_proto.clone(),
            segments: Some(segments),
        };
        debug_assert!(result.is_disjoint(), "overlapping segments in {result:?}");
        result
    }

    fn is_disjoint(&self) -> bool {
        let Some(segments) = &self.segments else {
            return true;
        };
        segments.iter().enumerate().all(|(i, (k1, v1))| {
            !k1.is_bottom() && !v1.is_bottom() && segments[i + 1..].iter().all(|(k2, _)| !overlaps(k1, k2))
        })
    }

    /// Fold `candidates` into the pairwise disjoint `known`.
    ///
    /// A candidate overlapping a known segment is replaced by the join of both,
    /// which is folded in again against the remaining segments.
    pub fn d_norm(known: Vec<(K, V)>, candidates: Vec<(K, V)>) -> Vec<(K, V)> {
        let mut result = known;
        let mut pending: Vec<(K, V)> = candidates.into_iter().rev().collect();
        while let Some((key, value)) = pending.pop() {
            if key.is_bottom() || value.is_bottom() {
                continue;
            }
            match result.iter().position(|(k, _)| overlaps(k, &key)) {
                Some(index) => {
                    let (k, v) = result.remove(index);
                    pending.push((k.join(key), v.join(value)));
                }
                None => result.push((key, value)),
            }
        }
        result
    }

    /// Weak update: `key` may now map to `value`, merged into overlapping segments.
    pub fn normalized_add(self, key: K, value: V) -> Self {
        let Some(segments) = self.segments.clone() else {
            return self;
        };
        self.with_segments(Self::d_norm(segments, vec![(key, value)]))
    }

    /// Strong update: every key in `key` maps to `value` afterwards.
    ///
    /// Overlapping segments keep only their parts outside `key`. When a key
    /// region cannot be decomposed the update degrades to
    /// [`FularaLattice::normalized_add`].
    pub fn partition_add(self, key: K, value: V) -> Self {
        let Some(segments) = &self.segments else {
            return self;
        };
        if key.is_bottom() || value.is_bottom() {
            return self;
        }
        let mut kept = Vec::with_capacity(segments.len() + 1);
        for (k, v) in segments {
            if !overlaps(k, &key) {
                kept.push((k.clone(), v.clone()));
                continue;
            }
            match k.decomp(&key) {
                Some(pieces) => kept.extend(pieces.into_iter().map(|piece| (piece, v.clone()))),
                None => {
                    trace!(?key, "key region cannot be decomposed, weak update");
                    return self.normalized_add(key, value);
                }
            }
        }
        kept.push((key, value));
        self.with_segments(kept)
    }

    /// Weak update by a set of pairwise disjoint segments.
    ///
    /// Where a new segment overlaps an existing one the overlap gets the join
    /// of both values, the rest of the existing segment keeps its value and the
    /// rest of the new segment is merged against the remaining segments.
    pub fn partition_update(self, updates: Vec<(K, V)>) -> Self {
        let Some(segments) = self.segments.clone() else {
            return self;
        };
        let mut result = segments;
        let mut pending: Vec<(K, V)> = updates.into_iter().rev().collect();
        while let Some((key, value)) = pending.pop() {
            if key.is_bottom() || value.is_bottom() {
                continue;
            }
            let Some(index) = result.iter().position(|(k, _)| overlaps(k, &key)) else {
                result.push((key, value));
                continue;
            };
            let (k, v) = result.remove(index);
            if k == key {
                result.push((k, v.join(value)));
                continue;
            }
            match (k.decomp(&key), key.decomp(&k)) {
                (Some(old_rest), Some(new_rest)) => {
                    let overlap = k.meet(key);
                    result.extend(old_rest.into_iter().map(|piece| (piece, v.clone())));
                    result.push((overlap, v.join(value.clone())));
                    pending.extend(new_rest.into_iter().map(|piece| (piece, value.clone())));
                }
                _ => {
                    trace!(?key, "key regions cannot be split, merging segments");
                    result.push((k, v));
                    result = Self::d_norm(result, vec![(key, value)]);
                }
            }
        }
        self.with_segments(result)
    }

    /// Join of every key region; bottom when there are none.
    pub fn get_keys_joined(&self) -> K {
        let keys = self.segments.iter().flatten().map(|(k, _)| k.clone());
        self.key_proto.big_join(keys)
    }

    /// Join of every value; bottom when there are none.
    pub fn get_values_joined(&self) -> V {
        let values = self.segments.iter().flatten().map(|(_, v)| v.clone());
        self.value_proto.big_join(values)
    }

    /// Join of the values of every segment overlapping `key`.
    pub fn values_at(&self, key: &K) -> V {
        let values = self
            .segments
            .iter()
            .flatten()
            .filter(|(k, _)| overlaps(k, key))
            .map(|(_, v)| v.clone());
        self.value_proto.big_join(values)
    }
}

impl<K: KeyWrapper, V: ValueWrapper> PartialEq for FularaLattice<K, V> {
    /// Segment sets compare regardless of order.
    fn eq(&self, other: &Self) -> bool {
        match (&self.segments, &other.segments) {
            (None, None) => true,
            (Some(left), Some(right)) => left.len() == right.len() && left.iter().all(|s| right.contains(s)),
            _ => false,
        }
    }
}

impl<K: KeyWrapper, V: ValueWrapper> Lattice for FularaLattice<K, V> {
    fn bottom(&self) -> Self {
        Self {
            key_proto: self.key_proto.clone(),
            value_proto: self.value_proto.clone(),
            segments: None,
        }
    }

    fn top(&self) -> Self {
        Self::new(self.key_proto.clone(), self.value_proto.clone())
    }

    fn is_bottom(&self) -> bool {
        self.segments.is_none()
    }

    fn is_top(&self) -> bool {
        matches!(self.segments.as_deref(), Some([(k, v)]) if k.is_top() && v.is_top())
    }

    /// Each segment lies inside a single segment of `other` with a larger value.
    fn do_less_equal(&self, other: &Self) -> bool {
        let (Some(mine), Some(theirs)) = (&self.segments, &other.segments) else {
            return self.segments.is_none();
        };
        mine.iter()
            .all(|(k, v)| theirs.iter().any(|(ok, ov)| k.less_equal(ok) && v.less_equal(ov)))
    }

    fn do_join(self, other: Self) -> Self {
        match (self.segments.clone(), other.segments) {
            (Some(mine), Some(theirs)) => self.with_segments(Self::d_norm(mine, theirs)),
            _ => self,
        }
    }

    fn do_meet(self, other: Self) -> Self {
        let (Some(mine), Some(theirs)) = (&self.segments, &other.segments) else {
            return self.bottom();
        };
        let mut result = Vec::new();
        for (k1, v1) in mine {
            for (k2, v2) in theirs {
                let key = k1.clone().meet(k2.clone());
                if key.is_bottom() {
                    continue;
                }
                let value = v1.clone().meet(v2.clone());
                if !value.is_bottom() {
                    result.push((key, value));
                }
            }
        }
        self.with_segments(result)
    }

    /// Widen each segment by the segments of `other` overlapping it.
    ///
    /// A segment of `other` overlapping nothing means the segmentation itself
    /// is still moving; the result then collapses to a single segment with top
    /// key and the join of all values.
    fn do_widening(self, other: Self) -> Self {
        let (Some(mine), Some(theirs)) = (&self.segments, &other.segments) else {
            return self.join(other);
        };
        if theirs.iter().any(|(ok, _)| !mine.iter().any(|(k, _)| overlaps(k, ok))) {
            trace!("segment boundaries unstable, extreme widening");
            let value = self.get_values_joined().join(other.get_values_joined());
            return self.with_segments(vec![(self.key_proto.top(), value)]);
        }
        let widened = mine
            .iter()
            .map(|(k, v)| {
                let (keys, values): (Vec<K>, Vec<V>) = theirs
                    .iter()
                    .filter(|(ok, _)| overlaps(k, ok))
                    .map(|(ok, ov)| (ok.clone(), ov.clone()))
                    .unzip();
                let key = k.clone().widening(k.big_join(keys).join(k.clone()));
                let value = v.clone().widening(v.big_join(values).join(v.clone()));
                (key, value)
            })
            .collect();
        self.with_segments(Self::d_norm(Vec::new(), widened))
    }
}

impl<K: fmt::Display, V: fmt::Display> fmt::Display for FularaLattice<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(segments) = &self.segments else {
            return write!(f, "⊥");
        };
        write!(f, "{{")?;
        for (i, (k, v)) in segments.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k} -> {v}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::super::wrappers::{IntervalKeyWrapper, IntervalValueWrapper};
    use super::*;
    use crate::interval::IntervalLattice;

    type Fulara = FularaLattice<IntervalKeyWrapper, IntervalValueWrapper>;

    fn key(lower: f64, upper: f64) -> IntervalKeyWrapper {
        IntervalKeyWrapper::integral(IntervalLattice::new(lower, upper))
    }

    fn value(lower: f64, upper: f64) -> IntervalValueWrapper {
        IntervalValueWrapper(IntervalLattice::new(lower, upper))
    }

    fn empty() -> Fulara {
        Fulara::empty(key(0.0, 0.0), value(0.0, 0.0))
    }

    fn top() -> Fulara {
        Fulara::new(key(0.0, 0.0), value(0.0, 0.0))
    }

    #[test]
    fn test_kinds() {
        assert!(top().is_top());
        assert!(empty().is_empty());
        assert!(!empty().is_bottom());
        assert!(empty().bottom().is_bottom());
        assert!(empty().less_equal(&top()));
        assert!(!top().less_equal(&empty()));
    }

    #[test]
    fn test_d_norm_merges_overlapping_chains() {
        let merged = Fulara::d_norm(
            vec![(key(0.0, 2.0), value(1.0, 1.0)), (key(5.0, 6.0), value(2.0, 2.0))],
            vec![(key(2.0, 5.0), value(3.0, 3.0)), (key(9.0, 9.0), value(0.0, 0.0))],
        );
        assert_eq!(
            merged,
            vec![(key(0.0, 6.0), value(1.0, 3.0)), (key(9.0, 9.0), value(0.0, 0.0))]
        );
    }

    #[test]
    fn test_partition_add_is_a_strong_update() {
        let d = empty()
            .partition_add(key(0.0, 9.0), value(0.0, 0.0))
            .partition_add(key(4.0, 4.0), value(7.0, 7.0));
        let segments = d.segments().unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(d.values_at(&key(4.0, 4.0)), value(7.0, 7.0));
        assert_eq!(d.values_at(&key(0.0, 3.0)), value(0.0, 0.0));
        assert_eq!(d.get_values_joined(), value(0.0, 7.0));
    }

    #[test]
    fn test_partition_add_degrades_on_real_keys() {
        let real = |l, u| IntervalKeyWrapper::real(IntervalLattice::new(l, u));
        let d = Fulara::from_segments(real(0.0, 0.0), value(0.0, 0.0), vec![(real(0.0, 9.0), value(0.0, 0.0))])
            .partition_add(real(4.0, 4.0), value(7.0, 7.0));
        assert_eq!(d.segments().unwrap(), &[(real(0.0, 9.0), value(0.0, 7.0))]);
    }

    #[test]
    fn test_normalized_add_is_a_weak_update() {
        let d = empty()
            .partition_add(key(3.0, 3.0), value(1.0, 1.0))
            .normalized_add(key(3.0, 4.0), value(5.0, 5.0));
        assert_eq!(d.segments().unwrap(), &[(key(3.0, 4.0), value(1.0, 5.0))]);
    }

    #[test]
    fn test_partition_update_splits_overlaps() {
        let d = empty()
            .partition_add(key(0.0, 4.0), value(1.0, 1.0))
            .partition_update(vec![(key(3.0, 6.0), value(9.0, 9.0))]);
        assert_eq!(d.values_at(&key(0.0, 2.0)), value(1.0, 1.0));
        assert_eq!(d.values_at(&key(3.0, 4.0)), value(1.0, 9.0));
        assert_eq!(d.values_at(&key(5.0, 6.0)), value(9.0, 9.0));
        assert_eq!(d.get_keys_joined(), key(0.0, 6.0));
        assert_eq!(d.segments().unwrap().len(), 3);
    }

    #[test]
    fn test_partition_update_joins_identical_keys() {
        let d = empty()
            .partition_add(key(2.0, 2.0), value(1.0, 1.0))
            .partition_update(vec![(key(2.0, 2.0), value(4.0, 4.0))]);
        assert_eq!(d.segments().unwrap(), &[(key(2.0, 2.0), value(1.0, 4.0))]);
    }

    #[test]
    fn test_order_allows_splitting_on_the_left_only() {
        let coarse = empty().partition_add(key(0.0, 3.0), value(0.0, 5.0));
        let fine = empty()
            .partition_add(key(0.0, 1.0), value(1.0, 1.0))
            .partition_add(key(2.0, 3.0), value(2.0, 2.0));
        assert!(fine.less_equal(&coarse));
        assert!(!coarse.less_equal(&fine));
        assert!(empty().less_equal(&fine));
    }

    #[test]
    fn test_meet_intersects_segments() {
        let a = empty().partition_add(key(0.0, 5.0), value(0.0, 10.0));
        let b = empty()
            .partition_add(key(3.0, 8.0), value(5.0, 20.0))
            .partition_add(key(9.0, 9.0), value(0.0, 0.0));
        let m = a.meet(b);
        assert_eq!(m.segments().unwrap(), &[(key(3.0, 5.0), value(5.0, 10.0))]);
    }

    #[test]
    fn test_join_then_queries() {
        let a = empty().partition_add(key(0.0, 0.0), value(1.0, 1.0));
        let b = empty().partition_add(key(0.0, 1.0), value(3.0, 3.0));
        let j = a.join(b);
        assert_eq!(j.segments().unwrap(), &[(key(0.0, 1.0), value(1.0, 3.0))]);
        assert_eq!(empty().get_keys_joined(), key(0.0, 0.0).bottom());
    }

    #[test]
    fn test_widening_pointwise_when_segments_are_stable() {
        let a = empty().partition_add(key(0.0, 1.0), value(0.0, 1.0));
        let b = empty().partition_add(key(0.0, 2.0), value(0.0, 2.0));
        let w = a.widening(b);
        assert_eq!(
            w.segments().unwrap(),
            &[(key(0.0, f64::INFINITY), value(0.0, f64::INFINITY))]
        );
    }

    #[test]
    fn test_extreme_widening_on_new_segments() {
        let a = empty().partition_add(key(0.0, 0.0), value(1.0, 1.0));
        let b = a.clone().partition_add(key(5.0, 5.0), value(2.0, 2.0));
        let w = a.widening(b);
        let segments = w.segments().unwrap();
        assert_eq!(segments.len(), 1);
        assert!(segments[0].0.is_top());
        assert_eq!(segments[0].1, value(1.0, 2.0));
    }

    #[test]
    fn test_display() {
        let d = empty().partition_add(key(1.0, 1.0), value(2.0, 2.0));
        assert_eq!(d.to_string(), "{[1, 1] -> [2, 2]}");
        assert_eq!(empty().to_string(), "{}");
        assert_eq!(empty().bottom().to_string(), "⊥");
    }
}
