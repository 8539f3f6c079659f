//! Per-field value cache.
//!
//! Each field remembers the result of its last core evaluation: the location
//! it was computed at, the values, the derivatives (when they were requested
//! and came out valid) and the module clock reading at the time. Buffers are
//! kept across [`FieldCache::clear`] and only grow when a larger derivative
//! block is needed.

use fieldgraph_core::{FieldValue, Location};

#[derive(Debug)]
pub(crate) struct FieldCache {
    location: Option<Location>,
    values: Vec<f64>,
    derivatives: Vec<f64>,
    number_of_derivatives: usize,
    derivatives_requested: bool,
    derivatives_valid: bool,
    stamp: Option<u64>,
}

impl FieldCache {
    pub(crate) fn new(number_of_components: usize) -> Self {
        Self {
            location: None,
            values: vec![0.0; number_of_components],
            derivatives: Vec::new(),
            number_of_derivatives: 0,
            derivatives_requested: false,
            derivatives_valid: false,
            stamp: None,
        }
    }

    /// The cached result for `location`, if it is still current.
    ///
    /// `latest_change` is the newest change stamp in the field's upstream
    /// closure. A result computed without derivatives does not satisfy a
    /// request for them; one computed with them serves both kinds.
    pub(crate) fn lookup(&self, location: &Location, latest_change: u64) -> Option<FieldValue> {
        let stamp = self.stamp?;
        if stamp < latest_change {
            return None;
        }
        let cached_at = self.location.as_ref()?;
        if !cached_at.same_place(location) {
            return None;
        }
        let wanted = location.wants_derivatives();
        if wanted && !self.derivatives_requested {
            return None;
        }
        let values = self.values.clone();
        if wanted && self.derivatives_valid && self.number_of_derivatives == location.number_of_derivatives() {
            let count = values.len() * self.number_of_derivatives;
            Some(FieldValue::with_derivatives(
                values,
                self.derivatives[..count].to_vec(),
                self.number_of_derivatives,
            ))
        } else {
            Some(FieldValue::values_only(values))
        }
    }

    /// Copy a freshly computed result into the cache buffers.
    pub(crate) fn store(&mut self, location: &Location, value: &FieldValue, stamp: u64) {
        self.values.clear();
        self.values.extend_from_slice(&value.values);
        self.derivatives_requested = location.wants_derivatives();
        self.number_of_derivatives = 0;
        self.derivatives_valid = false;
        if self.derivatives_requested {
            if let Some(derivatives) = value.derivatives.as_deref() {
                if self.derivatives.len() < derivatives.len() {
                    self.derivatives.resize(derivatives.len(), 0.0);
                }
                self.derivatives[..derivatives.len()].copy_from_slice(derivatives);
                self.number_of_derivatives = value.number_of_derivatives;
                self.derivatives_valid = true;
            }
        }
        self.location = Some(location.clone());
        self.stamp = Some(stamp);
    }

    /// Forget the cached result without releasing buffers.
    pub(crate) fn clear(&mut self) {
        self.stamp = None;
        self.derivatives_valid = false;
        self.location = None;
    }

    pub(crate) fn stamp(&self) -> Option<u64> {
        self.stamp
    }

    /// Whether a result is held that is no older than `latest_change`.
    pub(crate) fn is_current(&self, latest_change: u64) -> bool {
        self.stamp.is_some_and(|stamp| stamp >= latest_change)
    }

    pub(crate) fn derivatives_valid(&self) -> bool {
        self.derivatives_valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldgraph_core::{Element, ElementId, NodeId};

    fn square_location(xi: [f64; 2]) -> Location {
        let element = Element::new(ElementId(1), vec![NodeId(1), NodeId(2), NodeId(3), NodeId(4)]).unwrap();
        Location::element_xi(element, &xi, 0.0).unwrap()
    }

    #[test]
    fn hit_requires_same_place_and_fresh_stamp() {
        let mut cache = FieldCache::new(1);
        let here = square_location([0.5, 0.5]);
        cache.store(&here, &FieldValue::values_only(vec![3.0]), 4);
        assert_eq!(cache.lookup(&here, 4).unwrap().values, vec![3.0]);
        assert!(cache.lookup(&here, 5).is_none());
        assert!(cache.lookup(&square_location([0.5, 0.25]), 4).is_none());
    }

    #[test]
    fn derivative_request_needs_derivative_computation() {
        let mut cache = FieldCache::new(1);
        let plain = square_location([0.5, 0.5]);
        let with = plain.clone().with_derivatives(true);
        cache.store(&plain, &FieldValue::values_only(vec![1.0]), 1);
        assert!(cache.lookup(&with, 1).is_none());

        let value = FieldValue::with_derivatives(vec![1.0], vec![2.0, 3.0], 2);
        cache.store(&with, &value, 2);
        assert_eq!(cache.lookup(&with, 2), Some(value));
        let stripped = cache.lookup(&plain, 2).unwrap();
        assert!(!stripped.has_derivatives());
    }

    #[test]
    fn degraded_derivatives_are_served_as_invalid() {
        let mut cache = FieldCache::new(2);
        let with = square_location([0.1, 0.2]).with_derivatives(true);
        cache.store(&with, &FieldValue::values_only(vec![1.0, 2.0]), 1);
        assert!(!cache.derivatives_valid());
        let hit = cache.lookup(&with, 1).unwrap();
        assert_eq!(hit.values, vec![1.0, 2.0]);
        assert!(!hit.has_derivatives());
    }

    #[test]
    fn clear_keeps_buffers() {
        let mut cache = FieldCache::new(1);
        let with = square_location([0.5, 0.5]).with_derivatives(true);
        cache.store(&with, &FieldValue::with_derivatives(vec![1.0], vec![0.5, 0.5], 2), 1);
        cache.clear();
        assert!(cache.stamp().is_none());
        assert!(!cache.is_current(0));
        assert!(cache.derivatives.capacity() >= 2);
        assert!(cache.lookup(&with, 0).is_none());
    }
}
