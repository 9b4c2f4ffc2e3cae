// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Coordinate** - *One Cell Address in a Distribution*
//!
//! An immutable set of values holding at most one value per attribute.
//! Values are stored sorted by attribute name, so equality, hashing and
//! ordering are all structural and deterministic.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::{ReconstructionError, Result};
use crate::model::attribute::{AttributeId, Value};

/// One attribute-value combination identifying a distribution cell.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinate {
    values: Arc<[Value]>,
}

impl Coordinate {
    /// Builds a coordinate.
    ///
    /// # Errors
    /// `InvalidCoordinate` when two values share an attribute.
    pub fn new(values: impl IntoIterator<Item = Value>) -> Result<Self> {
        let mut values: Vec<Value> = values.into_iter().collect();
        values.sort();
        for pair in values.windows(2) {
            if pair[0].attribute() == pair[1].attribute() {
                return Err(ReconstructionError::coordinate(format!(
                    "attribute '{}' appears twice ({} and {})",
                    pair[0].attribute(),
                    pair[0].canonical(),
                    pair[1].canonical()
                )));
            }
        }
        Ok(Coordinate {
            values: values.into(),
        })
    }

    /// Coordinate with no values.
    pub fn empty() -> Self {
        Coordinate {
            values: Arc::from(Vec::new()),
        }
    }

    // Caller guarantees attribute-unique input.
    pub(crate) fn from_unique(mut values: Vec<Value>) -> Self {
        values.sort();
        Coordinate::from_sorted(values)
    }

    // Caller guarantees sorted, attribute-unique input.
    fn from_sorted(values: Vec<Value>) -> Self {
        debug_assert!(values.windows(2).all(|p| p[0].attribute() < p[1].attribute()));
        Coordinate {
            values: values.into(),
        }
    }

    /// Values sorted by attribute.
    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of values.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the coordinate holds no value.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Attributes of the coordinate, sorted.
    pub fn dimensions(&self) -> Vec<AttributeId> {
        self.values.iter().map(|v| v.attribute().clone()).collect()
    }

    /// Value held for `attribute`.
    pub fn get(&self, attribute: &AttributeId) -> Option<&Value> {
        self.values
            .binary_search_by(|v| v.attribute().cmp(attribute))
            .ok()
            .map(|i| &self.values[i])
    }

    /// Whether `value` is part of this coordinate.
    #[inline]
    pub fn contains(&self, value: &Value) -> bool {
        self.get(value.attribute()) == Some(value)
    }

    /// Whether every value of `values` is part of this coordinate.
    pub fn contains_all<'a>(&self, values: impl IntoIterator<Item = &'a Value>) -> bool {
        values.into_iter().all(|v| self.contains(v))
    }

    /// Whether the coordinate holds a value for each of `dimensions`.
    pub fn covers(&self, dimensions: &[AttributeId]) -> bool {
        dimensions.iter().all(|d| self.get(d).is_some())
    }

    /// Attribute -> value view.
    pub fn map(&self) -> BTreeMap<&AttributeId, &Value> {
        self.values.iter().map(|v| (v.attribute(), v)).collect()
    }

    /// Restriction to `dimensions`.
    ///
    /// # Errors
    /// `InvalidCoordinate` when one of `dimensions` is missing.
    pub fn project(&self, dimensions: &[AttributeId]) -> Result<Coordinate> {
        let mut out = Vec::with_capacity(dimensions.len());
        for d in dimensions {
            let v = self.get(d).ok_or_else(|| {
                ReconstructionError::coordinate(format!("{} has no value for '{}'", self, d))
            })?;
            out.push(v.clone());
        }
        out.sort();
        out.dedup();
        Ok(Coordinate::from_sorted(out))
    }

    /// Restriction to the attributes this coordinate shares with `dimensions`.
    pub fn restrict(&self, dimensions: &[AttributeId]) -> Coordinate {
        let out = self
            .values
            .iter()
            .filter(|v| dimensions.contains(v.attribute()))
            .cloned()
            .collect();
        Coordinate::from_sorted(out)
    }

    /// Copy with each replacement value swapped in for the value of the
    /// same attribute. Replacements for absent attributes are ignored.
    pub fn with_replaced(&self, replacements: impl IntoIterator<Item = Value>) -> Coordinate {
        let mut out: Vec<Value> = self.values.to_vec();
        for r in replacements {
            if let Ok(i) = out.binary_search_by(|v| v.attribute().cmp(r.attribute())) {
                out[i] = r;
            }
        }
        Coordinate::from_sorted(out)
    }

    /// Union with `other`.
    ///
    /// # Errors
    /// `InvalidCoordinate` when both hold a value for the same attribute.
    pub fn extend(&self, other: &Coordinate) -> Result<Coordinate> {
        Coordinate::new(self.values.iter().chain(other.values.iter()).cloned())
    }

    /// Copy with `value` added.
    ///
    /// # Errors
    /// `InvalidCoordinate` when the attribute already has a value.
    pub fn with(&self, value: Value) -> Result<Coordinate> {
        Coordinate::new(self.values.iter().cloned().chain(std::iter::once(value)))
    }
}

impl fmt::Debug for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.iter()).finish()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", v)?;
        }
        f.write_str("}")
    }
}
