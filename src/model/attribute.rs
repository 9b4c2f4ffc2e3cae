// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Attribute Space** - *Discrete Demographic Value Domains*
//!
//! Attributes, their values, and the per-scenario [`AttributeRegistry`] that
//! owns them.
//!
//! ## Attribute Kinds
//! - **Unique**: plain categorical domain (`sex`, `occupation`)
//! - **Range**: numeric buckets (`age` as `0:5`, `5:10`, ...)
//! - **Aggregated**: coarser re-expression of a referent (`age_group` over `age`)
//! - **Record**: pass-through placeholder mirroring a referent's domain
//!
//! Values are keyed by `(attribute, canonical)`. The attribute part is a
//! name handle, never the owning [`Attribute`], so equality and hashing stay
//! acyclic.
//!
//! Every attribute carries an *empty value* (canonical `""`) meaning
//! "not applicable", e.g. occupation for a toddler. Empty-correlate rules in
//! the registry say which attributes turn empty when a trigger value is present.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use ahash::AHashMap;

use crate::errors::{ReconstructionError, Result};
use crate::model::coordinate::Coordinate;

/// Canonical string of every attribute's empty value.
pub const EMPTY_CANONICAL: &str = "";

/// Name handle of an attribute. Unique within a scenario, cheap to clone,
/// ordered by name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeId(Arc<str>);

impl AttributeId {
    /// Creates a handle for `name`.
    pub fn new(name: impl AsRef<str>) -> Self {
        AttributeId(Arc::from(name.as_ref()))
    }

    /// Attribute name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for AttributeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

/// Semantic kind of an attribute's value space.
#[derive(Debug, Clone)]
pub enum AttributeKind {
    /// Plain categorical values.
    Unique,
    /// Numeric range buckets spanning `[lo, hi]` overall.
    Range {
        /// Lowest bucket bound.
        lo: f64,
        /// Highest bucket bound.
        hi: f64,
    },
    /// Each value stands for a set of referent values.
    Aggregated {
        /// Attribute being re-expressed.
        referent: AttributeId,
        /// Aggregated canonical value -> referent canonical values.
        mapper: AHashMap<Arc<str>, Vec<Arc<str>>>,
    },
    /// Mirrors the referent's domain without adding information.
    Record {
        /// Attribute being re-expressed.
        referent: AttributeId,
    },
}

/// One value of one attribute's domain.
#[derive(Clone)]
pub struct Value {
    attribute: AttributeId,
    canonical: Arc<str>,
    input: Arc<str>,
    bounds: Option<(f64, f64)>,
}

impl Value {
    fn new(attribute: &AttributeId, input: &str, canonical: &str) -> Self {
        Value {
            attribute: attribute.clone(),
            canonical: Arc::from(canonical),
            input: Arc::from(input),
            bounds: None,
        }
    }

    fn empty(attribute: &AttributeId) -> Self {
        Value::new(attribute, EMPTY_CANONICAL, EMPTY_CANONICAL)
    }

    /// Back-reference to the owning attribute.
    #[inline]
    pub fn attribute(&self) -> &AttributeId {
        &self.attribute
    }

    /// Normalised string identifying the value within its attribute.
    #[inline]
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Raw string the value was declared with.
    #[inline]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// `[lo, hi]` of a range bucket.
    #[inline]
    pub fn bounds(&self) -> Option<(f64, f64)> {
        self.bounds
    }

    /// Whether this is the attribute's "not applicable" value.
    #[inline]
    pub fn is_empty(&self) -> bool {
        &*self.canonical == EMPTY_CANONICAL
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.attribute == other.attribute && self.canonical == other.canonical
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.attribute.hash(state);
        self.canonical.hash(state);
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        self.attribute
            .cmp(&other.attribute)
            .then_with(|| self.canonical.cmp(&other.canonical))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?}", self.attribute, &*self.canonical)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.attribute, self.canonical)
    }
}

/// A named attribute with its value domain.
#[derive(Debug, Clone)]
pub struct Attribute {
    id: AttributeId,
    kind: AttributeKind,
    values: Vec<Value>,
    empty: Value,
    index: AHashMap<Arc<str>, usize>,
}

impl Attribute {
    fn new(id: AttributeId, kind: AttributeKind, values: Vec<Value>) -> Result<Self> {
        let mut index = AHashMap::with_capacity(values.len());
        for (i, v) in values.iter().enumerate() {
            if v.is_empty() {
                return Err(ReconstructionError::arguments(format!(
                    "attribute '{}': declared values may not use the empty canonical",
                    id
                )));
            }
            if index.insert(v.canonical.clone(), i).is_some() {
                return Err(ReconstructionError::arguments(format!(
                    "attribute '{}': duplicate value '{}'",
                    id, v.canonical
                )));
            }
        }
        let empty = Value::empty(&id);
        Ok(Attribute {
            id,
            kind,
            values,
            empty,
            index,
        })
    }

    /// Name handle.
    #[inline]
    pub fn id(&self) -> &AttributeId {
        &self.id
    }

    /// Attribute name.
    #[inline]
    pub fn name(&self) -> &str {
        self.id.name()
    }

    /// Value-space kind.
    #[inline]
    pub fn kind(&self) -> &AttributeKind {
        &self.kind
    }

    /// The attribute this one re-expresses; itself for unique and range kinds.
    pub fn referent(&self) -> &AttributeId {
        match &self.kind {
            AttributeKind::Unique | AttributeKind::Range { .. } => &self.id,
            AttributeKind::Aggregated { referent, .. } | AttributeKind::Record { referent } => {
                referent
            }
        }
    }

    /// Whether the attribute is its own referent.
    #[inline]
    pub fn is_referent(&self) -> bool {
        self.referent() == &self.id
    }

    /// Declared values, in declaration order. Excludes the empty value.
    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// The "not applicable" sentinel.
    #[inline]
    pub fn empty_value(&self) -> &Value {
        &self.empty
    }

    /// Looks up a value by canonical string, the empty value included.
    pub fn value(&self, canonical: &str) -> Option<&Value> {
        if canonical == EMPTY_CANONICAL {
            return Some(&self.empty);
        }
        self.index.get(canonical).map(|&i| &self.values[i])
    }

    /// Number of declared values.
    #[inline]
    pub fn domain_size(&self) -> usize {
        self.values.len()
    }
}

/// Rule: when `trigger` is present, `dependents` are not applicable.
#[derive(Debug, Clone)]
pub struct EmptyCorrelate {
    /// Value whose presence empties the dependents.
    pub trigger: Value,
    /// Attributes forced to their empty value.
    pub dependents: Vec<AttributeId>,
}

/// Scenario-wide attribute context.
///
/// Built once per scenario during ingestion and passed explicitly to the
/// algorithms that need value domains or referent mappings.
#[derive(Debug, Clone, Default)]
pub struct AttributeRegistry {
    attributes: AHashMap<AttributeId, Attribute>,
    order: Vec<AttributeId>,
    correlates: Vec<EmptyCorrelate>,
}

impl AttributeRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, attribute: Attribute) -> Result<AttributeId> {
        let id = attribute.id.clone();
        if self.attributes.contains_key(&id) {
            return Err(ReconstructionError::arguments(format!(
                "attribute '{}' already registered",
                id
            )));
        }
        self.attributes.insert(id.clone(), attribute);
        self.order.push(id.clone());
        Ok(id)
    }

    /// Registers a categorical attribute. Inputs are trimmed to canonical form.
    pub fn register_unique(&mut self, name: &str, values: &[&str]) -> Result<AttributeId> {
        let id = AttributeId::new(name);
        let values = values
            .iter()
            .map(|input| Value::new(&id, input, input.trim()))
            .collect();
        self.insert(Attribute::new(id, AttributeKind::Unique, values)?)
    }

    /// Registers a range attribute from `(lo, hi)` buckets.
    ///
    /// Canonical form of a bucket is `lo:hi`.
    pub fn register_range(&mut self, name: &str, buckets: &[(f64, f64)]) -> Result<AttributeId> {
        let id = AttributeId::new(name);
        if buckets.is_empty() {
            return Err(ReconstructionError::arguments(format!(
                "range attribute '{}' needs at least one bucket",
                name
            )));
        }
        let mut lo_all = f64::INFINITY;
        let mut hi_all = f64::NEG_INFINITY;
        let mut values = Vec::with_capacity(buckets.len());
        for &(lo, hi) in buckets {
            if !(lo.is_finite() && hi.is_finite() && lo <= hi) {
                return Err(ReconstructionError::arguments(format!(
                    "range attribute '{}': invalid bucket [{}, {}]",
                    name, lo, hi
                )));
            }
            lo_all = lo_all.min(lo);
            hi_all = hi_all.max(hi);
            let canonical = format!("{}:{}", lo, hi);
            let mut v = Value::new(&id, &canonical, &canonical);
            v.bounds = Some((lo, hi));
            values.push(v);
        }
        let kind = AttributeKind::Range {
            lo: lo_all,
            hi: hi_all,
        };
        self.insert(Attribute::new(id, kind, values)?)
    }

    /// Registers an aggregated attribute over `referent`.
    ///
    /// `groups` maps each aggregated value to the referent values it covers.
    /// The referent must be a referent itself; chains are not followed.
    pub fn register_aggregated(
        &mut self,
        name: &str,
        referent: &AttributeId,
        groups: &[(&str, &[&str])],
    ) -> Result<AttributeId> {
        let target = self.attribute(referent)?;
        if !target.is_referent() {
            return Err(ReconstructionError::arguments(format!(
                "aggregated attribute '{}': referent '{}' is itself a re-expression",
                name, referent
            )));
        }
        let id = AttributeId::new(name);
        let mut mapper = AHashMap::with_capacity(groups.len());
        let mut values = Vec::with_capacity(groups.len());
        for &(group, members) in groups {
            let mut mapped = Vec::with_capacity(members.len());
            for member in members {
                let value = target.value(member.trim()).ok_or_else(|| ReconstructionError::UnknownValue {
                    attribute: referent.name().to_string(),
                    value: member.to_string(),
                })?;
                mapped.push(value.canonical.clone());
            }
            let v = Value::new(&id, group, group.trim());
            mapper.insert(v.canonical.clone(), mapped);
            values.push(v);
        }
        let kind = AttributeKind::Aggregated {
            referent: referent.clone(),
            mapper,
        };
        self.insert(Attribute::new(id, kind, values)?)
    }

    /// Registers a record attribute mirroring `referent`'s domain.
    pub fn register_record(&mut self, name: &str, referent: &AttributeId) -> Result<AttributeId> {
        let target = self.attribute(referent)?;
        if !target.is_referent() {
            return Err(ReconstructionError::arguments(format!(
                "record attribute '{}': referent '{}' is itself a re-expression",
                name, referent
            )));
        }
        let id = AttributeId::new(name);
        let values = target
            .values()
            .iter()
            .map(|v| {
                let mut mirrored = Value::new(&id, v.input(), v.canonical());
                mirrored.bounds = v.bounds;
                mirrored
            })
            .collect();
        let kind = AttributeKind::Record {
            referent: referent.clone(),
        };
        self.insert(Attribute::new(id, kind, values)?)
    }

    /// Attribute for `id`.
    pub fn attribute(&self, id: &AttributeId) -> Result<&Attribute> {
        self.attributes
            .get(id)
            .ok_or_else(|| ReconstructionError::UnknownAttribute(id.name().to_string()))
    }

    /// Attribute by name.
    pub fn attribute_by_name(&self, name: &str) -> Result<&Attribute> {
        self.attribute(&AttributeId::new(name))
    }

    /// Value of attribute `name` with canonical form `canonical`.
    pub fn value(&self, name: &str, canonical: &str) -> Result<Value> {
        let attribute = self.attribute_by_name(name)?;
        attribute
            .value(canonical.trim())
            .cloned()
            .ok_or_else(|| ReconstructionError::UnknownValue {
                attribute: name.to_string(),
                value: canonical.to_string(),
            })
    }

    /// Empty value of attribute `id`.
    pub fn empty_value(&self, id: &AttributeId) -> Result<Value> {
        Ok(self.attribute(id)?.empty_value().clone())
    }

    /// Referent of attribute `id`.
    pub fn referent_of(&self, id: &AttributeId) -> Result<AttributeId> {
        Ok(self.attribute(id)?.referent().clone())
    }

    /// Attributes in registration order.
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.order.iter().filter_map(|id| self.attributes.get(id))
    }

    /// Number of registered attributes.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no attribute is registered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Referent values a value stands for.
    ///
    /// Identity for unique and range attributes; the mapped set for
    /// aggregated values; the same-canonical referent value for records. The
    /// empty value always maps to the referent's empty value.
    pub fn referent_values(&self, value: &Value) -> Result<Vec<Value>> {
        let attribute = self.attribute(value.attribute())?;
        let referent = self.attribute(attribute.referent())?;
        if value.is_empty() {
            return Ok(vec![referent.empty_value().clone()]);
        }
        match attribute.kind() {
            AttributeKind::Unique | AttributeKind::Range { .. } => Ok(vec![value.clone()]),
            AttributeKind::Aggregated { mapper, .. } => {
                let members = mapper.get(value.canonical()).ok_or_else(|| ReconstructionError::UnknownValue {
                    attribute: attribute.name().to_string(),
                    value: value.canonical().to_string(),
                })?;
                members
                    .iter()
                    .map(|c| self.value(referent.name(), c))
                    .collect()
            }
            AttributeKind::Record { .. } => Ok(vec![self.value(referent.name(), value.canonical())?]),
        }
    }

    /// Declares that `dependents` are not applicable whenever `trigger` is present.
    pub fn add_empty_correlate(&mut self, trigger: Value, dependents: &[AttributeId]) -> Result<()> {
        let owner = self.attribute(trigger.attribute())?;
        if owner.value(trigger.canonical()).is_none() {
            return Err(ReconstructionError::UnknownValue {
                attribute: owner.name().to_string(),
                value: trigger.canonical().to_string(),
            });
        }
        for d in dependents {
            self.attribute(d)?;
            if d == trigger.attribute() {
                return Err(ReconstructionError::arguments(format!(
                    "empty correlate on '{}' cannot empty its own attribute",
                    d
                )));
            }
        }
        self.correlates.push(EmptyCorrelate {
            trigger,
            dependents: dependents.to_vec(),
        });
        Ok(())
    }

    /// Registered empty-correlate rules.
    pub fn empty_correlates(&self) -> &[EmptyCorrelate] {
        &self.correlates
    }

    /// Substitutes empty values for every attribute of `coordinate` that a
    /// triggered rule declares not applicable.
    ///
    /// Returns a coordinate equal to the input when no rule fires.
    pub fn rewrite_empty_correlates(&self, coordinate: &Coordinate) -> Result<Coordinate> {
        let mut replacements = Vec::new();
        for rule in &self.correlates {
            if !coordinate.contains(&rule.trigger) {
                continue;
            }
            for d in &rule.dependents {
                if coordinate.get(d).is_some() {
                    replacements.push(self.empty_value(d)?);
                }
            }
        }
        if replacements.is_empty() {
            return Ok(coordinate.clone());
        }
        Ok(coordinate.with_replaced(replacements))
    }
}
