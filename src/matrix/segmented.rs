// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Segmented Matrix** - *Joint Distribution from Partial Sources*
//!
//! A set of full matrices whose dimension sets differ and may overlap. Used
//! when no single source covers every attribute jointly.
//!
//! ## Storage Order
//! Inner matrices are kept with every joint source (contingency table,
//! sample, global frequency table) ahead of every local frequency table;
//! insertion order is kept within each group. A local table only holds
//! frequencies conditional on some of its attributes, so it can never open
//! the chain below. Each local table must share at least one attribute with
//! a joint source.
//!
//! ## Lookup Semantics
//! With more than one inner matrix, controls are global frequencies obtained
//! by the chain rule over the inner matrices in storage order:
//! ```text
//! P(x) = Π_m  P_m(x ∩ D_m) / P_m(x ∩ C_m)
//! ```
//! where `D_m` is the dimension set of inner matrix `m` and `C_m` the part of
//! `D_m` already held by the matrices before it. Attributes that never share
//! an inner matrix therefore combine multiplicatively, i.e. independently.
//!
//! With a single inner matrix every query is delegated to it unchanged.

use crate::errors::{log_dimension_mismatch, ReconstructionError, Result};
use crate::matrix::{DistributionMatrix, FullMatrix, MetaDataType};
use crate::model::attribute::{AttributeId, Value};
use crate::model::control::Control;
use crate::model::coordinate::Coordinate;
use crate::utils::decode_mixed_radix;

/// Collection of full matrices over differing attribute subsets.
#[derive(Debug, Clone)]
pub struct SegmentedMatrix {
    inner: Vec<FullMatrix>,
    // Per inner matrix: cached total and `C_m`.
    totals: Vec<f64>,
    conditioning: Vec<Vec<AttributeId>>,
    dimensions: Vec<AttributeId>,
}

#[inline]
fn is_local(m: &FullMatrix) -> bool {
    m.metadata() == MetaDataType::LocalFrequencyTable
}

impl SegmentedMatrix {
    /// Builds from `matrices`, merging those with identical dimension sets.
    ///
    /// # Errors
    /// `InvalidArguments` with no matrix; `IncompatibleControlTotals` when two
    /// matrices over the same dimensions disagree on a cell.
    pub fn new(matrices: impl IntoIterator<Item = FullMatrix>) -> Result<Self> {
        let mut out = SegmentedMatrix {
            inner: Vec::new(),
            totals: Vec::new(),
            conditioning: Vec::new(),
            dimensions: Vec::new(),
        };
        for m in matrices {
            out.merge(m)?;
        }
        if out.inner.is_empty() {
            return Err(ReconstructionError::arguments("segmented matrix needs at least one inner matrix"));
        }
        Ok(out)
    }

    /// Adds `matrix`, or merges it into the inner matrix with the same dimensions.
    pub fn merge(&mut self, matrix: FullMatrix) -> Result<()> {
        if let Some(idx) = self
            .inner
            .iter()
            .position(|m| m.dimensions() == matrix.dimensions())
        {
            self.inner[idx].merge_from(&matrix)?;
            self.totals[idx] = self.inner[idx].total().value();
            return Ok(());
        }
        for d in matrix.dimensions() {
            if let Err(pos) = self.dimensions.binary_search(d) {
                self.dimensions.insert(pos, d.clone());
            }
        }
        let pos = if is_local(&matrix) {
            self.inner.len()
        } else {
            self.inner.iter().position(is_local).unwrap_or(self.inner.len())
        };
        self.totals.insert(pos, matrix.total().value());
        self.inner.insert(pos, matrix);
        self.conditioning = self
            .inner
            .iter()
            .enumerate()
            .map(|(k, m)| {
                m.dimensions()
                    .iter()
                    .filter(|d| self.inner[..k].iter().any(|e| e.dimensions().contains(d)))
                    .cloned()
                    .collect()
            })
            .collect();
        Ok(())
    }

    /// Dimensions of inner matrix `index` already held by the matrices before it.
    pub fn conditioning_of(&self, index: usize) -> &[AttributeId] {
        self.conditioning.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Checks that every local frequency table shares an attribute with a
    /// joint source.
    ///
    /// # Errors
    /// `IllegalDistributionCreation` naming the first unanchored local table.
    pub fn check_local_sources(&self) -> Result<()> {
        if self.inner.len() < 2 {
            return Ok(());
        }
        let joint: Vec<&FullMatrix> = self.inner.iter().filter(|m| !is_local(m)).collect();
        for m in self.inner.iter().filter(|m| is_local(m)) {
            let anchored = m
                .dimensions()
                .iter()
                .any(|d| joint.iter().any(|j| j.dimensions().contains(d)));
            if !anchored {
                return Err(ReconstructionError::illegal(format!(
                    "local frequency table over {:?} shares no attribute with a joint source",
                    m.dimensions()
                )));
            }
        }
        Ok(())
    }

    /// Joint inner matrix whose dimension set contains all of `attributes`.
    pub fn covering(&self, attributes: &[AttributeId]) -> Option<&FullMatrix> {
        self.covering_index(attributes).map(|i| &self.inner[i])
    }

    fn covering_index(&self, attributes: &[AttributeId]) -> Option<usize> {
        self.inner
            .iter()
            .position(|m| !is_local(m) && attributes.iter().all(|a| m.dimensions().contains(a)))
    }

    /// Chain-rule frequency of `values` under conditional independence.
    ///
    /// Values whose attribute no inner matrix holds are ignored. `values` must
    /// hold `C_m` for every inner matrix whose other attributes it mentions;
    /// [`DistributionMatrix::get_marginal`] completes partial queries first.
    pub fn chain_frequency(&self, values: &[Value]) -> Result<f64> {
        self.check_local_sources()?;
        let mut p = 1.0;
        for ((m, &total), conditioning) in self.inner.iter().zip(&self.totals).zip(&self.conditioning) {
            let local: Vec<Value> = values
                .iter()
                .filter(|v| m.dimensions().contains(v.attribute()))
                .cloned()
                .collect();
            if local.iter().all(|v| conditioning.contains(v.attribute())) {
                continue;
            }
            if total <= 0.0 {
                return Ok(0.0);
            }
            let joint = m.get_marginal(&local)?.value() / total;
            let shared: Vec<Value> = local
                .iter()
                .filter(|v| conditioning.contains(v.attribute()))
                .cloned()
                .collect();
            if shared.is_empty() {
                p *= joint;
            } else {
                let condition = m.get_marginal(&shared)?.value() / total;
                if condition <= 0.0 {
                    return Ok(0.0);
                }
                p *= joint / condition;
            }
            if p <= 0.0 {
                return Ok(0.0);
            }
        }
        Ok(p)
    }

    // Attributes of `C_m` a query over `attributes` must range over so that
    // every factor it touches is conditioned on its full `C_m`.
    fn missing_conditioning(&self, attributes: &[AttributeId]) -> Vec<AttributeId> {
        let mut query: Vec<AttributeId> = attributes.to_vec();
        let mut missing = Vec::new();
        loop {
            let mut grew = false;
            for (m, conditioning) in self.inner.iter().zip(&self.conditioning).rev() {
                let touched = m
                    .dimensions()
                    .iter()
                    .any(|d| !conditioning.contains(d) && query.contains(d));
                if !touched {
                    continue;
                }
                for d in conditioning {
                    if !query.contains(d) {
                        query.push(d.clone());
                        missing.push(d.clone());
                        grew = true;
                    }
                }
            }
            if !grew {
                return missing;
            }
        }
    }

    // Values of `attribute` observed in the first inner matrix holding it,
    // preferring joint sources.
    fn observed_values(&self, attribute: &AttributeId) -> Result<Vec<Value>> {
        let holder = self
            .covering(std::slice::from_ref(attribute))
            .or_else(|| self.inner.iter().find(|m| m.dimensions().contains(attribute)));
        match holder {
            Some(m) => Ok(m.marginal(attribute)?.into_iter().map(|(v, _)| v).collect()),
            None => Ok(Vec::new()),
        }
    }
}

impl DistributionMatrix for SegmentedMatrix {
    fn dimensions(&self) -> &[AttributeId] {
        &self.dimensions
    }

    fn metadata(&self) -> MetaDataType {
        match self.inner.as_slice() {
            [single] => single.metadata(),
            _ => MetaDataType::GlobalFrequencyTable,
        }
    }

    fn get_val(&self, coordinate: &Coordinate) -> Result<Control> {
        if let [single] = self.inner.as_slice() {
            return single.get_val(coordinate);
        }
        if !coordinate.covers(&self.dimensions) {
            return Err(ReconstructionError::coordinate(log_dimension_mismatch(
                "SegmentedMatrix::get_val",
                &self.dimensions,
                &coordinate.dimensions(),
            )));
        }
        let values: Vec<Value> = coordinate.restrict(&self.dimensions).values().to_vec();
        Ok(Control::Real(self.chain_frequency(&values)?))
    }

    fn get_marginal(&self, values: &[Value]) -> Result<Control> {
        if let [single] = self.inner.as_slice() {
            return single.get_marginal(values);
        }
        let attributes: Vec<AttributeId> = values.iter().map(|v| v.attribute().clone()).collect();
        if let Some(i) = self.covering_index(&attributes) {
            let total = self.totals[i];
            let f = if total > 0.0 { self.inner[i].get_marginal(values)?.value() / total } else { 0.0 };
            return Ok(Control::Real(f));
        }
        if !attributes.iter().all(|a| self.dimensions.contains(a)) {
            return Ok(Control::Real(0.0));
        }
        let missing = self.missing_conditioning(&attributes);
        if missing.is_empty() {
            return Ok(Control::Real(self.chain_frequency(values)?));
        }

        let domains = missing
            .iter()
            .map(|a| self.observed_values(a))
            .collect::<Result<Vec<_>>>()?;
        let radices: Vec<usize> = domains.iter().map(Vec::len).collect();
        let count: usize = radices.iter().product();
        let mut digits = Vec::with_capacity(radices.len());
        let mut query: Vec<Value> = values.to_vec();
        let mut sum = 0.0;
        for index in 0..count {
            decode_mixed_radix(index, &radices, &mut digits);
            query.truncate(values.len());
            query.extend(digits.iter().zip(&domains).map(|(&i, d)| d[i].clone()));
            sum += self.chain_frequency(&query)?;
        }
        Ok(Control::Real(sum))
    }

    fn inner(&self) -> &[FullMatrix] {
        &self.inner
    }

    fn size(&self) -> usize {
        self.inner.iter().map(|m| m.size()).sum()
    }

    fn to_csv(&self, separator: char) -> Result<String> {
        let blocks = self
            .inner
            .iter()
            .map(|m| m.to_csv(separator))
            .collect::<Result<Vec<_>>>()?;
        Ok(blocks.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attribute::AttributeRegistry;
    use crate::operators::NumericKind;

    fn reg() -> AttributeRegistry {
        let mut r = AttributeRegistry::new();
        r.register_unique("a", &["a0", "a1"]).unwrap();
        r.register_unique("b", &["b0", "b1"]).unwrap();
        r.register_unique("c", &["c0", "c1"]).unwrap();
        r
    }

    fn table(r: &AttributeRegistry, x: &str, y: &str, counts: [[i64; 2]; 2]) -> FullMatrix {
        let mut m = FullMatrix::new(
            vec![AttributeId::new(x), AttributeId::new(y)],
            NumericKind::Integer,
            MetaDataType::ContingencyTable,
        )
        .unwrap();
        for (i, row) in counts.iter().enumerate() {
            for (j, n) in row.iter().enumerate() {
                let c = Coordinate::new(vec![
                    r.value(x, &format!("{x}{i}")).unwrap(),
                    r.value(y, &format!("{y}{j}")).unwrap(),
                ])
                .unwrap();
                m.add_value(c, Control::Integer(*n)).unwrap();
            }
        }
        m
    }

    #[test]
    fn identical_copy_is_merged_away() {
        let r = reg();
        let ab = table(&r, "a", "b", [[10, 20], [30, 40]]);
        let bc = table(&r, "b", "c", [[5, 5], [1, 9]]);
        let mut s = SegmentedMatrix::new(vec![ab.clone(), bc]).unwrap();
        let (size, dims) = (s.size(), s.dimensions().to_vec());
        s.merge(ab).unwrap();
        assert_eq!(s.size(), size);
        assert_eq!(s.dimensions(), dims.as_slice());
        assert_eq!(s.inner().len(), 2);
        assert!(s.is_segmented());
    }

    #[test]
    fn chain_rule_through_shared_dimension() {
        let r = reg();
        let ab = table(&r, "a", "b", [[10, 20], [30, 40]]);
        let bc = table(&r, "b", "c", [[5, 5], [1, 9]]);
        let s = SegmentedMatrix::new(vec![ab, bc]).unwrap();
        let c = Coordinate::new(vec![
            r.value("a", "a1").unwrap(),
            r.value("b", "b1").unwrap(),
            r.value("c", "c1").unwrap(),
        ])
        .unwrap();
        // P(a1,b1) * P(c1 | b1) = 0.4 * 0.9
        let got = s.get_val(&c).unwrap().value();
        assert!((got - 0.36).abs() < 1e-12, "{got}");

        let mut sum = 0.0;
        for a in ["a0", "a1"] {
            for b in ["b0", "b1"] {
                for cc in ["c0", "c1"] {
                    let k = Coordinate::new(vec![
                        r.value("a", a).unwrap(),
                        r.value("b", b).unwrap(),
                        r.value("c", cc).unwrap(),
                    ])
                    .unwrap();
                    sum += s.get_val(&k).unwrap().value();
                }
            }
        }
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn disjoint_dimensions_are_independent() {
        let mut r = reg();
        r.register_unique("d", &["d0", "d1"]).unwrap();
        let ab = table(&r, "a", "b", [[10, 20], [30, 40]]);
        let cd = table(&r, "c", "d", [[1, 1], [1, 1]]);
        let s = SegmentedMatrix::new(vec![ab, cd]).unwrap();
        let m = s
            .get_marginal(&[r.value("a", "a0").unwrap(), r.value("c", "c1").unwrap()])
            .unwrap();
        assert!((m.value() - 0.3 * 0.5).abs() < 1e-12);
    }

    #[test]
    fn single_inner_delegates() {
        let r = reg();
        let ab = table(&r, "a", "b", [[10, 20], [30, 40]]);
        let s = SegmentedMatrix::new(vec![ab]).unwrap();
        assert!(!s.is_segmented());
        assert!(s.is_segmented_for(&[AttributeId::new("a"), AttributeId::new("c")]));
        assert!(!s.is_segmented_for(&[AttributeId::new("a")]));
        assert_eq!(s.metadata(), MetaDataType::ContingencyTable);
        let v = s.get_marginal(&[r.value("a", "a1").unwrap()]).unwrap();
        assert_eq!(v, Control::Integer(70));
    }

    #[test]
    fn lookup_requires_all_dimensions() {
        let r = reg();
        let s = SegmentedMatrix::new(vec![
            table(&r, "a", "b", [[1, 1], [1, 1]]),
            table(&r, "b", "c", [[1, 1], [1, 1]]),
        ])
        .unwrap();
        let partial = Coordinate::new(vec![r.value("a", "a0").unwrap()]).unwrap();
        assert!(matches!(s.get_val(&partial).unwrap_err(), ReconstructionError::InvalidCoordinate(_)));
        assert!(SegmentedMatrix::new(Vec::new()).is_err());
    }

    fn frequencies(r: &AttributeRegistry, dims: &[&str], cells: &[(&[&str], f64)], metadata: MetaDataType) -> FullMatrix {
        let mut m = FullMatrix::new(dims.iter().map(AttributeId::new), NumericKind::Real, metadata).unwrap();
        for (values, f) in cells {
            let c = Coordinate::new(dims.iter().zip(values.iter()).map(|(d, v)| r.value(d, v).unwrap())).unwrap();
            m.add_value(c, Control::Real(*f)).unwrap();
        }
        m
    }

    // P(b | a) with a0: .5/.5 and a1: .2/.8
    fn b_given_a(r: &AttributeRegistry) -> FullMatrix {
        frequencies(
            r,
            &["a", "b"],
            &[(&["a0", "b0"], 0.5), (&["a0", "b1"], 0.5), (&["a1", "b0"], 0.2), (&["a1", "b1"], 0.8)],
            MetaDataType::LocalFrequencyTable,
        )
    }

    fn a_global(r: &AttributeRegistry) -> FullMatrix {
        frequencies(r, &["a"], &[(&["a0"], 0.1), (&["a1"], 0.9)], MetaDataType::GlobalFrequencyTable)
    }

    #[test]
    fn local_tables_are_stored_after_joint_sources() {
        let r = reg();
        let local_first = SegmentedMatrix::new(vec![b_given_a(&r), a_global(&r)]).unwrap();
        let global_first = SegmentedMatrix::new(vec![a_global(&r), b_given_a(&r)]).unwrap();
        for s in [&local_first, &global_first] {
            assert_eq!(s.inner()[0].metadata(), MetaDataType::GlobalFrequencyTable);
            assert_eq!(s.inner()[1].metadata(), MetaDataType::LocalFrequencyTable);
            assert!(s.conditioning_of(0).is_empty());
            assert_eq!(s.conditioning_of(1), &[AttributeId::new("a")]);
        }
        for (a, b, expect) in [("a0", "b0", 0.05), ("a0", "b1", 0.05), ("a1", "b0", 0.18), ("a1", "b1", 0.72)] {
            let c = Coordinate::new(vec![r.value("a", a).unwrap(), r.value("b", b).unwrap()]).unwrap();
            let x = local_first.get_val(&c).unwrap().value();
            let y = global_first.get_val(&c).unwrap().value();
            assert!((x - expect).abs() < 1e-12, "{a},{b}: {x}");
            assert_eq!(x, y);
        }
    }

    #[test]
    fn marginal_through_local_table_sums_its_condition() {
        let r = reg();
        let s = SegmentedMatrix::new(vec![b_given_a(&r), a_global(&r)]).unwrap();
        // P(b0) = 0.1 * 0.5 + 0.9 * 0.2
        let b0 = s.get_marginal(&[r.value("b", "b0").unwrap()]).unwrap().value();
        assert!((b0 - 0.23).abs() < 1e-12, "{b0}");
        let a0 = s.get_marginal(&[r.value("a", "a0").unwrap()]).unwrap().value();
        assert!((a0 - 0.1).abs() < 1e-12, "{a0}");
    }

    #[test]
    fn partial_query_ranges_over_shared_dimension() {
        let r = reg();
        let ab = table(&r, "a", "b", [[10, 20], [30, 40]]);
        let bc = table(&r, "b", "c", [[5, 5], [1, 9]]);
        let s = SegmentedMatrix::new(vec![ab, bc]).unwrap();
        // P(a0, c1) = P(a0, b0) * 0.5 + P(a0, b1) * 0.9 = 0.1 * 0.5 + 0.2 * 0.9
        let q = [r.value("a", "a0").unwrap(), r.value("c", "c1").unwrap()];
        let f = s.get_marginal(&q).unwrap().value();
        assert!((f - 0.23).abs() < 1e-12, "{f}");
        // A single joint source answers directly.
        let c1 = s.get_marginal(&[r.value("c", "c1").unwrap()]).unwrap().value();
        assert!((c1 - 0.7).abs() < 1e-12, "{c1}");
    }

    #[test]
    fn merged_totals_stay_current() {
        let r = reg();
        let ab_cell = |a: &str, b: &str, n: i64| {
            (Coordinate::new(vec![r.value("a", a).unwrap(), r.value("b", b).unwrap()]).unwrap(), Control::Integer(n))
        };
        let dims = || vec![AttributeId::new("a"), AttributeId::new("b")];
        let mut partial = FullMatrix::new(dims(), NumericKind::Integer, MetaDataType::ContingencyTable).unwrap();
        for (c, v) in [ab_cell("a0", "b1", 20), ab_cell("a1", "b0", 30), ab_cell("a1", "b1", 40)] {
            partial.add_value(c, v).unwrap();
        }
        let mut s = SegmentedMatrix::new(vec![partial, table(&r, "b", "c", [[5, 5], [1, 9]])]).unwrap();
        let a0 = || s.get_marginal(&[r.value("a", "a0").unwrap()]).unwrap().value();
        assert!((a0() - 20.0 / 90.0).abs() < 1e-12);

        let mut missing = FullMatrix::new(dims(), NumericKind::Integer, MetaDataType::ContingencyTable).unwrap();
        let (c, v) = ab_cell("a0", "b0", 10);
        missing.add_value(c, v).unwrap();
        s.merge(missing).unwrap();
        let a0 = s.get_marginal(&[r.value("a", "a0").unwrap()]).unwrap().value();
        assert!((a0 - 0.3).abs() < 1e-12, "{a0}");
    }

    #[test]
    fn unanchored_local_table_is_illegal() {
        let r = reg();
        let local = frequencies(
            &r,
            &["b", "c"],
            &[(&["b0", "c0"], 1.0), (&["b1", "c1"], 1.0)],
            MetaDataType::LocalFrequencyTable,
        );
        let s = SegmentedMatrix::new(vec![local, a_global(&r)]).unwrap();
        assert!(matches!(s.check_local_sources().unwrap_err(), ReconstructionError::IllegalDistributionCreation(_)));
        let c = Coordinate::new(vec![
            r.value("a", "a0").unwrap(),
            r.value("b", "b0").unwrap(),
            r.value("c", "c0").unwrap(),
        ])
        .unwrap();
        assert!(matches!(s.get_val(&c).unwrap_err(), ReconstructionError::IllegalDistributionCreation(_)));
    }
}
