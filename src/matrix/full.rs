// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Full Matrix** - *Joint Table over One Attribute Set*
//!
//! Sparse `Coordinate -> Control` storage where every stored coordinate holds
//! exactly one value per declared dimension and every control has the
//! matrix's numeric kind.

use std::collections::BTreeMap;

use ahash::AHashMap;

use crate::config::CSV_VALUE_HEADER;
use crate::errors::{log_dimension_mismatch, ReconstructionError, Result};
use crate::matrix::{DistributionMatrix, MetaDataType};
use crate::model::attribute::{AttributeId, AttributeRegistry, Value};
use crate::model::control::Control;
use crate::model::coordinate::Coordinate;
use crate::operators::NumericKind;

/// Joint distribution over one fixed set of attributes.
#[derive(Debug, Clone)]
pub struct FullMatrix {
    dimensions: Vec<AttributeId>,
    kind: NumericKind,
    metadata: MetaDataType,
    cells: AHashMap<Coordinate, Control>,
}

impl FullMatrix {
    /// Empty matrix over `dimensions`.
    ///
    /// # Errors
    /// `InvalidArguments` for an empty or repeated dimension set.
    pub fn new(
        dimensions: impl IntoIterator<Item = AttributeId>,
        kind: NumericKind,
        metadata: MetaDataType,
    ) -> Result<Self> {
        let mut dimensions: Vec<AttributeId> = dimensions.into_iter().collect();
        let declared = dimensions.len();
        dimensions.sort();
        dimensions.dedup();
        if dimensions.is_empty() || dimensions.len() != declared {
            return Err(ReconstructionError::arguments(format!(
                "full matrix needs distinct, non-empty dimensions, got {:?}",
                dimensions
            )));
        }
        Ok(FullMatrix {
            dimensions,
            kind,
            metadata,
            cells: AHashMap::new(),
        })
    }

    /// Builds a matrix from `(coordinate, control)` pairs.
    ///
    /// Dimensions are taken from the first coordinate.
    pub fn from_cells(
        cells: impl IntoIterator<Item = (Coordinate, Control)>,
        kind: NumericKind,
        metadata: MetaDataType,
    ) -> Result<Self> {
        let mut iter = cells.into_iter().peekable();
        let dims = iter
            .peek()
            .map(|(c, _)| c.dimensions())
            .ok_or_else(|| ReconstructionError::arguments("from_cells: no cell to infer dimensions from"))?;
        let mut m = FullMatrix::new(dims, kind, metadata)?;
        for (c, v) in iter {
            if !m.add_value(c.clone(), v)? {
                return Err(ReconstructionError::control(format!("from_cells: {} given twice", c)));
            }
        }
        Ok(m)
    }

    /// Numeric kind of every control.
    #[inline]
    pub fn kind(&self) -> NumericKind {
        self.kind
    }

    /// Whether no cell is stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn check_insert(&self, coordinate: &Coordinate, control: &Control) -> Result<()> {
        if control.kind() != self.kind {
            return Err(ReconstructionError::control(format!(
                "control {} is {:?}, matrix holds {:?}",
                control,
                control.kind(),
                self.kind
            )));
        }
        let complete = coordinate.len() == self.dimensions.len() && coordinate.covers(&self.dimensions);
        if !complete {
            return Err(ReconstructionError::coordinate(log_dimension_mismatch(
                "FullMatrix::insert",
                &self.dimensions,
                &coordinate.dimensions(),
            )));
        }
        Ok(())
    }

    /// Inserts only if absent. Returns `false` when the coordinate is already
    /// stored; the stored control is never overwritten.
    pub fn add_value(&mut self, coordinate: Coordinate, control: Control) -> Result<bool> {
        self.check_insert(&coordinate, &control)?;
        if self.cells.contains_key(&coordinate) {
            return Ok(false);
        }
        self.cells.insert(coordinate, control);
        Ok(true)
    }

    /// Insert-or-replace. Returns the replaced control.
    pub fn set_value(&mut self, coordinate: Coordinate, control: Control) -> Result<Option<Control>> {
        self.check_insert(&coordinate, &control)?;
        Ok(self.cells.insert(coordinate, control))
    }

    /// Stored cells in storage order.
    pub fn cells(&self) -> impl Iterator<Item = (&Coordinate, &Control)> {
        self.cells.iter()
    }

    /// Stored cells sorted by coordinate. This is the deterministic cell
    /// ordering samplers and exports rely on.
    pub fn cells_sorted(&self) -> Vec<(&Coordinate, &Control)> {
        let mut out: Vec<_> = self.cells.iter().collect();
        out.sort_unstable_by(|a, b| a.0.cmp(b.0));
        out
    }

    /// Sum of all controls.
    pub fn total(&self) -> Control {
        self.cells
            .values()
            .fold(Control::zero(self.kind), |acc, c| acc + *c)
    }

    /// Distribution of one attribute, summing out all others, sorted by value.
    pub fn marginal(&self, attribute: &AttributeId) -> Result<Vec<(Value, Control)>> {
        if !self.dimensions.contains(attribute) {
            return Err(ReconstructionError::coordinate(format!(
                "marginal: '{}' is not a dimension of {:?}",
                attribute, self.dimensions
            )));
        }
        let mut acc: BTreeMap<Value, Control> = BTreeMap::new();
        for (coord, ctrl) in &self.cells {
            if let Some(v) = coord.get(attribute) {
                let slot = acc.entry(v.clone()).or_insert_with(|| Control::zero(self.kind));
                *slot = *slot + *ctrl;
            }
        }
        Ok(acc.into_iter().collect())
    }

    /// Sums cells onto a subset of the dimensions.
    ///
    /// # Errors
    /// `InvalidCoordinate` when `dimensions` is not a subset.
    pub fn project(&self, dimensions: &[AttributeId]) -> Result<FullMatrix> {
        let mut out = FullMatrix::new(dimensions.iter().cloned(), self.kind, self.metadata)?;
        if let Some(missing) = out.dimensions.iter().find(|d| !self.dimensions.contains(d)) {
            return Err(ReconstructionError::coordinate(format!(
                "project: '{}' is not a dimension of {:?}",
                missing, self.dimensions
            )));
        }
        for (coord, ctrl) in &self.cells {
            let key = coord.project(&out.dimensions)?;
            let slot = out.cells.entry(key).or_insert_with(|| Control::zero(self.kind));
            *slot = *slot + *ctrl;
        }
        Ok(out)
    }

    /// Copy with real controls divided by the total, tagged as a global frequency table.
    pub fn normalized(&self) -> FullMatrix {
        let total = self.total().value();
        let cells = self
            .cells
            .iter()
            .map(|(c, v)| {
                let f = if total > 0.0 { v.value() / total } else { 0.0 };
                (c.clone(), Control::Real(f))
            })
            .collect();
        FullMatrix {
            dimensions: self.dimensions.clone(),
            kind: NumericKind::Real,
            metadata: MetaDataType::GlobalFrequencyTable,
            cells,
        }
    }

    /// Copies every cell of `other`, which must have the same dimensions and kind.
    ///
    /// # Errors
    /// `IncompatibleControlTotals` when a coordinate exists in both with
    /// different controls, or the numeric kinds differ.
    pub fn merge_from(&mut self, other: &FullMatrix) -> Result<()> {
        if other.dimensions != self.dimensions {
            return Err(ReconstructionError::coordinate(log_dimension_mismatch(
                "FullMatrix::merge_from",
                &self.dimensions,
                &other.dimensions,
            )));
        }
        if other.kind != self.kind {
            return Err(ReconstructionError::control(format!(
                "merge_from: cannot merge {:?} controls into a {:?} matrix",
                other.kind, self.kind
            )));
        }
        for (coord, ctrl) in &other.cells {
            match self.cells.get(coord) {
                Some(existing) if !existing.equal_value(ctrl) => {
                    return Err(ReconstructionError::control(format!(
                        "merge_from: {} holds {} and {}",
                        coord, existing, ctrl
                    )));
                }
                Some(_) => {}
                None => {
                    self.cells.insert(coord.clone(), *ctrl);
                }
            }
        }
        Ok(())
    }

    /// Re-reads a [`to_csv`](DistributionMatrix::to_csv) dump.
    ///
    /// Header columns name attributes of `registry`, the last column holds
    /// the control; blank fields resolve to the attribute's empty value.
    pub fn from_csv(
        text: &str,
        separator: char,
        registry: &AttributeRegistry,
        kind: NumericKind,
        metadata: MetaDataType,
    ) -> Result<FullMatrix> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(separator_byte(separator)?)
            .from_reader(text.as_bytes());
        let headers = reader.headers()?.clone();
        let n = headers.len();
        if n < 2 || &headers[n - 1] != CSV_VALUE_HEADER {
            return Err(ReconstructionError::arguments(format!(
                "from_csv: expected attribute columns followed by '{}'",
                CSV_VALUE_HEADER
            )));
        }
        let names: Vec<&str> = headers.iter().take(n - 1).collect();
        for name in &names {
            registry.attribute_by_name(name)?;
        }
        let mut matrix = FullMatrix::new(names.iter().map(AttributeId::new), kind, metadata)?;
        for record in reader.records() {
            let record = record?;
            let mut values = Vec::with_capacity(names.len());
            for (name, field) in names.iter().zip(record.iter()) {
                values.push(registry.value(name, field)?);
            }
            let raw = record.get(n - 1).unwrap_or_default().trim();
            let control = match kind {
                NumericKind::Integer => raw.parse::<i64>().map(Control::Integer).map_err(|e| {
                    ReconstructionError::arguments(format!("from_csv: '{}' is not an integer: {}", raw, e))
                })?,
                NumericKind::Real => raw.parse::<f64>().map(Control::Real).map_err(|e| {
                    ReconstructionError::arguments(format!("from_csv: '{}' is not a number: {}", raw, e))
                })?,
            };
            let coordinate = Coordinate::new(values)?;
            if !matrix.add_value(coordinate.clone(), control)? {
                return Err(ReconstructionError::control(format!("from_csv: {} listed twice", coordinate)));
            }
        }
        Ok(matrix)
    }
}

pub(crate) fn separator_byte(separator: char) -> Result<u8> {
    if separator.is_ascii() && separator != '"' && separator != '\n' {
        Ok(separator as u8)
    } else {
        Err(ReconstructionError::arguments(format!(
            "csv separator must be a single ASCII character, got {:?}",
            separator
        )))
    }
}

impl DistributionMatrix for FullMatrix {
    fn dimensions(&self) -> &[AttributeId] {
        &self.dimensions
    }

    fn metadata(&self) -> MetaDataType {
        self.metadata
    }

    fn get_val(&self, coordinate: &Coordinate) -> Result<Control> {
        if !coordinate.covers(&self.dimensions) {
            return Err(ReconstructionError::coordinate(log_dimension_mismatch(
                "FullMatrix::get_val",
                &self.dimensions,
                &coordinate.dimensions(),
            )));
        }
        let key = if coordinate.len() == self.dimensions.len() {
            coordinate.clone()
        } else {
            coordinate.project(&self.dimensions)?
        };
        Ok(self.cells.get(&key).copied().unwrap_or(Control::zero(self.kind)))
    }

    fn get_marginal(&self, values: &[Value]) -> Result<Control> {
        Ok(self
            .cells
            .iter()
            .filter(|(coord, _)| coord.contains_all(values))
            .fold(Control::zero(self.kind), |acc, (_, c)| acc + *c))
    }

    fn inner(&self) -> &[FullMatrix] {
        std::slice::from_ref(self)
    }

    fn size(&self) -> usize {
        self.cells.len()
    }

    fn to_csv(&self, separator: char) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(separator_byte(separator)?)
            .from_writer(Vec::new());
        let mut header: Vec<&str> = self.dimensions.iter().map(|d| d.name()).collect();
        header.push(CSV_VALUE_HEADER);
        writer.write_record(&header)?;
        for (coord, ctrl) in self.cells_sorted() {
            let mut row: Vec<String> = coord.values().iter().map(|v| v.canonical().to_string()).collect();
            row.push(ctrl.to_string());
            writer.write_record(&row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| ReconstructionError::Csv(csv::Error::from(e.into_error())))?;
        String::from_utf8(bytes).map_err(|e| ReconstructionError::arguments(format!("to_csv: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (AttributeRegistry, FullMatrix) {
        let mut reg = AttributeRegistry::new();
        reg.register_unique("sex", &["m", "f"]).unwrap();
        reg.register_unique("work", &["yes", "no"]).unwrap();
        let mut m = FullMatrix::new(
            vec![AttributeId::new("work"), AttributeId::new("sex")],
            NumericKind::Integer,
            MetaDataType::ContingencyTable,
        )
        .unwrap();
        for (s, w, n) in [("m", "yes", 30), ("m", "no", 20), ("f", "yes", 25), ("f", "no", 25)] {
            let c = Coordinate::new(vec![reg.value("sex", s).unwrap(), reg.value("work", w).unwrap()]).unwrap();
            assert!(m.add_value(c, Control::Integer(n)).unwrap());
        }
        (reg, m)
    }

    fn coord(reg: &AttributeRegistry, pairs: &[(&str, &str)]) -> Coordinate {
        Coordinate::new(pairs.iter().map(|(a, v)| reg.value(a, v).unwrap())).unwrap()
    }

    #[test]
    fn add_value_never_overwrites() {
        let (reg, mut m) = setup();
        let c = coord(&reg, &[("sex", "m"), ("work", "yes")]);
        assert!(!m.add_value(c.clone(), Control::Integer(1)).unwrap());
        assert_eq!(m.get_val(&c).unwrap(), Control::Integer(30));
        assert_eq!(m.set_value(c.clone(), Control::Integer(1)).unwrap(), Some(Control::Integer(30)));
        assert_eq!(m.get_val(&c).unwrap(), Control::Integer(1));
    }

    #[test]
    fn foreign_kind_is_rejected() {
        let (reg, mut m) = setup();
        let c = coord(&reg, &[("sex", "m"), ("work", "yes")]);
        let err = m.set_value(c, Control::Real(1.0)).unwrap_err();
        assert!(matches!(err, ReconstructionError::IncompatibleControlTotals(_)));
    }

    #[test]
    fn incomplete_coordinate_is_rejected() {
        let (reg, mut m) = setup();
        let partial = coord(&reg, &[("sex", "m")]);
        assert!(matches!(
            m.add_value(partial.clone(), Control::Integer(1)).unwrap_err(),
            ReconstructionError::InvalidCoordinate(_)
        ));
        assert!(matches!(m.get_val(&partial).unwrap_err(), ReconstructionError::InvalidCoordinate(_)));
    }

    #[test]
    fn lookup_projects_supersets_and_defaults_to_zero() {
        let (mut reg, mut m) = setup();
        reg.register_unique("region", &["n"]).unwrap();
        let wide = coord(&reg, &[("sex", "f"), ("work", "no"), ("region", "n")]);
        assert_eq!(m.get_val(&wide).unwrap(), Control::Integer(25));

        let c = coord(&reg, &[("sex", "f"), ("work", "no")]);
        m.set_value(c.clone(), Control::Integer(0)).unwrap();
        let absent = coord(&reg, &[("sex", "f"), ("work", "")]);
        assert_eq!(m.get_val(&absent).unwrap(), Control::Integer(0));
    }

    #[test]
    fn marginal_query_scans_cells() {
        let (reg, m) = setup();
        let male = reg.value("sex", "m").unwrap();
        assert_eq!(m.get_marginal(&[male.clone()]).unwrap(), Control::Integer(50));
        let yes = reg.value("work", "yes").unwrap();
        assert_eq!(m.get_marginal(&[male, yes]).unwrap(), Control::Integer(30));
        assert_eq!(m.get_marginal(&[]).unwrap(), Control::Integer(100));
        assert_eq!(m.total(), Control::Integer(100));

        let by_sex = m.marginal(&AttributeId::new("sex")).unwrap();
        assert_eq!(by_sex.len(), 2);
        assert_eq!(by_sex[0].0.canonical(), "f");
        assert_eq!(by_sex[0].1, Control::Integer(50));
    }

    #[test]
    fn project_and_normalize() {
        let (_, m) = setup();
        let p = m.project(&[AttributeId::new("work")]).unwrap();
        assert_eq!(p.size(), 2);
        assert_eq!(p.total(), Control::Integer(100));
        assert!(m.project(&[AttributeId::new("nope")]).is_err());

        let n = m.normalized();
        assert_eq!(n.kind(), NumericKind::Real);
        assert_eq!(n.metadata(), MetaDataType::GlobalFrequencyTable);
        assert!((n.total().value() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn csv_is_sorted_and_reparses() {
        let (reg, m) = setup();
        let text = m.to_csv(';').unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("sex;work;value"));
        assert_eq!(lines.next(), Some("f;no;25"));
        let back = FullMatrix::from_csv(&text, ';', &reg, NumericKind::Integer, MetaDataType::ContingencyTable).unwrap();
        assert_eq!(back.size(), m.size());
        for (c, v) in m.cells() {
            assert_eq!(back.get_val(c).unwrap(), *v);
        }
    }

    #[test]
    fn merge_detects_conflicts() {
        let (reg, mut m) = setup();
        let copy = m.clone();
        m.merge_from(&copy).unwrap();
        assert_eq!(m.size(), 4);

        let mut other = copy.clone();
        other
            .set_value(coord(&reg, &[("sex", "m"), ("work", "yes")]), Control::Integer(31))
            .unwrap();
        assert!(matches!(m.merge_from(&other).unwrap_err(), ReconstructionError::IncompatibleControlTotals(_)));
    }
}
