//! Test fixtures: registries and small contingency tables.
#![allow(unused)]

use synthpop_kernels::prelude::*;

/// Registry with `attrs[i]` holding values `attrs[i]0 .. attrs[i]{n-1}`.
pub fn indexed_registry(attrs: &[(&str, usize)]) -> AttributeRegistry {
    let mut reg = AttributeRegistry::new();
    for &(name, n) in attrs {
        let values: Vec<String> = (0..n).map(|i| format!("{name}{i}")).collect();
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        reg.register_unique(name, &refs).unwrap();
    }
    reg
}

pub fn coord(reg: &AttributeRegistry, pairs: &[(&str, &str)]) -> Coordinate {
    Coordinate::new(pairs.iter().map(|(a, v)| reg.value(a, v).unwrap())).unwrap()
}

/// Integer table over `x` (rows) and `y` (columns) of an indexed registry.
/// Zero counts are left out of the sparse storage.
pub fn table<const R: usize, const C: usize>(
    reg: &AttributeRegistry,
    x: &str,
    y: &str,
    counts: [[i64; C]; R],
    metadata: MetaDataType,
) -> FullMatrix {
    let mut m = FullMatrix::new(
        vec![AttributeId::new(x), AttributeId::new(y)],
        NumericKind::Integer,
        metadata,
    )
    .unwrap();
    for (i, row) in counts.iter().enumerate() {
        for (j, &n) in row.iter().enumerate() {
            if n == 0 {
                continue;
            }
            let (xv, yv) = (format!("{x}{i}"), format!("{y}{j}"));
            let c = coord(reg, &[(x, xv.as_str()), (y, yv.as_str())]);
            assert!(m.add_value(c, Control::Integer(n)).unwrap());
        }
    }
    m
}

/// One-dimensional real marginal over an indexed attribute.
pub fn marginal<const N: usize>(reg: &AttributeRegistry, attr: &str, values: [f64; N]) -> FullMatrix {
    let mut m = FullMatrix::new(
        vec![AttributeId::new(attr)],
        NumericKind::Real,
        MetaDataType::ContingencyTable,
    )
    .unwrap();
    for (i, &v) in values.iter().enumerate() {
        let value = format!("{attr}{i}");
        m.add_value(coord(reg, &[(attr, value.as_str())]), Control::Real(v))
            .unwrap();
    }
    m
}

/// Real table over `x` (rows) and `y` (columns) of an indexed registry.
pub fn real_table<const R: usize, const C: usize>(
    reg: &AttributeRegistry,
    x: &str,
    y: &str,
    frequencies: [[f64; C]; R],
    metadata: MetaDataType,
) -> FullMatrix {
    let mut m = FullMatrix::new(
        vec![AttributeId::new(x), AttributeId::new(y)],
        NumericKind::Real,
        metadata,
    )
    .unwrap();
    for (i, row) in frequencies.iter().enumerate() {
        for (j, &f) in row.iter().enumerate() {
            let (xv, yv) = (format!("{x}{i}"), format!("{y}{j}"));
            let c = coord(reg, &[(x, xv.as_str()), (y, yv.as_str())]);
            m.add_value(c, Control::Real(f)).unwrap();
        }
    }
    m
}
