#![allow(unused)]

use synthpop_kernels::prelude::*;

/// Absolute-or-relative closeness, relative once `|e| > 1`.
pub fn assert_close(a: f64, e: f64, tol: f64) {
    let scale = 1.0_f64.max(e.abs());
    let ok = (a - e).abs() <= tol * scale;
    assert!(ok, "mismatch: got {a}, expect {e} (tol={tol})");
}

pub fn assert_slice_close(a: &[f64], e: &[f64], tol: f64) {
    assert_eq!(a.len(), e.len(), "len mismatch");
    for (i, (&ai, &ei)) in a.iter().zip(e.iter()).enumerate() {
        let scale = 1.0_f64.max(ei.abs());
        let ok = (ai - ei).abs() <= tol * scale;
        assert!(ok, "idx {i}: got {ai}, expect {ei} (tol={tol})");
    }
}

/// Controls of `matrix` summed per value of `attribute`, in value order.
pub fn marginal_values(matrix: &FullMatrix, attribute: &str) -> Vec<(String, f64)> {
    matrix
        .marginal(&AttributeId::new(attribute))
        .unwrap()
        .into_iter()
        .map(|(v, c)| (v.canonical().to_string(), c.value()))
        .collect()
}

/// Observed share of draws holding `value`.
pub fn share_of(draws: &[Coordinate], value: &Value) -> f64 {
    let hits = draws.iter().filter(|c| c.contains(value)).count();
    hits as f64 / draws.len() as f64
}

/// Installs a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
