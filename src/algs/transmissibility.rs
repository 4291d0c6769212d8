//! Per-connection transmissibility providers.
//!
//! Transmissibilities are addressed by *active* cell indices of the
//! [`GlobalGrid`](crate::topology::grid::GlobalGrid) and are symmetric:
//! `t(a, b) == t(b, a)`.

use crate::export_error::ExportError;
use std::collections::HashMap;
use std::sync::Arc;

/// Source of the flow conductance between two face-sharing cells.
pub trait Transmissibility: Send + Sync {
    fn transmissibility(&self, cell1: usize, cell2: usize) -> f64;
}

impl<F> Transmissibility for F
where
    F: Fn(usize, usize) -> f64 + Send + Sync,
{
    fn transmissibility(&self, cell1: usize, cell2: usize) -> f64 {
        self(cell1, cell2)
    }
}

/// The same value for every connection.
#[derive(Copy, Clone, Debug)]
pub struct UniformTransmissibility(pub f64);

impl Transmissibility for UniformTransmissibility {
    fn transmissibility(&self, _cell1: usize, _cell2: usize) -> f64 {
        self.0
    }
}

/// Explicit table; pairs not listed have zero transmissibility.
#[derive(Clone, Debug, Default)]
pub struct TransmissibilityMap {
    values: HashMap<(usize, usize), f64>,
}

impl TransmissibilityMap {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn key(a: usize, b: usize) -> (usize, usize) {
        (a.min(b), a.max(b))
    }

    pub fn insert(&mut self, cell1: usize, cell2: usize, trans: f64) {
        self.values.insert(Self::key(cell1, cell2), trans);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Transmissibility for TransmissibilityMap {
    fn transmissibility(&self, cell1: usize, cell2: usize) -> f64 {
        self.values
            .get(&Self::key(cell1, cell2))
            .copied()
            .unwrap_or(0.0)
    }
}

/// The two places transmissibilities come from.
///
/// The model computes *sequential* transmissibilities for the mesh it runs
/// on. A distributed run keeps a separate *global* set for the whole grid,
/// and a single-rank run does not maintain one at all, so the choice is
/// dictated by the run layout.
#[derive(Clone)]
pub struct TransmissibilitySource {
    sequential: Arc<dyn Transmissibility>,
    global: Option<Arc<dyn Transmissibility>>,
}

impl TransmissibilitySource {
    pub fn new(
        sequential: Arc<dyn Transmissibility>,
        global: Option<Arc<dyn Transmissibility>>,
    ) -> Self {
        Self { sequential, global }
    }

    /// Single-rank runs: only the sequential set exists.
    pub fn sequential(provider: Arc<dyn Transmissibility>) -> Self {
        Self::new(provider, None)
    }

    /// Provider addressing the global grid for this run layout.
    pub fn select(&self, is_parallel: bool) -> Result<&dyn Transmissibility, ExportError> {
        if is_parallel {
            self.global
                .as_deref()
                .ok_or(ExportError::MissingGlobalTransmissibility)
        } else {
            Ok(self.sequential.as_ref())
        }
    }
}

impl std::fmt::Debug for TransmissibilitySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransmissibilitySource")
            .field("has_global", &self.global.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl std::fmt::Debug for dyn Transmissibility + '_ {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("dyn Transmissibility")
        }
    }

    #[test]
    fn map_is_symmetric() {
        let mut m = TransmissibilityMap::new();
        m.insert(4, 1, 2.5);
        assert_eq!(m.transmissibility(1, 4), 2.5);
        assert_eq!(m.transmissibility(4, 1), 2.5);
        assert_eq!(m.transmissibility(1, 2), 0.0);
    }

    #[test]
    fn serial_run_ignores_global_set() {
        let src = TransmissibilitySource::new(
            Arc::new(UniformTransmissibility(1.0)),
            Some(Arc::new(UniformTransmissibility(9.0))),
        );
        assert_eq!(src.select(false).unwrap().transmissibility(0, 1), 1.0);
        assert_eq!(src.select(true).unwrap().transmissibility(0, 1), 9.0);
    }

    #[test]
    fn parallel_run_requires_global_set() {
        let src = TransmissibilitySource::sequential(Arc::new(|_: usize, _: usize| 3.0));
        assert_eq!(
            src.select(true).unwrap_err(),
            ExportError::MissingGlobalTransmissibility
        );
    }
}
