//! Named per-cell field arrays.

use crate::export_error::ExportError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Physical quantity a field is measured in. Unit conversion is left to the
/// persistence backend; the measure only travels with the data.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Measure {
    Identity,
    Pressure,
    Temperature,
    GasOilRatio,
    OilGasRatio,
    Transmissibility,
    Volume,
}

/// Which record a field belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetType {
    /// Written to restart records and read back on restart.
    RestartSolution,
    /// Written to restart records for post-processing only.
    RestartAuxiliary,
    /// Static data of the initial-state record.
    Init,
}

/// One named cell array with its measure and destination.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellData {
    pub measure: Measure,
    pub data: Vec<f64>,
    pub target: TargetType,
}

impl CellData {
    pub fn new(measure: Measure, data: Vec<f64>, target: TargetType) -> Self {
        Self {
            measure,
            data,
            target,
        }
    }

    /// Zero-filled array of `len` cells.
    pub fn zeros(measure: Measure, len: usize, target: TargetType) -> Self {
        Self::new(measure, vec![0.0; len], target)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Field name → cell array. Ordered so records serialize deterministically.
pub type FieldTable = BTreeMap<String, CellData>;

/// Check that every array of `table` has `expected` entries.
pub fn check_field_lengths(table: &FieldTable, expected: usize) -> Result<(), ExportError> {
    for (name, cell) in table {
        if cell.len() != expected {
            return Err(ExportError::BufferSizeMismatch {
                name: name.clone(),
                expected,
                found: cell.len(),
            });
        }
    }
    Ok(())
}

/// Round every array through `f32`, as single-precision records store it.
pub fn round_to_single(table: &mut FieldTable) {
    for cell in table.values_mut() {
        for v in &mut cell.data {
            *v = f64::from(*v as f32);
        }
    }
}
