//! Per-well results, including formation-test columns on connections.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One well-to-cell connection (perforation).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WellConnection {
    /// Global active cell index of the perforated cell.
    pub cell: usize,
    /// Surface rates by phase name.
    pub rates: BTreeMap<String, f64>,
    pub pressure: f64,
    /// Formation-test columns, filled by the rank owning `cell`.
    pub cell_pressure: Option<f64>,
    pub cell_saturation_water: Option<f64>,
    pub cell_saturation_gas: Option<f64>,
}

impl WellConnection {
    pub fn new(cell: usize) -> Self {
        Self {
            cell,
            ..Self::default()
        }
    }

    fn merge_columns(&mut self, other: &WellConnection) {
        self.cell_pressure = self.cell_pressure.or(other.cell_pressure);
        self.cell_saturation_water = self.cell_saturation_water.or(other.cell_saturation_water);
        self.cell_saturation_gas = self.cell_saturation_gas.or(other.cell_saturation_gas);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Well {
    pub rates: BTreeMap<String, f64>,
    pub bhp: f64,
    pub thp: f64,
    pub temperature: f64,
    pub connections: Vec<WellConnection>,
}

/// Well name → results.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WellData {
    pub wells: BTreeMap<String, Well>,
}

impl WellData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, well: Well) {
        self.wells.insert(name.into(), well);
    }

    pub fn get(&self, name: &str) -> Option<&Well> {
        self.wells.get(name)
    }

    pub fn len(&self) -> usize {
        self.wells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wells.is_empty()
    }

    /// Fold another rank's view of the wells into this one.
    ///
    /// Wells unknown here are adopted whole. For known wells the rates stay
    /// as they are and connection columns are filled from `other` wherever
    /// this side has none; columns are only ever set by one rank.
    pub fn merge_from(&mut self, other: &WellData) {
        for (name, theirs) in &other.wells {
            match self.wells.get_mut(name) {
                None => {
                    self.wells.insert(name.clone(), theirs.clone());
                }
                Some(ours) => {
                    for conn in &theirs.connections {
                        match ours.connections.iter_mut().find(|c| c.cell == conn.cell) {
                            Some(mine) => mine.merge_columns(conn),
                            None => ours.connections.push(conn.clone()),
                        }
                    }
                }
            }
        }
    }
}
