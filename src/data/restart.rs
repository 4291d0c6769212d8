//! Restart key catalog and the values a restart load returns.
//!
//! Which fields a restart needs depends on the physics that is switched on
//! when the run resumes, so the catalog is built from a [`PhysicalConfig`]
//! at read time rather than fixed up front.

use crate::data::field::{FieldTable, Measure};
use crate::export_error::ExportError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Physics switches that decide which restart fields exist.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalConfig {
    pub water_active: bool,
    pub gas_active: bool,
    pub oil_active: bool,
    pub enable_hysteresis: bool,
    pub enable_dissolved_gas: bool,
    pub enable_vaporized_oil: bool,
    pub vappars_active: bool,
}

impl Default for PhysicalConfig {
    fn default() -> Self {
        Self {
            water_active: true,
            gas_active: true,
            oil_active: true,
            enable_hysteresis: false,
            enable_dissolved_gas: true,
            enable_vaporized_oil: false,
            vappars_active: false,
        }
    }
}

/// Measure of a restart field and whether the current physics needs it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RestartKey {
    pub measure: Measure,
    pub required: bool,
}

impl RestartKey {
    pub const fn new(measure: Measure, required: bool) -> Self {
        Self { measure, required }
    }
}

/// Solution fields to load on restart.
#[derive(Clone, Debug, PartialEq)]
pub struct RestartCatalog {
    keys: BTreeMap<String, RestartKey>,
}

impl RestartCatalog {
    /// The black-oil solution catalog evaluated against `physics`.
    pub fn for_physics(physics: &PhysicalConfig) -> Self {
        use Measure::*;
        let hyst = physics.enable_hysteresis;
        let keys = [
            ("PRESSURE", RestartKey::new(Pressure, true)),
            ("SWAT", RestartKey::new(Identity, physics.water_active)),
            ("SGAS", RestartKey::new(Identity, physics.gas_active)),
            ("TEMP", RestartKey::new(Temperature, true)),
            ("RS", RestartKey::new(GasOilRatio, physics.enable_dissolved_gas)),
            ("RV", RestartKey::new(OilGasRatio, physics.enable_vaporized_oil)),
            ("SOMAX", RestartKey::new(Identity, physics.vappars_active)),
            ("PCSWM_OW", RestartKey::new(Identity, hyst)),
            ("KRNSW_OW", RestartKey::new(Identity, hyst)),
            ("PCSWM_GO", RestartKey::new(Identity, hyst)),
            ("KRNSW_GO", RestartKey::new(Identity, hyst)),
        ];
        Self {
            keys: keys
                .into_iter()
                .map(|(name, key)| (name.to_owned(), key))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&RestartKey> {
        self.keys.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RestartKey)> {
        self.keys.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Names the current physics asks for.
    pub fn required_names(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|(_, k)| k.required).map(|(n, _)| n)
    }

    /// Pick the requested fields out of a stored solution.
    ///
    /// Every required key must be present; keys whose condition is off are
    /// not copied even when the record has them.
    pub fn select(&self, stored: &FieldTable) -> Result<FieldTable, ExportError> {
        let mut out = FieldTable::new();
        for name in self.required_names() {
            let cell = stored
                .get(name)
                .ok_or_else(|| ExportError::MissingRestartField(name.to_owned()))?;
            out.insert(name.to_owned(), cell.clone());
        }
        Ok(out)
    }
}

/// Extra (non-cell) restart arrays: name → must be present.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtraKeys(BTreeMap<String, bool>);

impl ExtraKeys {
    /// Name of the array holding the suggested next step size.
    pub const NEXT_STEP: &'static str = "OPMEXTRA";

    pub fn standard() -> Self {
        Self(BTreeMap::from([(Self::NEXT_STEP.to_owned(), false)]))
    }

    pub fn select(
        &self,
        stored: &BTreeMap<String, Vec<f64>>,
    ) -> Result<BTreeMap<String, Vec<f64>>, ExportError> {
        let mut out = BTreeMap::new();
        for (name, &required) in &self.0 {
            match stored.get(name) {
                Some(values) => {
                    out.insert(name.clone(), values.clone());
                }
                None if required => return Err(ExportError::MissingRestartField(name.clone())),
                None => {}
            }
        }
        Ok(out)
    }
}

/// What a restart load hands back: global-indexed solution fields plus
/// extra arrays.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RestartValues {
    pub solution: FieldTable,
    pub extra: BTreeMap<String, Vec<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::field::{CellData, TargetType};

    fn table(names: &[&str]) -> FieldTable {
        names
            .iter()
            .map(|n| {
                (
                    (*n).to_owned(),
                    CellData::zeros(Measure::Identity, 2, TargetType::RestartSolution),
                )
            })
            .collect()
    }

    #[test]
    fn hysteresis_keys_follow_physics() {
        let off = RestartCatalog::for_physics(&PhysicalConfig::default());
        assert!(!off.get("PCSWM_OW").unwrap().required);
        let on = RestartCatalog::for_physics(&PhysicalConfig {
            enable_hysteresis: true,
            ..PhysicalConfig::default()
        });
        assert!(on.get("KRNSW_GO").unwrap().required);
    }

    #[test]
    fn missing_temperature_fails() {
        let cat = RestartCatalog::for_physics(&PhysicalConfig::default());
        let err = cat.select(&table(&["PRESSURE", "SWAT", "SGAS", "RS"])).unwrap_err();
        assert_eq!(err, ExportError::MissingRestartField("TEMP".into()));
    }

    #[test]
    fn inactive_keys_are_not_copied() {
        let cat = RestartCatalog::for_physics(&PhysicalConfig::default());
        let got = cat
            .select(&table(&["PRESSURE", "SWAT", "SGAS", "RS", "RV", "TEMP"]))
            .unwrap();
        assert!(got.contains_key("RS"));
        assert!(!got.contains_key("RV"));
    }

    #[test]
    fn optional_extra_may_be_absent() {
        let got = ExtraKeys::standard().select(&BTreeMap::new()).unwrap();
        assert!(got.is_empty());
    }
}
