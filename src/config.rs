//! Runtime configuration of the export writer.

use crate::export_error::ExportError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Output settings. Missing keys take their defaults when deserializing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Write steps on a background thread of the I/O rank.
    pub enable_async_output: bool,
    /// Store cell data as `f64`; otherwise values are rounded through `f32`.
    pub double_precision: bool,
    pub output_dir: PathBuf,
    pub case_name: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enable_async_output: true,
            double_precision: false,
            output_dir: PathBuf::from("."),
            case_name: "CASE".to_owned(),
        }
    }
}

impl ExportConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ExportError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn with_async_output(mut self, enabled: bool) -> Self {
        self.enable_async_output = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = ExportConfig::from_json_str(r#"{"double_precision": true}"#).unwrap();
        assert!(cfg.double_precision);
        assert!(cfg.enable_async_output);
        assert_eq!(cfg.case_name, "CASE");
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let err = ExportConfig::from_json_str("{").unwrap_err();
        assert!(matches!(err, ExportError::Serialization(_)));
    }
}
