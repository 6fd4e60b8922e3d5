use serde_json::Value;

use crate::errors::CoreError;
use crate::models::year_data::{parse_year, YearData, YearMap};

/// JSON backup of the full year map.
pub struct BackupManager;

impl BackupManager {
    /// Serialize every year to pretty-printed JSON.
    pub fn export_json(years: &YearMap) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(years)?)
    }

    /// Parse a backup.
    ///
    /// The top level must be an object whose keys are 4-digit years and whose
    /// values are year objects. Any violation rejects the whole document.
    pub fn import_json(json: &str) -> Result<YearMap, CoreError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| CoreError::ImportParse(format!("Not valid JSON: {e}")))?;
        let Value::Object(entries) = value else {
            return Err(CoreError::ImportParse(
                "Expected an object keyed by year".into(),
            ));
        };

        let mut years = YearMap::new();
        for (key, data) in entries {
            parse_year(&key)
                .map_err(|_| CoreError::ImportParse(format!("Invalid year key '{key}'")))?;
            if !data.is_object() {
                return Err(CoreError::ImportParse(format!(
                    "Year {key}: expected an object"
                )));
            }
            let year: YearData = serde_json::from_value(data)
                .map_err(|e| CoreError::ImportParse(format!("Year {key}: {e}")))?;
            years.insert(key.trim().to_string(), year);
        }
        Ok(years)
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn export_to_file(years: &YearMap, path: impl AsRef<std::path::Path>) -> Result<(), CoreError> {
        std::fs::write(path, Self::export_json(years)?)?;
        Ok(())
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn import_from_file(path: impl AsRef<std::path::Path>) -> Result<YearMap, CoreError> {
        let json = std::fs::read_to_string(path)?;
        Self::import_json(&json)
    }
}
