use crate::errors::CoreError;
use crate::models::year_data::YearMap;

use super::kv::KeyValueStore;

pub const YEAR_DATA_KEY: &str = "stockPortfolioData";
pub const YEAR_LIST_KEY: &str = "stockPortfolioYears";
pub const SELECTED_YEAR_KEY: &str = "stockPortfolioSelectedYear";

/// The locally persisted state of a signed-out session.
///
/// Stored under three keys: the year map and the year list as JSON, the
/// selected year as a plain string.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocalSnapshot {
    pub years: YearMap,
    /// Year keys, newest first.
    pub year_list: Vec<String>,
    pub selected_year: Option<String>,
}

impl LocalSnapshot {
    pub fn new(years: YearMap, selected_year: Option<String>) -> Self {
        let year_list = years.keys().rev().cloned().collect();
        Self {
            years,
            year_list,
            selected_year,
        }
    }

    pub fn save(&self, store: &mut dyn KeyValueStore) -> Result<(), CoreError> {
        store.set(YEAR_DATA_KEY, &serde_json::to_string(&self.years)?)?;
        store.set(YEAR_LIST_KEY, &serde_json::to_string(&self.year_list)?)?;
        match &self.selected_year {
            Some(year) => store.set(SELECTED_YEAR_KEY, year)?,
            None => store.remove(SELECTED_YEAR_KEY)?,
        }
        Ok(())
    }

    /// Load a saved snapshot. `None` when nothing was ever saved.
    ///
    /// A missing year list is rebuilt from the year map; a selected year that
    /// is not in the map is dropped.
    pub fn load(store: &dyn KeyValueStore) -> Result<Option<Self>, CoreError> {
        let Some(raw) = store.get(YEAR_DATA_KEY)? else {
            return Ok(None);
        };
        let years: YearMap = serde_json::from_str(&raw)?;

        let year_list = match store.get(YEAR_LIST_KEY)? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => years.keys().rev().cloned().collect(),
        };
        let selected_year = store
            .get(SELECTED_YEAR_KEY)?
            .filter(|year| years.contains_key(year));

        Ok(Some(Self {
            years,
            year_list,
            selected_year,
        }))
    }

    pub fn clear(store: &mut dyn KeyValueStore) -> Result<(), CoreError> {
        store.remove(YEAR_DATA_KEY)?;
        store.remove(YEAR_LIST_KEY)?;
        store.remove(SELECTED_YEAR_KEY)?;
        Ok(())
    }
}
