use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::CoreError;

use super::quote::PriceQuotes;

/// Exchange rates relative to a fixed base currency.
///
/// `rates[code]` is the value of one unit of `code` expressed in the base
/// currency, so the base itself is always 1.0. Values are last-known-good:
/// a failed refresh leaves the previous rates in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRates {
    pub base: String,
    pub rates: HashMap<String, f64>,
}

impl ExchangeRates {
    /// Empty table containing only the base currency.
    pub fn new(base: &str) -> Self {
        let base = base.trim().to_uppercase();
        let mut rates = HashMap::new();
        rates.insert(base.clone(), 1.0);
        Self { base, rates }
    }

    /// Rate of one unit of `currency` in the base currency.
    pub fn rate(&self, currency: &str) -> Option<f64> {
        let code = currency.trim().to_uppercase();
        if code == self.base {
            return Some(1.0);
        }
        self.rates.get(&code).copied()
    }

    /// Set a rate. Rates must be finite and positive; the base cannot be re-rated.
    pub fn set_rate(&mut self, currency: &str, rate: f64) -> Result<(), CoreError> {
        let code = currency.trim().to_uppercase();
        if !rate.is_finite() || rate <= 0.0 {
            return Err(CoreError::Validation(format!(
                "Exchange rate for {code} must be finite and positive, got {rate}"
            )));
        }
        if code == self.base {
            return Err(CoreError::Validation(format!(
                "Cannot override the base currency rate ({code})"
            )));
        }
        self.rates.insert(code, rate);
        Ok(())
    }

    /// Pull cross-rate entries for `tracked` currencies out of a feed result.
    /// Unusable entries are skipped so the previous rate survives.
    /// Returns the number of rates updated.
    pub fn absorb_quotes(&mut self, quotes: &PriceQuotes, tracked: &[String]) -> usize {
        let mut updated = 0;
        for code in tracked {
            if let Some(quote) = quotes.get(code) {
                if self.set_rate(code, quote.price).is_ok() {
                    updated += 1;
                } else {
                    log::warn!("Ignoring invalid cross rate for {code}: {}", quote.price);
                }
            }
        }
        updated
    }

    /// All known currency codes, sorted.
    pub fn currencies(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.rates.keys().cloned().collect();
        codes.sort();
        codes
    }
}

impl Default for ExchangeRates {
    /// USD base with the HKD and CNY rates the app starts with before the first refresh.
    fn default() -> Self {
        let mut rates = Self::new("USD");
        rates.rates.insert("HKD".into(), 0.128_643_84);
        rates.rates.insert("CNY".into(), 0.14);
        rates
    }
}
