use crate::errors::CoreError;
use crate::models::rates::ExchangeRates;

/// Converts amounts between currencies using an `ExchangeRates` table.
///
/// Every rate is expressed against the table's base currency, so any pair
/// goes through the base: `amount × rate(from) / rate(to)`.
/// E.g., with base USD and HKD = 0.1286, 1000 USD → ~7773 HKD.
pub struct CurrencyService;

impl CurrencyService {
    pub fn new() -> Self {
        Self
    }

    /// Convert `amount` from `from_currency` into `to_currency`.
    pub fn convert(
        &self,
        rates: &ExchangeRates,
        amount: f64,
        from_currency: &str,
        to_currency: &str,
    ) -> Result<f64, CoreError> {
        let from = from_currency.trim().to_uppercase();
        let to = to_currency.trim().to_uppercase();

        if from == to {
            return Ok(amount);
        }

        let from_rate = rates
            .rate(&from)
            .ok_or_else(|| CoreError::UnknownCurrency(from.clone()))?;
        let to_rate = rates
            .rate(&to)
            .ok_or_else(|| CoreError::UnknownCurrency(to.clone()))?;

        Ok(amount * from_rate / to_rate)
    }

    /// Convert an amount stored in the table's base currency into `display_currency`.
    pub fn to_display(
        &self,
        rates: &ExchangeRates,
        amount: f64,
        display_currency: &str,
    ) -> Result<f64, CoreError> {
        self.convert(rates, amount, &rates.base, display_currency)
    }

    /// Convert a quoted price into the base currency.
    /// Quotes without a currency are assumed to already be in the base.
    pub fn quote_to_base(
        &self,
        rates: &ExchangeRates,
        price: f64,
        quote_currency: Option<&str>,
    ) -> Result<f64, CoreError> {
        match quote_currency {
            Some(code) => self.convert(rates, price, code, &rates.base),
            None => Ok(price),
        }
    }
}

impl Default for CurrencyService {
    fn default() -> Self {
        Self::new()
    }
}
