use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::quote::{PriceQuotes, Quote};
use super::traits::PriceFeed;

/// Exchange suffixes and the currency their listings trade in.
const SUFFIX_CURRENCIES: &[(&str, &str)] = &[(".HK", "HKD"), (".SS", "CNY"), (".SZ", "CNY")];

/// Yahoo Finance quote feed.
///
/// No API key required. Listings are priced in their exchange currency
/// (`0700.HK` → HKD), so quotes carry that currency and the ledger converts
/// them. Cross rates for `tracked_currencies` are read from the `XXXUSD=X`
/// style pairs against the ledger base currency.
///
/// **Note**: Not WASM-compatible (uses native reqwest/tokio).
pub struct YahooQuoteFeed {
    connector: yahoo_finance_api::YahooConnector,
    base_currency: String,
    tracked_currencies: Vec<String>,
}

impl YahooQuoteFeed {
    pub fn new(base_currency: &str, tracked_currencies: &[String]) -> Result<Self, CoreError> {
        let connector = yahoo_finance_api::YahooConnector::new().map_err(|e| CoreError::Api {
            status: 0,
            message: format!("Yahoo Finance: failed to create connector: {e}"),
        })?;
        Ok(Self {
            connector,
            base_currency: base_currency.trim().to_uppercase(),
            tracked_currencies: tracked_currencies.iter().map(|c| c.trim().to_uppercase()).collect(),
        })
    }

    /// Quote currency implied by a symbol's exchange suffix; `None` means the base.
    pub fn currency_for_symbol(symbol: &str) -> Option<&'static str> {
        let upper = symbol.to_uppercase();
        SUFFIX_CURRENCIES
            .iter()
            .find(|(suffix, _)| upper.ends_with(suffix))
            .map(|(_, currency)| *currency)
    }

    async fn last_close(&self, symbol: &str) -> Result<f64, CoreError> {
        let resp = self
            .connector
            .get_latest_quotes(symbol, "1d")
            .await
            .map_err(|e| CoreError::Api {
                status: 0,
                message: format!("Yahoo Finance: failed to fetch latest quote for {symbol}: {e}"),
            })?;
        let quote = resp.last_quote().map_err(|e| CoreError::Api {
            status: 0,
            message: format!("Yahoo Finance: no quote data for {symbol}: {e}"),
        })?;
        Ok(quote.close)
    }
}

#[async_trait]
impl PriceFeed for YahooQuoteFeed {
    fn name(&self) -> &str {
        "Yahoo Finance"
    }

    async fn fetch_quotes(&self, symbols: &[String]) -> Result<PriceQuotes, CoreError> {
        let mut quotes = PriceQuotes::new();
        let today = chrono::Utc::now().date_naive().to_string();

        for symbol in symbols {
            match self.last_close(symbol).await {
                Ok(price) => {
                    let mut quote = match Self::currency_for_symbol(symbol) {
                        Some(currency) if currency != self.base_currency => {
                            Quote::in_currency(price, currency)
                        }
                        _ => Quote::new(price),
                    };
                    quote.last_updated = Some(today.clone());
                    quotes.insert(symbol.clone(), quote);
                }
                Err(e) => log::warn!("{e}"),
            }
        }

        for currency in &self.tracked_currencies {
            if *currency == self.base_currency {
                continue;
            }
            let pair = format!("{currency}{}=X", self.base_currency);
            match self.last_close(&pair).await {
                Ok(rate) => {
                    let mut quote = Quote::new(rate);
                    quote.last_updated = Some(today.clone());
                    quotes.insert(currency.clone(), quote);
                }
                Err(e) => log::warn!("{e}"),
            }
        }

        Ok(quotes)
    }
}
