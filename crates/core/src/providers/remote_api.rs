use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;

use crate::errors::CoreError;
use crate::models::changes::IncrementalChanges;
use crate::models::quote::PriceQuotes;
use crate::models::year_data::{YearData, YearMap};
use super::traits::{PriceFeed, RemoteStore};

#[cfg(not(target_arch = "wasm32"))]
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Messages the backend uses for rejected credentials (besides HTTP 401).
const EXPIRED_TOKEN_MARKERS: &[&str] = &["无效或过期的令牌", "invalid or expired token"];

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct YearListResponse {
    #[serde(default)]
    years: Vec<String>,
}

#[derive(Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
struct UpdatePricesRequest<'a> {
    symbols: &'a [String],
}

#[derive(Deserialize)]
struct UpdatePricesResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: PriceQuotes,
    #[serde(default)]
    message: Option<String>,
}

// ── Client ──────────────────────────────────────────────────────────

/// HTTP client for the portfolio backend.
///
/// - `GET  /api/data?mode=years`        → `{ "years": [...] }`
/// - `GET  /api/data?mode=year&year=Y`  → one `YearData`
/// - `GET  /api/data`                   → the full year map (legacy)
/// - `POST /api/updateNotion`           → submit `IncrementalChanges`
/// - `POST /api/updatePrices`           → `{ success, data: { symbol → quote } }`
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpRemoteStore {
    pub fn new(base_url: &str, token: impl Into<String>) -> Self {
        let builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        Self {
            client: builder.build().unwrap_or_else(|_| Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn headers(&self) -> Result<HeaderMap, CoreError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|_| CoreError::Validation("Invalid access token format".into()))?;
        headers.insert(AUTHORIZATION, auth);
        Ok(headers)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, CoreError> {
        let url = format!("{}{path}", self.base_url);
        let response = self.client.get(&url).headers(self.headers()?).send().await?;
        parse_response(response).await
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, CoreError> {
        let url = format!("{}{path}", self.base_url);
        Ok(self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(body)
            .send()
            .await?)
    }
}

/// Read a response body, mapping non-success statuses onto `CoreError`.
async fn read_body(response: reqwest::Response) -> Result<(StatusCode, String), CoreError> {
    let status = response.status();
    let body = response.text().await?;
    debug!("API response ({status}): {} bytes", body.len());

    if !status.is_success() {
        let message = serde_json::from_str::<MessageResponse>(&body)
            .ok()
            .and_then(|m| m.message)
            .unwrap_or_else(|| format!("Request failed: {body}"));
        return Err(classify_failure(status, message));
    }
    Ok((status, body))
}

/// Decode a JSON response body.
async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, CoreError> {
    let (status, body) = read_body(response).await?;
    serde_json::from_str(&body).map_err(|e| {
        log::error!("Failed to deserialize response ({status}): {e}");
        CoreError::Api {
            status: status.as_u16(),
            message: format!("Failed to parse response: {e}"),
        }
    })
}

/// 401 or an expired-token message means the session is gone.
pub fn classify_failure(status: StatusCode, message: String) -> CoreError {
    if status == StatusCode::UNAUTHORIZED || is_expired_token_message(&message) {
        return CoreError::SessionExpired;
    }
    CoreError::Api {
        status: status.as_u16(),
        message,
    }
}

pub fn is_expired_token_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    EXPIRED_TOKEN_MARKERS.iter().any(|m| lower.contains(m))
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl RemoteStore for HttpRemoteStore {
    async fn fetch_year_list(&self) -> Result<Vec<String>, CoreError> {
        let resp: YearListResponse = self.get_json("/api/data?mode=years").await?;
        Ok(resp.years)
    }

    async fn fetch_year(&self, year: &str) -> Result<YearData, CoreError> {
        self.get_json(&format!("/api/data?mode=year&year={year}")).await
    }

    async fn fetch_all(&self) -> Result<YearMap, CoreError> {
        self.get_json("/api/data").await
    }

    async fn push_changes(&self, changes: &IncrementalChanges) -> Result<(), CoreError> {
        debug!(
            "Submitting {} changed entities over {} yearly summaries",
            changes.entity_count(),
            changes.yearly_summaries.len()
        );
        // any 2xx is an acknowledgement; the body is informational
        read_body(self.post("/api/updateNotion", changes).await?).await?;
        Ok(())
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl PriceFeed for HttpRemoteStore {
    fn name(&self) -> &str {
        "Portfolio backend"
    }

    async fn fetch_quotes(&self, symbols: &[String]) -> Result<PriceQuotes, CoreError> {
        if symbols.is_empty() {
            return Ok(PriceQuotes::new());
        }
        let response = self
            .post("/api/updatePrices", &UpdatePricesRequest { symbols })
            .await?;
        let resp: UpdatePricesResponse = parse_response(response).await?;
        if !resp.success {
            return Err(CoreError::Api {
                status: StatusCode::OK.as_u16(),
                message: resp
                    .message
                    .unwrap_or_else(|| "Price update was not successful".into()),
            });
        }
        Ok(resp.data)
    }
}
