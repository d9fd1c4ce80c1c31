//! Yahoo Finance clients
//!
//! Three transports feed the quote chain: the structured `v7/finance/quote`
//! endpoint, the chart metadata exposed by the `yahoo_finance_api` library,
//! and a raw `v8/finance/chart` request carrying a browser `User-Agent` for
//! when the library is blocked. Symbol search goes through the library.

use crate::error::{Result, StockError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};
use yahoo_finance_api as yahoo;

const QUOTE_URL: &str = "https://query1.finance.yahoo.com/v7/finance/quote";
const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Fields of the structured quote endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredQuote {
    pub symbol: String,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub currency: Option<String>,
    pub regular_market_price: Option<f64>,
    pub regular_market_change: Option<f64>,
    pub regular_market_change_percent: Option<f64>,
    pub regular_market_previous_close: Option<f64>,
}

/// Price fields of a chart response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartMeta {
    pub price: Option<f64>,
    pub previous_close: Option<f64>,
    pub currency: Option<String>,
}

/// Structured quote source
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteApi: Send + Sync {
    /// Quote for `symbol`, `None` when the upstream knows no such symbol
    async fn quote(&self, symbol: &str) -> Result<Option<StructuredQuote>>;
}

/// Chart metadata source
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChartApi: Send + Sync {
    async fn chart(&self, symbol: &str) -> Result<ChartMeta>;
}

/// Free-text instrument search
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SymbolSearch: Send + Sync {
    /// Candidate symbols, best match first
    async fn search(&self, query: &str) -> Result<Vec<String>>;
}

/// Client for the structured quote endpoint
pub struct YahooQuoteClient {
    client: Client,
}

impl YahooQuoteClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteEnvelope {
    quote_response: QuoteResponse,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    result: Vec<StructuredQuote>,
}

#[async_trait]
impl QuoteApi for YahooQuoteClient {
    #[instrument(skip(self))]
    async fn quote(&self, symbol: &str) -> Result<Option<StructuredQuote>> {
        let response = self
            .client
            .get(QUOTE_URL)
            .query(&[("symbols", symbol)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StockError::ApiError(format!(
                "quote endpoint returned {}",
                response.status()
            )));
        }

        let envelope: QuoteEnvelope = response.json().await?;
        Ok(envelope.quote_response.result.into_iter().next())
    }
}

/// Chart metadata and symbol search through the `yahoo_finance_api` library
pub struct YahooLibraryClient {
    connector: yahoo::YahooConnector,
}

impl YahooLibraryClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            connector: yahoo::YahooConnector::new()?,
        })
    }
}

#[async_trait]
impl ChartApi for YahooLibraryClient {
    #[instrument(skip(self))]
    async fn chart(&self, symbol: &str) -> Result<ChartMeta> {
        let response = self.connector.get_latest_quotes(symbol, "1d").await?;
        let meta = response.metadata()?;

        let price: Option<f64> = meta.regular_market_price.into();
        let previous_close: Option<f64> = meta.chart_previous_close.into();
        let currency: Option<String> = meta.currency.clone().into();

        Ok(ChartMeta {
            price,
            previous_close,
            currency,
        })
    }
}

#[async_trait]
impl SymbolSearch for YahooLibraryClient {
    #[instrument(skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<String>> {
        let result = self.connector.search_ticker(query).await?;
        let symbols: Vec<String> = result.quotes.into_iter().map(|q| q.symbol).collect();
        debug!("Search for {query:?} returned {} candidates", symbols.len());
        Ok(symbols)
    }
}

/// Raw chart request, bypassing the library
pub struct RawChartClient {
    client: Client,
    base_url: String,
}

impl RawChartClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: CHART_URL.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: RawChartMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChartMeta {
    currency: Option<String>,
    regular_market_price: Option<f64>,
    previous_close: Option<f64>,
    chart_previous_close: Option<f64>,
}

fn parse_raw_chart(symbol: &str, body: &str) -> Result<ChartMeta> {
    let envelope: ChartEnvelope = serde_json::from_str(body)?;
    let meta = envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .map(|r| r.meta)
        .ok_or_else(|| StockError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: "empty chart result".to_string(),
        })?;

    Ok(ChartMeta {
        price: meta.regular_market_price,
        previous_close: meta.previous_close.or(meta.chart_previous_close),
        currency: meta.currency,
    })
}

#[async_trait]
impl ChartApi for RawChartClient {
    #[instrument(skip(self))]
    async fn chart(&self, symbol: &str) -> Result<ChartMeta> {
        let response = self
            .client
            .get(format!("{}/{symbol}", self.base_url))
            .query(&[("interval", "1m"), ("range", "1d")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StockError::ApiError(format!(
                "chart endpoint returned {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        parse_raw_chart(symbol, &body)
    }
}
