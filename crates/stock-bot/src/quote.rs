//! Live quote retrieval
//!
//! Each candidate ticker goes through the structured quote source, then the
//! library chart, then the raw chart fetch. A domestic main-board ticker that
//! exhausts all three is tried once more on the secondary board. The candidate
//! list is built up front, so the retry can never recurse.
//!
//! A budgeted fetch splits the remaining time evenly over the candidates not
//! yet tried, so a stalled source on the main board still leaves time for the
//! secondary board and exhaustion is reported before the budget runs out.

use crate::api::{ChartApi, QuoteApi};
use crate::chain::{Chain, Strategy, first_success_until};
use crate::error::{Result, StockError};
use crate::types::{QuoteSnapshot, Ticker};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

/// Structured quote endpoint, the only source with display names
struct StructuredQuoteStrategy {
    api: Arc<dyn QuoteApi>,
}

#[async_trait]
impl Strategy<Ticker, QuoteSnapshot> for StructuredQuoteStrategy {
    fn name(&self) -> &str {
        "structured-quote"
    }

    async fn attempt(&self, ticker: &Ticker) -> Result<Option<QuoteSnapshot>> {
        let symbol = ticker.symbol();
        let Some(quote) = self.api.quote(&symbol).await? else {
            return Ok(None);
        };
        let unusable = |reason: &str| StockError::DataUnavailable {
            symbol: symbol.clone(),
            reason: reason.to_string(),
        };

        let price = quote
            .regular_market_price
            .ok_or_else(|| unusable("missing price"))?;

        // Reported change fields are only trusted as a pair
        let mut snapshot = match (quote.regular_market_change, quote.regular_market_change_percent) {
            (Some(change), Some(change_percent)) => QuoteSnapshot {
                display_name: symbol.clone(),
                symbol: symbol.clone(),
                price,
                change,
                change_percent,
                currency: String::new(),
            },
            _ => {
                let previous_close = quote
                    .regular_market_previous_close
                    .ok_or_else(|| unusable("missing change and previous close"))?;
                QuoteSnapshot::from_previous_close(ticker, price, previous_close, None)
                    .ok_or_else(|| unusable("invalid previous close"))?
            }
        };

        snapshot.display_name = quote.short_name.or(quote.long_name).unwrap_or(symbol);
        snapshot.currency = quote
            .currency
            .unwrap_or_else(|| ticker.default_currency().to_string());
        Ok(Some(snapshot))
    }
}

/// Chart metadata; change fields are computed from the previous close
struct ChartStrategy {
    name: &'static str,
    api: Arc<dyn ChartApi>,
}

#[async_trait]
impl Strategy<Ticker, QuoteSnapshot> for ChartStrategy {
    fn name(&self) -> &str {
        self.name
    }

    async fn attempt(&self, ticker: &Ticker) -> Result<Option<QuoteSnapshot>> {
        let symbol = ticker.symbol();
        let meta = self.api.chart(&symbol).await?;

        let (Some(price), Some(previous_close)) = (meta.price, meta.previous_close) else {
            return Err(StockError::DataUnavailable {
                symbol,
                reason: "chart without price or previous close".to_string(),
            });
        };

        QuoteSnapshot::from_previous_close(ticker, price, previous_close, meta.currency)
            .map(Some)
            .ok_or_else(|| StockError::DataUnavailable {
                symbol,
                reason: "invalid previous close".to_string(),
            })
    }
}

/// Fetches quotes through the source chain
pub struct QuoteFetcher {
    chain: Chain<Ticker, QuoteSnapshot>,
}

impl QuoteFetcher {
    /// Standard chain: structured quote, library chart, raw chart
    pub fn new(
        quote: Arc<dyn QuoteApi>,
        library_chart: Arc<dyn ChartApi>,
        raw_chart: Arc<dyn ChartApi>,
    ) -> Self {
        Self::with_chain(vec![
            Arc::new(StructuredQuoteStrategy { api: quote }),
            Arc::new(ChartStrategy {
                name: "library-chart",
                api: library_chart,
            }),
            Arc::new(ChartStrategy {
                name: "raw-chart",
                api: raw_chart,
            }),
        ])
    }

    /// Fetcher over a custom chain
    pub fn with_chain(chain: Chain<Ticker, QuoteSnapshot>) -> Self {
        Self { chain }
    }

    /// Quote for `ticker`, falling back to the secondary board once
    #[instrument(skip(self), fields(symbol = %ticker))]
    pub async fn fetch_quote(&self, ticker: &Ticker) -> Result<QuoteSnapshot> {
        self.fetch(ticker, None).await
    }

    /// [`fetch_quote`](Self::fetch_quote) that gives up once `budget` is spent
    #[instrument(skip(self), fields(symbol = %ticker))]
    pub async fn fetch_quote_within(&self, ticker: &Ticker, budget: Duration) -> Result<QuoteSnapshot> {
        self.fetch(ticker, Instant::now().checked_add(budget)).await
    }

    async fn fetch(&self, ticker: &Ticker, deadline: Option<Instant>) -> Result<QuoteSnapshot> {
        let candidates: Vec<Ticker> = std::iter::once(ticker.clone())
            .chain(ticker.alt_board())
            .collect();

        for (attempt, candidate) in candidates.iter().enumerate() {
            if attempt > 0 {
                warn!("All sources failed for {ticker}, retrying as {candidate}");
            }
            let untried = u32::try_from(candidates.len() - attempt).unwrap_or(1);
            let slot = deadline.map(|deadline| {
                let now = Instant::now();
                now + deadline.saturating_duration_since(now) / untried
            });
            if let Some(snapshot) = first_success_until(&self.chain, candidate, slot).await {
                info!(
                    "Quote for {}: {} {}",
                    snapshot.symbol, snapshot.price, snapshot.currency
                );
                return Ok(snapshot);
            }
        }

        Err(StockError::SourceExhausted {
            symbol: ticker.symbol(),
        })
    }
}
