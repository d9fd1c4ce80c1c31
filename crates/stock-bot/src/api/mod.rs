//! Outbound data sources

pub mod news;
pub mod yahoo;

pub use news::{GoogleNewsClient, NewsFeed, extract_code, extract_headlines};
pub use yahoo::{
    ChartApi, ChartMeta, QuoteApi, RawChartClient, StructuredQuote, SymbolSearch,
    YahooLibraryClient, YahooQuoteClient,
};
