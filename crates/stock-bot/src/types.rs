//! Domain types shared by the resolver, quote fetcher and analysis pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

/// Domestic exchange board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Board {
    /// Main board, `.KS`
    Main,
    /// Secondary (KOSDAQ) board, `.KQ`
    Alt,
}

impl Board {
    /// Upstream symbol suffix, without the dot
    pub fn suffix(self) -> &'static str {
        match self {
            Board::Main => "KS",
            Board::Alt => "KQ",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "KS" => Some(Board::Main),
            "KQ" => Some(Board::Alt),
            _ => None,
        }
    }
}

/// A resolved, quotable instrument
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ticker {
    /// Six-digit domestic code on a board
    Domestic { code: String, board: Board },
    /// Any other upstream symbol, used verbatim
    International { symbol: String },
}

impl Ticker {
    /// Domestic main-board ticker for a six-digit code
    pub fn domestic(code: impl Into<String>) -> Self {
        Ticker::Domestic {
            code: code.into(),
            board: Board::Main,
        }
    }

    /// Interpret an upstream symbol
    ///
    /// `NNNNNN.KS` and `NNNNNN.KQ` become domestic tickers, everything else is
    /// kept as an international symbol.
    pub fn parse(symbol: &str) -> Self {
        let domestic = symbol.split_once('.').and_then(|(code, suffix)| {
            let is_code = code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit());
            is_code
                .then(|| Board::from_suffix(suffix))
                .flatten()
                .map(|board| Ticker::Domestic {
                    code: code.to_string(),
                    board,
                })
        });

        domestic.unwrap_or_else(|| Ticker::International {
            symbol: symbol.to_string(),
        })
    }

    /// The symbol sent to quote sources, e.g. `005930.KS` or `AAPL`
    pub fn symbol(&self) -> String {
        match self {
            Ticker::Domestic { code, board } => format!("{code}.{}", board.suffix()),
            Ticker::International { symbol } => symbol.clone(),
        }
    }

    /// The same code on the secondary board, for main-board tickers only
    pub fn alt_board(&self) -> Option<Ticker> {
        match self {
            Ticker::Domestic {
                code,
                board: Board::Main,
            } => Some(Ticker::Domestic {
                code: code.clone(),
                board: Board::Alt,
            }),
            _ => None,
        }
    }

    /// Currency assumed when a source omits it
    pub fn default_currency(&self) -> &'static str {
        match self {
            Ticker::Domestic { .. } => "KRW",
            Ticker::International { .. } => "USD",
        }
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol())
    }
}

/// Normalized price snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub display_name: String,
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub currency: String,
}

impl QuoteSnapshot {
    /// Build a snapshot from a price and previous close
    ///
    /// Returns `None` when the previous close cannot be divided by.
    pub fn from_previous_close(
        ticker: &Ticker,
        price: f64,
        previous_close: f64,
        currency: Option<String>,
    ) -> Option<Self> {
        if !price.is_finite() || !previous_close.is_finite() || previous_close == 0.0 {
            return None;
        }

        let change = price - previous_close;
        Some(Self {
            display_name: ticker.symbol(),
            symbol: ticker.symbol(),
            price,
            change,
            change_percent: change / previous_close * 100.0,
            currency: currency.unwrap_or_else(|| ticker.default_currency().to_string()),
        })
    }
}

/// One headline from the news feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_domestic() {
        assert_eq!(
            Ticker::parse("086520.KQ"),
            Ticker::Domestic {
                code: "086520".into(),
                board: Board::Alt
            }
        );
        assert_eq!(Ticker::parse("005930.KS"), Ticker::domestic("005930"));
    }

    #[test]
    fn test_parse_international() {
        assert_eq!(
            Ticker::parse("BRK.B"),
            Ticker::International {
                symbol: "BRK.B".into()
            }
        );
        assert_eq!(
            Ticker::parse("7203.T"),
            Ticker::International {
                symbol: "7203.T".into()
            }
        );
    }

    #[test]
    fn test_alt_board() {
        let main = Ticker::domestic("247540");
        let alt = main.alt_board().unwrap();
        assert_eq!(alt.symbol(), "247540.KQ");
        assert!(alt.alt_board().is_none());
        assert!(Ticker::parse("AAPL").alt_board().is_none());
    }

    #[test]
    fn test_snapshot_from_previous_close() {
        let ticker = Ticker::domestic("005930");
        let snap = QuoteSnapshot::from_previous_close(&ticker, 71_000.0, 70_000.0, None).unwrap();
        assert!((snap.change - 1_000.0).abs() < 1e-9);
        assert!((snap.change_percent - 1.428_571_428_6).abs() < 1e-6);
        assert_eq!(snap.currency, "KRW");

        assert!(QuoteSnapshot::from_previous_close(&ticker, 1.0, 0.0, None).is_none());
    }
}
