//! Daily price series and the provider abstraction that produces them

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Daily closing prices for a single symbol, keyed and ordered by date.
///
/// A date is only present when the provider reported a finite close for it,
/// so absence is the only representation of a missing value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    pub symbol: String,
    closes: BTreeMap<NaiveDate, f64>,
}

impl PriceSeries {
    pub fn new(symbol: &str) -> Self {
        PriceSeries {
            symbol: symbol.to_string(),
            closes: BTreeMap::new(),
        }
    }

    /// Builds a series from raw bars, skipping missing and non-finite closes.
    /// When a date repeats, the later bar wins.
    pub fn from_bars<I>(symbol: &str, bars: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, Option<f64>)>,
    {
        let mut series = Self::new(symbol);
        for (date, close) in bars {
            if let Some(close) = close {
                series.insert(date, close);
            }
        }
        series
    }

    pub fn insert(&mut self, date: NaiveDate, close: f64) {
        if close.is_finite() {
            self.closes.insert(date, close);
        }
    }

    pub fn get(&self, date: &NaiveDate) -> Option<f64> {
        self.closes.get(date).copied()
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// Iterates `(date, close)` pairs in ascending date order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.closes.iter().map(|(date, close)| (*date, *close))
    }
}

#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Daily, non-adjusted closes for `symbol` from `start` through today.
    ///
    /// An unknown symbol or a window without trading yields an empty series
    /// rather than an error.
    async fn fetch_daily_closes(&self, symbol: &str, start: NaiveDate) -> Result<PriceSeries>;
}
