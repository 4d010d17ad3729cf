//! Gold ratio pipelines
//!
//! Both pipelines fetch their series, inner-join them by date and price the
//! target instrument in grams of gold. The stock pipeline works in the local
//! currency of the FX symbol, the crypto pipeline in USD.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;
use tracing::{debug, instrument};

use crate::core::config::RatioConfig;
use crate::core::error::RatioError;
use crate::core::series::{HistoryProvider, PriceSeries};

/// One date on which every aligned series has a close, in input order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedRow<const N: usize> {
    pub date: NaiveDate,
    pub prices: [f64; N],
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatioPoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl RatioPoint {
    fn new(date: NaiveDate, ratio: f64) -> Self {
        RatioPoint {
            date,
            value: round_to_6dp(ratio),
        }
    }
}

/// Rounds on the exact decimal expansion of `value`; scaling by 1e6 first
/// can push a value just below a tie onto it.
fn round_to_6dp(value: f64) -> f64 {
    format!("{value:.6}").parse().unwrap_or(value)
}

/// Inner join on date. Rows come out in ascending date order.
pub fn align<const N: usize>(series: [&PriceSeries; N]) -> Vec<AlignedRow<N>> {
    let Some((first, rest)) = series.split_first() else {
        return Vec::new();
    };

    first
        .iter()
        .filter_map(|(date, close)| {
            let mut prices = [0.0; N];
            prices[0] = close;
            for (slot, other) in prices[1..].iter_mut().zip(rest) {
                *slot = other.get(&date)?;
            }
            Some(AlignedRow { date, prices })
        })
        .collect()
}

/// Stock price (local currency) over the local-currency price of a gram of gold.
pub fn stock_gold_ratio(
    stock: &PriceSeries,
    gold: &PriceSeries,
    fx: &PriceSeries,
    config: &RatioConfig,
) -> Vec<RatioPoint> {
    align([stock, gold, fx])
        .into_iter()
        .map(|row| {
            let [stock_local, gold_ounce_usd, usd_local] = row.prices;
            let gold_gram_local = (gold_ounce_usd * usd_local) / config.gram_in_ounce;
            RatioPoint::new(row.date, stock_local / gold_gram_local)
        })
        .collect()
}

/// Crypto price (USD) over the USD price of a gram of gold.
pub fn crypto_gold_ratio(
    crypto: &PriceSeries,
    gold: &PriceSeries,
    config: &RatioConfig,
) -> Vec<RatioPoint> {
    align([crypto, gold])
        .into_iter()
        .map(|row| {
            let [crypto_usd, gold_ounce_usd] = row.prices;
            let gold_gram_usd = gold_ounce_usd / config.gram_in_ounce;
            RatioPoint::new(row.date, crypto_usd / gold_gram_usd)
        })
        .collect()
}

async fn fetch(
    provider: &dyn HistoryProvider,
    symbol: &str,
    start: NaiveDate,
) -> Result<PriceSeries, RatioError> {
    let series = provider
        .fetch_daily_closes(symbol, start)
        .await
        .map_err(RatioError::Upstream)?;
    debug!(symbol, rows = series.len(), "Fetched daily closes");
    Ok(series)
}

#[instrument(name = "StockGoldRatio", skip(provider, config))]
pub async fn stock_to_gold(
    provider: &dyn HistoryProvider,
    config: &RatioConfig,
    ticker: &str,
    start: NaiveDate,
) -> Result<Vec<RatioPoint>, RatioError> {
    let stock = fetch(provider, ticker, start).await?;
    let gold = fetch(provider, &config.gold_symbol, start).await?;
    let fx = fetch(provider, &config.fx_symbol, start).await?;

    if stock.is_empty() || gold.is_empty() || fx.is_empty() {
        return Err(RatioError::DataUnavailable);
    }

    Ok(stock_gold_ratio(&stock, &gold, &fx, config))
}

#[instrument(name = "CryptoGoldRatio", skip(provider, config))]
pub async fn crypto_to_gold(
    provider: &dyn HistoryProvider,
    config: &RatioConfig,
    ticker: &str,
    start: NaiveDate,
) -> Result<Vec<RatioPoint>, RatioError> {
    let crypto = fetch(provider, ticker, start).await?;
    let gold = fetch(provider, &config.gold_symbol, start).await?;

    if crypto.is_empty() || gold.is_empty() {
        return Err(RatioError::DataUnavailable);
    }

    Ok(crypto_gold_ratio(&crypto, &gold, config))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    Stock,
    Crypto,
}

impl Display for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Pipeline::Stock => "stock",
                Pipeline::Crypto => "crypto",
            }
        )
    }
}

impl FromStr for Pipeline {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stock" => Ok(Pipeline::Stock),
            "crypto" => Ok(Pipeline::Crypto),
            _ => Err(anyhow::anyhow!("Invalid pipeline: {}", s)),
        }
    }
}

/// A validated pair of ticker and start date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatioRequest {
    pub ticker: String,
    pub start: NaiveDate,
}

impl RatioRequest {
    /// Absent and empty values are both treated as missing.
    pub fn parse(ticker: Option<&str>, start_date: Option<&str>) -> Result<Self, RatioError> {
        let (Some(ticker), Some(start_date)) = (
            ticker.filter(|t| !t.is_empty()),
            start_date.filter(|s| !s.is_empty()),
        ) else {
            return Err(RatioError::MissingParameters);
        };

        let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d")
            .map_err(|_| RatioError::InvalidStartDate(start_date.to_string()))?;

        Ok(RatioRequest {
            ticker: ticker.to_string(),
            start,
        })
    }
}

impl Pipeline {
    pub async fn run(
        self,
        provider: &dyn HistoryProvider,
        config: &RatioConfig,
        request: &RatioRequest,
    ) -> Result<Vec<RatioPoint>, RatioError> {
        match self {
            Pipeline::Stock => stock_to_gold(provider, config, &request.ticker, request.start).await,
            Pipeline::Crypto => {
                crypto_to_gold(provider, config, &request.ticker, request.start).await
            }
        }
    }
}
