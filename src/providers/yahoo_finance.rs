use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::core::series::{HistoryProvider, PriceSeries};

/// Daily bar history from the Yahoo Finance chart API.
pub struct YahooFinanceProvider {
    base_url: Url,
    client: reqwest::Client,
}

impl YahooFinanceProvider {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("goldratio/0.1")
            .build()?;
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid Yahoo base URL: {base_url}"))?;
        if base_url.cannot_be_a_base() {
            bail!("Invalid Yahoo base URL: {}", base_url);
        }
        Ok(YahooFinanceProvider { base_url, client })
    }

    /// Chart URL for `symbol`. The symbol is a single escaped path segment so
    /// it can never add query parameters of its own.
    fn chart_url(&self, symbol: &str, period1: i64, period2: i64) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Invalid Yahoo base URL: {}", self.base_url))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        url.query_pairs_mut()
            .append_pair("period1", &period1.to_string())
            .append_pair("period2", &period2.to_string())
            .append_pair("interval", "1d")
            .append_pair("events", "history");
        Ok(url)
    }
}

#[derive(Deserialize, Debug)]
struct YahooChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    #[serde(default)]
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Deserialize, Debug, Default)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

/// Calendar date of a bar in the exchange's own timezone.
fn bar_date(timestamp: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp(timestamp + gmtoffset, 0).map(|dt| dt.date_naive())
}

/// Bars dated before `start` in exchange time are dropped; the request window
/// opens a day early to catch exchanges east of UTC.
fn extract_series(symbol: &str, start: NaiveDate, item: &ChartItem) -> PriceSeries {
    let (Some(timestamps), Some(closes)) = (
        item.timestamp.as_ref(),
        item.indicators
            .as_ref()
            .and_then(|inds| inds.quote.first())
            .and_then(|q| q.close.as_ref()),
    ) else {
        return PriceSeries::new(symbol);
    };

    PriceSeries::from_bars(
        symbol,
        timestamps
            .iter()
            .zip(closes)
            .filter_map(|(ts, close)| bar_date(*ts, item.meta.gmtoffset).map(|d| (d, *close)))
            .filter(|(date, _)| *date >= start),
    )
}

#[async_trait]
impl HistoryProvider for YahooFinanceProvider {
    #[instrument(
        name = "YahooHistoryFetch",
        skip(self),
        fields(symbol = %symbol, start = %start)
    )]
    async fn fetch_daily_closes(&self, symbol: &str, start: NaiveDate) -> Result<PriceSeries> {
        let now = Utc::now();
        if start > now.date_naive() {
            debug!("Start date is in the future, nothing to fetch");
            return Ok(PriceSeries::new(symbol));
        }

        let period1 = start
            .pred_opt()
            .and_then(|day| day.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().timestamp())
            .ok_or_else(|| anyhow!("Invalid start date: {}", start))?;
        let period2 = now.timestamp();

        let url = self.chart_url(symbol, period1, period2)?;
        debug!("Requesting price history from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for symbol: {}", e, symbol))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("Symbol not found upstream");
            return Ok(PriceSeries::new(symbol));
        }
        if !status.is_success() {
            return Err(anyhow!("HTTP error: {} for symbol: {}", status, symbol));
        }

        let text = response.text().await?;
        let data: YahooChartResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", symbol, e))?;

        if let Some(error) = data.chart.error {
            if error.code == "Not Found" {
                return Ok(PriceSeries::new(symbol));
            }
            return Err(anyhow!(
                "Yahoo error for symbol {}: {} {}",
                symbol,
                error.code,
                error.description.unwrap_or_default()
            ));
        }

        let series = data
            .chart
            .result
            .unwrap_or_default()
            .first()
            .map(|item| extract_series(symbol, start, item))
            .unwrap_or_else(|| PriceSeries::new(symbol));

        debug!(rows = series.len(), "Parsed Yahoo price history");
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    pub async fn create_mock_server(
        symbol: &str,
        status: u16,
        mock_response: &str,
    ) -> wiremock::MockServer {
        let mock_server = MockServer::start().await;
        let request_path = format!("/v8/finance/chart/{symbol}");

        Mock::given(method("GET"))
            .and(path(request_path))
            .and(query_param("interval", "1d"))
            .respond_with(ResponseTemplate::new(status).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    #[tokio::test]
    async fn test_successful_history_fetch() {
        // 2024-01-02 and 2024-01-03 at 05:00 UTC, New York midnight.
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "meta": {
                        "currency": "USD",
                        "symbol": "GC=F",
                        "gmtoffset": -18000
                    },
                    "timestamp": [1704171600, 1704258000, 1704344400],
                    "indicators": {
                        "quote": [{
                            "close": [2064.39990234375, 2034.199951171875, null]
                        }],
                        "adjclose": [{
                            "adjclose": [1.0, 1.0, 1.0]
                        }]
                    }
                }],
                "error": null
            }
        }"#;

        let mock_server = create_mock_server("GC=F", 200, mock_response).await;
        let provider = YahooFinanceProvider::new(&mock_server.uri()).unwrap();

        let series = provider
            .fetch_daily_closes("GC=F", date("2024-01-01"))
            .await
            .unwrap();

        assert_eq!(series.symbol, "GC=F");
        assert_eq!(series.len(), 2);
        assert_eq!(series.get(&date("2024-01-02")), Some(2064.39990234375));
        assert_eq!(series.get(&date("2024-01-03")), Some(2034.199951171875));
        assert_eq!(series.get(&date("2024-01-04")), None);
    }

    #[tokio::test]
    async fn test_bar_dates_use_exchange_offset() {
        // 2024-01-01T23:00:00Z is already 2024-01-02 at UTC+1.
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "meta": { "gmtoffset": 3600 },
                    "timestamp": [1704150000],
                    "indicators": { "quote": [{ "close": [29.55] }] }
                }],
                "error": null
            }
        }"#;

        let mock_server = create_mock_server("USDTRY=X", 200, mock_response).await;
        let provider = YahooFinanceProvider::new(&mock_server.uri()).unwrap();

        let series = provider
            .fetch_daily_closes("USDTRY=X", date("2024-01-01"))
            .await
            .unwrap();
        assert_eq!(series.get(&date("2024-01-02")), Some(29.55));
    }

    #[tokio::test]
    async fn test_window_opens_the_day_before_start() {
        // 2023-12-31T00:00:00Z
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/BTC-USD"))
            .and(query_param("period1", "1703980800"))
            .and(query_param("interval", "1d"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"chart": {"result": [], "error": null}}"#),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = YahooFinanceProvider::new(&mock_server.uri()).unwrap();
        let series = provider
            .fetch_daily_closes("BTC-USD", date("2024-01-01"))
            .await
            .unwrap();
        assert!(series.is_empty());
    }

    #[tokio::test]
    async fn test_bars_before_start_are_dropped() {
        // London midnight in summer time: 2024-06-30 and 2024-07-01 local.
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "meta": { "gmtoffset": 3600 },
                    "timestamp": [1719702000, 1719788400],
                    "indicators": { "quote": [{ "close": [32.8, 32.9] }] }
                }],
                "error": null
            }
        }"#;

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/USDTRY=X"))
            .and(query_param("period1", "1719705600"))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = YahooFinanceProvider::new(&mock_server.uri()).unwrap();
        let series = provider
            .fetch_daily_closes("USDTRY=X", date("2024-07-01"))
            .await
            .unwrap();

        assert_eq!(series.len(), 1);
        assert_eq!(series.get(&date("2024-06-30")), None);
        assert_eq!(series.get(&date("2024-07-01")), Some(32.9));
    }

    #[tokio::test]
    async fn test_symbol_is_escaped_into_one_path_segment() {
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "meta": { "gmtoffset": 0 },
                    "timestamp": [1704153600],
                    "indicators": { "quote": [{ "close": [1.0] }] }
                }],
                "error": null
            }
        }"#;

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/X%3Finterval=1wk&range=max%23frag"))
            .and(query_param("interval", "1d"))
            .and(query_param("period1", "1703980800"))
            .and(query_param_is_missing("range"))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = YahooFinanceProvider::new(&mock_server.uri()).unwrap();
        let series = provider
            .fetch_daily_closes("X?interval=1wk&range=max#frag", date("2024-01-01"))
            .await
            .unwrap();
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(YahooFinanceProvider::new("not a url").is_err());
        assert!(YahooFinanceProvider::new("mailto:someone@example.com").is_err());
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_empty_series() {
        let mock_response = r#"{
            "chart": {
                "result": null,
                "error": {
                    "code": "Not Found",
                    "description": "No data found, symbol may be delisted"
                }
            }
        }"#;

        let mock_server = create_mock_server("INVALID", 404, mock_response).await;
        let provider = YahooFinanceProvider::new(&mock_server.uri()).unwrap();

        let series = provider
            .fetch_daily_closes("INVALID", date("2024-01-01"))
            .await
            .unwrap();
        assert!(series.is_empty());
    }

    #[tokio::test]
    async fn test_result_without_bars_is_empty_series() {
        let mock_response = r#"{
            "chart": {
                "result": [{ "meta": { "gmtoffset": 0 } }],
                "error": null
            }
        }"#;

        let mock_server = create_mock_server("THYAO.IS", 200, mock_response).await;
        let provider = YahooFinanceProvider::new(&mock_server.uri()).unwrap();

        let series = provider
            .fetch_daily_closes("THYAO.IS", date("2024-01-01"))
            .await
            .unwrap();
        assert!(series.is_empty());
    }

    #[tokio::test]
    async fn test_future_start_date_skips_request() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&mock_server)
            .await;

        let provider = YahooFinanceProvider::new(&mock_server.uri()).unwrap();
        let tomorrow = Utc::now().date_naive() + chrono::Duration::days(2);

        let series = provider
            .fetch_daily_closes("GC=F", tomorrow)
            .await
            .unwrap();
        assert!(series.is_empty());
    }

    #[tokio::test]
    async fn test_yahoo_api_error_response() {
        let mock_server = create_mock_server("GC=F", 500, "").await;
        let provider = YahooFinanceProvider::new(&mock_server.uri()).unwrap();

        let result = provider
            .fetch_daily_closes("GC=F", date("2024-01-01"))
            .await;
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "HTTP error: 500 Internal Server Error for symbol: GC=F"
        );
    }

    #[tokio::test]
    async fn test_yahoo_api_malformed_response() {
        let mock_response = r#"{ "charts": { "result": [] } }"#;
        let mock_server = create_mock_server("GC=F", 200, mock_response).await;
        let provider = YahooFinanceProvider::new(&mock_server.uri()).unwrap();

        let result = provider
            .fetch_daily_closes("GC=F", date("2024-01-01"))
            .await;
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse JSON response for GC=F")
        );
    }

    #[tokio::test]
    async fn test_yahoo_chart_error_is_reported() {
        let mock_response = r#"{
            "chart": {
                "result": null,
                "error": {
                    "code": "Bad Request",
                    "description": "Invalid input - interval=1d is not supported"
                }
            }
        }"#;
        let mock_server = create_mock_server("GC=F", 200, mock_response).await;
        let provider = YahooFinanceProvider::new(&mock_server.uri()).unwrap();

        let err = provider
            .fetch_daily_closes("GC=F", date("2024-01-01"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Yahoo error for symbol GC=F: Bad Request Invalid input - interval=1d is not supported"
        );
    }

    #[tokio::test]
    async fn test_unreachable_provider() {
        // Nothing listens on port 1.
        let provider = YahooFinanceProvider::new("http://127.0.0.1:1").unwrap();
        let err = provider
            .fetch_daily_closes("GC=F", date("2024-01-01"))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Request error:"));
        assert!(err.to_string().ends_with("for symbol: GC=F"));
    }
}
