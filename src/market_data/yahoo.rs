// =============================================================================
// Yahoo Finance Chart Client — daily closing prices
// =============================================================================
//
// Uses the public v8 chart endpoint:
//
//   GET /v8/finance/chart/{symbol}?period1=<unix>&period2=<unix>&interval=1d
//
// The response carries parallel arrays: `timestamp[]` and
// `indicators.quote[0].close[]`.  A `null` close marks a row without a
// settled price (typically today's session) and is skipped.  Timestamps are
// shifted by `meta.gmtoffset` so each row lands on its exchange-local date.
// =============================================================================

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::PipelineError;
use crate::market_data::{PriceSource, DATE_FORMAT};
use crate::types::PricePoint;

/// Public chart API host.
pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// The chart endpoint rejects requests without a browser-like user agent.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) rsi-pulse/1.0";

/// Yahoo Finance REST client for daily price history.
#[derive(Debug, Clone)]
pub struct YahooClient {
    base_url: Url,
    client: reqwest::Client,
}

impl YahooClient {
    /// Create a client against `base_url` with a client-level request
    /// timeout of `timeout_secs`.
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client for Yahoo Finance")?;

        let raw = base_url.into();
        let base_url = Url::parse(&raw)
            .with_context(|| format!("invalid Yahoo Finance base URL: {raw}"))?;
        if base_url.cannot_be_a_base() {
            bail!("Yahoo Finance base URL cannot carry a path: {raw}");
        }
        debug!(base_url = %base_url, "YahooClient initialised");

        Ok(Self { base_url, client })
    }

    /// The symbol is pushed as a single percent-encoded path segment.
    fn chart_url(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Url, PipelineError> {
        let period1 = from.and_time(NaiveTime::MIN).and_utc().timestamp();
        // `to` is inclusive: ask for everything up to the end of that day.
        let period2 = to
            .succ_opt()
            .unwrap_or(to)
            .and_time(NaiveTime::MIN)
            .and_utc()
            .timestamp();

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PipelineError::data_fetch(symbol, "base URL cannot carry a path"))?
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

#[async_trait]
impl PriceSource for YahooClient {
    #[instrument(skip(self), name = "yahoo::fetch_daily_closes")]
    async fn fetch_daily_closes(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, PipelineError> {
        let url = self.chart_url(symbol, from, to)?;

        debug!(
            symbol,
            from = %from.format(DATE_FORMAT),
            to = %to.format(DATE_FORMAT),
            "requesting daily closes"
        );

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::data_fetch(symbol, format!("request failed: {e}")))?;

        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| PipelineError::data_fetch(symbol, format!("invalid JSON body: {e}")))?;

        if !status.is_success() {
            let detail = api_error(&body).unwrap_or_else(|| body.to_string());
            return Err(PipelineError::data_fetch(
                symbol,
                format!("HTTP {status}: {detail}"),
            ));
        }

        let points = parse_chart(symbol, &body)?;
        debug!(symbol, count = points.len(), "daily closes fetched");
        Ok(points)
    }
}

// =============================================================================
// Response parsing
// =============================================================================

/// Extract the `chart.error` description, if the API reported one.
fn api_error(body: &Value) -> Option<String> {
    let err = body.pointer("/chart/error")?;
    if err.is_null() {
        return None;
    }
    let code = err["code"].as_str().unwrap_or("unknown");
    let description = err["description"].as_str().unwrap_or("");
    Some(format!("{code}: {description}"))
}

/// Parse a chart response body into price points (order as received).
pub(crate) fn parse_chart(symbol: &str, body: &Value) -> Result<Vec<PricePoint>, PipelineError> {
    if let Some(detail) = api_error(body) {
        return Err(PipelineError::data_fetch(symbol, detail));
    }

    let result = body
        .pointer("/chart/result/0")
        .ok_or_else(|| PipelineError::data_fetch(symbol, "response has no chart result"))?;

    let gmt_offset = result.pointer("/meta/gmtoffset").and_then(Value::as_i64).unwrap_or(0);

    let Some(timestamps) = result["timestamp"].as_array() else {
        // No timestamps at all means no trading days in the window.
        return Ok(Vec::new());
    };

    let closes = result
        .pointer("/indicators/quote/0/close")
        .and_then(Value::as_array)
        .ok_or_else(|| PipelineError::data_fetch(symbol, "response has no close series"))?;

    if closes.len() != timestamps.len() {
        return Err(PipelineError::data_fetch(
            symbol,
            format!(
                "timestamp/close length mismatch ({} vs {})",
                timestamps.len(),
                closes.len()
            ),
        ));
    }

    let mut points = Vec::with_capacity(closes.len());
    for (ts, close) in timestamps.iter().zip(closes) {
        if close.is_null() {
            continue;
        }
        let close = close
            .as_f64()
            .ok_or_else(|| PipelineError::data_fetch(symbol, format!("malformed close: {close}")))?;
        let date = ts
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs + gmt_offset, 0))
            .map(|dt| dt.date_naive())
            .ok_or_else(|| PipelineError::data_fetch(symbol, format!("malformed timestamp: {ts}")))?;
        points.push(PricePoint::new(date, close));
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_closes_and_skips_nulls() {
        let body = json!({
            "chart": {
                "result": [{
                    "meta": { "gmtoffset": -14400 },
                    "timestamp": [1709904600, 1710163800, 1710250200],
                    "indicators": { "quote": [{ "close": [170.73, null, 173.23] }] }
                }],
                "error": null
            }
        });
        let points = parse_chart("AAPL", &body).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], PricePoint::new(date(2024, 3, 8), 170.73));
        assert_eq!(points[1], PricePoint::new(date(2024, 3, 12), 173.23));
    }

    #[test]
    fn api_error_becomes_data_fetch() {
        let body = json!({
            "chart": {
                "result": null,
                "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" }
            }
        });
        let err = parse_chart("NOPE", &body).unwrap_err();
        assert!(matches!(err, PipelineError::DataFetch { ref symbol, .. } if symbol == "NOPE"));
        assert!(err.to_string().contains("Not Found"));
    }

    #[test]
    fn missing_timestamps_is_empty_series() {
        let body = json!({
            "chart": {
                "result": [{ "meta": {}, "indicators": { "quote": [{}] } }],
                "error": null
            }
        });
        assert!(parse_chart("BTC-USD", &body).unwrap().is_empty());
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let body = json!({
            "chart": {
                "result": [{
                    "timestamp": [1709856000, 1709942400],
                    "indicators": { "quote": [{ "close": [1.0] }] }
                }],
                "error": null
            }
        });
        assert!(parse_chart("BTC-USD", &body).is_err());
    }

    #[test]
    fn non_numeric_close_is_rejected() {
        let body = json!({
            "chart": {
                "result": [{
                    "timestamp": [1709856000],
                    "indicators": { "quote": [{ "close": ["abc"] }] }
                }],
                "error": null
            }
        });
        assert!(parse_chart("BTC-USD", &body).is_err());
    }

    #[test]
    fn chart_url_covers_inclusive_window() {
        let client = YahooClient::new("http://localhost:1", 5).unwrap();
        let url = client
            .chart_url("ETH-USD", date(2024, 1, 1), date(2024, 1, 2))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:1/v8/finance/chart/ETH-USD?period1=1704067200&period2=1704240000&interval=1d&events=history"
        );
    }

    #[test]
    fn symbol_is_a_single_encoded_segment() {
        let client = YahooClient::new("http://localhost:1/", 5).unwrap();
        let url = client
            .chart_url("A/B?x=1#y", date(2024, 1, 1), date(2024, 1, 2))
            .unwrap();

        let segments: Vec<&str> = url.path_segments().unwrap().collect();
        assert_eq!(segments, vec!["v8", "finance", "chart", "A%2FB%3Fx=1%23y"]);
        assert_eq!(url.fragment(), None);
        assert_eq!(
            url.query(),
            Some("period1=1704067200&period2=1704240000&interval=1d&events=history")
        );
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(YahooClient::new("not a url", 5).is_err());
        assert!(YahooClient::new("mailto:prices@example.com", 5).is_err());
    }
}
