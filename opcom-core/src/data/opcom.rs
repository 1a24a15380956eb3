//! OPCOM day-ahead report provider.
//!
//! Loads the report page once to capture the session token (the HTTP client
//! keeps the session cookie), then submits one form POST per date and parses
//! the returned page. Transport failures are retried with exponential backoff
//! and jitter, guarded by the circuit breaker.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{AuthToken, DataError, DayProvider};
use super::report::{extract_token, parse_day_report};
use crate::domain::DayBatch;
use chrono::{Datelike, NaiveDate};
use rand::Rng;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{StatusCode, Url};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Public PZU price and traded volume report.
pub const OPCOM_ENDPOINT: &str =
    "https://www.opcom.ro/grafice-ip-raportPIP-si-volumTranzactionat/ro";

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Fail on the first transport error.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`
    /// plus up to 25% random jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1));
        let max_jitter = exp.as_millis() as u64 / 4;
        let jitter = if max_jitter == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=max_jitter)
        };
        exp + Duration::from_millis(jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// OPCOM report provider.
pub struct OpcomProvider {
    client: Client,
    endpoint: Url,
    circuit_breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
}

impl OpcomProvider {
    pub fn new(endpoint: &str, circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let endpoint =
            Url::parse(endpoint).map_err(|_| DataError::InvalidEndpoint(endpoint.to_string()))?;

        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            circuit_breaker,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    /// Form fields for one day's report request.
    fn day_form(date: NaiveDate, token: &AuthToken) -> [(&'static str, String); 5] {
        [
            ("_token", token.as_str().to_string()),
            ("day", date.day().to_string()),
            ("month", date.month().to_string()),
            ("year", date.year().to_string()),
            ("buton", "Refresh".to_string()),
        ]
    }

    /// Send a request with retry and circuit breaker logic, returning the body.
    ///
    /// Non-success statuses other than 403, 429 and 5xx still return their
    /// body: an expired-session page simply has no report table in it.
    fn send_with_retry<F>(&self, what: &str, build: F) -> Result<String, DataError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_error = None;

        for attempt in 0..=self.retry.max_retries {
            if attempt > 0 {
                let delay = self.retry.backoff(attempt);
                warn!(
                    request = what,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_error.as_ref().map(ToString::to_string).unwrap_or_default(),
                    "retrying request"
                );
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let resp = match build().send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    self.circuit_breaker.record_failure();
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();

            if status == StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }

            if status.is_server_error() {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::HttpStatus {
                    status: status.as_u16(),
                });
                continue;
            }

            if !status.is_success() {
                warn!(
                    request = what,
                    status = status.as_u16(),
                    "non-success status, scanning page anyway"
                );
            }

            match resp.text() {
                Ok(body) => {
                    self.circuit_breaker.record_success();
                    return Ok(body);
                }
                Err(e) => {
                    self.circuit_breaker.record_failure();
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or(DataError::NetworkUnreachable("max retries exceeded".into())))
    }
}

impl DayProvider for OpcomProvider {
    fn name(&self) -> &str {
        "opcom"
    }

    fn acquire_token(&self) -> Result<AuthToken, DataError> {
        let page = self.send_with_retry("token", || self.client.get(self.endpoint.clone()))?;
        extract_token(&page)
            .map(AuthToken::new)
            .ok_or_else(|| DataError::TokenNotFound {
                url: self.endpoint.to_string(),
            })
    }

    fn fetch_day(&self, date: NaiveDate, token: &AuthToken) -> Result<DayBatch, DataError> {
        let form = Self::day_form(date, token);
        let label = date.to_string();
        let page = self.send_with_retry(&label, || {
            self.client.post(self.endpoint.clone()).form(&form)
        })?;
        let rows = parse_day_report(&page, date);
        debug!(date = %label, rows = rows.len(), bytes = page.len(), "parsed report page");
        Ok(rows)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
