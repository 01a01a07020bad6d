//! Shared blocking HTTP plumbing for the remote providers.
//!
//! Maps HTTP status codes onto `DataError` and keeps the provider's circuit
//! breaker informed. There are no retries: a failed request is reported once
//! and the next scheduled run tries again.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, ProviderId};
use std::sync::Arc;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

pub struct HttpFetcher {
    provider: ProviderId,
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl HttpFetcher {
    pub fn new(provider: ProviderId, circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            provider,
            client,
            circuit_breaker,
        })
    }

    pub fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }

    /// GET `url` and return the body as text.
    pub fn get_text(&self, url: &str, symbol: &str) -> Result<String, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        tracing::debug!(provider = %self.provider, symbol, "GET {}", redact(url));

        let resp = self.client.get(url).send().map_err(|e| {
            self.circuit_breaker.record_failure();
            DataError::NetworkUnreachable(e.to_string())
        })?;

        let status = resp.status();

        if status == reqwest::StatusCode::FORBIDDEN {
            self.circuit_breaker.trip();
            return Err(DataError::CircuitBreakerTripped);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            self.circuit_breaker.record_failure();
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(DataError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(DataError::AuthenticationRequired(format!(
                "{} rejected the credentials",
                self.provider
            )));
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        if !status.is_success() {
            self.circuit_breaker.record_failure();
            return Err(DataError::Other(format!("HTTP {status} for {symbol}")));
        }

        let body = resp.text().map_err(|e| {
            DataError::ResponseFormatChanged(format!("unreadable body for {symbol}: {e}"))
        })?;
        self.circuit_breaker.record_success();
        Ok(body)
    }
}

/// Strip the API key from a URL before it reaches the logs.
fn redact(url: &str) -> String {
    match url.find("api_key=") {
        Some(idx) => {
            let rest = &url[idx + "api_key=".len()..];
            let tail = rest.find('&').map(|i| &rest[i..]).unwrap_or("");
            format!("{}api_key=***{tail}", &url[..idx])
        }
        None => url.to_string(),
    }
}

/// Normalize a provider column label to a snake_case field name:
/// `"Traded Volume"` → `traded_volume`, `"Adj Close"` → `adj_close`.
pub fn field_name(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut pending_sep = false;
    for ch in label.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_hides_api_key() {
        assert_eq!(
            redact("https://x/data.json?start_date=2024-01-01&api_key=SECRET&end_date=2024-01-10"),
            "https://x/data.json?start_date=2024-01-01&api_key=***&end_date=2024-01-10"
        );
        assert_eq!(redact("https://x/?api_key=SECRET"), "https://x/?api_key=***");
        assert_eq!(redact("https://x/?s=aapl"), "https://x/?s=aapl");
    }

    #[test]
    fn field_names_are_snake_case() {
        assert_eq!(field_name("Traded Volume"), "traded_volume");
        assert_eq!(field_name("Adj Close"), "adj_close");
        assert_eq!(field_name("Last Price of the Day"), "last_price_of_the_day");
        assert_eq!(field_name(" Close "), "close");
        assert_eq!(field_name("Daily-Turnover"), "daily_turnover");
    }
}
