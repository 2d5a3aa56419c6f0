//! Retrying fetcher.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{ExchangeAdapter, ParseError, Request, RetryPolicy, Transport, TransportError};

/// Why a single attempt failed.
#[derive(Error, Debug)]
pub enum AttemptError {
    /// The request itself failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The exchange answered with an error payload.
    #[error("API error: {0}")]
    Api(String),
}

/// Errors that end a fetch for good.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Every attempt failed.
    #[error("{request} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// The request that kept failing.
        request: String,
        /// Attempts made.
        attempts: u32,
        /// The final failure.
        #[source]
        last: AttemptError,
    },

    /// A successful response had an unexpected shape.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Issues requests through a [`Transport`], retrying failures per [`RetryPolicy`].
///
/// Retries cover transport failures (connect, timeout, non-success status,
/// undecodable body) and API errors the adapter finds inside an otherwise
/// successful body. An empty page is a valid answer and is never retried.
/// Backoff sleeps suspend only the calling task.
#[derive(Debug, Clone)]
pub struct RetryingFetcher {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl RetryingFetcher {
    /// Creates a fetcher.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Returns the retry policy.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches one response body.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::RetriesExhausted`] once the policy's attempts
    /// are used up.
    pub async fn fetch(
        &self,
        adapter: &dyn ExchangeAdapter,
        request: &Request,
    ) -> Result<Value, FetchError> {
        let attempts = self.policy.attempts();
        let mut attempt = 1;
        loop {
            let failure = match self.transport.get(request).await {
                Ok(body) => match adapter.api_error(&body) {
                    None => {
                        debug!(exchange = %adapter.exchange(), %request, attempt, "fetched");
                        return Ok(body);
                    }
                    Some(message) => AttemptError::Api(message),
                },
                Err(e) => AttemptError::Transport(e),
            };

            if attempt >= attempts {
                return Err(FetchError::RetriesExhausted {
                    request: request.to_string(),
                    attempts,
                    last: failure,
                });
            }

            let delay = self.policy.delay(attempt);
            warn!(
                exchange = %adapter.exchange(),
                %request,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "request failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FnTransport, adapter_for};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use trawl_types::Exchange;

    fn flaky(failures: u32) -> (Arc<AtomicU32>, Arc<dyn Transport>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let transport: Arc<dyn Transport> = Arc::new(FnTransport::new(move |_req: &Request| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < failures {
                Err(TransportError::Status {
                    status: 503,
                    body: "busy".into(),
                })
            } else {
                Ok(json!([]))
            }
        }));
        (calls, transport)
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let (calls, transport) = flaky(3);
        let fetcher = RetryingFetcher::new(transport, RetryPolicy::immediate(10));
        let adapter = adapter_for(Exchange::Binance);

        let body = fetcher
            .fetch(adapter.as_ref(), &Request::new("/aggTrades"))
            .await
            .unwrap();
        assert_eq!(body, json!([]));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_empty_page_is_not_retried() {
        let (calls, transport) = flaky(0);
        let fetcher = RetryingFetcher::new(transport, RetryPolicy::immediate(10));
        let adapter = adapter_for(Exchange::Coinbase);

        let body = fetcher
            .fetch(adapter.as_ref(), &Request::new("/products/BTC-USD/trades"))
            .await
            .unwrap();
        assert_eq!(body, json!([]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let (calls, transport) = flaky(u32::MAX);
        let fetcher = RetryingFetcher::new(transport, RetryPolicy::immediate(5));
        let adapter = adapter_for(Exchange::Coinbase);

        let err = fetcher
            .fetch(adapter.as_ref(), &Request::new("/products/BTC-USD/trades"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::RetriesExhausted {
                attempts: 5,
                last: AttemptError::Transport(TransportError::Status { status: 503, .. }),
                ..
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_api_errors_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let transport = FnTransport::new(move |_req: &Request| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(json!({ "error": ["EAPI:Rate limit exceeded"] }))
            } else {
                Ok(json!({ "error": [], "result": { "XXBTZUSD": [], "last": "0" } }))
            }
        });
        let fetcher = RetryingFetcher::new(Arc::new(transport), RetryPolicy::immediate(3));
        let adapter = adapter_for(Exchange::Kraken);

        let body = fetcher
            .fetch(adapter.as_ref(), &Request::new("/public/Trades"))
            .await
            .unwrap();
        assert_eq!(body["result"]["last"], "0");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_grows_linearly() {
        let (_, transport) = flaky(2);
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
        };
        let fetcher = RetryingFetcher::new(transport, policy);
        let adapter = adapter_for(Exchange::Bitmex);

        let started = tokio::time::Instant::now();
        fetcher
            .fetch(adapter.as_ref(), &Request::new("/trade"))
            .await
            .unwrap();
        assert_eq!(started.elapsed().as_secs(), 3);
    }
}
