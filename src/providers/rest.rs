use std::time::Duration;

use log::{debug, warn};
use reqwest::{Client, RequestBuilder, Response};
use url::Url;

use crate::auth::Token;
use crate::error::{Result, ZingStatsError};

const MAX_RETRIES: u32 = 5;
const RETRY_DELAY_SECONDS: u64 = 10;

/// Credentials attached to every request.
#[derive(Debug, Clone)]
pub enum Auth {
    /// Gerrit HTTP password
    Basic { user: String, token: Token },
    /// GitHub personal access token
    Bearer(Token),
}

/// Thin REST client shared by the Gerrit and GitHub providers.
///
/// Retries connection failures, rate limiting (429) and server errors with a
/// fixed delay; any other response is handed back to the caller untouched.
pub struct RestClient {
    client: Client,
    auth: Option<Auth>,
    max_retries: u32,
    retry_delay: Duration,
}

impl RestClient {
    pub fn new(auth: Option<Auth>, verify_tls: bool) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("zing-stats/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .map_err(|e| ZingStatsError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            auth,
            max_retries: MAX_RETRIES,
            retry_delay: Duration::from_secs(RETRY_DELAY_SECONDS),
        })
    }

    #[cfg(test)]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    fn auth_request(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some(Auth::Basic { user, token }) => request.basic_auth(user, Some(token.as_str())),
            Some(Auth::Bearer(token)) => request.bearer_auth(token.as_str()),
            None => request,
        }
    }

    /// GET with retries. Non-retryable error statuses are returned as-is.
    pub async fn get(&self, url: &Url) -> Result<Response> {
        let mut retry_count = 0;
        loop {
            debug!("GET {url}");
            let request = self.auth_request(self.client.get(url.clone()));

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    if retry_count >= self.max_retries {
                        return Err(e.into());
                    }
                    warn!(
                        "Network error ({e}), retrying in {}s ({}/{})...",
                        self.retry_delay.as_secs(),
                        retry_count + 1,
                        self.max_retries
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    retry_count += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();
            if status == 429 || status.is_server_error() {
                if retry_count >= self.max_retries {
                    return Err(ZingStatsError::ApiErrorAfterRetries {
                        status: status.as_u16(),
                        retries: self.max_retries,
                    });
                }
                warn!(
                    "API error (status {status}) for {url}. Waiting {}s before retry {}/{}...",
                    self.retry_delay.as_secs(),
                    retry_count + 1,
                    self.max_retries
                );
                tokio::time::sleep(self.retry_delay).await;
                retry_count += 1;
                continue;
            }

            return Ok(response);
        }
    }

    /// GET that treats any non-2xx status as an error.
    pub async fn get_success(&self, url: &Url) -> Result<Response> {
        let response = self.get(url).await?;
        ensure_success(response).await
    }
}

pub async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());
    Err(ZingStatsError::ApiError {
        status: status.as_u16(),
        message,
    })
}
