use log::debug;
use reqwest::header::{HeaderMap, LINK};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use super::types::GitHubPullRequest;
use crate::auth::Token;
use crate::error::{Result, ZingStatsError};
use crate::providers::rest::{ensure_success, Auth, RestClient};

const PER_PAGE: &str = "100";

/// One page of a paginated GitHub listing.
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<Url>,
}

/// GitHub Enterprise REST client (`{server}/api/v3/`).
pub struct GitHubClient {
    rest: RestClient,
    api_url: Url,
}

impl GitHubClient {
    pub fn new(base_url: &str, token: Option<Token>, verify_tls: bool) -> Result<Self> {
        let api_url = Url::parse(&format!("{}/api/v3/", base_url.trim_end_matches('/')))
            .map_err(|e| ZingStatsError::Config(format!("Invalid GitHub URL: {e}")))?;

        Ok(Self {
            rest: RestClient::new(token.map(Auth::Bearer), verify_tls)?,
            api_url,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.rest.is_authenticated()
    }

    /// First page of pull requests for `owner/repo`, most recently updated first.
    pub fn pulls_url(&self, project: &str) -> Result<Url> {
        let mut url = self
            .api_url
            .join(&format!("repos/{project}/pulls"))
            .map_err(|e| ZingStatsError::Config(format!("Invalid pulls URL for {project}: {e}")))?;

        url.query_pairs_mut()
            .append_pair("state", "all")
            .append_pair("sort", "updated")
            .append_pair("direction", "desc")
            .append_pair("per_page", PER_PAGE);

        Ok(url)
    }

    /// Fetches a page of pull requests. `Ok(None)` when the repository is
    /// not visible (404).
    pub async fn fetch_pulls_page(&self, url: &Url) -> Result<Option<Page<GitHubPullRequest>>> {
        let response = self.rest.get(url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = ensure_success(response).await?;
        let next = next_link(response.headers());
        let items = response.json().await?;

        Ok(Some(Page { items, next }))
    }

    /// Fetches every page of a listing such as a PR's `commits_url`.
    pub async fn fetch_all<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>> {
        let mut url = Url::parse(url)
            .map_err(|e| ZingStatsError::Config(format!("Invalid GitHub URL {url}: {e}")))?;
        url.query_pairs_mut().append_pair("per_page", PER_PAGE);

        let mut all = Vec::new();
        let mut next = Some(url);
        while let Some(url) = next {
            let response = self.rest.get_success(&url).await?;
            next = next_link(response.headers());
            let items: Vec<T> = response.json().await?;
            debug!("Fetched {} items from {url}", items.len());
            all.extend(items);
        }

        Ok(all)
    }
}

/// Extracts the `rel="next"` target from a `Link` header.
fn next_link(headers: &HeaderMap) -> Option<Url> {
    let link = headers.get(LINK)?.to_str().ok()?;

    link.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|param| param.trim() == r#"rel="next""#);
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .and_then(|t| Url::parse(t).ok())
    })
}
