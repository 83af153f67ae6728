use log::debug;
use url::Url;

use super::types::GerritChangeInfo;
use crate::auth::Token;
use crate::error::{Result, ZingStatsError};
use crate::providers::rest::{Auth, RestClient};

/// Gerrit prefixes JSON bodies with this line to defeat XSSI.
const XSSI_PREFIX: &str = ")]}'";

pub struct GerritClient {
    rest: RestClient,
    /// Public server URL, used for links to changes
    pub base_url: String,
    /// REST root: `{base}/a/` when authenticated, `{base}/` otherwise
    api_url: Url,
}

impl GerritClient {
    pub fn new(
        base_url: &str,
        user: Option<&str>,
        token: Option<Token>,
        verify_tls: bool,
    ) -> Result<Self> {
        let auth = match (user, token) {
            (Some(user), Some(token)) => Some(Auth::Basic {
                user: user.to_string(),
                token,
            }),
            _ => None,
        };

        let base = base_url.trim_end_matches('/');
        let api_root = if auth.is_some() {
            format!("{base}/a/")
        } else {
            format!("{base}/")
        };
        let api_url = Url::parse(&api_root)
            .map_err(|e| ZingStatsError::Config(format!("Invalid Gerrit URL: {e}")))?;

        Ok(Self {
            rest: RestClient::new(auth, verify_tls)?,
            base_url: base.to_string(),
            api_url,
        })
    }

    fn changes_url(&self, query: &str, start: usize, count: usize) -> Result<Url> {
        let mut url = self
            .api_url
            .join("changes/")
            .map_err(|e| ZingStatsError::Config(format!("Invalid Gerrit changes URL: {e}")))?;

        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("o", "ALL_REVISIONS")
            .append_pair("o", "MESSAGES")
            .append_pair("start", &start.to_string())
            .append_pair("n", &count.to_string());

        Ok(url)
    }

    /// Fetches one page of changes with all revisions and messages.
    pub async fn query_changes(
        &self,
        query: &str,
        start: usize,
        count: usize,
    ) -> Result<Vec<GerritChangeInfo>> {
        let url = self.changes_url(query, start, count)?;
        debug!("Querying {count} changes starting at {start}");

        let body = self.rest.get_success(&url).await?.text().await?;
        let changes = serde_json::from_str(strip_xssi_prefix(&body))?;

        Ok(changes)
    }
}

fn strip_xssi_prefix(body: &str) -> &str {
    body.strip_prefix(XSSI_PREFIX)
        .map_or(body, |rest| rest.trim_start_matches(['\r', '\n']))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[test]
    fn test_strip_xssi_prefix() {
        assert_eq!(strip_xssi_prefix(")]}'\n[]"), "[]");
        assert_eq!(strip_xssi_prefix("[]"), "[]");
    }

    #[test]
    fn test_changes_url_encoding() {
        let client = GerritClient::new("http://gerrit.example.com/", None, None, true).unwrap();
        let url = client
            .changes_url("status:open OR status:closed", 0, 100)
            .unwrap();

        assert_eq!(
            url.as_str(),
            "http://gerrit.example.com/changes/?q=status%3Aopen+OR+status%3Aclosed&o=ALL_REVISIONS&o=MESSAGES&start=0&n=100"
        );
    }

    #[test]
    fn test_authenticated_requests_use_a_prefix() {
        let client = GerritClient::new(
            "https://gerrit.example.com",
            Some("jdoe"),
            Some(Token::from("secret")),
            true,
        )
        .unwrap();
        let url = client.changes_url("status:open", 0, 10).unwrap();

        assert!(url.as_str().starts_with("https://gerrit.example.com/a/changes/"));
        assert_eq!(client.base_url, "https://gerrit.example.com");
    }

    #[tokio::test]
    async fn test_query_changes_empty() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/changes/")
            .match_query(Matcher::UrlEncoded("start".into(), "0".into()))
            .with_status(200)
            .with_body(")]}'\n[]\n")
            .create_async()
            .await;

        let client = GerritClient::new(&server.url(), None, None, true).unwrap();
        let changes = client
            .query_changes("status:open OR status:closed", 0, 100)
            .await
            .unwrap();

        assert!(changes.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_query_changes_rejects_non_json() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/changes/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("data")
            .create_async()
            .await;

        let client = GerritClient::new(&server.url(), None, None, true).unwrap();
        let result = client.query_changes("status:open", 0, 100).await;

        assert!(matches!(result, Err(ZingStatsError::Json(_))));
    }
}
