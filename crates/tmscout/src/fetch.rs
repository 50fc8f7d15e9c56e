use reqwest::Client;
use std::future::Future;
use std::time::Duration;

/// Desktop browser user agent sent with every request. The site serves reduced
/// markup to unknown agents.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 6.3; Trident/7.0; rv:11.0) like Gecko";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for every request made while collecting loan returnees.
pub const CLUB_PAGE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Empty response for {0}")]
    EmptyBody(String),
    #[error("Failed to fetch {url}: {cause}")]
    Other { url: String, cause: String },
}

/// Retrieves the raw HTML of a page.
///
/// Implementations perform exactly one outbound request per call and keep no
/// cookies or cache between calls. Dropping the returned future abandons the
/// request.
pub trait PageFetcher: Send + Sync {
    fn fetch(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<String, FetchError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        log::debug!("GET {} (timeout {:?})", url, timeout);

        let html = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?
            .error_for_status()?
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?;

        if html.trim().is_empty() {
            return Err(FetchError::EmptyBody(url.to_string()));
        }

        Ok(html)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FixtureFetcher;
    use super::*;

    #[test]
    fn test_http_fetcher_builds() {
        assert!(HttpFetcher::new().is_ok());
    }

    #[test]
    fn test_club_timeout_is_shorter_than_default() {
        assert_eq!(DEFAULT_TIMEOUT, Duration::from_secs(30));
        assert_eq!(CLUB_PAGE_TIMEOUT, Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_fixture_fetcher_scripted_failures() {
        let fetcher = FixtureFetcher::new()
            .with_page("https://example.test/a", "<html></html>")
            .failing("https://example.test/a", 1);

        let first = fetcher
            .fetch("https://example.test/a", DEFAULT_TIMEOUT)
            .await;
        assert!(matches!(first, Err(FetchError::Other { .. })));

        let second = fetcher
            .fetch("https://example.test/a", CLUB_PAGE_TIMEOUT)
            .await
            .expect("second call should succeed");
        assert_eq!(second, "<html></html>");

        let calls = fetcher.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].1, CLUB_PAGE_TIMEOUT);
    }
}
