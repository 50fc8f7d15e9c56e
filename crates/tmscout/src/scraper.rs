use crate::fetch::{DEFAULT_TIMEOUT, FetchError, HttpFetcher, PageFetcher};
use crate::parser::{ParseError, ProfileDetails, parse_player_profile, parse_search_results};
use crate::retry::RetryPolicy;
use crate::returnees::DEFAULT_CLUB_CONCURRENCY;
use crate::schema::{ProfileSchema, SearchResultsSchema};
use crate::types::{PlayerRecord, RefreshedAttributes, SearchCandidate};

use reqwest::Url;
use std::time::Duration;

const UNKNOWN: &str = "Unknown";

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("Fetch failed: {0}")]
    FetchError(#[from] FetchError),
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),
    #[error("Failed after {attempts} attempts. Last error: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<ScraperError>,
    },
    #[error("Profile URL is blank")]
    InvalidProfileUrl,
}

#[derive(Debug, Clone)]
pub struct WebScraper<F = HttpFetcher> {
    pub(crate) fetcher: F,
    pub(crate) base_url: String,
    pub(crate) retry: RetryPolicy,
    pub(crate) club_concurrency: usize,
}

impl WebScraper<HttpFetcher> {
    pub fn new() -> Result<Self, ScraperError> {
        Ok(Self::with_fetcher(HttpFetcher::new()?, crate::BASE_URL))
    }
}

impl<F: PageFetcher> WebScraper<F> {
    pub fn with_fetcher(fetcher: F, base_url: &str) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
            club_concurrency: DEFAULT_CLUB_CONCURRENCY,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Number of club pages fetched in parallel while collecting returnees.
    pub fn with_club_concurrency(mut self, concurrency: usize) -> Self {
        self.club_concurrency = concurrency.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub(crate) async fn get_html(&self, url: &str, timeout: Duration) -> Result<String, ScraperError> {
        Ok(self.fetcher.fetch(url, timeout).await?)
    }

    pub fn search_url(&self, query: &str) -> Result<String, ScraperError> {
        let endpoint = format!("{}/schnellsuche/ergebnis/schnellsuche", self.base_url);
        let url = Url::parse_with_params(&endpoint, &[("query", query)])
            .map_err(|e| ParseError::UrlParseError(e.to_string()))?;
        Ok(url.to_string())
    }

    /// Player hits for a free-text query, in page order. A blank query yields
    /// no candidates without touching the network.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>, ScraperError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.search_url(query)?;
        log::info!("Searching players for '{}'", query);

        let html = self
            .get_html(&url, DEFAULT_TIMEOUT)
            .await
            .inspect_err(|e| log::error!("Search for '{}' failed: {}", query, e))?;
        let batch = parse_search_results(&html, &self.base_url, &SearchResultsSchema)?;

        Ok(batch.into_rows())
    }

    async fn fetch_profile(&self, profile_url: &str) -> Result<ProfileDetails, ScraperError> {
        if profile_url.trim().is_empty() {
            return Err(ScraperError::InvalidProfileUrl);
        }

        let html = self.get_html(profile_url, DEFAULT_TIMEOUT).await?;
        Ok(parse_player_profile(&html, &self.base_url, &ProfileSchema)?)
    }

    /// Builds the canonical record for a search hit. Name, image, age and
    /// flag come from the hit; everything else from the profile page.
    pub async fn resolve_full_profile(
        &self,
        candidate: &SearchCandidate,
    ) -> Result<PlayerRecord, ScraperError> {
        log::info!("Resolving profile {}", candidate.profile_url);

        let details = self
            .fetch_profile(&candidate.profile_url)
            .await
            .inspect_err(|e| {
                log::error!("Failed to resolve {}: {}", candidate.profile_url, e)
            })?;

        Ok(PlayerRecord {
            profile_url: candidate.profile_url.clone(),
            full_name: candidate.name.clone(),
            height: or_unknown(details.height),
            age: candidate.age.clone(),
            positions: details.positions,
            image_url: candidate.image_url.clone(),
            nationality: or_unknown(details.nationality),
            nationality_flag: candidate.nationality_flag.clone(),
            contract_expires: details.contract_expires,
            market_value: details.market_value,
            created_at: chrono::Utc::now().timestamp_millis(),
            current_club: details.club,
            ..Default::default()
        })
    }

    /// Re-reads the market-derived attributes of a stored player.
    pub async fn refresh_player(
        &self,
        profile_url: &str,
    ) -> Result<RefreshedAttributes, ScraperError> {
        log::debug!("Refreshing {}", profile_url);

        let details = self
            .fetch_profile(profile_url)
            .await
            .inspect_err(|e| log::warn!("Refresh of '{}' failed: {}", profile_url, e))?;

        Ok(RefreshedAttributes {
            market_value: details.market_value,
            image_url: details.image_url,
            nationality: details.nationality,
            nationality_flag: details.nationality_flag,
            age: details.age,
            contract_expires: details.contract_expires,
            positions: details.positions,
            current_club: details.club,
        })
    }
}

fn or_unknown(value: String) -> String {
    if value.trim().is_empty() {
        UNKNOWN.to_string()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::FixtureFetcher;

    const BASE: &str = "https://www.transfermarkt.com";
    const MESSI_URL: &str = "https://www.transfermarkt.com/lionel-messi/profil/spieler/28003";
    const SEARCH_URL: &str =
        "https://www.transfermarkt.com/schnellsuche/ergebnis/schnellsuche?query=Messi";

    fn scraper(fetcher: FixtureFetcher) -> WebScraper<FixtureFetcher> {
        WebScraper::with_fetcher(fetcher, BASE)
    }

    #[test]
    fn test_scraper_creation() {
        let scraper = WebScraper::new();
        assert!(scraper.is_ok());
        assert_eq!(scraper.unwrap().base_url(), BASE);
    }

    #[test]
    fn test_search_url_encodes_query() {
        let scraper = scraper(FixtureFetcher::new());
        assert_eq!(scraper.search_url("Messi").unwrap(), SEARCH_URL);
        assert_eq!(
            scraper.search_url("Lionel Messi").unwrap(),
            "https://www.transfermarkt.com/schnellsuche/ergebnis/schnellsuche?query=Lionel+Messi"
        );
    }

    #[tokio::test]
    async fn test_search() {
        let fetcher = FixtureFetcher::new().with_fixture(SEARCH_URL, "fixtures/search_messi.html");
        let scraper = scraper(fetcher);

        let candidates = scraper.search("Messi").await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].profile_url, MESSI_URL);
        assert_eq!(candidates[0].position, "Right Winger");
        assert_eq!(scraper.fetcher.calls()[0].1, DEFAULT_TIMEOUT);
    }

    #[tokio::test]
    async fn test_search_blank_query_skips_network() {
        let scraper = scraper(FixtureFetcher::new());
        assert!(scraper.search("   ").await.unwrap().is_empty());
        assert!(scraper.fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_search_network_failure_propagates() {
        let scraper = scraper(FixtureFetcher::new());
        let result = scraper.search("Messi").await;
        assert!(matches!(result, Err(ScraperError::FetchError(_))));
    }

    #[tokio::test]
    async fn test_resolve_full_profile() {
        let fetcher = FixtureFetcher::new()
            .with_fixture(SEARCH_URL, "fixtures/search_messi.html")
            .with_fixture(MESSI_URL, "fixtures/profile_messi.html");
        let scraper = scraper(fetcher);

        let candidate = scraper.search("Messi").await.unwrap().remove(0);
        let before = chrono::Utc::now().timestamp_millis();
        let player = scraper.resolve_full_profile(&candidate).await.unwrap();

        assert_eq!(player.profile_url, MESSI_URL);
        assert_eq!(player.full_name, "Lionel Messi");
        assert_eq!(player.image_url, candidate.image_url);
        assert_eq!(player.age, "37");
        assert_eq!(player.nationality_flag, candidate.nationality_flag);
        assert_eq!(player.nationality, "Argentina");
        assert_eq!(player.height, "1,70 m");
        assert_eq!(player.positions, vec!["RW", "CF", "SS"]);
        assert_eq!(player.market_value, "€20.00m");
        assert_eq!(player.contract_expires, "Dec 31, 2025");
        assert_eq!(player.current_club.name, "Inter Miami CF");
        assert!(player.created_at >= before);
        assert!(player.agent_in_charge_id.is_none());
        assert!(player.note_history.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_defaults_to_unknown() {
        let url = "https://www.transfermarkt.com/nobody/profil/spieler/1";
        let fetcher = FixtureFetcher::new().with_page(
            url,
            "<html><body><header class=\"data-header\"></header></body></html>",
        );
        let candidate = SearchCandidate {
            profile_url: url.to_string(),
            name: "Nobody".to_string(),
            ..Default::default()
        };

        let player = scraper(fetcher)
            .resolve_full_profile(&candidate)
            .await
            .unwrap();
        assert_eq!(player.nationality, "Unknown");
        assert_eq!(player.height, "Unknown");
        assert!(player.positions.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_player_is_stable() {
        let fetcher = FixtureFetcher::new().with_fixture(MESSI_URL, "fixtures/profile_messi.html");
        let scraper = scraper(fetcher);

        let first = scraper.refresh_player(MESSI_URL).await.unwrap();
        let second = scraper.refresh_player(MESSI_URL).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.market_value, "€20.00m");
        assert_eq!(
            first.image_url,
            "https://img.a.transfermarkt.technology/portrait/header/28003-1.jpg"
        );
        assert_eq!(
            first.nationality_flag,
            "https://tmssl.akamaized.net/images/flagge/head/9.png"
        );
        assert_eq!(first.age, "37");
        assert_eq!(first.current_club.country, "United States");
    }

    #[tokio::test]
    async fn test_refresh_blank_url() {
        let scraper = scraper(FixtureFetcher::new());
        let result = scraper.refresh_player("  ").await;
        assert!(matches!(result, Err(ScraperError::InvalidProfileUrl)));
        assert!(scraper.fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_reports_failures() {
        let url = "https://www.transfermarkt.com/gone/profil/spieler/2";
        let fetcher = FixtureFetcher::new().with_page(url, "<html><body><p>Moved</p></body></html>");
        let scraper = scraper(fetcher);

        let parse_failure = scraper.refresh_player(url).await;
        assert!(matches!(parse_failure, Err(ScraperError::ParseError(_))));

        let fetch_failure = scraper
            .refresh_player("https://www.transfermarkt.com/missing/profil/spieler/3")
            .await;
        assert!(matches!(fetch_failure, Err(ScraperError::FetchError(_))));
    }
}
