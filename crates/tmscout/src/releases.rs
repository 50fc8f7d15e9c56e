use std::cmp::Reverse;

use futures::future::join_all;
use futures::{StreamExt, TryStreamExt, stream};
use serde::Serialize;

use crate::fetch::{DEFAULT_TIMEOUT, PageFetcher};
use crate::parser::{RowBatch, TransferPage, parse_transfer_page};
use crate::schema::TransferListSchema;
use crate::scraper::{ScraperError, WebScraper};
use crate::types::{MarketValueBracket, TransferListing, dedupe_by_profile_url};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketFailure {
    pub bracket: MarketValueBracket,
    pub cause: String,
}

/// Merged result of several brackets. Failed brackets are listed rather than
/// failing the whole sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSweep {
    pub listings: Vec<TransferListing>,
    pub failures: Vec<BracketFailure>,
}

impl ReleaseSweep {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<F: PageFetcher> WebScraper<F> {
    pub fn release_page_url(&self, bracket: MarketValueBracket, page: u32) -> String {
        format!(
            "{}/transfers/neuestetransfers/statistik?land_id=0&wettbewerb_id=alle&minMarktwert={}&maxMarktwert={}&plus=1&page={}",
            self.base_url, bracket.min, bracket.max, page
        )
    }

    async fn fetch_release_page(
        &self,
        bracket: MarketValueBracket,
        page: u32,
    ) -> Result<TransferPage, ScraperError> {
        let url = self.release_page_url(bracket, page);
        let html = self.get_html(&url, DEFAULT_TIMEOUT).await?;
        Ok(parse_transfer_page(&html, &self.base_url, &TransferListSchema)?)
    }

    /// One pass over every page of a bracket. The first page is fetched once
    /// and supplies both the page count and its own rows.
    async fn collect_bracket_once(
        &self,
        bracket: MarketValueBracket,
    ) -> Result<Vec<TransferListing>, ScraperError> {
        let first = self.fetch_release_page(bracket, 1).await?;
        log::debug!("Bracket {}: {} pages", bracket, first.page_count);

        let batch: RowBatch<TransferListing> = stream::iter(2..=first.page_count)
            .then(|page| self.fetch_release_page(bracket, page))
            .try_fold(first.rows, |acc, page| async move {
                Ok::<_, ScraperError>(acc.merge(page.rows))
            })
            .await?;

        log::info!(
            "Bracket {}: {} free agents ({} malformed rows, {} with a club)",
            bracket,
            batch.rows.len(),
            batch.skipped,
            batch.filtered
        );
        Ok(batch.into_rows())
    }

    /// Every player released to "Without Club" within the bracket, in page
    /// order. Any page failure restarts the whole bracket, up to
    /// `max_attempts` passes in total.
    pub async fn collect_releases(
        &self,
        bracket: MarketValueBracket,
        max_attempts: u32,
    ) -> Result<Vec<TransferListing>, ScraperError> {
        let label = format!("Releases {}", bracket);
        self.retry
            .with_max_attempts(max_attempts)
            .run(&label, |_| self.collect_bracket_once(bracket))
            .await
    }

    /// Collects all brackets concurrently, drops duplicate profiles (first
    /// bracket wins) and orders the result by market value, highest first.
    pub async fn sweep_releases(&self, brackets: &[MarketValueBracket]) -> ReleaseSweep {
        let max_attempts = self.retry.max_attempts();
        let outcomes = join_all(brackets.iter().map(|&bracket| async move {
            (bracket, self.collect_releases(bracket, max_attempts).await)
        }))
        .await;

        let (listings, failures) = outcomes.into_iter().fold(
            (Vec::new(), Vec::new()),
            |(mut listings, mut failures), (bracket, outcome)| {
                match outcome {
                    Ok(rows) => listings.extend(rows),
                    Err(e) => {
                        log::warn!("Skipping bracket {}: {}", bracket, e);
                        failures.push(BracketFailure {
                            bracket,
                            cause: e.to_string(),
                        });
                    }
                }
                (listings, failures)
            },
        );

        let mut listings = dedupe_by_profile_url(listings);
        listings.sort_by_key(|l| Reverse(l.market_value_amount()));

        log::info!(
            "Release sweep: {} players from {} brackets, {} failed",
            listings.len(),
            brackets.len(),
            failures.len()
        );
        ReleaseSweep { listings, failures }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::FixtureFetcher;
    use crate::parser::WITHOUT_CLUB;
    use crate::retry::RetryPolicy;
    use std::time::Duration;
    use tokio::time::Instant;

    const BASE: &str = "https://www.transfermarkt.com";
    const PAGED: MarketValueBracket = MarketValueBracket::new(1_000_001, 1_200_000);
    const SINGLE: MarketValueBracket = MarketValueBracket::new(2_000_001, 2_500_000);
    const BROKEN: MarketValueBracket = MarketValueBracket::new(100_000, 250_000);

    fn page_url(bracket: MarketValueBracket, page: u32) -> String {
        format!(
            "{BASE}/transfers/neuestetransfers/statistik?land_id=0&wettbewerb_id=alle&minMarktwert={}&maxMarktwert={}&plus=1&page={page}",
            bracket.min, bracket.max
        )
    }

    fn fixtures() -> FixtureFetcher {
        FixtureFetcher::new()
            .with_fixture(&page_url(PAGED, 1), "fixtures/transfer_list_page1.html")
            .with_fixture(&page_url(PAGED, 2), "fixtures/transfer_list_page2.html")
            .with_fixture(&page_url(SINGLE, 1), "fixtures/transfer_list_single.html")
    }

    #[test]
    fn test_release_page_url() {
        let scraper = WebScraper::with_fetcher(FixtureFetcher::new(), BASE);
        assert_eq!(
            scraper.release_page_url(PAGED, 3),
            "https://www.transfermarkt.com/transfers/neuestetransfers/statistik?land_id=0&wettbewerb_id=alle&minMarktwert=1000001&maxMarktwert=1200000&plus=1&page=3"
        );
    }

    #[tokio::test]
    async fn test_collect_releases_walks_every_page() {
        let scraper = WebScraper::with_fetcher(fixtures(), BASE);
        let listings = scraper.collect_releases(PAGED, 3).await.unwrap();

        let names: Vec<_> = listings.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Ivan Petrov", "Marko Jovanovic"]);
        assert!(
            listings
                .iter()
                .all(|l| l.club_name.as_deref() == Some(WITHOUT_CLUB))
        );
        assert_eq!(scraper.fetcher.call_count(&page_url(PAGED, 1)), 1);
        assert_eq!(scraper.fetcher.call_count(&page_url(PAGED, 2)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_releases_retries_whole_bracket() {
        let fetcher = fixtures().failing(&page_url(PAGED, 2), 2);
        let scraper = WebScraper::with_fetcher(fetcher, BASE);

        let start = Instant::now();
        let listings = scraper.collect_releases(PAGED, 3).await.unwrap();

        assert_eq!(listings.len(), 2);
        assert_eq!(scraper.fetcher.call_count(&page_url(PAGED, 1)), 3);
        assert_eq!(scraper.fetcher.call_count(&page_url(PAGED, 2)), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(3000), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(3010), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_releases_gives_up() {
        let scraper = WebScraper::with_fetcher(fixtures(), BASE);

        let result = scraper.collect_releases(BROKEN, 3).await;
        match result {
            Err(ScraperError::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, ScraperError::FetchError(_)));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(scraper.fetcher.call_count(&page_url(BROKEN, 1)), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_collection_stops_retrying() {
        let scraper = WebScraper::with_fetcher(fixtures(), BASE);

        let result =
            tokio::time::timeout(Duration::from_millis(500), scraper.collect_releases(BROKEN, 3))
                .await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(scraper.fetcher.call_count(&page_url(BROKEN, 1)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_still_tries_once() {
        let scraper = WebScraper::with_fetcher(fixtures(), BASE);
        assert!(scraper.collect_releases(BROKEN, 0).await.is_err());
        assert_eq!(scraper.fetcher.call_count(&page_url(BROKEN, 1)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_merges_and_sorts() {
        let scraper = WebScraper::with_fetcher(fixtures(), BASE)
            .with_retry(RetryPolicy::new(2, Duration::from_millis(10)));

        let sweep = scraper.sweep_releases(&[PAGED, SINGLE, BROKEN]).await;

        let names: Vec<_> = sweep.listings.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Luis Gomez", "Ivan Petrov", "Marko Jovanovic"]);
        assert_eq!(sweep.failures.len(), 1);
        assert_eq!(sweep.failures[0].bracket, BROKEN);
        assert!(sweep.failures[0].cause.starts_with("Failed after 2 attempts"));
        assert!(!sweep.is_complete());
    }

    #[tokio::test]
    async fn test_sweep_without_brackets() {
        let scraper = WebScraper::with_fetcher(FixtureFetcher::new(), BASE);
        let sweep = scraper.sweep_releases(&[]).await;
        assert_eq!(sweep, ReleaseSweep::default());
        assert!(sweep.is_complete());
    }
}
