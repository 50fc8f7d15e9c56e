use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};

use crate::fetch::{CLUB_PAGE_TIMEOUT, PageFetcher};
use crate::parser::{RowBatch, parse_club_links, parse_club_returnees};
use crate::schema::{ClubListSchema, ClubTransfersSchema};
use crate::scraper::{ScraperError, WebScraper};
use crate::types::{TransferListing, dedupe_by_profile_url};

pub const DEFAULT_CLUB_CONCURRENCY: usize = 3;

const LEAGUES: &[(&str, &str)] = &[
    (
        "Belgium - Jupiler Pro League",
        "https://www.transfermarkt.com/jupiler-pro-league/startseite/wettbewerb/BE1",
    ),
    (
        "Netherlands - Eredivisie",
        "https://www.transfermarkt.com/eredivisie/startseite/wettbewerb/NL1",
    ),
    (
        "Portugal - Liga Portugal",
        "https://www.transfermarkt.com/liga-portugal/startseite/wettbewerb/PO1",
    ),
    (
        "Serbia - Super Liga Srbije",
        "https://www.transfermarkt.com/super-liga-srbije/startseite/wettbewerb/SER1",
    ),
    (
        "Greece - Super League 1",
        "https://www.transfermarkt.com/super-league-1/startseite/wettbewerb/GR1",
    ),
    (
        "Sweden - Allsvenskan",
        "https://www.transfermarkt.com/allsvenskan/startseite/wettbewerb/SE1",
    ),
    (
        "Poland - Ekstraklasa",
        "https://www.transfermarkt.com/pko-bp-ekstraklasa/startseite/wettbewerb/PL1",
    ),
    (
        "Ukraine - Ukrainian Premier League",
        "https://www.transfermarkt.com/premier-liga/startseite/wettbewerb/UKR1",
    ),
    (
        "Portugal - Liga Portugal 2",
        "https://www.transfermarkt.com/liga-portugal-2/startseite/wettbewerb/PO2",
    ),
    (
        "Turkey - SuperLig",
        "https://www.transfermarkt.com/super-lig/startseite/wettbewerb/TR1",
    ),
    (
        "Switzerland - Super League",
        "https://www.transfermarkt.com/super-league/startseite/wettbewerb/C1",
    ),
    (
        "Austria - Bundesliga",
        "https://www.transfermarkt.com/bundesliga/startseite/wettbewerb/A1",
    ),
    (
        "Czech Republic - Chance Liga",
        "https://www.transfermarkt.com/chance-liga/startseite/wettbewerb/TS1",
    ),
    (
        "Romania - SuperLiga",
        "https://www.transfermarkt.com/superliga/startseite/wettbewerb/RO1",
    ),
    (
        "Bulgaria - Efbet Liga",
        "https://www.transfermarkt.com/efbet-liga/startseite/wettbewerb/BU1",
    ),
    (
        "Hungary - Top Division",
        "https://www.transfermarkt.com/nemzeti-bajnoksag/startseite/wettbewerb/UNG1",
    ),
    (
        "Cyprus - Cyprus League",
        "https://www.transfermarkt.com/cyprus-league/startseite/wettbewerb/ZYP1",
    ),
    (
        "Slovakia - Nike Liga",
        "https://www.transfermarkt.com/nike-liga/startseite/wettbewerb/SLO1",
    ),
    (
        "Azerbaijan - Premyer Liqa",
        "https://www.transfermarkt.com/premyer-liqa/startseite/wettbewerb/AZ1",
    ),
    (
        "England - Championship",
        "https://www.transfermarkt.com/championship/startseite/wettbewerb/GB2",
    ),
    (
        "Italy - Serie A",
        "https://www.transfermarkt.com/serie-a/startseite/wettbewerb/IT1",
    ),
    (
        "Italy - Serie B",
        "https://www.transfermarkt.com/serie-b/startseite/wettbewerb/IT2",
    ),
    (
        "Germany - Bundesliga 2",
        "https://www.transfermarkt.com/2-bundesliga/startseite/wettbewerb/L2",
    ),
    (
        "Spain - LaLiga",
        "https://www.transfermarkt.com/laliga/startseite/wettbewerb/ES1",
    ),
    (
        "Spain - LaLiga2",
        "https://www.transfermarkt.com/laliga2/startseite/wettbewerb/ES2",
    ),
    (
        "France - Ligue 2",
        "https://www.transfermarkt.com/ligue-2/startseite/wettbewerb/FR2",
    ),
    (
        "Turkey - 1.Lig",
        "https://www.transfermarkt.com/1-lig/startseite/wettbewerb/TR2",
    ),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct League {
    pub name: String,
    pub url: String,
}

impl League {
    /// Competition code at the end of the overview URL, e.g. `NL1`.
    pub fn code(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or_default()
    }
}

/// The leagues watched for returnees, sorted by name.
pub fn leagues() -> Vec<League> {
    let mut leagues: Vec<League> = LEAGUES
        .iter()
        .map(|(name, url)| League {
            name: name.to_string(),
            url: url.to_string(),
        })
        .collect();
    leagues.sort_by(|a, b| a.name.cmp(&b.name));
    leagues.dedup_by(|a, b| a.url == b.url);
    leagues
}

/// Looks a league up by competition code, then by a case-insensitive name
/// fragment.
pub fn find_league(query: &str) -> Option<League> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }

    let needle = query.to_lowercase();
    let leagues = leagues();
    let by_code = leagues
        .iter()
        .position(|l| l.code().eq_ignore_ascii_case(query));
    let index = by_code.or_else(|| {
        leagues
            .iter()
            .position(|l| l.name.to_lowercase().contains(&needle))
    })?;

    leagues.into_iter().nth(index)
}

impl<F: PageFetcher> WebScraper<F> {
    /// Loan returnees of one club's transfer page.
    pub async fn fetch_club_returnees(
        &self,
        transfers_url: &str,
    ) -> Result<RowBatch<TransferListing>, ScraperError> {
        let html = self.get_html(transfers_url, CLUB_PAGE_TIMEOUT).await?;
        Ok(parse_club_returnees(
            &html,
            &self.base_url,
            &ClubTransfersSchema::ARRIVALS,
            &ClubTransfersSchema::DEPARTURES,
        )?)
    }

    /// Loan returnees of every club in a league, in club order. Clubs whose
    /// page cannot be fetched or parsed are left out. Only a failure to read
    /// the league page itself is an error.
    pub async fn fetch_returnees(
        &self,
        league_url: &str,
    ) -> Result<Vec<TransferListing>, ScraperError> {
        log::info!("Collecting returnees from {}", league_url);

        let html = self.get_html(league_url, CLUB_PAGE_TIMEOUT).await?;
        let clubs = parse_club_links(&html, &self.base_url, &ClubListSchema)?;
        log::info!("Found {} clubs", clubs.len());

        let returnees = stream::iter(clubs)
            .map(|url| async move {
                let outcome = self.fetch_club_returnees(&url).await;
                (url, outcome)
            })
            .buffered(self.club_concurrency)
            .fold(Vec::new(), |mut acc, (url, outcome)| async move {
                match outcome {
                    Ok(batch) => {
                        log::debug!("{}: {} returnees", url, batch.rows.len());
                        acc.extend(batch.rows);
                    }
                    Err(e) => log::warn!("Skipping club {}: {}", url, e),
                }
                acc
            })
            .await;

        log::info!("Collected {} returnees", returnees.len());
        Ok(returnees)
    }

    /// `fetch_returnees` with each player kept once. A player listed by two
    /// clubs keeps the row of the first club.
    pub async fn fetch_returnee_feed(
        &self,
        league_url: &str,
    ) -> Result<Vec<TransferListing>, ScraperError> {
        let returnees = self.fetch_returnees(league_url).await?;
        Ok(dedupe_by_profile_url(returnees))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::FixtureFetcher;
    use std::time::Duration;

    const BASE: &str = "https://www.transfermarkt.com";
    const LEAGUE_URL: &str = "https://www.transfermarkt.com/example-league/startseite/wettbewerb/EX1";
    const ALPHA: &str =
        "https://www.transfermarkt.com/fc-alpha/transfers/verein/100/saison_id/2024/saison_id";
    const BETA: &str =
        "https://www.transfermarkt.com/fc-beta/transfers/verein/200/saison_id/2024/saison_id";
    const DELTA: &str =
        "https://www.transfermarkt.com/fc-delta/transfers/verein/400/saison_id/2024/saison_id";

    fn league_fixtures() -> FixtureFetcher {
        FixtureFetcher::new()
            .with_fixture(LEAGUE_URL, "fixtures/league_clubs.html")
            .with_fixture(ALPHA, "fixtures/club_alpha_transfers.html")
            .with_fixture(BETA, "fixtures/club_beta_transfers.html")
            .with_page(
                DELTA,
                "<html><body><table class=\"items\"><tbody></tbody></table></body></html>",
            )
    }

    #[test]
    fn test_leagues_sorted_and_unique() {
        let leagues = leagues();
        assert_eq!(leagues.len(), 27);
        assert!(leagues.windows(2).all(|w| w[0].name < w[1].name));
        assert_eq!(leagues[0].name, "Austria - Bundesliga");
    }

    #[test]
    fn test_find_league() {
        assert_eq!(find_league("nl1").unwrap().name, "Netherlands - Eredivisie");
        assert_eq!(
            find_league("eredivisie").unwrap().url,
            "https://www.transfermarkt.com/eredivisie/startseite/wettbewerb/NL1"
        );
        assert_eq!(find_league("PO2").unwrap().name, "Portugal - Liga Portugal 2");
        assert!(find_league("Scottish Premiership").is_none());
        assert!(find_league("").is_none());
    }

    #[tokio::test]
    async fn test_fetch_returnees() {
        let scraper = WebScraper::with_fetcher(league_fixtures(), BASE);
        let returnees = scraper.fetch_returnees(LEAGUE_URL).await.unwrap();

        let names: Vec<_> = returnees.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Nikola Stanic", "Shared Player", "Shared Player"]);
        assert!(returnees.iter().all(|r| r.market_value.is_none()));
    }

    #[tokio::test]
    async fn test_returnee_feed_lists_each_player_once() {
        let scraper = WebScraper::with_fetcher(league_fixtures(), BASE);
        let feed = scraper.fetch_returnee_feed(LEAGUE_URL).await.unwrap();

        let names: Vec<_> = feed.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Nikola Stanic", "Shared Player"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_scan_stops_fetching() {
        let fetcher = league_fixtures().with_latency(Duration::from_millis(100));
        let scraper = WebScraper::with_fetcher(fetcher, BASE).with_club_concurrency(1);

        let result = tokio::time::timeout(
            Duration::from_millis(250),
            scraper.fetch_returnees(LEAGUE_URL),
        )
        .await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_secs(5)).await;
        let urls: Vec<_> = scraper.fetcher.calls().into_iter().map(|(url, _)| url).collect();
        assert_eq!(urls, vec![LEAGUE_URL, ALPHA, BETA]);
    }

    #[tokio::test]
    async fn test_fetch_returnees_uses_club_timeout() {
        let scraper = WebScraper::with_fetcher(league_fixtures(), BASE);
        scraper.fetch_returnees(LEAGUE_URL).await.unwrap();

        let calls = scraper.fetcher.calls();
        assert_eq!(calls.len(), 5);
        assert!(calls.iter().all(|(_, timeout)| *timeout == CLUB_PAGE_TIMEOUT));
    }

    #[tokio::test]
    async fn test_sequential_matches_concurrent() {
        let concurrent = WebScraper::with_fetcher(league_fixtures(), BASE)
            .with_club_concurrency(4)
            .fetch_returnees(LEAGUE_URL)
            .await
            .unwrap();
        let sequential = WebScraper::with_fetcher(league_fixtures(), BASE)
            .with_club_concurrency(1)
            .fetch_returnees(LEAGUE_URL)
            .await
            .unwrap();

        assert_eq!(concurrent, sequential);
    }

    #[tokio::test]
    async fn test_league_page_failure_is_error() {
        let scraper = WebScraper::with_fetcher(FixtureFetcher::new(), BASE);
        let result = scraper.fetch_returnees(LEAGUE_URL).await;
        assert!(matches!(result, Err(ScraperError::FetchError(_))));
    }

    #[tokio::test]
    async fn test_club_page_without_departures_is_error() {
        let scraper = WebScraper::with_fetcher(league_fixtures(), BASE);
        assert!(scraper.fetch_club_returnees(DELTA).await.is_err());
    }
}
