pub mod fetch;
pub mod normalize;
pub mod parser;
pub mod releases;
pub mod retry;
pub mod returnees;
pub mod schema;
pub mod scraper;
pub mod types;
pub mod utils;

pub use fetch::{FetchError, HttpFetcher, PageFetcher};
pub use retry::RetryPolicy;
pub use crate::scraper::{ScraperError, WebScraper};

pub(crate) const BASE_URL: &str = "https://www.transfermarkt.com";
