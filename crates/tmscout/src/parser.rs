use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html};

use crate::normalize::normalize_position_label;
use crate::schema::{
    ClubListField, ListingField, MovementField, PageSchema, PaginatedSchema, ProfileField,
    SearchField,
};
use crate::types::{ClubRecord, SearchCandidate, TransferListing};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to parse URL: {0}")]
    UrlParseError(String),
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Why a single row was left out of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    #[error("missing {0}")]
    MissingField(&'static str),
    #[error("filtered out: {0}")]
    Filtered(&'static str),
}

/// Rows that parsed, plus counts of malformed and filtered-out rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowBatch<T> {
    pub rows: Vec<T>,
    pub skipped: usize,
    pub filtered: usize,
}

impl<T> Default for RowBatch<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            skipped: 0,
            filtered: 0,
        }
    }
}

impl<T> RowBatch<T> {
    pub fn merge(mut self, other: RowBatch<T>) -> Self {
        self.rows.extend(other.rows);
        self.skipped += other.skipped;
        self.filtered += other.filtered;
        self
    }

    pub fn into_rows(self) -> Vec<T> {
        self.rows
    }
}

impl<T> FromIterator<Result<T, SkipReason>> for RowBatch<T> {
    fn from_iter<I: IntoIterator<Item = Result<T, SkipReason>>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::default(), |mut batch, outcome| {
                match outcome {
                    Ok(row) => batch.rows.push(row),
                    Err(reason @ SkipReason::Filtered(_)) => {
                        log::trace!("Dropping row: {}", reason);
                        batch.filtered += 1;
                    }
                    Err(reason @ SkipReason::MissingField(_)) => {
                        log::debug!("Skipping malformed row: {}", reason);
                        batch.skipped += 1;
                    }
                }
                batch
            })
    }
}

/// Player details as printed on a profile page, before any defaults are
/// applied.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfileDetails {
    pub nationality: String,
    pub nationality_flag: String,
    pub height: String,
    pub market_value: String,
    pub contract_expires: String,
    pub image_url: String,
    pub age: String,
    pub positions: Vec<String>,
    pub club: ClubRecord,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPage {
    pub page_count: u32,
    pub rows: RowBatch<TransferListing>,
}

pub const WITHOUT_CLUB: &str = "Without Club";
const LOAN_RETURN_MARKER: &str = "end of loan";

static RE_CLUB_PROFILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/startseite/verein/\d+").expect("invalid regex: club profile"));

fn extract_parenthesized(text: &str) -> Option<String> {
    let start = text.find('(')?;
    let end = text.rfind(')')?;
    (end > start).then(|| text[start + 1..end].trim().to_string())
}

pub(crate) fn absolute_url(base_url: &str, href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else {
        format!("{}{}", base_url, href)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub fn parse_search_results<S>(
    html: &str,
    base_url: &str,
    schema: &S,
) -> Result<RowBatch<SearchCandidate>, ParseError>
where
    S: PageSchema<Field = SearchField>,
{
    let document = Html::parse_document(html);
    let batch: RowBatch<_> = schema
        .extract_rows(&document)?
        .into_iter()
        .map(|row| parse_search_row(schema, row, base_url))
        .collect();

    log::debug!(
        "Search page: {} candidates, {} malformed, {} non-profile",
        batch.rows.len(),
        batch.skipped,
        batch.filtered
    );
    Ok(batch)
}

fn parse_search_row<S>(
    schema: &S,
    row: ElementRef,
    base_url: &str,
) -> Result<SearchCandidate, SkipReason>
where
    S: PageSchema<Field = SearchField>,
{
    let field = |f| schema.extract_field(row, f);

    let href = non_empty(field(SearchField::ProfileHref))
        .ok_or(SkipReason::MissingField("profile link"))?;
    let profile_url = absolute_url(base_url, &href);
    if !profile_url.to_lowercase().contains("profil") {
        return Err(SkipReason::Filtered("not a player profile"));
    }

    let name = non_empty(field(SearchField::Name)).ok_or(SkipReason::MissingField("name"))?;

    Ok(SearchCandidate {
        profile_url,
        name,
        image_url: field(SearchField::Image).unwrap_or_default(),
        position: field(SearchField::Position).unwrap_or_default(),
        age: field(SearchField::Age).unwrap_or_default(),
        market_value: field(SearchField::MarketValue).unwrap_or_default(),
        nationality: field(SearchField::Nationality).unwrap_or_default(),
        nationality_flag: field(SearchField::NationalityFlag).unwrap_or_default(),
        club_name: field(SearchField::ClubName).unwrap_or_default(),
        club_logo: field(SearchField::ClubLogo).unwrap_or_default(),
    })
}

pub fn parse_player_profile<S>(
    html: &str,
    base_url: &str,
    schema: &S,
) -> Result<ProfileDetails, ParseError>
where
    S: PageSchema<Field = ProfileField>,
{
    let document = Html::parse_document(html);
    let root = schema
        .extract_rows(&document)?
        .into_iter()
        .next()
        .ok_or_else(|| ParseError::MissingField("profile header".to_string()))?;
    let field = |f| schema.extract_field(root, f).unwrap_or_default();

    let age = extract_parenthesized(&field(ProfileField::BirthDate)).unwrap_or_default();
    let club_href = field(ProfileField::ClubHref);

    Ok(ProfileDetails {
        nationality: field(ProfileField::Nationality),
        nationality_flag: field(ProfileField::NationalityFlag),
        height: field(ProfileField::Height),
        market_value: field(ProfileField::MarketValue),
        contract_expires: field(ProfileField::ContractExpires),
        image_url: field(ProfileField::Image),
        age,
        positions: parse_positions(schema, root),
        club: ClubRecord {
            name: field(ProfileField::ClubName),
            logo_url: field(ProfileField::ClubLogo),
            profile_url: if club_href.is_empty() {
                String::new()
            } else {
                absolute_url(base_url, &club_href)
            },
            country: field(ProfileField::ClubCountry),
        },
    })
}

/// Normalized codes from the position list, falling back to the trailing
/// segment of the header line when the list is absent or empty.
fn parse_positions<S>(schema: &S, root: ElementRef) -> Vec<String>
where
    S: PageSchema<Field = ProfileField>,
{
    let positions: Vec<String> = schema
        .extract_list(root, ProfileField::Positions)
        .iter()
        .map(|p| normalize_position_label(p))
        .filter(|p| !p.is_empty())
        .collect();

    if !positions.is_empty() {
        return positions;
    }

    schema
        .extract_field(root, ProfileField::FallbackPosition)
        .and_then(|line| {
            let tail = line.rsplit_once(':').map_or(line.as_str(), |(_, t)| t).trim();
            (!tail.is_empty()).then(|| normalize_position_label(tail))
        })
        .into_iter()
        .collect()
}

/// Parses one page of the transfer statistics listing, keeping only players
/// whose destination is "Without Club".
pub fn parse_transfer_page<S>(
    html: &str,
    base_url: &str,
    schema: &S,
) -> Result<TransferPage, ParseError>
where
    S: PaginatedSchema<Field = ListingField>,
{
    let document = Html::parse_document(html);
    let page_count = schema.page_count(&document).unwrap_or(1).max(1);
    let rows: RowBatch<_> = schema
        .extract_rows(&document)?
        .into_iter()
        .map(|row| parse_listing_row(schema, row, base_url))
        .collect();

    Ok(TransferPage { page_count, rows })
}

fn parse_listing_row<S>(
    schema: &S,
    row: ElementRef,
    base_url: &str,
) -> Result<TransferListing, SkipReason>
where
    S: PageSchema<Field = ListingField>,
{
    let field = |f| schema.extract_field(row, f);

    let badge = field(ListingField::ClubBadge).ok_or(SkipReason::MissingField("club badge"))?;
    if badge.trim() != WITHOUT_CLUB {
        return Err(SkipReason::Filtered("player has a club"));
    }

    let href = non_empty(field(ListingField::ProfileHref))
        .ok_or(SkipReason::MissingField("profile link"))?;
    let name = non_empty(field(ListingField::Name)).ok_or(SkipReason::MissingField("name"))?;
    let position = field(ListingField::Position).ok_or(SkipReason::MissingField("position"))?;
    let age = field(ListingField::Age).ok_or(SkipReason::MissingField("age"))?;
    let transfer_date =
        field(ListingField::TransferDate).ok_or(SkipReason::MissingField("transfer date"))?;
    let market_value =
        field(ListingField::MarketValue).ok_or(SkipReason::MissingField("market value"))?;

    Ok(TransferListing {
        name,
        image_url: field(ListingField::Image).unwrap_or_default(),
        profile_url: absolute_url(base_url, &href),
        position: normalize_position_label(&position),
        age,
        nationality: field(ListingField::Nationality),
        nationality_flag: field(ListingField::NationalityFlag),
        club_name: Some(badge),
        club_logo: field(ListingField::ClubLogo),
        transfer_date: Some(transfer_date),
        market_value: Some(market_value),
    })
}

/// Transfer-page URLs of every club linked from a league overview, in page
/// order.
pub fn parse_club_links<S>(
    html: &str,
    base_url: &str,
    schema: &S,
) -> Result<Vec<String>, ParseError>
where
    S: PageSchema<Field = ClubListField>,
{
    let document = Html::parse_document(html);
    let links = schema
        .extract_rows(&document)?
        .into_iter()
        .filter_map(|row| schema.extract_field(row, ClubListField::ClubHref))
        .filter(|href| RE_CLUB_PROFILE.is_match(href))
        .map(|href| {
            format!(
                "{}/saison_id",
                absolute_url(base_url, &href.replace("/startseite/", "/transfers/"))
            )
        })
        .collect();

    Ok(links)
}

/// Loan returnees of one club: arrivals marked as end of loan whose player
/// does not also appear among the departures.
pub fn parse_club_returnees<S>(
    html: &str,
    base_url: &str,
    arrivals: &S,
    departures: &S,
) -> Result<RowBatch<TransferListing>, ParseError>
where
    S: PageSchema<Field = MovementField>,
{
    let document = Html::parse_document(html);
    let arrival_rows = arrivals.extract_rows(&document)?;
    let departed: HashSet<String> = departures
        .extract_rows(&document)?
        .into_iter()
        .filter_map(|row| non_empty(departures.extract_field(row, MovementField::ProfileHref)))
        .map(|href| absolute_url(base_url, &href))
        .collect();

    Ok(arrival_rows
        .into_iter()
        .map(|row| parse_returnee_row(arrivals, row, base_url, &departed))
        .collect())
}

fn parse_returnee_row<S>(
    schema: &S,
    row: ElementRef,
    base_url: &str,
    departed: &HashSet<String>,
) -> Result<TransferListing, SkipReason>
where
    S: PageSchema<Field = MovementField>,
{
    let field = |f| schema.extract_field(row, f);

    let text = field(MovementField::Text).unwrap_or_default();
    if !text.to_lowercase().contains(LOAN_RETURN_MARKER) {
        return Err(SkipReason::Filtered("not a loan return"));
    }

    let href = non_empty(field(MovementField::ProfileHref))
        .ok_or(SkipReason::MissingField("profile link"))?;
    let profile_url = absolute_url(base_url, &href);
    if departed.contains(&profile_url) {
        return Err(SkipReason::Filtered("left again in the same window"));
    }

    Ok(TransferListing {
        name: field(MovementField::Name).unwrap_or_default(),
        image_url: field(MovementField::Image).unwrap_or_default(),
        profile_url,
        position: field(MovementField::Position)
            .map(|p| normalize_position_label(&p))
            .unwrap_or_default(),
        age: field(MovementField::Age).unwrap_or_default(),
        ..Default::default()
    })
}
