//! Markup knowledge for each page type of the site.
//!
//! Extraction algorithms in [`crate::parser`] only ask a schema for rows and
//! named fields, so selector drift upstream is fixed here without touching
//! the algorithms.

use std::fmt::Debug;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::parser::ParseError;

pub trait PageSchema {
    type Field: Copy + Debug;

    /// Returns the rows of interest, or an error when the page does not have
    /// the expected structure at all.
    fn extract_rows<'a>(&self, document: &'a Html) -> Result<Vec<ElementRef<'a>>, ParseError>;

    fn extract_field(&self, row: ElementRef<'_>, field: Self::Field) -> Option<String>;

    /// Multi-valued fields. Single-valued fields yield at most one item.
    fn extract_list(&self, row: ElementRef<'_>, field: Self::Field) -> Vec<String> {
        self.extract_field(row, field).into_iter().collect()
    }
}

pub trait PaginatedSchema: PageSchema {
    fn page_count(&self, document: &Html) -> Option<u32>;
}

macro_rules! selector {
    ($css:literal) => {
        LazyLock::new(|| Selector::parse($css).expect(concat!("invalid selector: ", $css)))
    };
}

static SEL_BOX: LazyLock<Selector> = selector!("div.box");
static SEL_BOX_HEADLINE: LazyLock<Selector> = selector!("h2.content-box-headline");
static SEL_ITEM_ROWS: LazyLock<Selector> = selector!("table.items tr.odd, table.items tr.even");
static SEL_ITEMS_TABLE: LazyLock<Selector> = selector!("table.items");
static SEL_STRIPED_ROWS: LazyLock<Selector> = selector!("tr.odd, tr.even");
static SEL_BODY_ROWS: LazyLock<Selector> = selector!("table.items > tbody > tr");
static SEL_TBODY: LazyLock<Selector> = selector!("tbody");
static SEL_IMG: LazyLock<Selector> = selector!("img");
static SEL_LINK: LazyLock<Selector> = selector!("a");
static SEL_TR: LazyLock<Selector> = selector!("tr");
static SEL_TD: LazyLock<Selector> = selector!("td");
static SEL_PLAYER_LINK: LazyLock<Selector> = selector!("td.hauptlink a");
static SEL_CENTERED: LazyLock<Selector> = selector!("td.zentriert");
static SEL_CENTERED_CLUB_IMG: LazyLock<Selector> = selector!("td.zentriert a img");
static SEL_RIGHT: LazyLock<Selector> = selector!("td.rechts");
static SEL_VALUE_CELL: LazyLock<Selector> = selector!("td.rechts.hauptlink");
static SEL_INLINE_TABLE: LazyLock<Selector> = selector!("table.inline-table");
static SEL_PAGER_ITEM: LazyLock<Selector> = selector!("div.pager li.tm-pagination__list-item");
static SEL_SECOND_CELL_LINK: LazyLock<Selector> = selector!("td:nth-child(2) a[href]");

static SEL_PROFILE_HEADER: LazyLock<Selector> =
    selector!("header.data-header, div.data-header__profile-container");
static SEL_NATIONALITY_IMG: LazyLock<Selector> = selector!("[itemprop=nationality] img");
static SEL_HEIGHT: LazyLock<Selector> = selector!("[itemprop=height]");
static SEL_BIRTH_DATE: LazyLock<Selector> = selector!("span[itemprop=birthDate]");
static SEL_VALUE_BOX: LazyLock<Selector> = selector!("div.data-header__box--small");
static SEL_HEADER_LABEL: LazyLock<Selector> = selector!("span.data-header__label");
static SEL_PROFILE_IMG: LazyLock<Selector> = selector!("div.data-header__profile-container img");
static SEL_POSITION_ENTRIES: LazyLock<Selector> = selector!("div.detail-position__box dd");
static SEL_HEADER_ITEMS: LazyLock<Selector> = selector!("ul.data-header__items");
static SEL_CLUB_LINK: LazyLock<Selector> = selector!("span.data-header__club a");
static SEL_CLUB_BOX_IMG: LazyLock<Selector> = selector!("div.data-header__box--big img");
static SEL_CLUB_COUNTRY_IMG: LazyLock<Selector> =
    selector!("div.data-header__club-info span.data-header__label img");

fn elem_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clean_text(element: ElementRef) -> String {
    normalize_whitespace(&elem_text(element))
}

fn nth<'a>(scope: ElementRef<'a>, selector: &Selector, n: usize) -> Option<ElementRef<'a>> {
    scope.select(selector).nth(n)
}

/// Value of `attr` on the first matching element that carries it.
fn first_attr(scope: ElementRef, selector: &Selector, attr: &str) -> Option<String> {
    scope
        .select(selector)
        .find_map(|e| e.value().attr(attr))
        .map(str::to_string)
}

/// Text of every match, joined by single spaces.
fn joined_text(scope: ElementRef, selector: &Selector) -> String {
    scope
        .select(selector)
        .map(clean_text)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    ProfileHref,
    Name,
    Image,
    Position,
    Age,
    MarketValue,
    Nationality,
    NationalityFlag,
    ClubName,
    ClubLogo,
}

/// Quick-search result page. Rows come from the box headed "players" only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchResultsSchema;

impl PageSchema for SearchResultsSchema {
    type Field = SearchField;

    fn extract_rows<'a>(&self, document: &'a Html) -> Result<Vec<ElementRef<'a>>, ParseError> {
        let player_box = document.select(&SEL_BOX).find(|b| {
            b.select(&SEL_BOX_HEADLINE)
                .any(|h| elem_text(h).to_lowercase().contains("players"))
        });

        Ok(player_box
            .map(|b| b.select(&SEL_ITEM_ROWS).collect())
            .unwrap_or_default())
    }

    fn extract_field(&self, row: ElementRef<'_>, field: SearchField) -> Option<String> {
        match field {
            SearchField::ProfileHref => first_attr(row, &SEL_PLAYER_LINK, "href"),
            SearchField::Name => first_attr(row, &SEL_IMG, "alt")
                .filter(|s| !s.trim().is_empty())
                .or_else(|| row.select(&SEL_PLAYER_LINK).next().map(clean_text)),
            SearchField::Image => {
                first_attr(row, &SEL_IMG, "src").map(|s| s.replace("small", "big"))
            }
            SearchField::Position => nth(row, &SEL_CENTERED, 0).map(clean_text),
            SearchField::ClubName => first_attr(row, &SEL_CENTERED_CLUB_IMG, "title"),
            SearchField::ClubLogo => {
                first_attr(row, &SEL_CENTERED_CLUB_IMG, "src").map(|s| s.replace("tiny", "head"))
            }
            SearchField::Age => nth(row, &SEL_CENTERED, 2).map(clean_text),
            SearchField::Nationality => {
                nth(row, &SEL_CENTERED, 3).and_then(|cell| first_attr(cell, &SEL_IMG, "title"))
            }
            SearchField::NationalityFlag => nth(row, &SEL_CENTERED, 3)
                .and_then(|cell| first_attr(cell, &SEL_IMG, "src"))
                .map(|s| s.replace("verysmall", "head").replace("tiny", "head")),
            SearchField::MarketValue => Some(joined_text(row, &SEL_VALUE_CELL)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    Nationality,
    NationalityFlag,
    Height,
    MarketValue,
    ContractExpires,
    Image,
    BirthDate,
    /// Multi-valued: one entry per listed position.
    Positions,
    /// The header line used when the position list is absent.
    FallbackPosition,
    ClubName,
    ClubLogo,
    ClubHref,
    ClubCountry,
}

/// Player profile page. The whole document is the single row.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileSchema;

impl PageSchema for ProfileSchema {
    type Field = ProfileField;

    fn extract_rows<'a>(&self, document: &'a Html) -> Result<Vec<ElementRef<'a>>, ParseError> {
        if document.select(&SEL_PROFILE_HEADER).next().is_none() {
            return Err(ParseError::MissingField("profile header".to_string()));
        }
        Ok(vec![document.root_element()])
    }

    fn extract_field(&self, row: ElementRef<'_>, field: ProfileField) -> Option<String> {
        match field {
            ProfileField::Nationality => first_attr(row, &SEL_NATIONALITY_IMG, "title"),
            ProfileField::NationalityFlag => row
                .select(&SEL_NATIONALITY_IMG)
                .next()
                .and_then(|img| img.value().attr("src"))
                .map(|s| s.replace("tiny", "head")),
            ProfileField::Height => Some(joined_text(row, &SEL_HEIGHT)),
            ProfileField::MarketValue => {
                let text = joined_text(row, &SEL_VALUE_BOX);
                let value = text.split_once("Last").map_or(text.as_str(), |(v, _)| v);
                Some(value.trim().to_string())
            }
            ProfileField::ContractExpires => {
                let text = joined_text(row, &SEL_HEADER_LABEL);
                let value = text.rsplit_once(':').map_or(text.as_str(), |(_, v)| v);
                Some(value.trim().to_string())
            }
            ProfileField::Image => row
                .select(&SEL_PROFILE_IMG)
                .next()
                .and_then(|img| img.value().attr("src"))
                .map(str::to_string),
            ProfileField::BirthDate => row.select(&SEL_BIRTH_DATE).next().map(clean_text),
            ProfileField::Positions => self.extract_list(row, field).into_iter().next(),
            ProfileField::FallbackPosition => nth(row, &SEL_HEADER_ITEMS, 1).map(clean_text),
            ProfileField::ClubName => first_attr(row, &SEL_CLUB_LINK, "title"),
            ProfileField::ClubLogo => first_attr(row, &SEL_CLUB_BOX_IMG, "srcset").map(|s| {
                s.split_once("1x")
                    .map_or(s.as_str(), |(url, _)| url)
                    .trim()
                    .to_string()
            }),
            ProfileField::ClubHref => first_attr(row, &SEL_CLUB_LINK, "href"),
            ProfileField::ClubCountry => first_attr(row, &SEL_CLUB_COUNTRY_IMG, "title"),
        }
    }

    fn extract_list(&self, row: ElementRef<'_>, field: ProfileField) -> Vec<String> {
        match field {
            ProfileField::Positions => row
                .select(&SEL_POSITION_ENTRIES)
                .map(clean_text)
                .filter(|s| !s.is_empty())
                .collect(),
            other => self.extract_field(row, other).into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingField {
    ProfileHref,
    Name,
    Image,
    Position,
    Age,
    Nationality,
    NationalityFlag,
    /// Alt text of the destination club badge.
    ClubBadge,
    ClubLogo,
    TransferDate,
    MarketValue,
}

/// One page of the "latest transfers" statistics listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferListSchema;

impl TransferListSchema {
    fn inline_table(row: ElementRef<'_>, n: usize) -> Option<ElementRef<'_>> {
        nth(row, &SEL_INLINE_TABLE, n)
    }
}

impl PageSchema for TransferListSchema {
    type Field = ListingField;

    fn extract_rows<'a>(&self, document: &'a Html) -> Result<Vec<ElementRef<'a>>, ParseError> {
        Ok(document
            .select(&SEL_ITEMS_TABLE)
            .flat_map(|table| table.select(&SEL_STRIPED_ROWS))
            .collect())
    }

    fn extract_field(&self, row: ElementRef<'_>, field: ListingField) -> Option<String> {
        match field {
            ListingField::ProfileHref => {
                Self::inline_table(row, 0).and_then(|t| first_attr(t, &SEL_LINK, "href"))
            }
            ListingField::Name => {
                Self::inline_table(row, 0).and_then(|t| first_attr(t, &SEL_IMG, "title"))
            }
            ListingField::Image => Self::inline_table(row, 0)
                .and_then(|t| first_attr(t, &SEL_IMG, "data-src"))
                .map(|s| s.replace("medium", "big")),
            ListingField::Position => {
                Self::inline_table(row, 0).and_then(|t| nth(t, &SEL_TR, 1).map(clean_text))
            }
            ListingField::Age => nth(row, &SEL_CENTERED, 0).map(clean_text),
            ListingField::Nationality => {
                nth(row, &SEL_CENTERED, 1).and_then(|cell| first_attr(cell, &SEL_IMG, "title"))
            }
            ListingField::NationalityFlag => nth(row, &SEL_CENTERED, 1)
                .and_then(|cell| first_attr(cell, &SEL_IMG, "src"))
                .map(|s| s.replace("verysmall", "head")),
            ListingField::ClubBadge => {
                Self::inline_table(row, 2).and_then(|t| first_attr(t, &SEL_IMG, "alt"))
            }
            ListingField::ClubLogo => Self::inline_table(row, 2)
                .and_then(|t| first_attr(t, &SEL_IMG, "src"))
                .map(|s| s.replace("tiny", "head")),
            ListingField::TransferDate => nth(row, &SEL_CENTERED, 2).map(clean_text),
            ListingField::MarketValue => nth(row, &SEL_RIGHT, 0).map(clean_text),
        }
    }
}

impl PaginatedSchema for TransferListSchema {
    fn page_count(&self, document: &Html) -> Option<u32> {
        document
            .select(&SEL_PAGER_ITEM)
            .filter_map(|li| clean_text(li).parse::<u32>().ok())
            .max()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClubListField {
    ClubHref,
}

/// League overview page listing the participating clubs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClubListSchema;

impl PageSchema for ClubListSchema {
    type Field = ClubListField;

    fn extract_rows<'a>(&self, document: &'a Html) -> Result<Vec<ElementRef<'a>>, ParseError> {
        Ok(document.select(&SEL_BODY_ROWS).collect())
    }

    fn extract_field(&self, row: ElementRef<'_>, field: ClubListField) -> Option<String> {
        match field {
            ClubListField::ClubHref => first_attr(row, &SEL_SECOND_CELL_LINK, "href"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementField {
    ProfileHref,
    Name,
    Image,
    Position,
    Age,
    /// Whole row text, used for transfer-type markers.
    Text,
}

/// A club's transfer page: arrivals are the first items table, departures
/// the second.
#[derive(Debug, Clone, Copy)]
pub struct ClubTransfersSchema {
    table: usize,
    label: &'static str,
}

impl ClubTransfersSchema {
    pub const ARRIVALS: Self = Self {
        table: 0,
        label: "arrivals table",
    };
    pub const DEPARTURES: Self = Self {
        table: 1,
        label: "departures table",
    };
}

impl PageSchema for ClubTransfersSchema {
    type Field = MovementField;

    fn extract_rows<'a>(&self, document: &'a Html) -> Result<Vec<ElementRef<'a>>, ParseError> {
        let table = document
            .select(&SEL_ITEMS_TABLE)
            .nth(self.table)
            .ok_or_else(|| ParseError::MissingField(self.label.to_string()))?;
        let body = table
            .select(&SEL_TBODY)
            .next()
            .ok_or_else(|| ParseError::MissingField(format!("{} body", self.label)))?;

        Ok(body.children().filter_map(ElementRef::wrap).collect())
    }

    fn extract_field(&self, row: ElementRef<'_>, field: MovementField) -> Option<String> {
        match field {
            MovementField::ProfileHref => first_attr(row, &SEL_PLAYER_LINK, "href"),
            MovementField::Name => row.select(&SEL_PLAYER_LINK).next().map(clean_text),
            MovementField::Image => row
                .select(&SEL_IMG)
                .next()
                .and_then(|img| img.value().attr("data-src"))
                .map(|s| s.replace("tiny", "big")),
            MovementField::Position => nth(row, &SEL_TD, 4).map(clean_text),
            MovementField::Age => nth(row, &SEL_TD, 5).map(clean_text),
            MovementField::Text => Some(clean_text(row)),
        }
    }
}
