use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Display;

use crate::normalize::{normalize_position_label, parse_market_value};

/// A quick-search hit. Only lives until a full profile is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCandidate {
    pub profile_url: String,
    pub name: String,
    pub image_url: String,
    pub position: String,
    pub age: String,
    pub market_value: String,
    pub nationality: String,
    pub nationality_flag: String,
    pub club_name: String,
    pub club_logo: String,
}

impl SearchCandidate {
    pub fn position_code(&self) -> String {
        normalize_position_label(&self.position)
    }
}

impl Display for SearchCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.position_code(), self.age)?;
        if !self.club_name.is_empty() {
            write!(f, " | {}", self.club_name)?;
        }
        if !self.market_value.is_empty() {
            write!(f, " | {}", self.market_value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubRecord {
    pub name: String,
    pub logo_url: String,
    pub profile_url: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEntry {
    pub text: String,
    pub created_by: Option<String>,
    pub created_at: i64,
}

/// Canonical player document. `profile_url` is the identity of the player
/// everywhere. The agency fields at the bottom are written by the document
/// store only and are never touched by scraping.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub profile_url: String,
    pub full_name: String,
    pub height: String,
    pub age: String,
    pub positions: Vec<String>,
    pub image_url: String,
    pub nationality: String,
    pub nationality_flag: String,
    pub contract_expires: String,
    pub market_value: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    pub current_club: ClubRecord,

    pub agent_in_charge_id: Option<String>,
    pub agent_in_charge_name: Option<String>,
    pub player_phone: Option<String>,
    pub agent_phone: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub note_history: Vec<NoteEntry>,
}

impl PlayerRecord {
    /// Overwrites the market-derived attributes with freshly scraped ones.
    pub fn apply_refresh(&mut self, refreshed: RefreshedAttributes) {
        self.market_value = refreshed.market_value;
        self.image_url = refreshed.image_url;
        self.nationality = refreshed.nationality;
        self.nationality_flag = refreshed.nationality_flag;
        self.age = refreshed.age;
        self.contract_expires = refreshed.contract_expires;
        self.positions = refreshed.positions;
        self.current_club = refreshed.current_club;
    }

    pub fn assign_agent(&mut self, account: &AgentAccount) {
        self.agent_in_charge_id = account.id.clone();
        self.agent_in_charge_name = account.name.clone();
    }

    pub fn market_value_amount(&self) -> u64 {
        parse_market_value(&self.market_value)
    }
}

impl Display for PlayerRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.full_name)?;
        writeln!(f, "  Profile: {}", self.profile_url)?;
        if !self.positions.is_empty() {
            writeln!(f, "  Positions: {}", self.positions.join(", "))?;
        }
        writeln!(f, "  Age: {}  Height: {}", self.age, self.height)?;
        writeln!(f, "  Nationality: {}", self.nationality)?;
        if !self.current_club.name.is_empty() {
            writeln!(
                f,
                "  Club: {} ({})",
                self.current_club.name, self.current_club.country
            )?;
        }
        writeln!(f, "  Contract expires: {}", self.contract_expires)?;
        write!(f, "  Market value: {}", self.market_value)
    }
}

/// The subset of a profile that changes over time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedAttributes {
    pub market_value: String,
    pub image_url: String,
    pub nationality: String,
    pub nationality_flag: String,
    pub age: String,
    pub contract_expires: String,
    pub positions: Vec<String>,
    pub current_club: ClubRecord,
}

impl Display for RefreshedAttributes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Market value: {}", self.market_value)?;
        writeln!(f, "Age: {}", self.age)?;
        writeln!(f, "Nationality: {}", self.nationality)?;
        writeln!(f, "Positions: {}", self.positions.join(", "))?;
        writeln!(f, "Contract expires: {}", self.contract_expires)?;
        write!(f, "Club: {}", self.current_club.name)
    }
}

/// One row of the free-agent or returnee feeds. The returnee feed carries no
/// nationality, destination club, date or value, so those are optional.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferListing {
    pub name: String,
    pub image_url: String,
    pub profile_url: String,
    pub position: String,
    pub age: String,
    pub nationality: Option<String>,
    pub nationality_flag: Option<String>,
    pub club_name: Option<String>,
    pub club_logo: Option<String>,
    pub transfer_date: Option<String>,
    pub market_value: Option<String>,
}

impl TransferListing {
    pub fn market_value_amount(&self) -> u64 {
        self.market_value
            .as_deref()
            .map(parse_market_value)
            .unwrap_or(0)
    }
}

impl Display for TransferListing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} ({})", self.position, self.name, self.age)?;
        if let Some(nationality) = &self.nationality {
            write!(f, " {}", nationality)?;
        }
        if let Some(value) = &self.market_value {
            write!(f, " | {}", value)?;
        }
        if let Some(date) = &self.transfer_date {
            write!(f, " | {}", date)?;
        }
        Ok(())
    }
}

/// Keeps the first listing for each profile URL, preserving order.
pub fn dedupe_by_profile_url(listings: Vec<TransferListing>) -> Vec<TransferListing> {
    let mut seen = HashSet::new();
    listings
        .into_iter()
        .filter(|l| seen.insert(l.profile_url.clone()))
        .collect()
}

/// Position reference data, owned by the document store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRecord {
    pub id: Option<String>,
    pub name: String,
    pub sort: Option<i32>,
    pub hebrew_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AgentAccount {
    pub id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// An inclusive market value range of the transfer feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketValueBracket {
    pub min: u64,
    pub max: u64,
}

impl MarketValueBracket {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }
}

impl Display for MarketValueBracket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "€{}-€{}", self.min, self.max)
    }
}

pub const DEFAULT_BRACKETS: [MarketValueBracket; 11] = [
    MarketValueBracket::new(100_000, 250_000),
    MarketValueBracket::new(251_000, 400_000),
    MarketValueBracket::new(401_000, 600_000),
    MarketValueBracket::new(601_000, 800_000),
    MarketValueBracket::new(801_000, 1_000_000),
    MarketValueBracket::new(1_000_001, 1_200_000),
    MarketValueBracket::new(1_200_001, 1_400_000),
    MarketValueBracket::new(1_400_001, 1_600_000),
    MarketValueBracket::new(1_600_001, 1_800_000),
    MarketValueBracket::new(1_800_001, 2_000_000),
    MarketValueBracket::new(2_000_001, 2_500_000),
];
