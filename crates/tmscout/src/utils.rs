use std::collections::BTreeMap;

use crate::normalize::normalize_position_label;
use crate::types::{PositionRecord, TransferListing};

/// Narrows a feed to one position and pages through it. `offset` is the
/// number of leading rows to drop, so 0 keeps the feed as is.
#[derive(Debug, Default)]
pub struct FeedFilter {
    pub position: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl FeedFilter {
    /// Filter for a stored position. Long names are matched by their code.
    pub fn for_position(position: &PositionRecord) -> Self {
        Self {
            position: Some(position.name.clone()),
            ..Default::default()
        }
    }

    pub fn apply(self, mut listings: Vec<TransferListing>) -> Vec<TransferListing> {
        if let Some(position) = self.position {
            let code = normalize_position_label(&position);
            listings.retain(|l| l.position.eq_ignore_ascii_case(&code));
        }
        if let Some(off) = self.offset {
            listings = listings.into_iter().skip(off).collect();
        }
        if let Some(lim) = self.limit {
            listings.truncate(lim);
        }
        listings
    }

    pub fn validate(self) -> Result<Self, String> {
        if self
            .position
            .as_deref()
            .is_some_and(|p| p.trim().is_empty())
        {
            return Err("Position must not be blank".to_string());
        }
        if self.limit.is_some_and(|l| l == 0) {
            return Err("Limit must be greater than 0".to_string());
        }
        Ok(self)
    }
}

#[derive(Debug)]
pub struct FeedStats {
    pub by_position: BTreeMap<String, usize>,
    pub without_value: usize,
    pub total: usize,
}

impl FeedStats {
    pub fn from_listings(listings: &[TransferListing]) -> FeedStats {
        let by_position = listings.iter().fold(BTreeMap::new(), |mut acc, l| {
            let key = if l.position.is_empty() {
                "?".to_string()
            } else {
                l.position.clone()
            };
            *acc.entry(key).or_insert(0) += 1;
            acc
        });

        FeedStats {
            by_position,
            without_value: listings
                .iter()
                .filter(|l| l.market_value_amount() == 0)
                .count(),
            total: listings.len(),
        }
    }
}

impl std::fmt::Display for FeedStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nStatistics:")?;
        for (position, count) in &self.by_position {
            writeln!(f, "  {:<4} {}", position, count)?;
        }
        writeln!(f, "  Without market value: {}", self.without_value)?;
        writeln!(f, "  Total:                {}", self.total)
    }
}
