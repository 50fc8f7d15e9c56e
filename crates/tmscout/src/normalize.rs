use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
#[error("Unknown position '{0}'")]
pub struct PositionParseError(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Goalkeeper,
    LeftBack,
    CentreBack,
    RightBack,
    DefensiveMidfield,
    CentralMidfield,
    AttackingMidfield,
    RightWinger,
    LeftWinger,
    CentreForward,
    SecondStriker,
    LeftMidfield,
    RightMidfield,
}

impl Position {
    pub const ALL: [Position; 13] = [
        Position::Goalkeeper,
        Position::LeftBack,
        Position::CentreBack,
        Position::RightBack,
        Position::DefensiveMidfield,
        Position::CentralMidfield,
        Position::AttackingMidfield,
        Position::RightWinger,
        Position::LeftWinger,
        Position::CentreForward,
        Position::SecondStriker,
        Position::LeftMidfield,
        Position::RightMidfield,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Position::Goalkeeper => "GK",
            Position::LeftBack => "LB",
            Position::CentreBack => "CB",
            Position::RightBack => "RB",
            Position::DefensiveMidfield => "DM",
            Position::CentralMidfield => "CM",
            Position::AttackingMidfield => "AM",
            Position::RightWinger => "RW",
            Position::LeftWinger => "LW",
            Position::CentreForward => "CF",
            Position::SecondStriker => "SS",
            Position::LeftMidfield => "LM",
            Position::RightMidfield => "RM",
        }
    }

    pub fn long_name(&self) -> &'static str {
        match self {
            Position::Goalkeeper => "Goalkeeper",
            Position::LeftBack => "Left Back",
            Position::CentreBack => "Centre Back",
            Position::RightBack => "Right Back",
            Position::DefensiveMidfield => "Defensive Midfield",
            Position::CentralMidfield => "Central Midfield",
            Position::AttackingMidfield => "Attacking Midfield",
            Position::RightWinger => "Right Winger",
            Position::LeftWinger => "Left Winger",
            Position::CentreForward => "Centre Forward",
            Position::SecondStriker => "Second Striker",
            Position::LeftMidfield => "Left Midfield",
            Position::RightMidfield => "Right Midfield",
        }
    }
}

/// Parses the exact long-form name, e.g. `"Centre Back"`.
impl FromStr for Position {
    type Err = PositionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::ALL
            .into_iter()
            .find(|p| p.long_name() == s)
            .ok_or_else(|| PositionParseError(s.to_string()))
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.long_name())
    }
}

/// Maps a long position name to its short code. Names outside the table are
/// returned unchanged and `None` becomes an empty string.
pub fn normalize_position(name: Option<&str>) -> String {
    match name {
        Some(name) => name
            .parse::<Position>()
            .map(|p| p.code().to_string())
            .unwrap_or_else(|_| name.to_string()),
        None => String::new(),
    }
}

/// Site markup writes compound positions with hyphens ("Centre-Back").
pub fn normalize_position_label(label: &str) -> String {
    normalize_position(Some(label.replace('-', " ").trim()))
}

/// Converts a market value label such as `"€1.5m"` or `"€500k"` into a whole
/// amount. Ranges (anything containing `-`), empty labels and unrecognised
/// shapes yield 0.
pub fn parse_market_value(label: &str) -> u64 {
    let label = label.trim();
    if label.is_empty() || label.contains('-') {
        return 0;
    }

    let amount = label.split_once('€').map_or(label, |(_, rest)| rest);
    let lower = amount.to_lowercase();

    let (number, multiplier) = if let Some((number, _)) = lower.split_once('k') {
        (number, 1_000.0)
    } else if let Some((number, _)) = lower.split_once('m') {
        (number, 1_000_000.0)
    } else {
        return 0;
    };

    match number.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => (value * multiplier).round() as u64,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_every_table_entry() {
        let cases = [
            ("Goalkeeper", "GK"),
            ("Left Back", "LB"),
            ("Centre Back", "CB"),
            ("Right Back", "RB"),
            ("Defensive Midfield", "DM"),
            ("Central Midfield", "CM"),
            ("Attacking Midfield", "AM"),
            ("Right Winger", "RW"),
            ("Left Winger", "LW"),
            ("Centre Forward", "CF"),
            ("Second Striker", "SS"),
            ("Left Midfield", "LM"),
            ("Right Midfield", "RM"),
        ];

        for (long, short) in cases {
            assert_eq!(normalize_position(Some(long)), short, "for {long}");
        }
        assert_eq!(cases.len(), Position::ALL.len());
    }

    #[test]
    fn test_normalize_passthrough() {
        assert_eq!(normalize_position(Some("Sweeper")), "Sweeper");
        assert_eq!(normalize_position(Some("centre back")), "centre back");
        assert_eq!(normalize_position(None), "");
    }

    #[test]
    fn test_normalize_hyphenated_label() {
        assert_eq!(normalize_position_label("Centre-Back"), "CB");
        assert_eq!(normalize_position_label(" Right Winger "), "RW");
        assert_eq!(normalize_position_label("Attack"), "Attack");
    }

    #[test]
    fn test_position_display_and_parse() {
        let position: Position = "Second Striker".parse().unwrap();
        assert_eq!(position, Position::SecondStriker);
        assert_eq!(position.to_string(), "Second Striker");
        assert!("Libero".parse::<Position>().is_err());
    }

    #[test]
    fn test_parse_market_value() {
        assert_eq!(parse_market_value("€1.5m"), 1_500_000);
        assert_eq!(parse_market_value("€500k"), 500_000);
        assert_eq!(parse_market_value("€1.2m"), 1_200_000);
        assert_eq!(parse_market_value("€12.00m"), 12_000_000);
        assert_eq!(parse_market_value("€250K"), 250_000);
        assert_eq!(parse_market_value("1.75m"), 1_750_000);
    }

    #[test]
    fn test_parse_market_value_zero_cases() {
        assert_eq!(parse_market_value("-"), 0);
        assert_eq!(parse_market_value(""), 0);
        assert_eq!(parse_market_value("   "), 0);
        assert_eq!(parse_market_value("€100k-€200k"), 0);
        assert_eq!(parse_market_value("€900"), 0);
        assert_eq!(parse_market_value("€abck"), 0);
    }
}
