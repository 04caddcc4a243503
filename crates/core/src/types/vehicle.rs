//! Vehicle categories offered for rides.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a car category string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid car category: {0} (expected Medium or XL)")]
pub struct UnknownCarCategory(pub String);

/// Car category requested for a ride. `Xl` is the premium tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "soko.car_category"))]
pub enum CarCategory {
    #[default]
    Medium,
    #[serde(rename = "XL")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "XL"))]
    Xl,
}

impl CarCategory {
    /// Whether this is the premium tier.
    #[must_use]
    pub const fn is_premium(self) -> bool {
        matches!(self, Self::Xl)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Medium => "Medium",
            Self::Xl => "XL",
        }
    }
}

impl std::fmt::Display for CarCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CarCategory {
    type Err = UnknownCarCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("medium") {
            Ok(Self::Medium)
        } else if s.eq_ignore_ascii_case("xl") {
            Ok(Self::Xl)
        } else {
            Err(UnknownCarCategory(s.to_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_categories() {
        assert_eq!("Medium".parse(), Ok(CarCategory::Medium));
        assert_eq!("XL".parse(), Ok(CarCategory::Xl));
        assert_eq!("xl".parse(), Ok(CarCategory::Xl));
        assert!("Limo".parse::<CarCategory>().is_err());
    }

    #[test]
    fn test_serde_uses_display_names() {
        assert_eq!(
            serde_json::to_string(&CarCategory::Xl).unwrap_or_default(),
            "\"XL\""
        );
        assert!(CarCategory::Xl.is_premium());
        assert!(!CarCategory::default().is_premium());
    }
}
