use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunkoType {
    #[serde(rename = "Pop!")]
    Pop,
    #[serde(rename = "Pop! Rides")]
    PopRides,
    #[serde(rename = "Vinyl Soda")]
    VinylSoda,
    #[serde(rename = "Vinyl Gold")]
    VinylGold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunkoGenre {
    Animation,
    #[serde(rename = "Films and TV")]
    FilmsAndTv,
    Videogames,
    Sports,
    Music,
    Anime,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid Franchise Number: {0}")]
    SeriesNumber(f64),
    #[error("Invalid Market Value: {0}")]
    MarketValue(f64),
    #[error("unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
}

/// Unvalidated field bag. Every way of obtaining a `Funko` goes through
/// `Funko::new`, including deserialization.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunkoData {
    pub id: String,
    pub name: String,
    pub desc: String,
    #[serde(rename = "type")]
    pub kind: FunkoType,
    pub genre: FunkoGenre,
    pub franchise: String,
    pub franchise_number: f64,
    pub is_exclusive: bool,
    pub special_features: String,
    pub market_value: f64,
}

/// A collectible figure. Immutable once built; updates replace the whole value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FunkoData")]
pub struct Funko {
    id: String,
    name: String,
    #[serde(rename = "desc")]
    description: String,
    #[serde(rename = "type")]
    category: FunkoType,
    #[serde(rename = "genre")]
    sub_category: FunkoGenre,
    #[serde(rename = "franchise")]
    series_name: String,
    #[serde(rename = "franchiseNumber")]
    series_number: u64,
    #[serde(rename = "isExclusive")]
    is_exclusive: bool,
    #[serde(rename = "specialFeatures")]
    special_features: String,
    #[serde(rename = "marketValue")]
    market_value: f64,
}

impl Funko {
    pub fn new(data: FunkoData) -> Result<Funko, ValidationError> {
        let series_number = data.franchise_number;

        // u64::MAX as f64 rounds up to 2^64, which is itself out of range
        if !series_number.is_finite()
            || series_number < 0.0
            || series_number.fract() != 0.0
            || series_number >= u64::MAX as f64
        {
            return Err(ValidationError::SeriesNumber(series_number));
        }

        if !data.market_value.is_finite() || data.market_value < 0.0 {
            return Err(ValidationError::MarketValue(data.market_value));
        }

        Ok(Funko {
            id: data.id,
            name: data.name,
            description: data.desc,
            category: data.kind,
            sub_category: data.genre,
            series_name: data.franchise,
            series_number: series_number as u64,
            is_exclusive: data.is_exclusive,
            special_features: data.special_features,
            market_value: data.market_value,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> FunkoType {
        self.category
    }

    pub fn sub_category(&self) -> FunkoGenre {
        self.sub_category
    }

    pub fn series_name(&self) -> &str {
        &self.series_name
    }

    pub fn series_number(&self) -> u64 {
        self.series_number
    }

    pub fn is_exclusive(&self) -> bool {
        self.is_exclusive
    }

    pub fn special_features(&self) -> &str {
        &self.special_features
    }

    pub fn market_value(&self) -> f64 {
        self.market_value
    }
}

impl TryFrom<FunkoData> for Funko {
    type Error = ValidationError;

    fn try_from(data: FunkoData) -> Result<Self, Self::Error> {
        Funko::new(data)
    }
}

impl fmt::Display for Funko {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}) {} ({}) - {} - SpecialFeatures: {} - Genre: {} - Franchise: {} - FranchiseNumber: {} - Exclusive: {} - MarketValue: {} $",
            self.id,
            self.name,
            self.category,
            self.description,
            self.special_features,
            self.sub_category,
            self.series_name,
            self.series_number,
            self.is_exclusive,
            self.market_value,
        )
    }
}

impl FunkoType {
    pub const ALL: [FunkoType; 4] = [
        FunkoType::Pop,
        FunkoType::PopRides,
        FunkoType::VinylSoda,
        FunkoType::VinylGold,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FunkoType::Pop => "Pop!",
            FunkoType::PopRides => "Pop! Rides",
            FunkoType::VinylSoda => "Vinyl Soda",
            FunkoType::VinylGold => "Vinyl Gold",
        }
    }

    fn slug(self) -> &'static str {
        match self {
            FunkoType::Pop => "pop",
            FunkoType::PopRides => "pop-rides",
            FunkoType::VinylSoda => "vinyl-soda",
            FunkoType::VinylGold => "vinyl-gold",
        }
    }
}

impl FunkoGenre {
    pub const ALL: [FunkoGenre; 6] = [
        FunkoGenre::Animation,
        FunkoGenre::FilmsAndTv,
        FunkoGenre::Videogames,
        FunkoGenre::Sports,
        FunkoGenre::Music,
        FunkoGenre::Anime,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FunkoGenre::Animation => "Animation",
            FunkoGenre::FilmsAndTv => "Films and TV",
            FunkoGenre::Videogames => "Videogames",
            FunkoGenre::Sports => "Sports",
            FunkoGenre::Music => "Music",
            FunkoGenre::Anime => "Anime",
        }
    }

    fn slug(self) -> &'static str {
        match self {
            FunkoGenre::Animation => "animation",
            FunkoGenre::FilmsAndTv => "films-and-tv",
            FunkoGenre::Videogames => "videogames",
            FunkoGenre::Sports => "sports",
            FunkoGenre::Music => "music",
            FunkoGenre::Anime => "anime",
        }
    }
}

impl fmt::Display for FunkoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for FunkoGenre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FunkoType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FunkoType::ALL
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(s) || t.slug().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::UnknownVariant {
                kind: "type",
                value: s.to_string(),
            })
    }
}

impl FromStr for FunkoGenre {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FunkoGenre::ALL
            .into_iter()
            .find(|g| g.label().eq_ignore_ascii_case(s) || g.slug().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::UnknownVariant {
                kind: "genre",
                value: s.to_string(),
            })
    }
}
