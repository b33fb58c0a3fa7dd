use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UtilityType {
    Power,
    Water,
    Internet,
}

impl UtilityType {
    pub const ALL: [UtilityType; 3] = [
        UtilityType::Power,
        UtilityType::Water,
        UtilityType::Internet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UtilityType::Power => "POWER",
            UtilityType::Water => "WATER",
            UtilityType::Internet => "INTERNET",
        }
    }
}

impl fmt::Display for UtilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown utility type: {0}")]
pub struct UnknownUtilityType(pub String);

impl FromStr for UtilityType {
    type Err = UnknownUtilityType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "POWER" => Ok(UtilityType::Power),
            "WATER" => Ok(UtilityType::Water),
            "INTERNET" => Ok(UtilityType::Internet),
            _ => Err(UnknownUtilityType(value.to_string())),
        }
    }
}

/// Reported condition of a utility. `Unknown` holds any value a report source
/// could not map onto the three known states; it scores as an outage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Stable,
    Flickering,
    Outage,
    Unknown,
}

impl Status {
    /// Permissive parse: anything unrecognised becomes `Status::Unknown`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "STABLE" => Status::Stable,
            "FLICKERING" => Status::Flickering,
            "OUTAGE" => Status::Outage,
            _ => Status::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Status::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Stable => "STABLE",
            Status::Flickering => "FLICKERING",
            Status::Outage => "OUTAGE",
            Status::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub id: Uuid,
    pub building_id: String,
    pub utility_type: UtilityType,
    pub status: Status,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilityScore {
    pub score: Option<u8>,
    pub status: Option<Status>,
    pub last_report_at: Option<DateTime<Utc>>,
}

impl UtilityScore {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct UtilityScores {
    #[serde(rename = "POWER")]
    pub power: UtilityScore,
    #[serde(rename = "WATER")]
    pub water: UtilityScore,
    #[serde(rename = "INTERNET")]
    pub internet: UtilityScore,
}

impl UtilityScores {
    pub fn get(&self, utility: UtilityType) -> &UtilityScore {
        match utility {
            UtilityType::Power => &self.power,
            UtilityType::Water => &self.water,
            UtilityType::Internet => &self.internet,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (UtilityType, &UtilityScore)> {
        UtilityType::ALL
            .into_iter()
            .map(move |utility| (utility, self.get(utility)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingScore {
    pub composite: Option<u8>,
    pub utilities: UtilityScores,
    pub has_data: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Building {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub neighbourhood: String,
    pub city: String,
    pub suspicious: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingListing {
    #[serde(flatten)]
    pub building: Building,
    pub score: BuildingScore,
    pub marker_color: &'static str,
    pub report_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSummary {
    pub utility: UtilityType,
    pub stable: usize,
    pub flickering: usize,
    pub outage: usize,
    pub unknown: usize,
}

impl StatusSummary {
    pub fn total(&self) -> usize {
        self.stable + self.flickering + self.outage + self.unknown
    }
}

#[derive(Debug, Clone)]
pub struct ReportTrend {
    pub week_start: NaiveDate,
    pub report_count: i64,
    pub outage_count: i64,
    pub building_count: i64,
}
