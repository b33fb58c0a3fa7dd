//! CSV report source. Rows carry the report plus optional building details so
//! a single file can feed both the Postgres store and offline scoring.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ImportError, ValidationError};
use crate::models::{Building, Report, Status, UtilityType};

const DEFAULT_NEIGHBOURHOOD: &str = "Unknown";
const DEFAULT_CITY: &str = "Nairobi";

/// How unrecognised status values are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPolicy {
    /// Keep the row as `Status::Unknown`; it scores as an outage.
    Permissive,
    /// Reject the whole batch with the first offending row.
    Strict,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    id: Option<Uuid>,
    source_key: Option<String>,
    building_id: String,
    building_name: Option<String>,
    neighbourhood: Option<String>,
    city: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    utility_type: String,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ImportedReport {
    pub report: Report,
    pub source_key: String,
}

#[derive(Debug, Clone, Default)]
pub struct ReportBatch {
    pub buildings: Vec<Building>,
    pub reports: Vec<ImportedReport>,
    pub unknown_statuses: usize,
}

impl ReportBatch {
    pub fn to_reports(&self) -> Vec<Report> {
        self.reports.iter().map(|imported| imported.report.clone()).collect()
    }
}

// Building details collected across every row that mentions the building.
// Blank columns on one row are filled from later rows.
#[derive(Debug, Default)]
struct BuildingDetails {
    id: String,
    name: Option<String>,
    neighbourhood: Option<String>,
    city: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl BuildingDetails {
    fn merge(&mut self, row: &CsvRow) {
        fill_text(&mut self.name, row.building_name.as_deref());
        fill_text(&mut self.neighbourhood, row.neighbourhood.as_deref());
        fill_text(&mut self.city, row.city.as_deref());
        self.latitude = self.latitude.or(row.latitude);
        self.longitude = self.longitude.or(row.longitude);
    }

    fn into_building(self) -> Building {
        Building {
            name: self.name.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            latitude: self.latitude.unwrap_or_default(),
            longitude: self.longitude.unwrap_or_default(),
            neighbourhood: self
                .neighbourhood
                .unwrap_or_else(|| DEFAULT_NEIGHBOURHOOD.to_string()),
            city: self.city.unwrap_or_else(|| DEFAULT_CITY.to_string()),
            suspicious: false,
        }
    }
}

fn fill_text(slot: &mut Option<String>, value: Option<&str>) {
    if slot.is_none() {
        *slot = value
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
    }
}

pub fn read_reports(path: &Path, policy: StatusPolicy) -> Result<ReportBatch, ImportError> {
    let file = File::open(path)?;
    parse_reports(file, policy)
}

pub fn parse_reports<R: Read>(input: R, policy: StatusPolicy) -> Result<ReportBatch, ImportError> {
    let mut reader = csv::Reader::from_reader(input);
    let mut batch = ReportBatch::default();
    let mut buildings: Vec<BuildingDetails> = Vec::new();
    let mut building_index: HashMap<String, usize> = HashMap::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let label = row_label(&row, index + 1);
        let building_id = row.building_id.trim().to_string();
        if building_id.is_empty() {
            return Err(ValidationError::MissingBuilding { report: label }.into());
        }

        let utility_type = row
            .utility_type
            .parse::<UtilityType>()
            .map_err(|_| ValidationError::UnknownUtility {
                report: label.clone(),
                value: row.utility_type.clone(),
            })?;

        let status = Status::parse(&row.status);
        if !status.is_known() {
            if policy == StatusPolicy::Strict {
                return Err(ValidationError::UnknownStatus {
                    report: label,
                    value: row.status,
                }
                .into());
            }
            batch.unknown_statuses += 1;
        }

        let slot = *building_index.entry(building_id.clone()).or_insert_with(|| {
            buildings.push(BuildingDetails {
                id: building_id.clone(),
                ..BuildingDetails::default()
            });
            buildings.len() - 1
        });
        buildings[slot].merge(&row);

        let id = row.id.unwrap_or_else(Uuid::new_v4);
        let source_key = row
            .source_key
            .filter(|key| !key.trim().is_empty())
            .unwrap_or_else(|| format!("import-{id}"));

        batch.reports.push(ImportedReport {
            report: Report {
                id,
                building_id,
                utility_type,
                status,
                created_at: row.created_at,
            },
            source_key,
        });
    }

    batch.buildings = buildings
        .into_iter()
        .map(BuildingDetails::into_building)
        .collect();

    if batch.unknown_statuses > 0 {
        tracing::warn!(
            count = batch.unknown_statuses,
            "unrecognised report statuses scored as outages"
        );
    }

    Ok(batch)
}

fn row_label(row: &CsvRow, row_number: usize) -> String {
    if let Some(id) = row.id {
        return id.to_string();
    }
    match row.source_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => key.to_string(),
        _ => format!("row {row_number}"),
    }
}
