use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Building, BuildingListing, Report};
use crate::score::{self, ScoreBand};

pub fn score_buildings(
    buildings: &[Building],
    reports: &[Report],
    now: DateTime<Utc>,
) -> Vec<BuildingListing> {
    let mut by_building: HashMap<&str, Vec<Report>> = HashMap::new();
    for report in reports {
        by_building
            .entry(report.building_id.as_str())
            .or_default()
            .push(report.clone());
    }

    buildings
        .iter()
        .map(|building| {
            let reports = by_building
                .get(building.id.as_str())
                .map(Vec::as_slice)
                .unwrap_or_default();
            let score = score::score_building(reports, now);
            BuildingListing {
                building: building.clone(),
                score,
                marker_color: ScoreBand::from_score(score.composite).marker_color(),
                report_count: reports
                    .iter()
                    .filter(|report| score::in_scoring_window(report, now))
                    .count(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct ListingQuery {
    pub building: Option<String>,
    pub query: Option<String>,
    pub neighbourhood: Option<String>,
}

impl ListingQuery {
    pub fn matches(&self, building: &Building) -> bool {
        if let Some(id) = self.building.as_deref() {
            if building.id != id {
                return false;
            }
        }
        if let Some(neighbourhood) = self.neighbourhood.as_deref() {
            if !building.neighbourhood.eq_ignore_ascii_case(neighbourhood) {
                return false;
            }
        }
        match self.query.as_deref().map(str::trim) {
            Some(query) if !query.is_empty() => building
                .name
                .to_lowercase()
                .contains(&query.to_lowercase()),
            _ => true,
        }
    }

    pub fn apply(&self, listings: Vec<BuildingListing>) -> Vec<BuildingListing> {
        listings
            .into_iter()
            .filter(|listing| self.matches(&listing.building))
            .collect()
    }
}

pub fn rank(listings: &mut [BuildingListing]) {
    listings.sort_by(|a, b| {
        compare_composite(a.score.composite, b.score.composite)
            .then_with(|| a.building.name.cmp(&b.building.name))
            .then_with(|| a.building.id.cmp(&b.building.id))
    });
}

fn compare_composite(a: Option<u8>, b: Option<u8>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub buildings: Vec<BuildingListing>,
    pub pagination: Pagination,
}

pub fn paginate(listings: Vec<BuildingListing>, page: usize, limit: usize) -> Page {
    let page = page.max(1);
    let limit = limit.max(1);
    let total = listings.len();
    let buildings = listings
        .into_iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .collect();

    Page {
        buildings,
        pagination: Pagination {
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Status, UtilityType};
    use crate::score::tests::{fixed_now, report};

    fn building(id: &str, name: &str, neighbourhood: &str) -> Building {
        Building {
            id: id.to_string(),
            name: name.to_string(),
            latitude: -1.28,
            longitude: 36.8,
            neighbourhood: neighbourhood.to_string(),
            city: "Nairobi".to_string(),
            suspicious: false,
        }
    }

    fn for_building(id: &str, utility: UtilityType, status: Status, days_ago: i64) -> Report {
        let mut report = report(utility, status, days_ago);
        report.building_id = id.to_string();
        report
    }

    fn sample() -> Vec<BuildingListing> {
        let buildings = vec![
            building("westlands-square", "Westlands Square", "Westlands"),
            building("kilimani-plaza", "Kilimani Plaza", "Kilimani"),
            building("upperhill-towers", "Upperhill Towers", "Upper Hill"),
        ];
        let reports = vec![
            for_building("westlands-square", UtilityType::Power, Status::Flickering, 1),
            for_building("westlands-square", UtilityType::Water, Status::Outage, 45),
            for_building("kilimani-plaza", UtilityType::Power, Status::Stable, 2),
            for_building("kilimani-plaza", UtilityType::Internet, Status::Stable, 9),
        ];
        score_buildings(&buildings, &reports, fixed_now())
    }

    #[test]
    fn scores_each_building_from_its_own_reports() {
        let listings = sample();
        assert_eq!(listings.len(), 3);
        assert_eq!(listings[0].score.composite, Some(50));
        assert_eq!(listings[0].marker_color, "#f59e0b");
        assert_eq!(listings[0].report_count, 1);
        assert_eq!(listings[1].score.composite, Some(100));
        assert_eq!(listings[1].report_count, 2);
        assert!(!listings[2].score.has_data);
        assert_eq!(listings[2].marker_color, "#9ca3af");
        assert_eq!(listings[2].report_count, 0);
    }

    #[test]
    fn rank_puts_best_first_and_no_data_last() {
        let mut listings = sample();
        rank(&mut listings);
        let order: Vec<&str> = listings.iter().map(|l| l.building.id.as_str()).collect();
        assert_eq!(order, vec!["kilimani-plaza", "westlands-square", "upperhill-towers"]);
    }

    #[test]
    fn query_filters_by_name_and_neighbourhood() {
        let by_name = ListingQuery {
            query: Some("plaza".to_string()),
            ..ListingQuery::default()
        };
        let filtered = by_name.apply(sample());
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].building.id, "kilimani-plaza");

        let by_area = ListingQuery {
            neighbourhood: Some("upper hill".to_string()),
            ..ListingQuery::default()
        };
        assert_eq!(by_area.apply(sample())[0].building.id, "upperhill-towers");
    }

    #[test]
    fn paginate_reports_totals() {
        let page = paginate(sample(), 2, 2);
        assert_eq!(page.buildings.len(), 1);
        assert_eq!(
            page.pagination,
            Pagination {
                page: 2,
                limit: 2,
                total: 3,
                total_pages: 2,
            }
        );

        let clamped = paginate(sample(), 0, 0);
        assert_eq!(clamped.pagination.page, 1);
        assert_eq!(clamped.pagination.limit, 1);
        assert_eq!(clamped.pagination.total_pages, 3);
    }
}
