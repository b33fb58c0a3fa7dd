use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use crate::models::{BuildingListing, Report, ReportTrend, Status, StatusSummary, UtilityType};
use crate::score::{self, ScoreBand};

pub fn summarize_by_status(reports: &[Report], now: DateTime<Utc>) -> Vec<StatusSummary> {
    UtilityType::ALL
        .into_iter()
        .map(|utility| {
            let mut summary = StatusSummary {
                utility,
                stable: 0,
                flickering: 0,
                outage: 0,
                unknown: 0,
            };
            for report in reports.iter().filter(|report| {
                report.utility_type == utility && score::in_scoring_window(report, now)
            }) {
                match report.status {
                    Status::Stable => summary.stable += 1,
                    Status::Flickering => summary.flickering += 1,
                    Status::Outage => summary.outage += 1,
                    Status::Unknown => summary.unknown += 1,
                }
            }
            summary
        })
        .collect()
}

/// Groups reports by the Monday of their week, newest week first.
pub fn weekly_trends(reports: &[Report]) -> Vec<ReportTrend> {
    let mut weeks: BTreeMap<NaiveDate, (i64, i64, HashSet<&str>)> = BTreeMap::new();

    for report in reports {
        let day = report.created_at.date_naive();
        let week_start = day - Duration::days(i64::from(day.weekday().num_days_from_monday()));
        let entry = weeks
            .entry(week_start)
            .or_insert_with(|| (0, 0, HashSet::new()));
        entry.0 += 1;
        if report.status == Status::Outage {
            entry.1 += 1;
        }
        entry.2.insert(report.building_id.as_str());
    }

    weeks
        .into_iter()
        .rev()
        .map(|(week_start, (report_count, outage_count, buildings))| ReportTrend {
            week_start,
            report_count,
            outage_count,
            building_count: buildings.len() as i64,
        })
        .collect()
}

const RECENT_REPORTS: usize = 5;
const BUILDING_HISTORY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportScope<'a> {
    All,
    Building(&'a str),
    Neighbourhood(&'a str),
}

impl ReportScope<'_> {
    fn label(&self) -> &str {
        match self {
            ReportScope::All => "all buildings",
            ReportScope::Building(id) => id,
            ReportScope::Neighbourhood(name) => name,
        }
    }
}

pub fn build_report(
    scope: ReportScope<'_>,
    now: DateTime<Utc>,
    history_days: i64,
    listings: &[BuildingListing],
    reports: &[Report],
) -> String {
    let summaries = summarize_by_status(reports, now);
    let trends = weekly_trends(reports);
    let names: HashMap<&str, &str> = listings
        .iter()
        .map(|listing| (listing.building.id.as_str(), listing.building.name.as_str()))
        .collect();

    let mut output = String::new();

    let _ = writeln!(output, "# Building Livability Report");
    let _ = writeln!(
        output,
        "Generated for {} on {} (reports since {})",
        scope.label(),
        now.date_naive(),
        score::history_cutoff(now, history_days).date_naive()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Building Scores");

    if listings.is_empty() {
        let _ = writeln!(output, "No buildings matched this scope.");
    } else {
        for listing in listings {
            let _ = writeln!(output, "- {}", describe_listing(listing));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Status Mix (last {} days)", score::SCORING_WINDOW_DAYS);

    if summaries.iter().all(|summary| summary.total() == 0) {
        let _ = writeln!(output, "No reports recorded in the scoring window.");
    } else {
        for summary in &summaries {
            let _ = write!(
                output,
                "- {}: {} stable, {} flickering, {} outage",
                summary.utility, summary.stable, summary.flickering, summary.outage
            );
            if summary.unknown > 0 {
                let _ = write!(output, ", {} unrecognised", summary.unknown);
            }
            let _ = writeln!(output);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weekly Trend");

    if trends.is_empty() {
        let _ = writeln!(output, "No reports recorded for this window.");
    } else {
        for trend in &trends {
            let _ = writeln!(
                output,
                "- Week of {}: {} reports ({} outages) across {} buildings",
                trend.week_start, trend.report_count, trend.outage_count, trend.building_count
            );
        }
    }

    let mut recent: Vec<&Report> = reports.iter().collect();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    let _ = writeln!(output);
    // A single building gets its full recent history, like the building detail page.
    let (heading, limit) = match scope {
        ReportScope::Building(_) => ("Report History", BUILDING_HISTORY),
        _ => ("Recent Reports", RECENT_REPORTS),
    };
    let _ = writeln!(output, "## {heading}");

    if recent.is_empty() {
        let _ = writeln!(output, "No reports recorded for this window.");
    } else {
        for report in recent.iter().take(limit) {
            let name = names
                .get(report.building_id.as_str())
                .copied()
                .unwrap_or(report.building_id.as_str());
            let _ = writeln!(
                output,
                "- {} {} {} at {}",
                name,
                report.utility_type,
                report.status,
                report.created_at.format("%Y-%m-%d %H:%M UTC")
            );
        }
    }

    output
}

/// One-line summary shared by the markdown report and the CLI text output.
pub fn describe_listing(listing: &BuildingListing) -> String {
    let score = &listing.score;
    let mut line = format!(
        "{} ({}) score {} [{}]",
        listing.building.name,
        listing.building.neighbourhood,
        format_score(score.composite),
        ScoreBand::from_score(score.composite).label()
    );
    for (utility, utility_score) in score.utilities.iter() {
        let status = utility_score.status.map(|status| status.as_str()).unwrap_or("-");
        let _ = write!(
            line,
            " {} {}/{}",
            utility.as_str().to_lowercase(),
            format_score(utility_score.score),
            status
        );
    }
    let _ = write!(line, " across {} reports", listing.report_count);
    if listing.building.suspicious {
        line.push_str(" (flagged suspicious)");
    }
    line
}

fn format_score(score: Option<u8>) -> String {
    score.map(|value| value.to_string()).unwrap_or_else(|| "-".to_string())
}
