use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::import::ReportBatch;
use crate::models::{Building, Report, Status, UtilityType};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const SEED_BUILDINGS: [(&str, &str, f64, f64, &str); 5] = [
    ("westlands-square", "Westlands Square", -1.2676, 36.8078, "Westlands"),
    ("kilimani-plaza", "Kilimani Plaza", -1.2921, 36.7856, "Kilimani"),
    ("upperhill-towers", "Upperhill Towers", -1.2864, 36.8172, "Upper Hill"),
    ("parklands-heights", "Parklands Heights", -1.2627, 36.8234, "Parklands"),
    ("lavington-gardens", "Lavington Gardens", -1.2789, 36.7645, "Lavington"),
];

const SEED_REPORTS: [(&str, UtilityType, Status, i64); 17] = [
    ("westlands-square", UtilityType::Power, Status::Stable, 0),
    ("westlands-square", UtilityType::Power, Status::Stable, 3),
    ("westlands-square", UtilityType::Water, Status::Flickering, 1),
    ("westlands-square", UtilityType::Internet, Status::Stable, 2),
    ("kilimani-plaza", UtilityType::Power, Status::Outage, 0),
    ("kilimani-plaza", UtilityType::Power, Status::Flickering, 6),
    ("kilimani-plaza", UtilityType::Water, Status::Stable, 4),
    ("kilimani-plaza", UtilityType::Internet, Status::Flickering, 12),
    ("upperhill-towers", UtilityType::Power, Status::Stable, 1),
    ("upperhill-towers", UtilityType::Water, Status::Stable, 2),
    ("upperhill-towers", UtilityType::Internet, Status::Stable, 0),
    ("parklands-heights", UtilityType::Power, Status::Flickering, 5),
    ("parklands-heights", UtilityType::Water, Status::Outage, 2),
    ("parklands-heights", UtilityType::Water, Status::Outage, 9),
    ("parklands-heights", UtilityType::Internet, Status::Outage, 40),
    ("lavington-gardens", UtilityType::Power, Status::Stable, 45),
    ("lavington-gardens", UtilityType::Water, Status::Flickering, 20),
];

/// Inserts the sample Nairobi buildings and reports dated relative to `now`.
/// Re-running is a no-op thanks to the fixed source keys.
pub async fn seed(pool: &PgPool, now: DateTime<Utc>) -> anyhow::Result<usize> {
    for (id, name, latitude, longitude, neighbourhood) in SEED_BUILDINGS {
        sqlx::query(
            r#"
            INSERT INTO livability.buildings (id, name, latitude, longitude, neighbourhood)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(latitude)
        .bind(longitude)
        .bind(neighbourhood)
        .execute(pool)
        .await?;
    }

    let mut inserted = 0usize;
    for (index, (building_id, utility, status, days_ago)) in SEED_REPORTS.into_iter().enumerate() {
        let result = sqlx::query(
            r#"
            INSERT INTO livability.reports
            (id, building_id, utility_type, status, created_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(building_id)
        .bind(utility.as_str())
        .bind(status.as_str())
        .bind(now - Duration::days(days_ago))
        .bind(format!("seed-{:03}", index + 1))
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    tracing::info!(inserted, "seed reports written");
    Ok(inserted)
}

/// Stores a parsed CSV batch in one transaction. Existing buildings are left
/// untouched and rows whose id or source key already exist are skipped.
pub async fn import_batch(pool: &PgPool, batch: &ReportBatch) -> anyhow::Result<usize> {
    let mut tx = pool.begin().await?;

    for building in &batch.buildings {
        sqlx::query(
            r#"
            INSERT INTO livability.buildings
            (id, name, latitude, longitude, neighbourhood, city)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&building.id)
        .bind(&building.name)
        .bind(building.latitude)
        .bind(building.longitude)
        .bind(&building.neighbourhood)
        .bind(&building.city)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to upsert building {}", building.id))?;
    }

    let mut inserted = 0usize;
    for imported in &batch.reports {
        let report = &imported.report;
        if !report.status.is_known() {
            anyhow::bail!(
                "report {} has an unrecognised status and cannot be stored",
                imported.source_key
            );
        }

        let result = sqlx::query(
            r#"
            INSERT INTO livability.reports
            (id, building_id, utility_type, status, created_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(report.id)
        .bind(&report.building_id)
        .bind(report.utility_type.as_str())
        .bind(report.status.as_str())
        .bind(report.created_at)
        .bind(&imported.source_key)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    tx.commit().await?;
    Ok(inserted)
}

pub async fn fetch_buildings(
    pool: &PgPool,
    building_id: Option<&str>,
    neighbourhood: Option<&str>,
) -> anyhow::Result<Vec<Building>> {
    let mut query = String::from(
        "SELECT id, name, latitude, longitude, neighbourhood, city, suspicious \
         FROM livability.buildings WHERE TRUE",
    );
    let filters = push_scope_filters(
        &mut query,
        1,
        "id",
        "neighbourhood",
        building_id,
        neighbourhood,
    );
    query.push_str(" ORDER BY name");

    let mut rows = sqlx::query(&query);
    for value in filters {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let mut buildings = Vec::with_capacity(records.len());

    for row in records {
        buildings.push(Building {
            id: row.get("id"),
            name: row.get("name"),
            latitude: row.get("latitude"),
            longitude: row.get("longitude"),
            neighbourhood: row.get("neighbourhood"),
            city: row.get("city"),
            suspicious: row.get("suspicious"),
        });
    }

    Ok(buildings)
}

/// Live reports created at or after `since`, newest first. The engine does
/// not rely on that ordering.
pub async fn fetch_reports(
    pool: &PgPool,
    since: DateTime<Utc>,
    building_id: Option<&str>,
    neighbourhood: Option<&str>,
) -> anyhow::Result<Vec<Report>> {
    let mut query = String::from(
        "SELECT r.id, r.building_id, r.utility_type, r.status, r.created_at \
         FROM livability.reports r \
         JOIN livability.buildings b ON b.id = r.building_id \
         WHERE r.deleted_at IS NULL AND r.created_at >= $1",
    );
    let filters = push_scope_filters(
        &mut query,
        2,
        "b.id",
        "b.neighbourhood",
        building_id,
        neighbourhood,
    );
    query.push_str(" ORDER BY r.created_at DESC");

    let mut rows = sqlx::query(&query).bind(since);
    for value in filters {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let mut reports = Vec::with_capacity(records.len());

    for row in records {
        let utility: String = row.get("utility_type");
        let status: String = row.get("status");
        reports.push(Report {
            id: row.get("id"),
            building_id: row.get("building_id"),
            utility_type: utility
                .parse::<UtilityType>()
                .context("stored report has invalid utility type")?,
            status: Status::parse(&status),
            created_at: row.get("created_at"),
        });
    }

    Ok(reports)
}

// Appends the optional building/neighbourhood predicates, numbering
// placeholders from `first_param`, and returns the values to bind in order.
fn push_scope_filters<'a>(
    query: &mut String,
    first_param: usize,
    id_column: &str,
    neighbourhood_column: &str,
    building_id: Option<&'a str>,
    neighbourhood: Option<&'a str>,
) -> Vec<&'a str> {
    let mut values = Vec::new();
    if let Some(id) = building_id {
        query.push_str(&format!(" AND {id_column} = ${}", first_param + values.len()));
        values.push(id);
    }
    if let Some(area) = neighbourhood {
        query.push_str(&format!(
            " AND lower({neighbourhood_column}) = lower(${})",
            first_param + values.len()
        ));
        values.push(area);
    }
    values
}
