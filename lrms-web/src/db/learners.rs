//! Learner store
//!
//! Persisted learner profiles and their measurement rows.

use lrms_common::db::{LearnerProfile, MeasurementTable};
use lrms_common::{Region, Result};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::BTreeMap;

/// Insert a profile, or overwrite every field of the existing one.
///
/// Takes a connection so the caller can run a batch inside one transaction.
pub async fn upsert_profile(conn: &mut SqliteConnection, profile: &LearnerProfile) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO learner_profiles
            (learner_number, name, gender, region, learning_hub, program, class, co_learner, grade_level)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(learner_number) DO UPDATE SET
            name = excluded.name,
            gender = excluded.gender,
            region = excluded.region,
            learning_hub = excluded.learning_hub,
            program = excluded.program,
            class = excluded.class,
            co_learner = excluded.co_learner,
            grade_level = excluded.grade_level
        "#,
    )
    .bind(&profile.learner_number)
    .bind(&profile.name)
    .bind(&profile.gender)
    .bind(&profile.region)
    .bind(&profile.learning_hub)
    .bind(&profile.program)
    .bind(&profile.class_name)
    .bind(&profile.co_learner)
    .bind(&profile.grade_level)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Number of persisted learners whose `region` column names each region.
///
/// Every region is present in the result, with zero when it has no rows.
pub async fn count_by_region(pool: &SqlitePool) -> Result<BTreeMap<Region, i64>> {
    let rows = sqlx::query(
        r#"
        SELECT region, COUNT(*) AS learners
        FROM learner_profiles
        WHERE region IN ('Luzon', 'Visayas', 'Mindanao')
        GROUP BY region
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut counts: BTreeMap<Region, i64> = Region::ALL.iter().map(|r| (*r, 0)).collect();
    for row in rows {
        let region: String = row.get("region");
        if let Ok(region) = region.parse::<Region>() {
            counts.insert(region, row.get("learners"));
        }
    }

    Ok(counts)
}

pub async fn get_profile(pool: &SqlitePool, learner_number: &str) -> Result<Option<LearnerProfile>> {
    let profile = sqlx::query_as::<_, LearnerProfile>(
        r#"
        SELECT learner_number, name, gender, region, learning_hub, program, class, co_learner, grade_level
        FROM learner_profiles
        WHERE learner_number = ?
        "#,
    )
    .bind(learner_number)
    .fetch_optional(pool)
    .await?;

    Ok(profile)
}

/// Row count per measurement table for one learner
pub async fn measurement_counts(
    pool: &SqlitePool,
    learner_number: &str,
) -> Result<BTreeMap<&'static str, i64>> {
    let mut counts = BTreeMap::new();

    for table in MeasurementTable::ALL {
        let query = format!(
            "SELECT COUNT(*) FROM {} WHERE learner_number = ?",
            table.table_name()
        );
        let count: i64 = sqlx::query_scalar(&query)
            .bind(learner_number)
            .fetch_one(pool)
            .await?;
        counts.insert(table.table_name(), count);
    }

    Ok(counts)
}

/// Delete a learner; measurement rows cascade.
///
/// Returns false when no such learner exists.
pub async fn delete_profile(pool: &SqlitePool, learner_number: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM learner_profiles WHERE learner_number = ?")
        .bind(learner_number)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
