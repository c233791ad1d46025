use async_trait::async_trait;
use chrono::{DateTime, Duration, DurationRound, Utc};
use sqlx::Row;
use tracing::{error, info, warn};

use crate::db::DbConnection;
use crate::error::StorageError;
use crate::models::{StatsPoint, StatsQuery};

/// Capability set the layers above are written against. Exactly the three
/// operations the service exposes; substitutable for tests.
#[async_trait]
pub trait BannerStorage: Send + Sync {
    async fn save_statistics(&self, banner_id: i64) -> Result<(), StorageError>;
    async fn create_banner(&self, name: &str) -> Result<(), StorageError>;
    async fn load_stats(&self, query: StatsQuery) -> Result<Vec<StatsPoint>, StorageError>;
}

/// SQLite-backed storage accessor. Owns all query text and the translation
/// from raw database errors to the domain taxonomy.
pub struct Repository {
    db: DbConnection,
}

const SAVE_STATISTICS_QUERY: &str = "\
    INSERT INTO stats (banner_id, timestamp, count)
    VALUES (?, ?, 1)
    ON CONFLICT (banner_id, timestamp)
    DO UPDATE SET count = count + 1";

const LOAD_STATS_QUERY: &str = "\
    SELECT timestamp, count
    FROM stats
    WHERE banner_id = ? AND timestamp >= ? AND timestamp < ?
    ORDER BY timestamp";

const CREATE_BANNER_QUERY: &str = "INSERT INTO banners (name) VALUES (?)";

impl Repository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Folds a click at `at` into its minute bucket. A single conditional
    /// upsert, so concurrent clicks on the same bucket cannot lose updates.
    async fn save_statistics_at(
        &self,
        banner_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let minute = at
            .duration_trunc(Duration::minutes(1))
            .map_err(|err| StorageError::SaveFailed(err.to_string()))?;

        sqlx::query(SAVE_STATISTICS_QUERY)
            .bind(banner_id)
            .bind(minute)
            .execute(self.db.pool())
            .await
            .map_err(|err| {
                error!(banner_id, timestamp = %minute, error = %err, "statistics insert failed");
                StorageError::SaveFailed(err.to_string())
            })?;

        info!(banner_id, timestamp = %minute, "statistics saved");
        Ok(())
    }
}

/// Maps a failed banner insert to the domain taxonomy. A unique violation is
/// only a conflict when it names the banner-name constraint; anything else
/// stays a generic create failure.
fn translate_banner_insert_error(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() && db_err.message().contains("banners.name") {
            return StorageError::NameConflict;
        }
    }
    StorageError::CreateFailed(err.to_string())
}

#[async_trait]
impl BannerStorage for Repository {
    async fn save_statistics(&self, banner_id: i64) -> Result<(), StorageError> {
        // Banner existence is deliberately not checked; orphan stats are
        // tolerated.
        self.save_statistics_at(banner_id, Utc::now()).await
    }

    async fn create_banner(&self, name: &str) -> Result<(), StorageError> {
        let result = sqlx::query(CREATE_BANNER_QUERY)
            .bind(name)
            .execute(self.db.pool())
            .await;

        match result {
            Ok(_) => {
                info!(name, "banner created");
                Ok(())
            }
            Err(err) => {
                let err = translate_banner_insert_error(err);
                match &err {
                    StorageError::NameConflict => warn!(name, "banner name already exists"),
                    other => error!(name, error = %other, "banner insert failed"),
                }
                Err(err)
            }
        }
    }

    async fn load_stats(&self, query: StatsQuery) -> Result<Vec<StatsPoint>, StorageError> {
        let rows = sqlx::query(LOAD_STATS_QUERY)
            .bind(query.banner_id)
            .bind(query.from)
            .bind(query.to)
            .fetch_all(self.db.pool())
            .await
            .map_err(|err| {
                error!(banner_id = query.banner_id, error = %err, "stats query failed");
                StorageError::QueryFailed(err.to_string())
            })?;

        let mut stats = Vec::with_capacity(rows.len());
        for row in &rows {
            let scan_failed = |err: sqlx::Error| {
                error!(banner_id = query.banner_id, error = %err, "stats row scan failed");
                StorageError::ScanFailed(err.to_string())
            };
            let ts: DateTime<Utc> = row.try_get("timestamp").map_err(scan_failed)?;
            let v: i64 = row.try_get("count").map_err(scan_failed)?;
            stats.push(StatsPoint { ts, v });
        }

        info!(banner_id = query.banner_id, rows = stats.len(), "stats loaded");
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn setup() -> Repository {
        let db = DbConnection::init_test()
            .await
            .expect("failed to create test database");
        Repository::new(db)
    }

    fn at(hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, min, sec).unwrap()
    }

    fn query(banner_id: i64, from: DateTime<Utc>, to: DateTime<Utc>) -> StatsQuery {
        StatsQuery {
            banner_id,
            from,
            to,
        }
    }

    #[tokio::test]
    async fn clicks_in_same_minute_fold_into_one_bucket() {
        let repo = setup().await;

        for sec in [5, 30, 59] {
            repo.save_statistics_at(1, at(10, 0, sec))
                .await
                .expect("click should save");
        }

        let stats = repo
            .load_stats(query(1, at(10, 0, 0), at(10, 1, 0)))
            .await
            .expect("stats should load");
        assert_eq!(
            stats,
            vec![StatsPoint {
                ts: at(10, 0, 0),
                v: 3
            }]
        );
    }

    #[tokio::test]
    async fn clicks_in_different_minutes_create_distinct_buckets() {
        let repo = setup().await;

        repo.save_statistics_at(1, at(10, 0, 30)).await.unwrap();
        repo.save_statistics_at(1, at(10, 2, 10)).await.unwrap();
        repo.save_statistics_at(1, at(10, 1, 45)).await.unwrap();

        let stats = repo
            .load_stats(query(1, at(10, 0, 0), at(11, 0, 0)))
            .await
            .expect("stats should load");
        let timestamps: Vec<_> = stats.iter().map(|p| p.ts).collect();
        assert_eq!(timestamps, vec![at(10, 0, 0), at(10, 1, 0), at(10, 2, 0)]);
        assert!(stats.iter().all(|p| p.v == 1));
    }

    #[tokio::test]
    async fn load_stats_range_is_inclusive_exclusive() {
        let repo = setup().await;

        repo.save_statistics_at(1, at(10, 0, 0)).await.unwrap();
        repo.save_statistics_at(1, at(10, 1, 0)).await.unwrap();
        repo.save_statistics_at(1, at(10, 2, 0)).await.unwrap();

        let stats = repo
            .load_stats(query(1, at(10, 0, 0), at(10, 2, 0)))
            .await
            .expect("stats should load");
        let timestamps: Vec<_> = stats.iter().map(|p| p.ts).collect();
        assert_eq!(timestamps, vec![at(10, 0, 0), at(10, 1, 0)]);
    }

    #[tokio::test]
    async fn load_stats_ignores_other_banners() {
        let repo = setup().await;

        repo.save_statistics_at(1, at(10, 0, 0)).await.unwrap();
        repo.save_statistics_at(2, at(10, 0, 0)).await.unwrap();

        let stats = repo
            .load_stats(query(2, at(9, 0, 0), at(11, 0, 0)))
            .await
            .expect("stats should load");
        assert_eq!(
            stats,
            vec![StatsPoint {
                ts: at(10, 0, 0),
                v: 1
            }]
        );
    }

    #[tokio::test]
    async fn empty_range_returns_empty_sequence() {
        let repo = setup().await;

        repo.save_statistics_at(1, at(10, 0, 0)).await.unwrap();

        let stats = repo
            .load_stats(query(1, at(12, 0, 0), at(13, 0, 0)))
            .await
            .expect("an empty range is not an error");
        assert!(stats.is_empty());
    }

    #[tokio::test]
    async fn save_statistics_accepts_unknown_banner() {
        let repo = setup().await;

        // No banner row exists; the click is still recorded.
        repo.save_statistics(4242)
            .await
            .expect("orphan stats are tolerated");
    }

    #[tokio::test]
    async fn create_banner_rejects_duplicate_name() {
        let repo = setup().await;

        repo.create_banner("summer-sale")
            .await
            .expect("first create should succeed");
        let err = repo
            .create_banner("summer-sale")
            .await
            .expect_err("duplicate name should conflict");
        assert!(matches!(err, StorageError::NameConflict));

        // The conflict must leave the original row untouched.
        let rows = sqlx::query("SELECT id FROM banners WHERE name = ?")
            .bind("summer-sale")
            .fetch_all(repo.db.pool())
            .await
            .expect("query should succeed");
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn create_banner_with_novel_name_is_retrievable() {
        let repo = setup().await;

        repo.create_banner("autumn-sale").await.unwrap();

        let row = sqlx::query("SELECT id FROM banners WHERE name = ?")
            .bind("autumn-sale")
            .fetch_one(repo.db.pool())
            .await
            .expect("banner should be retrievable");
        let id: i64 = row.try_get("id").unwrap();
        assert!(id >= 1);
    }
}
