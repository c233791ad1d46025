use std::sync::Arc;

use anyhow::Result;
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};

/// Shared handle to the SQLite pool. Cloning is cheap; the pool itself is
/// owned by process startup and dropped on shutdown.
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Connect to the database at `url`, creating it if it does not exist,
    /// and apply pending migrations before returning.
    pub async fn new(url: &str) -> Result<Self> {
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            Sqlite::create_database(url).await?;
        }

        let pool = SqlitePool::connect(url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Initialize a uniquely-named in-memory database for tests.
    #[cfg(test)]
    pub async fn init_test() -> Result<Self> {
        let test_id = uuid::Uuid::new_v4().to_string();
        let url = format!("file:memdb_{}?mode=memory&cache=shared", test_id);

        Self::new(&url).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
