use anyhow::Result;
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use tracing::info;

/// Row counts shown by the maintenance tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    pub users: i64,
    pub captures: i64,
    pub verified_captures: i64,
}

#[derive(Clone)]
pub struct DatabaseManager {
    pub pool: SqlitePool,
}

impl DatabaseManager {
    pub async fn new(database_url: &str) -> Result<Self> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
            info!("Creating database {}", database_url);
            Sqlite::create_database(database_url).await?;
        }

        let pool = SqlitePool::connect(database_url).await?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Deletes every user and capture row, keeping the schema.
    pub async fn truncate_all(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM captures").execute(&mut tx).await?;
        sqlx::query("DELETE FROM users").execute(&mut tx).await?;
        tx.commit().await?;
        info!("All users and captures deleted");
        Ok(())
    }

    pub async fn table_names(&self) -> Result<Vec<String>> {
        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(tables.into_iter().map(|(name,)| name).collect())
    }

    pub async fn stats(&self) -> Result<DatabaseStats> {
        let (users,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let (captures, verified_captures): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), COALESCE(SUM(verified), 0) FROM captures")
                .fetch_one(&self.pool)
                .await?;

        Ok(DatabaseStats {
            users,
            captures,
            verified_captures,
        })
    }
}
