use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One counted photo and the verdict it received.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Capture {
    pub id: String,
    pub user_id: i64,
    pub window_date: String,
    pub verified: bool,
    pub is_home: bool,
    pub reason: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub total: i64,
    pub verified: i64,
}

impl CaptureStats {
    pub fn percent(&self) -> f64 {
        if self.total > 0 {
            self.verified as f64 / self.total as f64 * 100.0
        } else {
            0.0
        }
    }
}

impl Capture {
    pub async fn create(
        pool: &sqlx::SqlitePool,
        user_id: i64,
        window_date: NaiveDate,
        verified: bool,
        is_home: bool,
        reason: &str,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4().to_string();
        let window_date = window_date.format("%Y-%m-%d").to_string();
        let created_at = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO captures (id, user_id, window_date, verified, is_home, reason, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(&window_date)
        .bind(verified)
        .bind(is_home)
        .bind(reason)
        .bind(&created_at)
        .execute(pool)
        .await?;

        Ok(Capture {
            id,
            user_id,
            window_date,
            verified,
            is_home,
            reason: reason.to_string(),
            created_at,
        })
    }

    pub async fn find_by_window(
        pool: &sqlx::SqlitePool,
        user_id: i64,
        window_date: NaiveDate,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Capture>(
            "SELECT id, user_id, window_date, verified, is_home, reason, created_at FROM captures WHERE user_id = ? AND window_date = ? ORDER BY created_at"
        )
        .bind(user_id)
        .bind(window_date.format("%Y-%m-%d").to_string())
        .fetch_all(pool)
        .await
    }

    pub async fn stats_for_user(
        pool: &sqlx::SqlitePool,
        user_id: i64,
    ) -> Result<CaptureStats, sqlx::Error> {
        let (total, verified): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN verified THEN 1 ELSE 0 END), 0)
            FROM captures
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(CaptureStats { total, verified })
    }
}
