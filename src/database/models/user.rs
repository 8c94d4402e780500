use crate::domain::UserProfile;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub profile: String,
    pub registered_at: String,
    pub updated_at: String,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile::from_json(&self.profile)
    }

    pub async fn find(
        pool: &sqlx::SqlitePool,
        user_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT user_id, username, first_name, profile, registered_at, updated_at FROM users WHERE user_id = ?"
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Inserts the user on first contact and refreshes the Telegram names
    /// afterwards; `None` keeps the stored name. The profile is left untouched.
    pub async fn touch(
        pool: &sqlx::SqlitePool,
        user_id: i64,
        username: Option<String>,
        first_name: Option<String>,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO users (user_id, username, first_name, profile, registered_at, updated_at)
            VALUES (?, ?, ?, '{}', ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                username = COALESCE(excluded.username, users.username),
                first_name = COALESCE(excluded.first_name, users.first_name)
            "#,
        )
        .bind(user_id)
        .bind(&username)
        .bind(&first_name)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await?;

        Self::find(pool, user_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Writes the whole profile document. Last write wins.
    pub async fn save_profile(
        pool: &sqlx::SqlitePool,
        user_id: i64,
        profile: &UserProfile,
    ) -> Result<(), sqlx::Error> {
        let json = profile
            .to_json()
            .map_err(|e| sqlx::Error::Protocol(format!("profile serialization failed: {e}")))?;
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query("UPDATE users SET profile = ?, updated_at = ? WHERE user_id = ?")
            .bind(&json)
            .bind(&now)
            .bind(user_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(())
    }

    pub async fn load_profile(
        pool: &sqlx::SqlitePool,
        user_id: i64,
    ) -> Result<Option<UserProfile>, sqlx::Error> {
        Ok(Self::find(pool, user_id).await?.map(|u| u.profile()))
    }

    pub async fn all(pool: &sqlx::SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT user_id, username, first_name, profile, registered_at, updated_at FROM users ORDER BY user_id"
        )
        .fetch_all(pool)
        .await
    }

    pub fn display_name(&self) -> String {
        match (&self.username, &self.first_name) {
            (Some(username), _) => format!("@{username}"),
            (None, Some(first)) => first.clone(),
            (None, None) => self.user_id.to_string(),
        }
    }
}
