use anyhow::{anyhow, Result};
use chrono_tz::Tz;
use std::env;
use std::str::FromStr;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:./data/coach.db";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub database_url: String,
    pub http_port: u16,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub vision_model: String,
    pub text_model: String,
    pub timezone: Tz,
    pub admin_id: Option<i64>,
    pub webapp_origin: Option<String>,
    pub max_photo_size: usize,
    pub shots_per_window: u32,
    pub pass_threshold: u32,
    pub end_grace_minutes: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let token = env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| anyhow!("TELEGRAM_BOT_TOKEN must be set"))?;
        if token.trim().is_empty() {
            return Err(anyhow!("TELEGRAM_BOT_TOKEN must be set"));
        }

        let openai_api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY must be set"))?;
        if openai_api_key.trim().is_empty() {
            return Err(anyhow!("OPENAI_API_KEY must be set"));
        }

        let database_url = database_url_from_env();
        let openai_base_url = non_empty_var("OPENAI_BASE_URL")
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());

        let http_port = parse_var("HTTP_PORT", 3000u16)?;

        let timezone = match non_empty_var("TIMEZONE") {
            Some(name) => name
                .trim()
                .parse::<Tz>()
                .map_err(|_| anyhow!("Invalid TIMEZONE: {}", name))?,
            None => chrono_tz::Europe::Moscow,
        };

        let admin_id = match non_empty_var("ADMIN_ID") {
            Some(raw) => Some(
                raw.trim()
                    .parse()
                    .map_err(|_| anyhow!("Invalid ADMIN_ID"))?,
            ),
            None => None,
        };

        let shots_per_window = parse_var("SHOTS_PER_WINDOW", 3u32)?;
        let pass_threshold = parse_var("PASS_THRESHOLD", 2u32)?;
        if shots_per_window == 0 {
            return Err(anyhow!("SHOTS_PER_WINDOW must be at least 1"));
        }
        if pass_threshold > shots_per_window {
            return Err(anyhow!("PASS_THRESHOLD cannot exceed SHOTS_PER_WINDOW"));
        }

        Ok(Config {
            telegram_bot_token: token,
            database_url,
            http_port,
            openai_api_key,
            openai_base_url,
            vision_model: non_empty_var("VISION_MODEL").unwrap_or_else(|| "gpt-4o".to_string()),
            text_model: non_empty_var("TEXT_MODEL").unwrap_or_else(|| "gpt-4.1".to_string()),
            timezone,
            admin_id,
            webapp_origin: non_empty_var("WEBAPP_ORIGIN").map(|o| normalize_origin(&o)),
            max_photo_size: parse_var("MAX_PHOTO_SIZE", 5 * 1024 * 1024usize)?,
            shots_per_window,
            pass_threshold,
            end_grace_minutes: parse_var("END_GRACE_MINUTES", 15u32)?,
        })
    }

    /// Filesystem path of the SQLite database, as the dialogue storage wants it.
    pub fn database_path(&self) -> &str {
        sqlite_path(&self.database_url)
    }

    /// Page served to Telegram's web-app button.
    pub fn webapp_url(&self) -> Option<String> {
        self.webapp_origin.as_ref().map(|o| format!("{o}/"))
    }

    /// Relay endpoint that hands out a photo uploaded from the web page.
    pub fn pull_url(&self, token: &str) -> Result<reqwest::Url> {
        let origin = self
            .webapp_origin
            .as_ref()
            .ok_or_else(|| anyhow!("WEBAPP_ORIGIN is not configured"))?;
        Ok(reqwest::Url::parse_with_params(
            &format!("{origin}/pull"),
            &[("token", token)],
        )?)
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_id == Some(user_id)
    }
}

/// `DATABASE_URL` alone, for tools that don't need the bot credentials.
pub fn database_url_from_env() -> String {
    non_empty_var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string())
}

/// Strips the `sqlite:` / `sqlite://` scheme from a database URL.
pub fn sqlite_path(url: &str) -> &str {
    url.strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url)
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match non_empty_var(name) {
        Some(raw) => raw.trim().parse().map_err(|_| anyhow!("Invalid {}", name)),
        None => Ok(default),
    }
}

/// Trims the trailing slash and forces https.
pub fn normalize_origin(origin: &str) -> String {
    let trimmed = origin.trim().trim_end_matches('/');
    match trimmed.strip_prefix("http://") {
        Some(rest) => format!("https://{rest}"),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_origin() {
        assert_eq!(normalize_origin("http://example.com/"), "https://example.com");
        assert_eq!(normalize_origin("https://example.com"), "https://example.com");
        assert_eq!(normalize_origin(" https://a.b/app// "), "https://a.b/app");
    }

    #[test]
    fn test_sqlite_path() {
        assert_eq!(sqlite_path("sqlite:./data/coach.db"), "./data/coach.db");
        assert_eq!(sqlite_path("sqlite:///tmp/x.db"), "/tmp/x.db");
        assert_eq!(sqlite_path("coach.db"), "coach.db");
    }
}
