//! Client for an OpenAI-compatible chat completions API.
//!
//! Used for three things: judging workout photos against a fixed rubric,
//! generating a short photo task for a capture window, and suggesting a
//! deposit size from the questionnaire. Every call goes through a
//! fixed-attempt retry; callers get a usable fallback instead of an error.

use crate::config::Config;
use crate::domain::{heuristic_advice, parse_money_value, Answers, DepositAdvice, WeeklySchedule, MIN_DEPOSIT};
use crate::utils::logging::log_retry;
use backon::{ExponentialBuilder, Retryable};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

const MAX_ATTEMPTS: usize = 3;
const FALLBACK_TASK: &str = "Photo of your dumbbells";

const VERIFY_SYSTEM_PROMPT: &str = "You are a fitness coach verifying workout photos. \
Check whether the photo shows exercise actually being performed right now. \
Collages, screenshots and edited images are not allowed. Also judge the location: HOME or not home. \
Answer in STRICT JSON with no explanation: \
{\"success\": true|false, \"is_home\": true|false, \"reason\": \"short explanation\"}";

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("API response had no message content")]
    EmptyResponse,
    #[error("unsupported image format")]
    UnsupportedImage,
}

/// Rubric result for one photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub success: bool,
    pub is_home: bool,
    pub reason: String,
}

impl Verdict {
    pub fn failed(reason: &str) -> Self {
        Self {
            success: false,
            is_home: false,
            reason: reason.to_string(),
        }
    }

    /// A photo counts only when the exercise is real and done at home.
    pub fn counts(&self) -> bool {
        self.success && self.is_home
    }

    /// Missing fields read as false, so an incomplete answer never passes.
    pub fn from_model_text(text: &str) -> Self {
        let data = extract_json_object(text).unwrap_or(Value::Null);
        Self {
            success: data.get("success").and_then(Value::as_bool).unwrap_or(false),
            is_home: data.get("is_home").and_then(Value::as_bool).unwrap_or(false),
            reason: data
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Clone)]
pub struct VisionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    vision_model: String,
    text_model: String,
}

impl VisionClient {
    pub fn new(config: &Config) -> Result<Self, VisionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            base_url: config.openai_base_url.clone(),
            api_key: config.openai_api_key.clone(),
            vision_model: config.vision_model.clone(),
            text_model: config.text_model.clone(),
        })
    }

    /// Judges a workout photo. Never fails: errors become a failed verdict.
    pub async fn verify_photo(&self, image: &[u8], task: Option<&str>) -> Verdict {
        match self.try_verify_photo(image, task).await {
            Ok(verdict) => verdict,
            Err(VisionError::UnsupportedImage) => Verdict::failed("Only JPEG or PNG photos are accepted"),
            Err(e) => {
                tracing::error!("Photo verification failed: {}", e);
                Verdict::failed("verification error")
            }
        }
    }

    async fn try_verify_photo(&self, image: &[u8], task: Option<&str>) -> Result<Verdict, VisionError> {
        let mime = sniff_image_mime(image).ok_or(VisionError::UnsupportedImage)?;
        let data_url = format!("data:{};base64,{}", mime, STANDARD.encode(image));

        let mut user_text = String::new();
        if let Some(task) = task {
            user_text.push_str(&format!("Task: {task}\n"));
        }
        user_text.push_str(
            "Evaluate:\n\
             1) Is an exercise being performed (not a selfie pose or just showing equipment)?\n\
             2) Any obvious signs of editing or a screenshot?\n\
             3) Location: home (room/apartment) vs commercial or public gym.\n\
             Return exactly one JSON object.",
        );

        let body = json!({
            "model": self.vision_model,
            "messages": [
                {"role": "system", "content": [{"type": "text", "text": VERIFY_SYSTEM_PROMPT}]},
                {"role": "user", "content": [
                    {"type": "text", "text": user_text},
                    {"type": "image_url", "image_url": {"url": data_url}}
                ]}
            ],
            "temperature": 0,
            "max_tokens": 300
        });

        let content = self.complete_with_retry("verify_photo", &body).await?;
        Ok(Verdict::from_model_text(&content))
    }

    /// One short sentence describing what to photograph.
    pub async fn generate_task(&self, goal: Option<&str>) -> String {
        let mut prompt = String::from(
            "Invent a simple home-workout task that can be confirmed with one photo.\n\
             Rules: one piece of equipment or bodyweight, one detail, one short sentence, \
             format \"Do [action] with [equipment] + [detail]\".",
        );
        if let Some(goal) = goal.filter(|g| !g.trim().is_empty()) {
            prompt.push_str(&format!("\nTake the user's goal into account: {goal}"));
        }
        let body = json!({
            "model": self.text_model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.7
        });

        match self.complete_with_retry("generate_task", &body).await {
            Ok(text) => {
                let cleaned = text.replace(['*', '_'], "").trim().to_string();
                if cleaned.is_empty() {
                    FALLBACK_TASK.to_string()
                } else {
                    cleaned
                }
            }
            Err(e) => {
                tracing::error!("Task generation failed: {}", e);
                FALLBACK_TASK.to_string()
            }
        }
    }

    /// Deposit suggestion from the model, or the heuristic when it can't help.
    pub async fn recommend_deposit(&self, answers: &Answers, schedule: &WeeklySchedule) -> DepositAdvice {
        let system = "You are a coach's assistant. Suggest a deposit size that supports discipline, \
based on the questionnaire: goal, motivation, self-rated discipline, workout frequency and length, \
price of the previous program. Return STRICT JSON without explanation: \
{\"deposit\": <int 500..100000>, \"reason\": \"<=200 chars, short explanation\"}";
        let profile = json!({
            "goal": answers.goal,
            "experience": answers.experience,
            "motivation": answers.motivation,
            "self_rate": answers.self_rate,
            "program_price": answers.program_price,
            "days_per_week": schedule.days_per_week(),
            "average_duration_min": schedule.average_duration(),
        });
        let body = json!({
            "model": self.text_model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": format!("User questionnaire as JSON:\n\n{profile}")}
            ],
            "temperature": 0.2,
            "max_tokens": 250
        });

        match self.complete_with_retry("recommend_deposit", &body).await {
            Ok(text) => match advice_from_model_text(&text) {
                Some(advice) => advice,
                None => {
                    tracing::warn!("Model deposit advice unusable, using heuristic: {}", text);
                    heuristic_advice(answers, schedule)
                }
            },
            Err(e) => {
                tracing::error!("Deposit recommendation failed, using heuristic: {}", e);
                heuristic_advice(answers, schedule)
            }
        }
    }

    async fn complete_with_retry(&self, operation: &str, body: &Value) -> Result<String, VisionError> {
        (|| async { self.complete(body).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(500))
                    .with_max_times(MAX_ATTEMPTS - 1),
            )
            .when(|e: &VisionError| !matches!(e, VisionError::UnsupportedImage))
            .notify(|e: &VisionError, delay: Duration| log_retry(operation, &e.to_string(), delay.as_millis()))
            .await
    }

    async fn complete(&self, body: &Value) -> Result<String, VisionError> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VisionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletion = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(VisionError::EmptyResponse)
    }
}

/// Parses `{"deposit": .., "reason": ..}`; None when the amount is unusable.
pub fn advice_from_model_text(text: &str) -> Option<DepositAdvice> {
    let data = extract_json_object(text)?;
    let amount = data.get("deposit").map(parse_money_value).unwrap_or(0);
    if amount < MIN_DEPOSIT {
        return None;
    }
    let reason = data
        .get("reason")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or("Suggested from your questionnaire");
    Some(DepositAdvice::new(amount, reason))
}

/// Whole text as JSON, or else the first balanced `{...}` inside it.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let text = text.trim();
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }

    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' if depth > 0 => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &text[start?..=i];
                    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(candidate) {
                        return Some(value);
                    }
                    start = None;
                }
            }
            _ => {}
        }
    }
    None
}

/// JPEG or PNG by magic bytes.
pub fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else {
        None
    }
}
