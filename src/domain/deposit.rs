use super::profile::Answers;
use super::schedule::WeeklySchedule;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub const MIN_DEPOSIT: i64 = 500;
pub const MAX_DEPOSIT: i64 = 100_000;
pub const DEFAULT_DEPOSIT: i64 = 5_000;

pub const MIN_DEPOSIT_DAYS: u32 = 7;
pub const MAX_DEPOSIT_DAYS: u32 = 180;
/// Durations offered as buttons in the wizard.
pub const DEPOSIT_DAY_OPTIONS: [u32; 3] = [14, 30, 60];

const MAX_REASON_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    /// Commitment running, workouts are being counted.
    Active,
    /// Every required workout passed; waiting for the payout.
    Completed,
    /// A capture window failed; waiting for the admin to collect.
    Forfeited,
    /// Admin paid the deposit back.
    Returned,
    /// Admin kept the deposit.
    Collected,
}

impl DepositStatus {
    pub fn label(self) -> &'static str {
        match self {
            DepositStatus::Active => "🟢 Active",
            DepositStatus::Completed => "🏆 Completed",
            DepositStatus::Forfeited => "💸 Forfeited",
            DepositStatus::Returned => "✅ Returned",
            DepositStatus::Collected => "🔒 Collected",
        }
    }

    pub fn awaiting_admin(self) -> bool {
        matches!(self, DepositStatus::Completed | DepositStatus::Forfeited)
    }

    /// The admin has settled it; nothing more will happen.
    pub fn is_final(self) -> bool {
        matches!(self, DepositStatus::Returned | DepositStatus::Collected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    pub amount: i64,
    pub duration_days: u32,
    pub started_at: DateTime<Utc>,
    pub sessions_required: u32,
    pub sessions_done: u32,
    pub status: DepositStatus,
    #[serde(default)]
    pub fulfilled_days: Vec<NaiveDate>,
    #[serde(default)]
    pub forfeit_reason: Option<String>,
}

/// What happened to the deposit after a workout was counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassEffect {
    Counted,
    AlreadyCounted,
    Completed,
    Inactive,
}

impl Deposit {
    pub fn new(amount: i64, duration_days: u32, schedule: &WeeklySchedule, now: DateTime<Utc>, tz: Tz) -> Self {
        let local = now.with_timezone(&tz).naive_local();
        let until = local + Duration::days(i64::from(duration_days));
        let sessions_required = schedule.occurrences_between(local, until).max(1);
        Self {
            amount,
            duration_days,
            started_at: now,
            sessions_required,
            sessions_done: 0,
            status: DepositStatus::Active,
            fulfilled_days: Vec::new(),
            forfeit_reason: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == DepositStatus::Active
    }

    pub fn sessions_remaining(&self) -> u32 {
        self.sessions_required.saturating_sub(self.sessions_done)
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        self.started_at + Duration::days(i64::from(self.duration_days))
    }

    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        let left = self.ends_at() - now;
        if left <= Duration::zero() {
            0
        } else {
            // partial days count as a full day left
            (left.num_seconds() + 86_399) / 86_400
        }
    }

    pub fn record_pass(&mut self, date: NaiveDate) -> PassEffect {
        if !self.is_active() {
            return PassEffect::Inactive;
        }
        if self.fulfilled_days.contains(&date) {
            return PassEffect::AlreadyCounted;
        }
        self.fulfilled_days.push(date);
        self.sessions_done += 1;
        if self.sessions_done >= self.sessions_required {
            self.status = DepositStatus::Completed;
            PassEffect::Completed
        } else {
            PassEffect::Counted
        }
    }

    /// Returns false when the deposit was not active.
    pub fn forfeit(&mut self, reason: impl Into<String>) -> bool {
        if !self.is_active() {
            return false;
        }
        self.status = DepositStatus::Forfeited;
        self.forfeit_reason = Some(reason.into());
        true
    }

    /// Completes an active deposit whose window has elapsed.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_active() && now >= self.ends_at() {
            self.status = DepositStatus::Completed;
            return true;
        }
        false
    }

    /// Admin decision on a completed or forfeited deposit.
    pub fn resolve(&mut self, returned: bool) -> Result<DepositStatus> {
        if !self.status.awaiting_admin() {
            return Err(anyhow!("Deposit is {:?}, nothing to resolve", self.status));
        }
        self.status = if returned {
            DepositStatus::Returned
        } else {
            DepositStatus::Collected
        };
        Ok(self.status)
    }
}

/// Suggested deposit size with a short explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositAdvice {
    pub amount: i64,
    pub reason: String,
}

impl DepositAdvice {
    pub fn new(amount: i64, reason: &str) -> Self {
        let reason: String = reason.trim().chars().take(MAX_REASON_CHARS).collect();
        Self {
            amount: clamp_amount(amount),
            reason,
        }
    }
}

pub fn clamp_amount(amount: i64) -> i64 {
    amount.clamp(MIN_DEPOSIT, MAX_DEPOSIT)
}

pub fn validate_amount(amount: i64) -> Result<i64> {
    if !(MIN_DEPOSIT..=MAX_DEPOSIT).contains(&amount) {
        return Err(anyhow!(
            "Deposit must be between {MIN_DEPOSIT} and {MAX_DEPOSIT}"
        ));
    }
    Ok(amount)
}

pub fn validate_duration_days(days: u32) -> Result<u32> {
    if !(MIN_DEPOSIT_DAYS..=MAX_DEPOSIT_DAYS).contains(&days) {
        return Err(anyhow!(
            "Deposit duration must be between {MIN_DEPOSIT_DAYS} and {MAX_DEPOSIT_DAYS} days"
        ));
    }
    Ok(days)
}

/// Joins every digit group, so "6 500 ₽" reads as 6500.
pub fn parse_money(text: &str) -> i64 {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// Same as [`parse_money`] for whatever the model put in the JSON field.
pub fn parse_money_value(value: &serde_json::Value) -> i64 {
    match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        serde_json::Value::String(s) => parse_money(s),
        _ => 0,
    }
}

/// Rule-based deposit suggestion used when the model is unavailable.
pub fn heuristic_advice(answers: &Answers, schedule: &WeeklySchedule) -> DepositAdvice {
    let mut amount = DEFAULT_DEPOSIT;
    let mut why: Vec<&str> = Vec::new();

    let rate = answers.self_rate.to_lowercase();
    let rate_number: Option<u32> = rate
        .split(|c: char| !c.is_ascii_digit())
        .find(|s| !s.is_empty())
        .and_then(|s| s.parse().ok());
    let low_words = ["low", "bad", "poor", "низ", "плохо"];
    let high_words = ["high", "good", "great", "выс", "хорош"];
    if rate_number.is_some_and(|n| (1..=3).contains(&n)) || low_words.iter().any(|w| rate.contains(w)) {
        amount += 1500;
        why.push("low discipline");
    } else if rate_number.is_some_and(|n| (8..=10).contains(&n)) || high_words.iter().any(|w| rate.contains(w)) {
        amount -= 500;
        why.push("high discipline");
    }

    if let Some(avg) = schedule.average_duration() {
        if avg >= 75 {
            amount += 1000;
            why.push("long workouts");
        } else if avg <= 30 {
            amount -= 500;
            why.push("short workouts");
        }
    }

    let frequency = schedule.days_per_week();
    if frequency >= 5 {
        amount += 1000;
        why.push("high frequency");
    } else if frequency > 0 && frequency <= 2 {
        amount -= 500;
        why.push("low frequency");
    }

    let price = parse_money(&answers.program_price);
    if price >= 10_000 {
        amount += 1000;
        why.push("expensive previous program");
    } else if price > 0 && price < 2000 {
        amount -= 500;
        why.push("cheap previous program");
    }

    let reason = if why.is_empty() {
        "Fallback estimate (model unavailable)".to_string()
    } else {
        format!("Fallback estimate: {}", why.join(", "))
    };
    DepositAdvice::new(amount, &reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_money_formats() {
        assert_eq!(parse_money("6 500 ₽"), 6500);
        assert_eq!(parse_money("≈7000 руб."), 7000);
        assert_eq!(parse_money("nothing"), 0);
    }

    #[test]
    fn test_parse_money_value_json() {
        assert_eq!(parse_money_value(&serde_json::json!(4200)), 4200);
        assert_eq!(parse_money_value(&serde_json::json!("3 000")), 3000);
        assert_eq!(parse_money_value(&serde_json::json!(null)), 0);
    }

    #[test]
    fn test_clamp_amount_bounds() {
        assert_eq!(clamp_amount(10), MIN_DEPOSIT);
        assert_eq!(clamp_amount(1_000_000), MAX_DEPOSIT);
        assert_eq!(clamp_amount(6000), 6000);
    }

    #[test]
    fn test_advice_reason_is_truncated() {
        let long = "x".repeat(500);
        let advice = DepositAdvice::new(3000, &long);
        assert_eq!(advice.reason.chars().count(), 200);
    }
}
