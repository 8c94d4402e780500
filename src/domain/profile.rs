use super::capture::{CaptureRules, CaptureWindow, CloseReason, SettlementOutcome};
use super::deposit::{Deposit, PassEffect};
use super::schedule::WeeklySchedule;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-text questionnaire answers gathered by the wizard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answers {
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub experience: String,
    #[serde(default)]
    pub motivation: String,
    #[serde(default)]
    pub self_rate: String,
    #[serde(default)]
    pub program_price: String,
}

/// The questions asked in order, with the field each answer lands in.
pub const QUESTIONS: [&str; 5] = [
    "🎯 What is your main goal for the next 1–2 months? (weight loss, muscle, strength, endurance, posture…)",
    "🩺 Your level and limitations: beginner / intermediate / advanced, injuries, anything you can't or won't do.",
    "🔥 Why does this matter to you right now?",
    "📏 Rate your own discipline from 1 to 10.",
    "💳 How much did you pay for your last training program or membership? (0 if none)",
];

impl Answers {
    pub fn set(&mut self, index: usize, value: String) {
        match index {
            0 => self.goal = value,
            1 => self.experience = value,
            2 => self.motivation = value,
            3 => self.self_rate = value,
            4 => self.program_price = value,
            _ => {}
        }
    }
}

/// What a settled window did to the deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositEffect {
    Counted { remaining: u32 },
    AlreadyCounted,
    Completed,
    Forfeited,
    NoDeposit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub outcome: SettlementOutcome,
    pub effect: DepositEffect,
}

impl Settlement {
    /// Completion and forfeiture both wait on the admin.
    pub fn needs_admin(&self) -> bool {
        matches!(self.effect, DepositEffect::Completed | DepositEffect::Forfeited)
    }
}

/// Everything the bot knows about one user, stored as a single JSON document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub answers: Answers,
    #[serde(default)]
    pub schedule: WeeklySchedule,
    #[serde(default)]
    pub rest_interval_min: u32,
    #[serde(default)]
    pub deposit: Option<Deposit>,
    #[serde(default)]
    pub active_window: Option<CaptureWindow>,
    #[serde(default)]
    pub onboarded_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn is_onboarded(&self) -> bool {
        !self.schedule.is_empty() && self.deposit.is_some()
    }

    pub fn has_active_deposit(&self) -> bool {
        self.deposit.as_ref().is_some_and(Deposit::is_active)
    }

    /// Closes the open window and applies the result to the deposit.
    /// Returns None when no window was open.
    pub fn settle_window(&mut self, reason: CloseReason, rules: &CaptureRules) -> Option<Settlement> {
        let window = self.active_window.take()?;
        let outcome = window.settle(reason, rules);
        let effect = match self.deposit.as_mut() {
            None => DepositEffect::NoDeposit,
            Some(deposit) if outcome.passed => match deposit.record_pass(outcome.date) {
                PassEffect::Counted => DepositEffect::Counted {
                    remaining: deposit.sessions_remaining(),
                },
                PassEffect::AlreadyCounted => DepositEffect::AlreadyCounted,
                PassEffect::Completed => DepositEffect::Completed,
                PassEffect::Inactive => DepositEffect::NoDeposit,
            },
            Some(deposit) => {
                if deposit.forfeit(outcome.failure_reason(rules)) {
                    DepositEffect::Forfeited
                } else {
                    DepositEffect::NoDeposit
                }
            }
        };
        Some(Settlement { outcome, effect })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Empty or malformed documents read as a fresh profile.
    pub fn from_json(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::default();
        }
        match serde_json::from_str(raw) {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!("Discarding unreadable profile document: {}", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DaySlot, DepositStatus, Day};
    use chrono::{NaiveDate, NaiveTime, TimeZone};

    fn rules() -> CaptureRules {
        CaptureRules {
            expected_shots: 3,
            pass_threshold: 2,
            rest_interval_min: 10,
        }
    }

    fn profile_with_window(verified: u32, shots: u32) -> UserProfile {
        let now = Utc.with_ymd_and_hms(2025, 3, 3, 12, 0, 0).unwrap();
        let mut schedule = WeeklySchedule::default();
        schedule.set(
            Day::Mon,
            DaySlot {
                start: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
                duration_min: 60,
            },
        );
        let deposit = Deposit::new(5000, 14, &schedule, now, chrono_tz::Europe::Moscow);
        let mut window = CaptureWindow::open(NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(), now, 60, None);
        window.shots_taken = shots;
        window.verified = verified;
        UserProfile {
            schedule,
            rest_interval_min: 10,
            deposit: Some(deposit),
            active_window: Some(window),
            ..UserProfile::default()
        }
    }

    #[test]
    fn test_settle_without_window_is_noop() {
        let mut profile = UserProfile::default();
        assert!(profile.settle_window(CloseReason::Manual, &rules()).is_none());
    }

    #[test]
    fn test_passing_window_counts_session() {
        let mut profile = profile_with_window(2, 3);
        let settlement = profile.settle_window(CloseReason::ShotsReached, &rules()).unwrap();
        assert!(settlement.outcome.passed);
        assert!(matches!(settlement.effect, DepositEffect::Counted { .. }));
        assert!(profile.active_window.is_none());
        assert_eq!(profile.deposit.as_ref().unwrap().sessions_done, 1);
    }

    #[test]
    fn test_failing_window_forfeits_deposit() {
        let mut profile = profile_with_window(1, 3);
        let settlement = profile.settle_window(CloseReason::Timeout, &rules()).unwrap();
        assert!(!settlement.outcome.passed);
        assert_eq!(settlement.effect, DepositEffect::Forfeited);
        assert!(settlement.needs_admin());
        let deposit = profile.deposit.unwrap();
        assert_eq!(deposit.status, DepositStatus::Forfeited);
        assert!(deposit.forfeit_reason.unwrap().contains("1/3"));
    }

    #[test]
    fn test_non_start_fails_even_with_verified_photos() {
        let mut profile = profile_with_window(3, 3);
        let settlement = profile.settle_window(CloseReason::NonStart, &rules()).unwrap();
        assert!(!settlement.outcome.passed);
        assert_eq!(settlement.effect, DepositEffect::Forfeited);
    }

    #[test]
    fn test_from_json_tolerates_garbage() {
        assert_eq!(UserProfile::from_json(""), UserProfile::default());
        assert_eq!(UserProfile::from_json("{not json"), UserProfile::default());
        assert_eq!(UserProfile::from_json("{}"), UserProfile::default());
    }
}
