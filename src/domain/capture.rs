use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Thresholds a capture window is judged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRules {
    pub expected_shots: u32,
    pub pass_threshold: u32,
    pub rest_interval_min: u32,
}

impl CaptureRules {
    pub fn passes(&self, window: &CaptureWindow, reason: CloseReason) -> bool {
        reason != CloseReason::NonStart && window.verified >= self.pass_threshold
    }
}

/// Open capture window: the user is expected to send `expected_shots`
/// photos before `ends_at` (plus the grace period).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureWindow {
    /// Calendar day (local) the workout belongs to.
    pub date: NaiveDate,
    pub opened_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub shots_taken: u32,
    pub verified: u32,
    pub last_shot_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub task: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShotDecision {
    Accepted,
    TooSoon { wait_min: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    ShotsReached,
    NonStart,
    Timeout,
    Manual,
}

impl CloseReason {
    pub fn describe(self) -> &'static str {
        match self {
            CloseReason::ShotsReached => "all photos received",
            CloseReason::NonStart => "workout was not started",
            CloseReason::Timeout => "capture window timed out",
            CloseReason::Manual => "workout ended manually",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementOutcome {
    pub passed: bool,
    pub verified: u32,
    pub shots_taken: u32,
    pub date: NaiveDate,
    pub reason: CloseReason,
}

impl SettlementOutcome {
    pub fn failure_reason(&self, rules: &CaptureRules) -> String {
        match self.reason {
            CloseReason::NonStart => "Workout was not started in time".to_string(),
            _ => format!(
                "Only {}/{} verified photos ({} required)",
                self.verified, self.shots_taken, rules.pass_threshold
            ),
        }
    }
}

impl CaptureWindow {
    pub fn open(date: NaiveDate, now: DateTime<Utc>, duration_min: u32, task: Option<String>) -> Self {
        Self {
            date,
            opened_at: now,
            ends_at: now + Duration::minutes(i64::from(duration_min)),
            shots_taken: 0,
            verified: 0,
            last_shot_at: None,
            task,
        }
    }

    /// Whether a photo arriving at `now` respects the rest interval.
    pub fn check_shot(&self, now: DateTime<Utc>, rules: &CaptureRules) -> ShotDecision {
        let Some(last) = self.last_shot_at else {
            return ShotDecision::Accepted;
        };
        let rest = Duration::minutes(i64::from(rules.rest_interval_min));
        let since = now - last;
        if since >= rest {
            ShotDecision::Accepted
        } else {
            let left = rest - since;
            let wait_min = (left.num_seconds() + 59) / 60;
            ShotDecision::TooSoon { wait_min: wait_min.max(1) }
        }
    }

    /// Counts an accepted shot. Returns true once the expected number of
    /// shots has been reached.
    pub fn record_shot(&mut self, now: DateTime<Utc>, verified: bool, rules: &CaptureRules) -> bool {
        self.shots_taken += 1;
        if verified {
            self.verified += 1;
        }
        self.last_shot_at = Some(now);
        self.is_complete(rules)
    }

    pub fn is_complete(&self, rules: &CaptureRules) -> bool {
        self.shots_taken >= rules.expected_shots
    }

    /// Last moment a photo is still accepted.
    pub fn deadline(&self, grace_min: u32) -> DateTime<Utc> {
        self.ends_at + Duration::minutes(i64::from(grace_min))
    }

    pub fn is_overdue(&self, now: DateTime<Utc>, grace_min: u32) -> bool {
        now >= self.deadline(grace_min)
    }

    pub fn settle(&self, reason: CloseReason, rules: &CaptureRules) -> SettlementOutcome {
        SettlementOutcome {
            passed: rules.passes(self, reason),
            verified: self.verified,
            shots_taken: self.shots_taken,
            date: self.date,
            reason,
        }
    }

    pub fn progress_line(&self, rules: &CaptureRules) -> String {
        format!(
            "📸 {}/{} photos, ✅ {} verified (need {})",
            self.shots_taken, rules.expected_shots, self.verified, rules.pass_threshold
        )
    }
}
