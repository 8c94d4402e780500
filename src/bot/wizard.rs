//! Onboarding wizard state, kept per chat in the dialogue storage, plus the
//! keyboards and texts shown at each step.

use crate::domain::{Answers, Day, DaySlot, DepositAdvice, WeeklySchedule, DEPOSIT_DAY_OPTIONS, QUESTIONS};
use crate::utils::validation::REST_OPTIONS;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{Dialogue, ErasedStorage};
use teloxide::types::{
    ButtonRequest, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, WebAppInfo,
};

pub type WizardStorage = ErasedStorage<WizardState>;
pub type WizardDialogue = Dialogue<WizardState, WizardStorage>;

pub const TIME_OPTIONS: [&str; 6] = ["07:00", "08:00", "12:00", "18:00", "19:00", "20:00"];
pub const DURATION_OPTIONS: [u32; 4] = [30, 45, 60, 90];
pub const PROFILE_BUTTON: &str = "📊 Profile";
pub const CAPTURE_BUTTON: &str = "📸 Send photo";

/// Everything collected so far, carried from step to step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub answers: Answers,
    pub schedule: WeeklySchedule,
    /// Days still waiting for a start time and duration, in order.
    pub pending: Vec<Day>,
    pub rest_interval_min: u32,
    pub deposit_days: u32,
}

impl Draft {
    pub fn current_day(&self) -> Option<Day> {
        self.pending.first().copied()
    }

    /// Starts the per-day time/duration loop over `days`.
    pub fn begin_schedule(&mut self, mut days: Vec<Day>) {
        days.sort();
        days.dedup();
        self.schedule = WeeklySchedule::default();
        self.pending = days;
    }

    /// Stores the slot for the current day. Returns true while days remain.
    pub fn complete_day(&mut self, start: NaiveTime, duration_min: u32) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        let day = self.pending.remove(0);
        self.schedule.set(day, DaySlot { start, duration_min });
        !self.pending.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizardState {
    #[default]
    Idle,
    Intro,
    Rules,
    Question {
        index: usize,
        draft: Draft,
    },
    PickDays {
        draft: Draft,
        days: Vec<Day>,
    },
    PickTime {
        draft: Draft,
    },
    PickDuration {
        draft: Draft,
        start: NaiveTime,
    },
    PickRest {
        draft: Draft,
    },
    PickDepositDays {
        draft: Draft,
    },
    ConfirmDeposit {
        draft: Draft,
        advice: DepositAdvice,
    },
    EnterDeposit {
        draft: Draft,
    },
}

impl WizardState {
    pub fn step_name(&self) -> &'static str {
        match self {
            WizardState::Idle => "idle",
            WizardState::Intro => "intro",
            WizardState::Rules => "rules",
            WizardState::Question { .. } => "question",
            WizardState::PickDays { .. } => "pick_days",
            WizardState::PickTime { .. } => "pick_time",
            WizardState::PickDuration { .. } => "pick_duration",
            WizardState::PickRest { .. } => "pick_rest",
            WizardState::PickDepositDays { .. } => "pick_deposit_days",
            WizardState::ConfirmDeposit { .. } => "confirm_deposit",
            WizardState::EnterDeposit { .. } => "enter_deposit",
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, WizardState::Idle)
    }
}

/// A wizard button press, decoded from its callback data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardInput {
    Next,
    Begin,
    ToggleDay(Day),
    DaysDone,
    Time(NaiveTime),
    Duration(u32),
    Rest(u32),
    DepositDays(u32),
    AcceptDeposit,
    CustomDeposit,
}

impl WizardInput {
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "ob_next" => return Some(WizardInput::Next),
            "qa_begin" => return Some(WizardInput::Begin),
            "days_done" => return Some(WizardInput::DaysDone),
            "dep_ok" => return Some(WizardInput::AcceptDeposit),
            "dep_custom" => return Some(WizardInput::CustomDeposit),
            _ => {}
        }
        if let Some(code) = data.strip_prefix("days_") {
            return Day::from_code(code).map(WizardInput::ToggleDay);
        }
        if let Some(time) = data.strip_prefix("time_") {
            return NaiveTime::parse_from_str(time, "%H:%M").ok().map(WizardInput::Time);
        }
        if let Some(min) = data.strip_prefix("dur_") {
            return min.parse().ok().map(WizardInput::Duration);
        }
        if let Some(min) = data.strip_prefix("rest_") {
            return min.parse().ok().map(WizardInput::Rest);
        }
        if let Some(days) = data.strip_prefix("depdays_") {
            return days.parse().ok().map(WizardInput::DepositDays);
        }
        None
    }
}

/// Adds or removes a day from the selection, keeping it sorted.
pub fn toggle_day(days: &mut Vec<Day>, day: Day) {
    if let Some(pos) = days.iter().position(|d| *d == day) {
        days.remove(pos);
    } else {
        days.push(day);
        days.sort();
    }
}

pub fn question_text(index: usize) -> Option<String> {
    QUESTIONS
        .get(index)
        .map(|q| format!("Question {}/{}\n\n{}", index + 1, QUESTIONS.len(), q))
}

pub const INTRO_TEXT: &str = "👋 Hi! I'm your workout coach.\n\n\
You put down a deposit, train on your own schedule and prove each workout with photos. \
Keep your promise and you get the deposit back. Skip workouts and you lose it.";

pub fn rules_text(shots: u32, threshold: u32, grace_min: u32) -> String {
    format!(
        "📋 How it works:\n\n\
         1. At the start of each scheduled workout I open a capture window.\n\
         2. Send {shots} photos during the workout, respecting your rest interval.\n\
         3. At least {threshold} photos must pass verification: real exercise, at home, no edits.\n\
         4. No photo by the middle of the workout means the workout was skipped.\n\
         5. After the workout ends you have {grace_min} more minutes to finish.\n\n\
         First, a few questions about you."
    )
}

pub fn intro_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback("Next ➡️", "ob_next")]])
}

pub fn rules_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback("Let's go 🚀", "qa_begin")]])
}

pub fn days_keyboard(selected: &[Day]) -> InlineKeyboardMarkup {
    let buttons: Vec<InlineKeyboardButton> = Day::ALL
        .iter()
        .map(|day| {
            let label = if selected.contains(day) {
                format!("✅ {day}")
            } else {
                day.to_string()
            };
            InlineKeyboardButton::callback(label, format!("days_{}", day.code()))
        })
        .collect();

    let mut rows: Vec<Vec<InlineKeyboardButton>> = buttons.chunks(4).map(|c| c.to_vec()).collect();
    rows.push(vec![InlineKeyboardButton::callback("Done ✔️", "days_done")]);
    InlineKeyboardMarkup::new(rows)
}

pub fn time_keyboard() -> InlineKeyboardMarkup {
    let rows = TIME_OPTIONS
        .chunks(3)
        .map(|chunk| {
            chunk
                .iter()
                .map(|t| InlineKeyboardButton::callback(*t, format!("time_{t}")))
                .collect()
        })
        .collect::<Vec<Vec<_>>>();
    InlineKeyboardMarkup::new(rows)
}

pub fn duration_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![DURATION_OPTIONS
        .iter()
        .map(|m| InlineKeyboardButton::callback(format!("{m} min"), format!("dur_{m}")))
        .collect::<Vec<_>>()])
}

pub fn rest_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![REST_OPTIONS
        .iter()
        .map(|m| InlineKeyboardButton::callback(format!("{m} min"), format!("rest_{m}")))
        .collect::<Vec<_>>()])
}

pub fn deposit_days_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![DEPOSIT_DAY_OPTIONS
        .iter()
        .map(|d| InlineKeyboardButton::callback(format!("{d} days"), format!("depdays_{d}")))
        .collect::<Vec<_>>()])
}

pub fn confirm_deposit_keyboard(amount: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(format!("✅ Deposit {amount}"), "dep_ok")],
        vec![InlineKeyboardButton::callback("✏️ Enter my own amount", "dep_custom")],
    ])
}

/// Persistent reply keyboard shown after onboarding.
pub fn main_keyboard(webapp_url: Option<&str>) -> KeyboardMarkup {
    let mut row = Vec::new();
    if let Some(url) = webapp_url.and_then(|u| reqwest::Url::parse(u).ok()) {
        row.push(KeyboardButton::new(CAPTURE_BUTTON).request(ButtonRequest::WebApp(WebAppInfo { url })));
    }
    row.push(KeyboardButton::new(PROFILE_BUTTON));
    KeyboardMarkup::new(vec![row]).resize_keyboard(true)
}
