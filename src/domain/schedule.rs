use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Day of the week a workout can be scheduled on, Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Day {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Day {
    pub const ALL: [Day; 7] = [Day::Mon, Day::Tue, Day::Wed, Day::Thu, Day::Fri, Day::Sat, Day::Sun];

    pub fn code(self) -> &'static str {
        match self {
            Day::Mon => "mon",
            Day::Tue => "tue",
            Day::Wed => "wed",
            Day::Thu => "thu",
            Day::Fri => "fri",
            Day::Sat => "sat",
            Day::Sun => "sun",
        }
    }

    /// Three-letter name as understood by cron expressions.
    pub fn cron_name(self) -> &'static str {
        match self {
            Day::Mon => "Mon",
            Day::Tue => "Tue",
            Day::Wed => "Wed",
            Day::Thu => "Thu",
            Day::Fri => "Fri",
            Day::Sat => "Sat",
            Day::Sun => "Sun",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Day::ALL.into_iter().find(|d| d.code() == code)
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn succ(self) -> Self {
        Day::ALL[(self.index() + 1) % 7]
    }

    pub fn weekday(self) -> Weekday {
        match self {
            Day::Mon => Weekday::Mon,
            Day::Tue => Weekday::Tue,
            Day::Wed => Weekday::Wed,
            Day::Thu => Weekday::Thu,
            Day::Fri => Weekday::Fri,
            Day::Sat => Weekday::Sat,
            Day::Sun => Weekday::Sun,
        }
    }

    pub fn from_weekday(weekday: Weekday) -> Self {
        Day::ALL[weekday.num_days_from_monday() as usize]
    }

    fn from_word(word: &str) -> Option<Self> {
        let day = match word {
            "mon" | "monday" | "пн" | "пон" | "понедельник" => Day::Mon,
            "tue" | "tues" | "tuesday" | "вт" | "вторник" => Day::Tue,
            "wed" | "wednesday" | "ср" | "среда" => Day::Wed,
            "thu" | "thur" | "thurs" | "thursday" | "чт" | "четверг" => Day::Thu,
            "fri" | "friday" | "пт" | "пятница" => Day::Fri,
            "sat" | "saturday" | "сб" | "суббота" => Day::Sat,
            "sun" | "sunday" | "вс" | "воскресенье" => Day::Sun,
            _ => return None,
        };
        Some(day)
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cron_name())
    }
}

/// Start time and length of the workout on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySlot {
    pub start: NaiveTime,
    pub duration_min: u32,
}

/// Which of the three daily callbacks a trigger represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Start,
    Mid,
    End,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::Mid => "mid",
            Phase::End => "end",
        }
    }
}

/// A single wall-clock registration: fire `phase` every `day` at `time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub phase: Phase,
    pub day: Day,
    /// Day the workout itself was scheduled on. Differs from `day` when the
    /// trigger was shifted past midnight.
    pub workout_day: Day,
    pub time: NaiveTime,
}

impl Trigger {
    /// First instant strictly after `now` at which the wall clock in `tz`
    /// shows this trigger's day and time.
    pub fn next_after(&self, now: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
        let local_now = now.with_timezone(&tz).naive_local();
        (0..=7).find_map(|offset| {
            let date = local_now.date() + Duration::days(offset);
            if date.weekday() != self.day.weekday() {
                return None;
            }
            let local = date.and_time(self.time);
            if local <= local_now {
                return None;
            }
            resolve_local(tz, local)
        })
    }

    /// Six-field cron expression (`sec min hour dom month dow`) in UTC for
    /// the next occurrence after `now`. The scheduler evaluates cron in UTC,
    /// so the local day and time are converted here, day shift included.
    pub fn utc_cron(&self, tz: Tz, now: DateTime<Utc>) -> Option<String> {
        let at = self.next_after(now, tz)?;
        Some(format!(
            "0 {} {} * * {}",
            at.minute(),
            at.hour(),
            Day::from_weekday(at.weekday()).cron_name()
        ))
    }
}

fn resolve_local(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(at) => Some(at.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        // Skipped by a clock change: fire once the clock has jumped.
        LocalResult::None => tz
            .from_local_datetime(&(local + Duration::hours(1)))
            .earliest()
            .map(|at| at.with_timezone(&Utc)),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    pub slots: BTreeMap<Day, DaySlot>,
}

impl WeeklySchedule {
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn days_per_week(&self) -> usize {
        self.slots.len()
    }

    pub fn set(&mut self, day: Day, slot: DaySlot) {
        self.slots.insert(day, slot);
    }

    pub fn slot_for(&self, day: Day) -> Option<&DaySlot> {
        self.slots.get(&day)
    }

    pub fn average_duration(&self) -> Option<u32> {
        if self.slots.is_empty() {
            return None;
        }
        let total: u32 = self.slots.values().map(|s| s.duration_min).sum();
        Some(total / self.slots.len() as u32)
    }

    /// Start, midpoint and end triggers for every scheduled day.
    pub fn triggers(&self) -> Vec<Trigger> {
        let mut out = Vec::with_capacity(self.slots.len() * 3);
        for (&day, slot) in &self.slots {
            let half = i64::from(slot.duration_min / 2);
            let full = i64::from(slot.duration_min);
            out.push(Trigger {
                phase: Phase::Start,
                day,
                workout_day: day,
                time: slot.start,
            });
            for (phase, offset) in [(Phase::Mid, half), (Phase::End, full)] {
                let (time, shift) = add_minutes(slot.start, offset);
                let mut shifted = day;
                for _ in 0..shift {
                    shifted = shifted.succ();
                }
                out.push(Trigger {
                    phase,
                    day: shifted,
                    workout_day: day,
                    time,
                });
            }
        }
        out
    }

    /// Number of scheduled workout starts strictly between `from` and `until`.
    pub fn occurrences_between(&self, from: NaiveDateTime, until: NaiveDateTime) -> u32 {
        if until <= from || self.slots.is_empty() {
            return 0;
        }
        let mut count = 0;
        let mut date = from.date();
        while date <= until.date() {
            if let Some(slot) = self.slot_for(Day::from_weekday(date.weekday())) {
                let start = date.and_time(slot.start);
                if start > from && start < until {
                    count += 1;
                }
            }
            date = match date.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        count
    }

    /// One `Mon 19:30 · 60 min` line per scheduled day.
    pub fn summary_lines(&self) -> Vec<String> {
        self.slots
            .iter()
            .map(|(day, slot)| {
                format!("{} {} · {} min", day, slot.start.format("%H:%M"), slot.duration_min)
            })
            .collect()
    }
}

/// Adds minutes to a wall-clock time, returning the new time and how many
/// midnights were crossed.
fn add_minutes(time: NaiveTime, minutes: i64) -> (NaiveTime, i64) {
    let (result, overflow_secs) = time.overflowing_add_signed(Duration::minutes(minutes));
    (result, overflow_secs / 86_400)
}

#[allow(clippy::expect_used)]
static DAY_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<from>[a-zа-яё]+)\s*[-–]\s*(?P<to>[a-zа-яё]+)|(?P<word>[a-zа-яё]+)").expect("day token regex")
});

#[allow(clippy::expect_used)]
static TIME_OF_DAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,2})[:.](\d{2})").expect("time regex"));

#[allow(clippy::expect_used)]
static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("number regex"));

const EVERY_DAY: [&str; 7] = [
    "every day",
    "everyday",
    "daily",
    "каждый день",
    "ежеднев",
    "все дни",
    "пн-вс",
];

/// Parses a free-text list of training days. Ranges (`mon-wed`, wrapping
/// past Sunday) and single days may be mixed; the result keeps the order
/// of first mention.
pub fn parse_days(input: &str) -> Vec<Day> {
    let text = input.trim().to_lowercase();
    if EVERY_DAY.iter().any(|p| text.contains(p)) {
        return Day::ALL.to_vec();
    }

    let mut days = Vec::new();
    let mut push = |day: Day| {
        if !days.contains(&day) {
            days.push(day);
        }
    };

    for caps in DAY_TOKEN.captures_iter(&text) {
        if let Some(word) = caps.name("word") {
            if let Some(day) = Day::from_word(word.as_str()) {
                push(day);
            }
            continue;
        }
        let from = caps.name("from").and_then(|m| Day::from_word(m.as_str()));
        let to = caps.name("to").and_then(|m| Day::from_word(m.as_str()));
        match (from, to) {
            (Some(first), Some(last)) => {
                let mut current = first;
                push(current);
                while current != last {
                    current = current.succ();
                    push(current);
                }
            }
            (from, to) => from.into_iter().chain(to).for_each(&mut push),
        }
    }
    days
}

/// Finds the first valid `HH:MM` (or `HH.MM`) in the text.
pub fn parse_time(input: &str) -> Option<NaiveTime> {
    TIME_OF_DAY.captures_iter(input).find_map(|caps| {
        let hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps[2].parse().ok()?;
        NaiveTime::from_hms_opt(hour, minute, 0)
    })
}

pub const MIN_DURATION_MIN: u32 = 10;
pub const MAX_DURATION_MIN: u32 = 240;

/// Workout length in minutes: the first number in the text.
pub fn parse_duration(input: &str) -> Option<u32> {
    let minutes: u32 = NUMBER.find(input)?.as_str().parse().ok()?;
    (MIN_DURATION_MIN..=MAX_DURATION_MIN)
        .contains(&minutes)
        .then_some(minutes)
}
