use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::{Europe, UTC};
use workout_deposit_bot::domain::{parse_days, parse_duration, parse_time, Day, DaySlot, Phase, WeeklySchedule};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn schedule(slots: &[(Day, NaiveTime, u32)]) -> WeeklySchedule {
    let mut schedule = WeeklySchedule::default();
    for &(day, start, duration_min) in slots {
        schedule.set(day, DaySlot { start, duration_min });
    }
    schedule
}

// 2025-03-03 is a Monday
fn monday_noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 12, 0, 0).unwrap()
}

#[cfg(test)]
mod trigger_tests {
    use super::*;

    #[test]
    fn test_three_triggers_per_day() {
        let schedule = schedule(&[(Day::Mon, t(19, 0), 60), (Day::Thu, t(7, 30), 45)]);
        let triggers = schedule.triggers();
        assert_eq!(triggers.len(), 6);

        let monday: Vec<_> = triggers.iter().filter(|t| t.workout_day == Day::Mon).collect();
        assert_eq!(monday[0].phase, Phase::Start);
        assert_eq!(monday[0].time, t(19, 0));
        assert_eq!(monday[1].phase, Phase::Mid);
        assert_eq!(monday[1].time, t(19, 30));
        assert_eq!(monday[2].phase, Phase::End);
        assert_eq!(monday[2].time, t(20, 0));

        // Odd half durations round down
        let thursday: Vec<_> = triggers.iter().filter(|t| t.workout_day == Day::Thu).collect();
        assert_eq!(thursday[1].time, t(7, 52));
        assert_eq!(thursday[2].time, t(8, 15));
    }

    #[test]
    fn test_cron_expression() {
        let schedule = schedule(&[(Day::Fri, t(18, 5), 30)]);
        let crons: Vec<String> = schedule
            .triggers()
            .iter()
            .filter_map(|t| t.utc_cron(UTC, monday_noon()))
            .collect();
        assert_eq!(crons, vec!["0 5 18 * * Fri", "0 20 18 * * Fri", "0 35 18 * * Fri"]);
    }

    #[test]
    fn test_triggers_past_midnight_move_to_next_day() {
        let schedule = schedule(&[(Day::Sun, t(23, 30), 90)]);
        let triggers = schedule.triggers();

        assert_eq!(triggers[0].day, Day::Sun);
        assert_eq!(triggers[1].day, Day::Mon);
        assert_eq!(triggers[1].time, t(0, 15));
        assert_eq!(triggers[2].day, Day::Mon);
        assert_eq!(triggers[2].time, t(1, 0));
        assert!(triggers.iter().all(|t| t.workout_day == Day::Sun));
        assert_eq!(triggers[2].utc_cron(UTC, monday_noon()).unwrap(), "0 0 1 * * Mon");
    }

    #[test]
    fn test_local_triggers_become_utc_cron() {
        // Moscow is UTC+3 all year
        let schedule = schedule(&[(Day::Mon, t(19, 30), 60), (Day::Tue, t(1, 30), 30)]);
        let crons: Vec<String> = schedule
            .triggers()
            .iter()
            .filter_map(|t| t.utc_cron(Europe::Moscow, monday_noon()))
            .collect();
        assert_eq!(
            crons,
            vec![
                "0 30 16 * * Mon",
                "0 0 17 * * Mon",
                "0 30 17 * * Mon",
                // Early Tuesday in Moscow is still Monday evening in UTC
                "0 30 22 * * Mon",
                "0 45 22 * * Mon",
                "0 0 23 * * Mon",
            ]
        );
    }

    #[test]
    fn test_next_occurrence_follows_local_clock() {
        let schedule = schedule(&[(Day::Mon, t(19, 0), 60)]);
        let start = schedule.triggers()[0];

        let next = start.next_after(monday_noon(), Europe::Moscow).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 3, 3, 16, 0, 0).unwrap());

        // Once today's start has passed, the next one is a week later
        let later = start.next_after(next, Europe::Moscow).unwrap();
        assert_eq!(later, Utc.with_ymd_and_hms(2025, 3, 10, 16, 0, 0).unwrap());
    }

    #[test]
    fn test_clock_change_uses_current_offset() {
        // Berlin moves to summer time on 2025-03-30
        let schedule = schedule(&[(Day::Mon, t(19, 0), 60)]);
        let start = schedule.triggers()[0];
        let before = Utc.with_ymd_and_hms(2025, 3, 25, 12, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2025, 4, 1, 12, 0, 0).unwrap();

        assert_eq!(start.utc_cron(Europe::Berlin, monday_noon()).unwrap(), "0 0 18 * * Mon");
        assert_eq!(start.utc_cron(Europe::Berlin, before).unwrap(), "0 0 17 * * Mon");
        assert_eq!(start.utc_cron(Europe::Berlin, after).unwrap(), "0 0 17 * * Mon");
    }

    #[test]
    fn test_empty_schedule_has_no_triggers() {
        assert!(WeeklySchedule::default().triggers().is_empty());
    }
}

#[cfg(test)]
mod occurrence_tests {
    use super::*;

    #[test]
    fn test_occurrences_in_two_weeks() {
        let schedule = schedule(&[(Day::Mon, t(19, 0), 60), (Day::Thu, t(19, 0), 60)]);
        // 2025-03-03 is a Monday
        let from = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap().and_time(t(12, 0));
        let until = NaiveDate::from_ymd_opt(2025, 3, 17).unwrap().and_time(t(12, 0));

        // Mar 3, 6, 10, 13; Mar 17 19:00 is after the end
        assert_eq!(schedule.occurrences_between(from, until), 4);
    }

    #[test]
    fn test_start_at_workout_time_is_not_counted() {
        let schedule = schedule(&[(Day::Mon, t(19, 0), 60)]);
        let from = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap().and_time(t(19, 0));
        let until = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap().and_time(t(20, 0));
        assert_eq!(schedule.occurrences_between(from, until), 1);
    }

    #[test]
    fn test_degenerate_ranges() {
        let schedule = schedule(&[(Day::Mon, t(19, 0), 60)]);
        let from = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap().and_time(t(12, 0));
        assert_eq!(schedule.occurrences_between(from, from), 0);
        assert_eq!(WeeklySchedule::default().occurrences_between(from, from + chrono::Duration::days(30)), 0);
    }

    #[test]
    fn test_summary_and_average() {
        let schedule = schedule(&[(Day::Wed, t(7, 0), 30), (Day::Mon, t(19, 30), 60)]);
        assert_eq!(schedule.summary_lines(), vec!["Mon 19:30 · 60 min", "Wed 07:00 · 30 min"]);
        assert_eq!(schedule.average_duration(), Some(45));
        assert_eq!(schedule.days_per_week(), 2);
        assert_eq!(WeeklySchedule::default().average_duration(), None);
    }

    #[test]
    fn test_weekday_conversion() {
        assert_eq!(Day::from_weekday(Weekday::Sun), Day::Sun);
        assert_eq!(Day::Wed.weekday(), Weekday::Wed);
    }
}

#[cfg(test)]
mod parsing_tests {
    use super::*;

    #[test]
    fn test_parse_day_lists() {
        assert_eq!(parse_days("Mon, Wed, Fri"), vec![Day::Mon, Day::Wed, Day::Fri]);
        assert_eq!(parse_days("tuesday and thursday"), vec![Day::Tue, Day::Thu]);
        assert_eq!(parse_days("пн, ср, пт"), vec![Day::Mon, Day::Wed, Day::Fri]);
        assert_eq!(parse_days("mon mon mon"), vec![Day::Mon]);
    }

    #[test]
    fn test_parse_day_ranges() {
        assert_eq!(parse_days("mon-fri"), vec![Day::Mon, Day::Tue, Day::Wed, Day::Thu, Day::Fri]);
        assert_eq!(parse_days("пн-ср"), vec![Day::Mon, Day::Tue, Day::Wed]);
        // Ranges wrap around the week
        assert_eq!(parse_days("fri-mon"), vec![Day::Fri, Day::Sat, Day::Sun, Day::Mon]);
    }

    #[test]
    fn test_parse_range_mixed_with_list() {
        assert_eq!(
            parse_days("mon-wed, fri"),
            vec![Day::Mon, Day::Tue, Day::Wed, Day::Fri]
        );
        assert_eq!(parse_days("Sat and Mon - Tue"), vec![Day::Sat, Day::Mon, Day::Tue]);
        assert_eq!(parse_days("вт, чт-пт"), vec![Day::Tue, Day::Thu, Day::Fri]);
    }

    #[test]
    fn test_parse_every_day() {
        assert_eq!(parse_days("Every day").len(), 7);
        assert_eq!(parse_days("каждый день").len(), 7);
    }

    #[test]
    fn test_parse_days_without_days() {
        assert!(parse_days("whenever I feel like it").is_empty());
        assert!(parse_days("").is_empty());
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("7:05"), Some(t(7, 5)));
        assert_eq!(parse_time("around 18.30"), Some(t(18, 30)));
        assert_eq!(parse_time("19:3"), None);
        assert_eq!(parse_time("24:00"), None);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("45"), Some(45));
        assert_eq!(parse_duration("60 min"), Some(60));
        assert_eq!(parse_duration("45 or 50"), Some(45));
        assert_eq!(parse_duration("5"), None);
        assert_eq!(parse_duration("300"), None);
        assert_eq!(parse_duration("an hour"), None);
    }
}
