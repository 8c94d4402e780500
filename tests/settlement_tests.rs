use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use workout_deposit_bot::domain::*;

fn rules() -> CaptureRules {
    CaptureRules {
        expected_shots: 3,
        pass_threshold: 2,
        rest_interval_min: 10,
    }
}

fn monday_noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 12, 0, 0).unwrap()
}

fn monday_schedule() -> WeeklySchedule {
    let mut schedule = WeeklySchedule::default();
    schedule.set(
        Day::Mon,
        DaySlot {
            start: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            duration_min: 60,
        },
    );
    schedule
}

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}

#[cfg(test)]
mod capture_window_tests {
    use super::*;

    #[test]
    fn test_rest_interval_between_shots() {
        let t0 = monday_noon();
        let mut window = CaptureWindow::open(date(3), t0, 60, None);
        assert_eq!(window.ends_at, t0 + Duration::minutes(60));
        assert_eq!(window.check_shot(t0, &rules()), ShotDecision::Accepted);

        assert!(!window.record_shot(t0, true, &rules()));
        assert_eq!(
            window.check_shot(t0 + Duration::minutes(4), &rules()),
            ShotDecision::TooSoon { wait_min: 6 }
        );
        // Less than a minute left still asks to wait one minute
        assert_eq!(
            window.check_shot(t0 + Duration::seconds(570), &rules()),
            ShotDecision::TooSoon { wait_min: 1 }
        );
        assert_eq!(window.check_shot(t0 + Duration::minutes(10), &rules()), ShotDecision::Accepted);
    }

    #[test]
    fn test_window_completes_after_expected_shots() {
        let t0 = monday_noon();
        let mut window = CaptureWindow::open(date(3), t0, 60, Some("Hold a plank".to_string()));

        assert!(!window.record_shot(t0, true, &rules()));
        assert!(!window.record_shot(t0 + Duration::minutes(10), false, &rules()));
        assert!(window.record_shot(t0 + Duration::minutes(20), true, &rules()));

        assert_eq!(window.shots_taken, 3);
        assert_eq!(window.verified, 2);
        assert_eq!(window.progress_line(&rules()), "📸 3/3 photos, ✅ 2 verified (need 2)");

        let outcome = window.settle(CloseReason::ShotsReached, &rules());
        assert!(outcome.passed);
        assert_eq!(outcome.date, date(3));
    }

    #[test]
    fn test_failed_settlement_reasons() {
        let mut window = CaptureWindow::open(date(3), monday_noon(), 60, None);
        window.record_shot(monday_noon(), true, &rules());

        let timeout = window.settle(CloseReason::Timeout, &rules());
        assert!(!timeout.passed);
        assert_eq!(timeout.failure_reason(&rules()), "Only 1/1 verified photos (2 required)");

        let empty = CaptureWindow::open(date(3), monday_noon(), 60, None);
        let non_start = empty.settle(CloseReason::NonStart, &rules());
        assert!(!non_start.passed);
        assert_eq!(non_start.failure_reason(&rules()), "Workout was not started in time");
    }

    #[test]
    fn test_close_reason_descriptions() {
        assert_eq!(CloseReason::ShotsReached.describe(), "all photos received");
        assert_eq!(CloseReason::Manual.describe(), "workout ended manually");
    }
}

#[cfg(test)]
mod deposit_tests {
    use super::*;

    fn deposit() -> Deposit {
        // Mar 3 and Mar 10 at 19:00 fall inside the two weeks
        Deposit::new(5000, 14, &monday_schedule(), monday_noon(), chrono_tz::UTC)
    }

    #[test]
    fn test_sessions_required_from_schedule() {
        let deposit = deposit();
        assert_eq!(deposit.sessions_required, 2);
        assert_eq!(deposit.sessions_remaining(), 2);
        assert_eq!(deposit.status, DepositStatus::Active);
        assert_eq!(deposit.ends_at(), monday_noon() + Duration::days(14));
    }

    #[test]
    fn test_at_least_one_session_required() {
        let deposit = Deposit::new(5000, 14, &WeeklySchedule::default(), monday_noon(), chrono_tz::UTC);
        assert_eq!(deposit.sessions_required, 1);
    }

    #[test]
    fn test_passes_count_once_per_day() {
        let mut deposit = deposit();
        assert_eq!(deposit.record_pass(date(3)), PassEffect::Counted);
        assert_eq!(deposit.record_pass(date(3)), PassEffect::AlreadyCounted);
        assert_eq!(deposit.sessions_remaining(), 1);
        assert_eq!(deposit.record_pass(date(10)), PassEffect::Completed);
        assert_eq!(deposit.status, DepositStatus::Completed);
        assert_eq!(deposit.record_pass(date(17)), PassEffect::Inactive);
    }

    #[test]
    fn test_forfeit_only_from_active() {
        let mut deposit = deposit();
        assert!(deposit.forfeit("Workout was not started in time"));
        assert_eq!(deposit.status, DepositStatus::Forfeited);
        assert!(!deposit.forfeit("again"));
        assert_eq!(deposit.forfeit_reason.as_deref(), Some("Workout was not started in time"));
    }

    #[test]
    fn test_expire_and_days_remaining() {
        let mut deposit = deposit();
        let start = monday_noon();
        assert_eq!(deposit.days_remaining(start), 14);
        assert_eq!(deposit.days_remaining(start + Duration::hours(1)), 14);
        assert_eq!(deposit.days_remaining(start + Duration::days(14)), 0);

        assert!(!deposit.expire(start + Duration::days(13)));
        assert!(deposit.expire(start + Duration::days(14)));
        assert_eq!(deposit.status, DepositStatus::Completed);
        assert!(!deposit.expire(start + Duration::days(15)));
    }

    #[test]
    fn test_admin_resolution() {
        let mut deposit = deposit();
        assert!(deposit.resolve(true).is_err());

        deposit.forfeit("skipped");
        assert_eq!(deposit.resolve(false).unwrap(), DepositStatus::Collected);
        assert!(deposit.status.is_final());
        assert!(deposit.resolve(true).is_err());
    }

    #[test]
    fn test_amount_and_duration_validation() {
        assert!(validate_amount(MIN_DEPOSIT).is_ok());
        assert!(validate_amount(MIN_DEPOSIT - 1).is_err());
        assert!(validate_amount(MAX_DEPOSIT + 1).is_err());
        assert!(validate_duration_days(30).is_ok());
        assert!(validate_duration_days(3).is_err());
    }
}

#[cfg(test)]
mod profile_settlement_tests {
    use super::*;

    fn onboarded_profile() -> UserProfile {
        let schedule = monday_schedule();
        let deposit = Deposit::new(5000, 14, &schedule, monday_noon(), chrono_tz::UTC);
        UserProfile {
            schedule,
            rest_interval_min: 10,
            deposit: Some(deposit),
            onboarded_at: Some(monday_noon()),
            ..UserProfile::default()
        }
    }

    fn pass_window(profile: &mut UserProfile, day: u32) -> Settlement {
        let now = monday_noon();
        let mut window = CaptureWindow::open(date(day), now, 60, None);
        window.record_shot(now, true, &rules());
        window.record_shot(now + Duration::minutes(10), true, &rules());
        profile.active_window = Some(window);
        profile.settle_window(CloseReason::Manual, &rules()).unwrap()
    }

    #[test]
    fn test_two_passing_weeks_complete_the_deposit() {
        let mut profile = onboarded_profile();

        let first = pass_window(&mut profile, 3);
        assert_eq!(first.effect, DepositEffect::Counted { remaining: 1 });
        assert!(!first.needs_admin());

        let repeat = pass_window(&mut profile, 3);
        assert_eq!(repeat.effect, DepositEffect::AlreadyCounted);

        let second = pass_window(&mut profile, 10);
        assert_eq!(second.effect, DepositEffect::Completed);
        assert!(second.needs_admin());
        assert!(!profile.has_active_deposit());
    }

    #[test]
    fn test_window_after_forfeit_does_not_touch_deposit() {
        let mut profile = onboarded_profile();
        profile.active_window = Some(CaptureWindow::open(date(3), monday_noon(), 60, None));
        let failed = profile.settle_window(CloseReason::NonStart, &rules()).unwrap();
        assert_eq!(failed.effect, DepositEffect::Forfeited);

        profile.active_window = Some(CaptureWindow::open(date(10), monday_noon(), 60, None));
        let late = profile.settle_window(CloseReason::Timeout, &rules()).unwrap();
        assert_eq!(late.effect, DepositEffect::NoDeposit);
        assert_eq!(profile.deposit.unwrap().status, DepositStatus::Forfeited);
    }

    #[test]
    fn test_window_without_deposit() {
        let mut profile = UserProfile {
            active_window: Some(CaptureWindow::open(date(3), monday_noon(), 60, None)),
            ..UserProfile::default()
        };
        let settlement = profile.settle_window(CloseReason::Timeout, &rules()).unwrap();
        assert_eq!(settlement.effect, DepositEffect::NoDeposit);
        assert!(!profile.is_onboarded());
    }

    #[test]
    fn test_profile_json_round_trip_keeps_open_window() {
        let mut profile = onboarded_profile();
        profile.active_window = Some(CaptureWindow::open(date(3), monday_noon(), 45, Some("Squats".to_string())));

        let json = profile.to_json().unwrap();
        assert_eq!(UserProfile::from_json(&json), profile);
    }
}

#[cfg(test)]
mod advice_tests {
    use super::*;

    #[test]
    fn test_heuristic_advice_adjustments() {
        let answers = Answers {
            self_rate: "2".to_string(),
            program_price: "15 000".to_string(),
            ..Answers::default()
        };
        let mut schedule = WeeklySchedule::default();
        for day in [Day::Mon, Day::Tue, Day::Wed, Day::Thu, Day::Fri] {
            schedule.set(
                day,
                DaySlot {
                    start: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
                    duration_min: 90,
                },
            );
        }

        let advice = heuristic_advice(&answers, &schedule);
        assert_eq!(advice.amount, 9500);
        assert_eq!(
            advice.reason,
            "Fallback estimate: low discipline, long workouts, high frequency, expensive previous program"
        );
    }

    #[test]
    fn test_heuristic_advice_without_signals() {
        let advice = heuristic_advice(&Answers::default(), &WeeklySchedule::default());
        assert_eq!(advice.amount, DEFAULT_DEPOSIT);
        assert_eq!(advice.reason, "Fallback estimate (model unavailable)");
    }

    #[test]
    fn test_answers_fill_in_question_order() {
        let mut answers = Answers::default();
        for (i, text) in ["strength", "beginner", "health", "6", "0"].into_iter().enumerate() {
            answers.set(i, text.to_string());
        }
        answers.set(QUESTIONS.len(), "ignored".to_string());
        assert_eq!(answers.goal, "strength");
        assert_eq!(answers.self_rate, "6");
        assert_eq!(answers.program_price, "0");
        assert_eq!(QUESTIONS.len(), 5);
    }
}
