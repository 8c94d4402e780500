use crate::database::{connection::DatabaseManager, models::User};
use crate::domain::{Phase, Trigger, WeeklySchedule};
use crate::services::workout::{WindowRecovery, WorkoutService};
use crate::utils::logging::log_system_event;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Daily re-registration, in UTC. Cron jobs carry a fixed UTC offset, so
/// this keeps them on local time across clock changes.
const REFRESH_CRON: &str = "0 5 0 * * *";

/// Per-user cron jobs for the start, midpoint and end of every scheduled
/// workout, plus one-shot timeouts after the end prompt.
#[derive(Clone)]
pub struct ReminderService {
    scheduler: JobScheduler,
    workouts: Arc<WorkoutService>,
    db: Arc<DatabaseManager>,
    timezone: Tz,
    grace: Duration,
    jobs: Arc<Mutex<HashMap<i64, Vec<Uuid>>>>,
}

impl ReminderService {
    pub async fn new(
        workouts: Arc<WorkoutService>,
        db: Arc<DatabaseManager>,
        timezone: Tz,
        grace_minutes: u32,
    ) -> Result<Self, BoxError> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            workouts,
            db,
            timezone,
            grace: Duration::from_secs(u64::from(grace_minutes) * 60),
            jobs: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub async fn start(&self) -> Result<(), BoxError> {
        let service = self.clone();
        let refresh = Job::new_async(REFRESH_CRON, move |_uuid, _l| {
            let service = service.clone();
            Box::pin(async move {
                if let Err(e) = service.reschedule_all().await {
                    tracing::error!("Daily reminder refresh failed: {}", e);
                }
            })
        })?;
        self.scheduler.add(refresh).await?;
        self.scheduler.start().await?;
        log_system_event("Reminder scheduler started", Some(&format!("timezone {}", self.timezone)));
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), BoxError> {
        let mut scheduler = self.scheduler.clone();
        scheduler.shutdown().await?;
        Ok(())
    }

    /// Replaces the user's jobs with three per scheduled day.
    pub async fn schedule_user(&self, user_id: i64, schedule: &WeeklySchedule) -> Result<usize, BoxError> {
        self.unschedule_user(user_id).await?;

        let now = Utc::now();
        let mut ids = Vec::new();
        for trigger in schedule.triggers() {
            let job = self.trigger_job(user_id, trigger, now)?;
            ids.push(self.scheduler.add(job).await?);
        }

        let count = ids.len();
        self.jobs.lock().await.insert(user_id, ids);
        tracing::info!("Scheduled {} reminder jobs for user {}", count, user_id);
        Ok(count)
    }

    pub async fn unschedule_user(&self, user_id: i64) -> Result<(), BoxError> {
        let ids = self.jobs.lock().await.remove(&user_id).unwrap_or_default();
        for id in &ids {
            self.scheduler.remove(id).await?;
        }
        if !ids.is_empty() {
            tracing::debug!("Removed {} reminder jobs for user {}", ids.len(), user_id);
        }
        Ok(())
    }

    pub async fn unschedule_all(&self) -> Result<(), BoxError> {
        let all: Vec<(i64, Vec<Uuid>)> = self.jobs.lock().await.drain().collect();
        for (_, ids) in all {
            for id in &ids {
                self.scheduler.remove(id).await?;
            }
        }
        Ok(())
    }

    /// Registers every onboarded user with an active deposit, after closing
    /// or re-arming windows left open by a previous run. Runs at startup and
    /// once a day.
    pub async fn reschedule_all(&self) -> Result<usize, BoxError> {
        let users = User::all(&self.db.pool).await?;
        let mut scheduled = 0;
        for user in users {
            let mut profile = user.profile();
            if profile.active_window.is_some() {
                self.recover_window(user.user_id).await;
                profile = User::load_profile(&self.db.pool, user.user_id)
                    .await?
                    .unwrap_or_default();
            }
            if !profile.is_onboarded() || !profile.has_active_deposit() {
                self.unschedule_user(user.user_id).await?;
                continue;
            }
            match self.schedule_user(user.user_id, &profile.schedule).await {
                Ok(_) => scheduled += 1,
                Err(e) => tracing::error!("Failed to schedule reminders for user {}: {}", user.user_id, e),
            }
        }
        log_system_event("Reminders restored", Some(&format!("{scheduled} users")));
        Ok(scheduled)
    }

    pub async fn scheduled_users(&self) -> usize {
        self.jobs.lock().await.len()
    }

    /// Next fire time of each of the user's reminder jobs, earliest first.
    pub async fn next_runs(&self, user_id: i64) -> Result<Vec<DateTime<Utc>>, BoxError> {
        let ids = self.jobs.lock().await.get(&user_id).cloned().unwrap_or_default();
        let mut scheduler = self.scheduler.clone();
        let mut runs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(at) = scheduler.next_tick_for_job(id).await? {
                runs.push(at);
            }
        }
        runs.sort();
        Ok(runs)
    }

    async fn recover_window(&self, user_id: i64) {
        match self.workouts.recover_window(user_id).await {
            Ok(WindowRecovery::Settled(settlement)) => {
                tracing::info!(
                    "Settled capture window of user {} from {} left open before restart",
                    user_id,
                    settlement.outcome.date
                );
            }
            Ok(WindowRecovery::Pending { date, remaining }) => {
                if let Err(e) = self.schedule_timeout(user_id, date, remaining).await {
                    tracing::error!("Failed to re-arm timeout for user {}: {}", user_id, e);
                }
            }
            Ok(WindowRecovery::Idle) => {}
            Err(e) => tracing::error!("Failed to recover capture window of user {}: {}", user_id, e),
        }
    }

    /// Settles the window of `date` once `delay` has passed, if still open.
    pub async fn schedule_timeout(&self, user_id: i64, date: NaiveDate, delay: Duration) -> Result<Uuid, BoxError> {
        add_timeout_job(&self.scheduler, self.workouts.clone(), user_id, date, delay).await
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    fn trigger_job(&self, user_id: i64, trigger: Trigger, now: DateTime<Utc>) -> Result<Job, BoxError> {
        let workouts = self.workouts.clone();
        let scheduler = self.scheduler.clone();
        let grace = self.grace;
        let cron = trigger.utc_cron(self.timezone, now).ok_or_else(|| {
            format!(
                "no upcoming {} {} in {}",
                trigger.day,
                trigger.time.format("%H:%M"),
                self.timezone
            )
        })?;

        let job = Job::new_async(cron.as_str(), move |_uuid, _l| {
            let workouts = workouts.clone();
            let scheduler = scheduler.clone();
            Box::pin(async move {
                tracing::debug!("{} trigger fired for user {}", trigger.phase.label(), user_id);
                match trigger.phase {
                    Phase::Start => {
                        if let Err(e) = workouts.open_window(user_id, Some(trigger.workout_day)).await {
                            tracing::error!("Failed to open capture window for user {}: {}", user_id, e);
                        }
                    }
                    Phase::Mid => {
                        if let Err(e) = workouts.midpoint(user_id).await {
                            tracing::error!("Midpoint check failed for user {}: {}", user_id, e);
                        }
                    }
                    Phase::End => match workouts.final_call(user_id).await {
                        Ok(Some(date)) => {
                            if let Err(e) = add_timeout_job(&scheduler, workouts.clone(), user_id, date, grace).await {
                                tracing::error!("Failed to arm timeout for user {}: {}", user_id, e);
                            }
                        }
                        Ok(None) => {}
                        Err(e) => tracing::error!("Final call failed for user {}: {}", user_id, e),
                    },
                }
            })
        })?;
        Ok(job)
    }
}

async fn add_timeout_job(
    scheduler: &JobScheduler,
    workouts: Arc<WorkoutService>,
    user_id: i64,
    date: NaiveDate,
    delay: Duration,
) -> Result<Uuid, BoxError> {
    let job = Job::new_one_shot_async(delay, move |_uuid, _l| {
        let workouts = workouts.clone();
        Box::pin(async move {
            if let Err(e) = workouts.timeout_window(user_id, date).await {
                tracing::error!("Timeout settlement failed for user {}: {}", user_id, e);
            }
        })
    })?;
    Ok(scheduler.add(job).await?)
}
