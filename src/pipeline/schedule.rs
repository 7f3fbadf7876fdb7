//! Periodic refresh of the current season.
//!
//! - Weekly: recompute the current season's race winners
//! - Hourly: while the current season is open, drop and recompute its
//!   champion; disarms itself once the season has ended
//!
//! Only a startup synchronization pass re-arms the hourly job.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveTime, TimeDelta, Utc, Weekday};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::Result;
use crate::services::champions::{Lookup, SeasonChampionsService};
use crate::services::race_winners::RaceWinnersService;
use crate::utils::time::Clock;

/// Source of firing instants for a scheduled job.
#[async_trait]
pub trait Trigger: Send {
    /// Wait for the next firing. `false` means the trigger is exhausted.
    async fn next(&mut self) -> bool;
}

/// Fires every `period`, starting one period from now.
pub struct IntervalTrigger {
    interval: tokio::time::Interval,
}

impl IntervalTrigger {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl Trigger for IntervalTrigger {
    async fn next(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Fires once a week at a fixed UTC weekday and hour.
pub struct WeeklyTrigger {
    weekday: Weekday,
    hour: u32,
    clock: Arc<dyn Clock>,
}

impl WeeklyTrigger {
    pub fn new(weekday: Weekday, hour: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            weekday,
            hour,
            clock,
        }
    }
}

/// Next instant strictly after `now` falling on `weekday` at `hour`:00 UTC.
pub fn next_weekly(now: DateTime<Utc>, weekday: Weekday, hour: u32) -> DateTime<Utc> {
    let days_ahead = (i64::from(weekday.num_days_from_monday())
        - i64::from(now.weekday().num_days_from_monday()))
    .rem_euclid(7);
    let time = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
    let candidate = (now.date_naive() + TimeDelta::days(days_ahead))
        .and_time(time)
        .and_utc();

    if candidate <= now {
        candidate + TimeDelta::days(7)
    } else {
        candidate
    }
}

#[async_trait]
impl Trigger for WeeklyTrigger {
    async fn next(&mut self) -> bool {
        let now = self.clock.now();
        let target = next_weekly(now, self.weekday, self.hour);
        let wait = (target - now).to_std().unwrap_or_default();
        log::debug!("Weekly refresh due at {} (in {:?})", target, wait);
        tokio::time::sleep(wait).await;
        true
    }
}

/// Fires whenever its sender sends; exhausted when all senders drop.
pub struct ManualTrigger {
    rx: mpsc::Receiver<()>,
}

impl ManualTrigger {
    pub fn channel() -> (mpsc::Sender<()>, Self) {
        let (tx, rx) = mpsc::channel(8);
        (tx, Self { rx })
    }
}

#[async_trait]
impl Trigger for ManualTrigger {
    async fn next(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}

/// Whether the hourly job should run. Shared with the startup synchronizer.
#[derive(Debug, Clone, Default)]
pub struct RefreshArm(Arc<AtomicBool>);

impl RefreshArm {
    pub fn set(&self, armed: bool) {
        self.0.store(armed, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What one hourly run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HourlyRun {
    /// Not armed, nothing done
    Skipped,
    /// Recomputed, season still open
    StillOpen,
    /// Recomputed, season over; the job is now disarmed
    Finished,
    /// Upstream unavailable; stays armed
    Unavailable,
}

#[derive(Debug, Clone, Copy)]
enum Job {
    Weekly,
    Hourly,
}

/// Runs the weekly and hourly jobs on their triggers until stopped.
pub struct RefreshScheduler {
    race_winners: Arc<RaceWinnersService>,
    champions: Arc<SeasonChampionsService>,
    clock: Arc<dyn Clock>,
    arm: RefreshArm,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RefreshScheduler {
    pub fn new(
        race_winners: Arc<RaceWinnersService>,
        champions: Arc<SeasonChampionsService>,
        clock: Arc<dyn Clock>,
        arm: RefreshArm,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            race_winners,
            champions,
            clock,
            arm,
            shutdown,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn arm(&self) -> &RefreshArm {
        &self.arm
    }

    /// Recompute the current season's race winners.
    pub async fn run_weekly(&self) -> Result<bool> {
        let season = self.clock.current_year();
        log::info!("Weekly refresh of {} race winners", season);
        self.race_winners.refresh_race_winners(season).await
    }

    /// Drop and recompute the current champion if armed.
    pub async fn run_hourly(&self) -> Result<HourlyRun> {
        if !self.arm.is_armed() {
            log::debug!("Hourly refresh not armed, skipping");
            return Ok(HourlyRun::Skipped);
        }

        let year = self.clock.current_year();
        log::info!("Hourly refresh of {} champion", year);

        Ok(match self.champions.refresh_champion(year).await? {
            Lookup::Found(record) if record.is_season_ended => {
                self.arm.set(false);
                log::info!(
                    "Season {} is over ({}), hourly refresh disarmed",
                    year,
                    record.champion_name()
                );
                HourlyRun::Finished
            }
            Lookup::Found(_) => HourlyRun::StillOpen,
            Lookup::Unavailable => {
                log::warn!("Champion {} unavailable, will retry next hour", year);
                HourlyRun::Unavailable
            }
        })
    }

    /// Spawn one task per trigger.
    pub fn start(self: &Arc<Self>, weekly: Box<dyn Trigger>, hourly: Box<dyn Trigger>) {
        self.shutdown.send_replace(false);
        let handles = [
            self.spawn_job(Job::Weekly, weekly),
            self.spawn_job(Job::Hourly, hourly),
        ];
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(handles);
        log::info!("Refresh scheduler started");
    }

    /// Signal shutdown and wait for running jobs to finish.
    pub async fn stop(&self) {
        self.shutdown.send_replace(true);
        let handles = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|e| e.into_inner()));
        for handle in handles {
            if let Err(e) = handle.await {
                log::error!("Scheduler task ended abnormally: {}", e);
            }
        }
        log::info!("Refresh scheduler stopped");
    }

    fn spawn_job(self: &Arc<Self>, job: Job, mut trigger: Box<dyn Trigger>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    fired = trigger.next() => {
                        if !fired {
                            break;
                        }
                        this.run_job(job).await;
                    }
                }
                if *shutdown.borrow() {
                    break;
                }
            }
            log::debug!("{:?} job loop exited", job);
        })
    }

    async fn run_job(&self, job: Job) {
        let result = match job {
            Job::Weekly => self.run_weekly().await.map(|_| ()),
            Job::Hourly => self.run_hourly().await.map(|_| ()),
        };
        if let Err(e) = result {
            log::error!("{:?} refresh failed: {}", job, e);
        }
    }
}
