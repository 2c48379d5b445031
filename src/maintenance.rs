//! Nightly cleanup and weekly refresh across every registered board.
//!
//! [`MaintenanceService`] is process-scoped and reference-counted by the
//! boards that use it: the first [`acquire`](MaintenanceService::acquire)
//! spawns both timer jobs, the matching last
//! [`release`](MaintenanceService::release) cancels them.

use chrono::{DateTime, Local, NaiveTime, TimeZone, Weekday};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::calendar;
use crate::error::{BoardError, BoardResult, MaintenanceError};
use crate::registry::BoardDirectory;
use crate::store::TaskBoardStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceSchedule {
    pub cleanup_time: NaiveTime,
    pub refresh_weekday: Weekday,
    pub refresh_time: NaiveTime,
}

impl Default for MaintenanceSchedule {
    fn default() -> Self {
        Self {
            cleanup_time: NaiveTime::from_hms_opt(3, 0, 0).unwrap_or(NaiveTime::MIN),
            refresh_weekday: Weekday::Mon,
            refresh_time: NaiveTime::from_hms_opt(0, 30, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceJob {
    NightlyCleanup,
    WeeklyRefresh,
}

impl MaintenanceJob {
    pub const ALL: [MaintenanceJob; 2] = [
        MaintenanceJob::NightlyCleanup,
        MaintenanceJob::WeeklyRefresh,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MaintenanceJob::NightlyCleanup => "nightly cleanup",
            MaintenanceJob::WeeklyRefresh => "weekly refresh",
        }
    }

    pub fn next_fire<Tz: TimeZone>(
        &self,
        schedule: &MaintenanceSchedule,
        now: &DateTime<Tz>,
    ) -> DateTime<Tz> {
        match self {
            MaintenanceJob::NightlyCleanup => calendar::next_daily(now, schedule.cleanup_time),
            MaintenanceJob::WeeklyRefresh => {
                calendar::next_weekly(now, schedule.refresh_weekday, schedule.refresh_time)
            }
        }
    }

    /// One pass over every board, using the local clock.
    pub fn run(&self, boards: &BoardDirectory) -> MaintenanceReport {
        match self {
            MaintenanceJob::NightlyCleanup => run_nightly_cleanup(boards),
            MaintenanceJob::WeeklyRefresh => run_weekly_refresh(boards, &Local::now()),
        }
    }
}

/// What one pass did. `total` is tasks removed (cleanup) or created (refresh).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub job: MaintenanceJob,
    pub visited: usize,
    pub total: usize,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

impl MaintenanceReport {
    fn new(job: MaintenanceJob) -> Self {
        Self {
            job,
            visited: 0,
            total: 0,
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }

    fn log(&self) {
        match self.job {
            MaintenanceJob::NightlyCleanup if self.total > 0 => {
                info!("nightly cleanup removed {} done tasks", self.total)
            }
            MaintenanceJob::NightlyCleanup => debug!("nightly cleanup found no done tasks"),
            MaintenanceJob::WeeklyRefresh => {
                info!("weekly refresh rebuilt {} tasks", self.total)
            }
        }
        if !self.failed.is_empty() {
            warn!(
                "{} failed on {} board(s): {}",
                self.job.name(),
                self.failed.len(),
                self.failed.join(", ")
            );
        }
    }
}

pub fn run_nightly_cleanup(boards: &BoardDirectory) -> MaintenanceReport {
    run_pass(MaintenanceJob::NightlyCleanup, boards, |store| {
        store.remove_done_tasks()
    })
}

pub fn run_weekly_refresh<Tz: TimeZone>(
    boards: &BoardDirectory,
    now: &DateTime<Tz>,
) -> MaintenanceReport {
    run_pass(MaintenanceJob::WeeklyRefresh, boards, |store| {
        store.weekly_refresh_at(now)
    })
}

/// Visit boards one by one. A board removed mid-pass is skipped and a failing
/// board counts as zero; neither stops the pass.
fn run_pass(
    job: MaintenanceJob,
    boards: &BoardDirectory,
    op: impl Fn(&TaskBoardStore) -> BoardResult<usize>,
) -> MaintenanceReport {
    let mut report = MaintenanceReport::new(job);
    for board_id in boards.ids() {
        let Some(store) = boards.get(&board_id) else {
            report.skipped.push(board_id);
            continue;
        };
        report.visited += 1;
        match op(&store) {
            Ok(count) => report.total += count,
            Err(BoardError::Removed(_)) => {
                debug!("{}: board {board_id} was removed, skipping", job.name());
                report.skipped.push(board_id);
            }
            Err(err) => {
                warn!("{} failed for board {board_id}: {err}", job.name());
                report.failed.push(board_id);
            }
        }
    }
    report
}

enum Lifecycle {
    Stopped,
    Running {
        holders: usize,
        jobs: Vec<JoinHandle<()>>,
    },
}

pub struct MaintenanceService {
    boards: Arc<BoardDirectory>,
    schedule: MaintenanceSchedule,
    lifecycle: Mutex<Lifecycle>,
    starts: AtomicU64,
}

impl MaintenanceService {
    pub fn new(boards: Arc<BoardDirectory>, schedule: MaintenanceSchedule) -> Self {
        Self {
            boards,
            schedule,
            lifecycle: Mutex::new(Lifecycle::Stopped),
            starts: AtomicU64::new(0),
        }
    }

    pub fn schedule(&self) -> &MaintenanceSchedule {
        &self.schedule
    }

    /// Register one more board; the first registration starts the jobs.
    /// Must be called from inside a tokio runtime.
    pub fn acquire(&self) -> Result<(), MaintenanceError> {
        let mut lifecycle = self.lifecycle.lock();
        if let Lifecycle::Running { holders, .. } = &mut *lifecycle {
            *holders += 1;
            return Ok(());
        }

        let jobs = self.spawn_jobs()?;
        self.starts.fetch_add(1, Ordering::SeqCst);
        info!(
            "maintenance started: cleanup daily at {}, refresh {} at {}",
            self.schedule.cleanup_time, self.schedule.refresh_weekday, self.schedule.refresh_time
        );
        *lifecycle = Lifecycle::Running { holders: 1, jobs };
        Ok(())
    }

    /// Drop one board's registration; the last one cancels the jobs.
    pub fn release(&self) {
        let mut lifecycle = self.lifecycle.lock();
        match &mut *lifecycle {
            Lifecycle::Stopped => {
                debug!("maintenance release without a matching acquire");
                return;
            }
            Lifecycle::Running { holders, .. } if *holders > 1 => {
                *holders -= 1;
                return;
            }
            Lifecycle::Running { .. } => {}
        }

        let previous = std::mem::replace(&mut *lifecycle, Lifecycle::Stopped);
        if let Lifecycle::Running { jobs, .. } = previous {
            for job in jobs {
                job.abort();
            }
        }
        info!("maintenance stopped");
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Running { .. })
    }

    pub fn holders(&self) -> usize {
        match &*self.lifecycle.lock() {
            Lifecycle::Stopped => 0,
            Lifecycle::Running { holders, .. } => *holders,
        }
    }

    /// How many times the jobs have been started over the service's life.
    pub fn start_count(&self) -> u64 {
        self.starts.load(Ordering::SeqCst)
    }

    fn spawn_jobs(&self) -> Result<Vec<JoinHandle<()>>, MaintenanceError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| MaintenanceError::NoRuntime)?;
        Ok(MaintenanceJob::ALL
            .into_iter()
            .map(|job| {
                runtime.spawn(run_job(
                    job,
                    self.schedule.clone(),
                    Arc::clone(&self.boards),
                ))
            })
            .collect())
    }
}

impl Drop for MaintenanceService {
    fn drop(&mut self) {
        if let Lifecycle::Running { jobs, .. } = self.lifecycle.get_mut() {
            for job in jobs.iter() {
                job.abort();
            }
        }
    }
}

async fn run_job(
    job: MaintenanceJob,
    schedule: MaintenanceSchedule,
    boards: Arc<BoardDirectory>,
) {
    loop {
        let now = Local::now();
        let next = job.next_fire(&schedule, &now);
        let wait = next
            .signed_duration_since(now)
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);
        debug!("{} scheduled for {next}", job.name());
        tokio::time::sleep(wait).await;

        let boards = Arc::clone(&boards);
        match tokio::task::spawn_blocking(move || job.run(&boards)).await {
            Ok(report) => report.log(),
            Err(err) => error!("{} pass aborted: {err}", job.name()),
        }
    }
}
