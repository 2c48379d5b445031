//! One read model per household: the rotation schedule derived from its
//! configured members and chores, next to the live task board.

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::board::BoardSnapshot;
use crate::config::HouseholdConfig;
use crate::rotation::{self, ChoreEvent, NextChoreDetail, RotationPlan};
use crate::store::TaskBoardStore;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Profile {
    name: String,
    members: Vec<String>,
    chores: Vec<String>,
}

struct CachedEvents {
    refreshed_at: DateTime<Utc>,
    events: Arc<Vec<ChoreEvent>>,
}

/// Everything a status page needs about one household.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HouseholdOverview {
    pub household: String,
    pub name: String,
    pub members: Vec<String>,
    pub chores: Vec<String>,
    pub next: Option<NextChoreDetail>,
    pub board: BoardSnapshot,
}

pub struct HouseholdView {
    id: String,
    profile: RwLock<Profile>,
    plan: RotationPlan,
    refresh_interval: Duration,
    cache: RwLock<Option<CachedEvents>>,
    board: Arc<TaskBoardStore>,
}

impl HouseholdView {
    pub fn new(
        config: &HouseholdConfig,
        plan: RotationPlan,
        refresh_interval: Duration,
        board: Arc<TaskBoardStore>,
    ) -> Self {
        Self {
            id: config.id.clone(),
            profile: RwLock::new(Profile {
                name: config.name.clone(),
                members: config.members.clone(),
                chores: config.chores.clone(),
            }),
            plan,
            refresh_interval,
            cache: RwLock::new(None),
            board,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> String {
        self.profile.read().name.clone()
    }

    pub fn members(&self) -> Vec<String> {
        self.profile.read().members.clone()
    }

    pub fn chores(&self) -> Vec<String> {
        self.profile.read().chores.clone()
    }

    pub fn plan(&self) -> &RotationPlan {
        &self.plan
    }

    pub fn board(&self) -> &Arc<TaskBoardStore> {
        &self.board
    }

    pub fn board_snapshot(&self) -> BoardSnapshot {
        self.board.snapshot()
    }

    /// New name, members and chores; the cached schedule is dropped.
    pub fn reconfigure(&self, config: &HouseholdConfig) {
        *self.profile.write() = Profile {
            name: config.name.clone(),
            members: config.members.clone(),
            chores: config.chores.clone(),
        };
        *self.cache.write() = None;
        debug!("household {} reconfigured", self.id);
    }

    /// Cached events, recomputed when older than the refresh interval.
    pub fn events<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Arc<Vec<ChoreEvent>> {
        let now_utc = now.with_timezone(&Utc);
        if let Some(cached) = self.cache.read().as_ref() {
            let age = now_utc.signed_duration_since(cached.refreshed_at);
            if age >= Duration::zero() && age < self.refresh_interval {
                return Arc::clone(&cached.events);
            }
        }
        self.refresh(now)
    }

    /// Recompute the schedule with `now` as the reference time.
    pub fn refresh<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Arc<Vec<ChoreEvent>> {
        let events = {
            let profile = self.profile.read();
            Arc::new(self.plan.generate(&profile.members, &profile.chores, now))
        };
        *self.cache.write() = Some(CachedEvents {
            refreshed_at: now.with_timezone(&Utc),
            events: Arc::clone(&events),
        });
        debug!("household {}: {} events scheduled", self.id, events.len());
        events
    }

    pub fn next_event<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<ChoreEvent> {
        let events = self.events(now);
        rotation::next_event(&events, now).cloned()
    }

    pub fn events_in_range<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        start: &DateTime<Tz>,
        end: &DateTime<Tz>,
    ) -> Vec<ChoreEvent> {
        rotation::events_in_range(&self.events(now), start, end)
    }

    pub fn next_chore_summary<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<String> {
        self.next_event(now).map(|event| event.summary)
    }

    pub fn next_chore_detail<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<NextChoreDetail> {
        self.next_event(now).map(|event| event.detail())
    }

    pub fn overview<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> HouseholdOverview {
        let profile = self.profile.read().clone();
        HouseholdOverview {
            household: self.id.clone(),
            name: profile.name,
            members: profile.members,
            chores: profile.chores,
            next: self.next_chore_detail(now),
            board: self.board.snapshot(),
        }
    }
}
