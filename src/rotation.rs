//! Rotating weekly chore schedule.
//!
//! Chores are spread over the days of the week by their position in the
//! chore list and handed to members round-robin, with the whole pattern
//! shifting by one member every week. Over `members.len()` consecutive weeks
//! every member covers every chore exactly once.

use chrono::{DateTime, Days, Duration, FixedOffset, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::calendar;

pub const DEFAULT_HORIZON_WEEKS: u32 = 8;
pub const DEFAULT_CHORE_DURATION_MINUTES: i64 = 30;
/// Ten years of weeks; longer horizons are clamped to this.
pub const MAX_HORIZON_WEEKS: u32 = 520;
const DAYS_PER_WEEK: usize = 7;

/// One computed chore occurrence. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoreEvent {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub summary: String,
    pub chore: String,
    pub member: String,
}

impl ChoreEvent {
    pub fn description(&self) -> String {
        format!("Chore: {}\nAssigned to: {}", self.chore, self.member)
    }

    pub fn location(&self) -> &'static str {
        "Home"
    }

    pub fn detail(&self) -> NextChoreDetail {
        NextChoreDetail {
            chore: self.chore.clone(),
            member: self.member.clone(),
            start: self.start,
            end: self.end,
        }
    }
}

/// Status-facing view of a single event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextChoreDetail {
    pub chore: String,
    pub member: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPlan {
    pub chore_time: NaiveTime,
    pub duration: Duration,
    pub horizon_weeks: u32,
}

impl Default for RotationPlan {
    fn default() -> Self {
        Self {
            chore_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN),
            duration: Duration::minutes(DEFAULT_CHORE_DURATION_MINUTES),
            horizon_weeks: DEFAULT_HORIZON_WEEKS,
        }
    }
}

impl RotationPlan {
    pub fn with_horizon(mut self, weeks: u32) -> Self {
        self.horizon_weeks = weeks;
        self
    }

    /// Events for `horizon_weeks` weeks starting with the week of `reference`,
    /// localized in the reference time's own zone and sorted by start.
    ///
    /// The horizon is clamped to [`MAX_HORIZON_WEEKS`], and generation stops
    /// early at the end of the representable calendar.
    pub fn generate<Tz: TimeZone>(
        &self,
        members: &[String],
        chores: &[String],
        reference: &DateTime<Tz>,
    ) -> Vec<ChoreEvent> {
        if members.is_empty() || chores.is_empty() {
            return Vec::new();
        }

        let tz = reference.timezone();
        let anchor = calendar::week_start(reference.date_naive());
        let weeks = self.horizon_weeks.min(MAX_HORIZON_WEEKS) as usize;
        let mut events = Vec::with_capacity(weeks * chores.len());

        'weeks: for week_offset in 0..weeks {
            let offset = Days::new((week_offset * DAYS_PER_WEEK) as u64);
            let Some(week) = anchor.checked_add_days(offset) else {
                break;
            };
            for (chore_index, chore) in chores.iter().enumerate() {
                // Each day is localized on its own so DST shifts never leak
                // into the wall-clock time of later events.
                let offset = Days::new((chore_index % DAYS_PER_WEEK) as u64);
                let Some(day) = week.checked_add_days(offset) else {
                    break 'weeks;
                };
                let start = calendar::localize(&tz, day, self.chore_time).fixed_offset();
                let Some(end) = start.checked_add_signed(self.duration) else {
                    break 'weeks;
                };
                let member = &members[assigned_member(week_offset, chore_index, members.len())];
                events.push(ChoreEvent {
                    start,
                    end,
                    summary: format!("{chore} - {member}"),
                    chore: chore.clone(),
                    member: member.clone(),
                });
            }
        }

        events.sort_by_key(|event| event.start);
        events
    }
}

/// Index of the member who owns chore `chore_index` in week `week_offset`.
pub fn assigned_member(week_offset: usize, chore_index: usize, member_count: usize) -> usize {
    (week_offset + chore_index) % member_count
}

/// Rotation with the default chore time and duration.
pub fn generate<Tz: TimeZone>(
    members: &[String],
    chores: &[String],
    reference: &DateTime<Tz>,
    horizon_weeks: u32,
) -> Vec<ChoreEvent> {
    RotationPlan::default()
        .with_horizon(horizon_weeks)
        .generate(members, chores, reference)
}

/// First event that has not finished by `now`.
pub fn next_event<'a, Tz: TimeZone>(
    events: &'a [ChoreEvent],
    now: &DateTime<Tz>,
) -> Option<&'a ChoreEvent> {
    events.iter().find(|event| event.end >= *now)
}

/// Events whose interval overlaps `[start, end]`.
pub fn events_in_range<Tz: TimeZone>(
    events: &[ChoreEvent],
    start: &DateTime<Tz>,
    end: &DateTime<Tz>,
) -> Vec<ChoreEvent> {
    events
        .iter()
        .filter(|event| event.start <= *end && event.end >= *start)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_shifts_one_member_per_week() {
        assert_eq!(assigned_member(0, 0, 3), 0);
        assert_eq!(assigned_member(1, 0, 3), 1);
        assert_eq!(assigned_member(2, 2, 3), 1);
    }

    #[test]
    fn description_names_chore_and_member() {
        let start = DateTime::parse_from_rfc3339("2025-01-06T18:00:00+00:00").unwrap();
        let event = ChoreEvent {
            start,
            end: start + Duration::minutes(30),
            summary: "Laundry - Sam".into(),
            chore: "Laundry".into(),
            member: "Sam".into(),
        };
        assert_eq!(event.description(), "Chore: Laundry\nAssigned to: Sam");
        assert_eq!(event.location(), "Home");
    }

    #[test]
    fn oversized_horizon_is_clamped() {
        let members = vec!["Sam".to_string()];
        let chores = vec!["Dishes".to_string()];
        let reference = DateTime::parse_from_rfc3339("2025-01-08T12:00:00+00:00").unwrap();

        let events = RotationPlan::default()
            .with_horizon(u32::MAX)
            .generate(&members, &chores, &reference);

        assert_eq!(events.len(), MAX_HORIZON_WEEKS as usize);
    }

    #[test]
    fn generation_stops_at_the_end_of_the_calendar() {
        let members = vec!["Sam".to_string()];
        let chores = vec!["Dishes".to_string()];
        let last_week = chrono::NaiveDate::MAX - Days::new(10);
        let reference = last_week
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc()
            .fixed_offset();

        let events = RotationPlan::default()
            .with_horizon(MAX_HORIZON_WEEKS)
            .generate(&members, &chores, &reference);

        assert!(!events.is_empty());
        assert!(events.len() <= 2);
    }
}
