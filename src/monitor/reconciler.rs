use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, FixedOffset, LocalResult, NaiveTime, TimeZone, Timelike, Utc};
use log::warn;
use tokio::sync::Mutex;

use crate::db::Database;
use crate::device::ScheduleSource;
use crate::models::{MedicationEvent, MedicineCompartment, ScheduleSlot};
use crate::notify::NotificationSink;

use super::state::{MonitorSnapshot, MonitorState};

/// Bridges the polled device schedule and the local medication history.
///
/// Each pass fetches the schedule, finds slots whose time arrived since the
/// previous successful pass, and records an unconfirmed dose per slot, at
/// most one per compartment, calendar day, and slot time. The watermark
/// of the last successful pass only advances when a pass completes, so a
/// failed fetch simply widens the window for the next tick.
pub struct ScheduleMonitor {
    source: Arc<dyn ScheduleSource>,
    sink: Arc<dyn NotificationSink>,
    db: Database,
    state: Mutex<MonitorState>,
    tz_offset: FixedOffset,
    medicine_names: Vec<String>,
}

impl ScheduleMonitor {
    pub fn new(
        source: Arc<dyn ScheduleSource>,
        sink: Arc<dyn NotificationSink>,
        db: Database,
        tz_offset: FixedOffset,
        medicine_names: Vec<String>,
    ) -> Self {
        Self {
            source,
            sink,
            db,
            state: Mutex::new(MonitorState::default()),
            tz_offset,
            medicine_names,
        }
    }

    /// One reconciliation pass against the device schedule.
    ///
    /// Returns the number of newly recorded doses. A fetch error aborts the
    /// pass with nothing mutated; a storage error aborts it mid-scan, in
    /// which case already-inserted events stay in history (append-only) but
    /// the watermark and alerts are untouched and the next tick retries.
    pub async fn poll_once(&self, now: DateTime<Utc>) -> Result<usize> {
        let slots = self
            .source
            .fetch_schedule()
            .await
            .context("schedule fetch failed")?;

        let last_poll = self.state.lock().await.last_poll_time;

        let mut created = Vec::new();
        for (index, slot) in slots.iter().enumerate() {
            let number = index as u32 + 1;
            if !slot.active {
                continue;
            }

            let Some(scheduled) = scheduled_instant(slot, now, self.tz_offset) else {
                warn!(
                    "skipping malformed slot {:02}:{:02} for compartment {number}",
                    slot.hour, slot.minute
                );
                continue;
            };

            // Only slot times that arrived since the previous pass count;
            // the upper bound is inclusive.
            if scheduled > now {
                continue;
            }
            if let Some(mark) = last_poll {
                if scheduled <= mark {
                    continue;
                }
            }

            if self.slot_already_recorded(number, scheduled).await? {
                continue;
            }

            let event = MedicationEvent::pending(
                number,
                medicine_name_for(&self.medicine_names, number),
                scheduled,
                slot.pills,
                now,
            );
            self.db
                .insert_event(&event)
                .await
                .context("failed to record pending medication event")?;
            self.sink.notify(&event);
            created.push(event);
        }

        let compartments = build_compartments(&slots, &self.medicine_names);

        // Terminal commit: alerts, the compartment snapshot, and the poll
        // watermark move together or not at all.
        let mut state = self.state.lock().await;
        state.alerts.extend(created.iter().cloned());
        state.compartments = compartments;
        state.last_poll_time = Some(now);

        Ok(created.len())
    }

    /// History membership check for one (compartment, day, hour, minute).
    async fn slot_already_recorded(
        &self,
        compartment_number: u32,
        scheduled: DateTime<Utc>,
    ) -> Result<bool> {
        let Some((start, end)) = local_day_bounds(scheduled, self.tz_offset) else {
            return Ok(false);
        };

        let local = scheduled.with_timezone(&self.tz_offset);
        let events = self
            .db
            .events_for_compartment_in_range(compartment_number, start, end)
            .await?;

        Ok(events.iter().any(|event| {
            let event_local = event.scheduled_time.with_timezone(&self.tz_offset);
            event_local.hour() == local.hour() && event_local.minute() == local.minute()
        }))
    }

    /// Confirms an intake: Pending → Taken with the confirmation time and a
    /// single pill, and clears the matching alert. Events in any other
    /// status are rejected.
    pub async fn mark_taken(&self, event_id: &str, now: DateTime<Utc>) -> Result<MedicationEvent> {
        self.db.mark_event_taken(event_id, now, now).await?;
        let event = self.db.get_event(event_id).await?;

        let mut state = self.state.lock().await;
        state.alerts.retain(|alert| alert.id != event_id);

        Ok(event)
    }

    /// Drops an alert without confirming the dose; the history entry stays
    /// pending.
    pub async fn dismiss_alert(&self, event_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let before = state.alerts.len();
        state.alerts.retain(|alert| alert.id != event_id);
        if state.alerts.len() == before {
            bail!("no active alert with id {event_id}");
        }
        Ok(())
    }

    pub async fn snapshot(&self) -> MonitorSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn alerts(&self) -> Vec<MedicationEvent> {
        self.state.lock().await.alerts.clone()
    }

    pub async fn compartments(&self) -> Vec<MedicineCompartment> {
        self.state.lock().await.compartments.clone()
    }

    pub async fn last_poll_time(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.last_poll_time
    }

    pub async fn history(&self, limit: u32) -> Result<Vec<MedicationEvent>> {
        self.db.recent_events(limit).await
    }
}

/// Today's dispense instant for a slot, in the configured device timezone.
/// `None` for out-of-range hour/minute.
fn scheduled_instant(
    slot: &ScheduleSlot,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Option<DateTime<Utc>> {
    let time = NaiveTime::from_hms_opt(u32::from(slot.hour), u32::from(slot.minute), 0)?;
    let local_day = now.with_timezone(&offset).date_naive();
    match offset.from_local_datetime(&local_day.and_time(time)) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        _ => None,
    }
}

/// UTC bounds of the local calendar day containing `scheduled`.
fn local_day_bounds(
    scheduled: DateTime<Utc>,
    offset: FixedOffset,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let midnight = scheduled
        .with_timezone(&offset)
        .date_naive()
        .and_hms_opt(0, 0, 0)?;
    match offset.from_local_datetime(&midnight) {
        LocalResult::Single(start) => {
            let start = start.with_timezone(&Utc);
            Some((start, start + Duration::days(1)))
        }
        _ => None,
    }
}

fn medicine_name_for(names: &[String], compartment_number: u32) -> String {
    names
        .get(compartment_number.saturating_sub(1) as usize)
        .filter(|name| !name.is_empty())
        .cloned()
        .unwrap_or_else(|| format!("Medicine {compartment_number}"))
}

fn build_compartments(slots: &[ScheduleSlot], names: &[String]) -> Vec<MedicineCompartment> {
    slots
        .iter()
        .enumerate()
        .map(|(index, slot)| {
            let number = index as u32 + 1;
            MedicineCompartment {
                number,
                medicine_name: medicine_name_for(names, number),
                pill_count: slot.pills,
                slot: slot.clone(),
            }
        })
        .collect()
}
