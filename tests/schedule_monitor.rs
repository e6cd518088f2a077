//! Reconciliation behavior of the schedule monitor against a fake device.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use reqwest::StatusCode;

use dispenser_agent::{
    ApiError, Database, MedicationEvent, MedicationStatus, MonitorController, NotificationSink,
    ScheduleMonitor, ScheduleSlot, ScheduleSource,
};

struct FakeSource {
    slots: Mutex<Vec<ScheduleSlot>>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl FakeSource {
    fn new(slots: Vec<ScheduleSlot>) -> Self {
        Self {
            slots: Mutex::new(slots),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ScheduleSource for FakeSource {
    async fn fetch_schedule(&self) -> Result<Vec<ScheduleSlot>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ApiError::InvalidResponse(StatusCode::INTERNAL_SERVER_ERROR));
        }
        Ok(self.slots.lock().unwrap().clone())
    }
}

struct RecordingSink {
    notified: Mutex<Vec<MedicationEvent>>,
}

impl RecordingSink {
    fn new() -> Self {
        Self {
            notified: Mutex::new(Vec::new()),
        }
    }

    fn count(&self) -> usize {
        self.notified.lock().unwrap().len()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, event: &MedicationEvent) {
        self.notified.lock().unwrap().push(event.clone());
    }
}

struct Harness {
    monitor: Arc<ScheduleMonitor>,
    source: Arc<FakeSource>,
    sink: Arc<RecordingSink>,
    db: Database,
    _dir: tempfile::TempDir,
}

fn harness_with_names(slots: Vec<ScheduleSlot>, names: Vec<String>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("history.db")).unwrap();
    let source = Arc::new(FakeSource::new(slots));
    let sink = Arc::new(RecordingSink::new());
    let monitor = Arc::new(ScheduleMonitor::new(
        source.clone(),
        sink.clone(),
        db.clone(),
        FixedOffset::east_opt(0).unwrap(),
        names,
    ));

    Harness {
        monitor,
        source,
        sink,
        db,
        _dir: dir,
    }
}

fn harness(slots: Vec<ScheduleSlot>) -> Harness {
    harness_with_names(slots, Vec::new())
}

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, hour, minute, 0).unwrap()
}

#[tokio::test]
async fn records_one_pending_event_per_elapsed_slot() {
    let h = harness(vec![
        ScheduleSlot::new(7, 0, 2),
        ScheduleSlot::new(8, 0, 1),
        ScheduleSlot::new(9, 30, 3),
    ]);

    let created = h.monitor.poll_once(at(10, 0)).await.unwrap();
    assert_eq!(created, 3);

    let alerts = h.monitor.alerts().await;
    assert_eq!(alerts.len(), 3);
    assert!(alerts
        .iter()
        .all(|event| event.status == MedicationStatus::Pending));
    assert_eq!(h.sink.count(), 3);
    assert_eq!(h.monitor.last_poll_time().await, Some(at(10, 0)));

    let history = h.db.recent_events(10).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].scheduled_time, at(9, 30));
    assert_eq!(history[0].pills_taken, 3);
}

#[tokio::test]
async fn second_pass_past_the_watermark_adds_nothing() {
    let h = harness(vec![ScheduleSlot::new(8, 0, 1)]);

    assert_eq!(h.monitor.poll_once(at(8, 5)).await.unwrap(), 1);
    assert_eq!(h.monitor.poll_once(at(8, 10)).await.unwrap(), 0);

    assert_eq!(h.monitor.alerts().await.len(), 1);
    assert_eq!(h.sink.count(), 1);
    assert_eq!(h.monitor.last_poll_time().await, Some(at(8, 10)));
}

#[tokio::test]
async fn existing_history_entry_suppresses_the_slot() {
    let h = harness(vec![ScheduleSlot::new(8, 0, 1), ScheduleSlot::new(8, 0, 1)]);

    // Compartment 2 already has a dose recorded for today's 08:00 slot.
    let existing = MedicationEvent::pending(2, "Medicine 2".into(), at(8, 0), 1, at(8, 0));
    h.db.insert_event(&existing).await.unwrap();

    let created = h.monitor.poll_once(at(8, 5)).await.unwrap();
    assert_eq!(created, 1);

    let alerts = h.monitor.alerts().await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].compartment_number, 1);
    assert_eq!(h.sink.count(), 1);
}

#[tokio::test]
async fn slot_at_exactly_now_is_included() {
    let h = harness(vec![ScheduleSlot::new(8, 0, 1), ScheduleSlot::new(8, 1, 1)]);

    let created = h.monitor.poll_once(at(8, 0)).await.unwrap();
    assert_eq!(created, 1);

    let alerts = h.monitor.alerts().await;
    assert_eq!(alerts[0].scheduled_time, at(8, 0));
}

#[tokio::test]
async fn morning_slot_scenario_notifies_exactly_once() {
    let h = harness(vec![ScheduleSlot::new(8, 0, 1)]);

    let created = h.monitor.poll_once(at(8, 5)).await.unwrap();
    assert_eq!(created, 1);

    let alerts = h.monitor.alerts().await;
    assert_eq!(alerts[0].scheduled_time, at(8, 0));
    assert_eq!(alerts[0].pills_taken, 1);
    assert_eq!(alerts[0].actual_time, None);
    assert_eq!(h.sink.count(), 1);

    // Watermark sits at 08:05 now; the 08:00 slot is behind it.
    assert_eq!(h.monitor.poll_once(at(8, 10)).await.unwrap(), 0);
    assert_eq!(h.sink.count(), 1);
}

#[tokio::test]
async fn fetch_failure_leaves_everything_untouched() {
    let h = harness(vec![ScheduleSlot::new(8, 0, 1)]);
    h.source.fail.store(true, Ordering::SeqCst);

    let result = h.monitor.poll_once(at(8, 5)).await;
    assert!(result.is_err());

    assert!(h.monitor.alerts().await.is_empty());
    assert_eq!(h.monitor.last_poll_time().await, None);
    assert_eq!(h.sink.count(), 0);
    assert!(h.db.recent_events(10).await.unwrap().is_empty());

    // The next tick retries against the same window.
    h.source.fail.store(false, Ordering::SeqCst);
    assert_eq!(h.monitor.poll_once(at(8, 6)).await.unwrap(), 1);
}

#[tokio::test]
async fn inactive_slots_never_fire() {
    let mut disabled = ScheduleSlot::new(8, 0, 1);
    disabled.active = false;
    let h = harness(vec![disabled, ScheduleSlot::new(9, 0, 2)]);

    let created = h.monitor.poll_once(at(10, 0)).await.unwrap();
    assert_eq!(created, 1);
    assert_eq!(h.monitor.alerts().await[0].compartment_number, 2);
}

#[tokio::test]
async fn slot_times_behind_the_watermark_are_ignored() {
    let h = harness(vec![ScheduleSlot::new(8, 0, 1)]);

    // First pass runs before the slot time, so nothing fires but the
    // watermark advances to 07:00.
    assert_eq!(h.monitor.poll_once(at(7, 0)).await.unwrap(), 0);

    // 08:00 is inside (07:00, 08:05], so the second pass picks it up.
    assert_eq!(h.monitor.poll_once(at(8, 5)).await.unwrap(), 1);
}

#[tokio::test]
async fn mark_taken_confirms_the_dose_and_clears_the_alert() {
    let h = harness(vec![ScheduleSlot::new(8, 0, 2)]);
    h.monitor.poll_once(at(8, 5)).await.unwrap();

    let alert_id = h.monitor.alerts().await[0].id.clone();
    let taken_at = at(8, 7);

    let event = h.monitor.mark_taken(&alert_id, taken_at).await.unwrap();
    assert_eq!(event.status, MedicationStatus::Taken);
    assert_eq!(event.actual_time, Some(taken_at));
    assert_eq!(event.pills_taken, 1);
    assert!(h.monitor.alerts().await.is_empty());

    let stored = h.db.get_event(&alert_id).await.unwrap();
    assert_eq!(stored.status, MedicationStatus::Taken);

    // Taken is terminal.
    assert!(h.monitor.mark_taken(&alert_id, at(8, 8)).await.is_err());
}

#[tokio::test]
async fn dismiss_clears_the_alert_but_history_stays_pending() {
    let h = harness(vec![ScheduleSlot::new(8, 0, 1)]);
    h.monitor.poll_once(at(8, 5)).await.unwrap();

    let alert_id = h.monitor.alerts().await[0].id.clone();
    h.monitor.dismiss_alert(&alert_id).await.unwrap();

    assert!(h.monitor.alerts().await.is_empty());
    let stored = h.db.get_event(&alert_id).await.unwrap();
    assert_eq!(stored.status, MedicationStatus::Pending);

    assert!(h.monitor.dismiss_alert(&alert_id).await.is_err());
    assert!(h.monitor.dismiss_alert("no-such-id").await.is_err());
}

#[tokio::test]
async fn compartments_carry_configured_medicine_names() {
    let h = harness_with_names(
        vec![ScheduleSlot::new(8, 0, 2), ScheduleSlot::new(20, 0, 1)],
        vec!["Aspirin".into()],
    );

    h.monitor.poll_once(at(21, 0)).await.unwrap();

    let compartments = h.monitor.compartments().await;
    assert_eq!(compartments.len(), 2);
    assert_eq!(compartments[0].medicine_name, "Aspirin");
    assert_eq!(compartments[1].medicine_name, "Medicine 2");

    let alerts = h.monitor.alerts().await;
    assert_eq!(alerts[0].medicine_name, "Aspirin");
    assert_eq!(alerts[1].medicine_name, "Medicine 2");
}

#[tokio::test]
async fn controller_runs_single_flight_and_restarts_cleanly() {
    let h = harness(vec![ScheduleSlot::new(0, 0, 1)]);

    let mut controller = MonitorController::new();
    controller
        .start(h.monitor.clone(), std::time::Duration::from_millis(50))
        .unwrap();
    assert!(controller.is_running());
    assert!(controller
        .start(h.monitor.clone(), std::time::Duration::from_millis(50))
        .is_err());

    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    controller.stop().await.unwrap();
    assert!(!controller.is_running());
    assert!(h.source.calls.load(Ordering::SeqCst) >= 1);

    // A stopped controller accepts a fresh start.
    controller
        .start(h.monitor.clone(), std::time::Duration::from_millis(50))
        .unwrap();
    controller.stop().await.unwrap();
}
