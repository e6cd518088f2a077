//! Medication event history records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MedicationStatus {
    Taken,
    Missed,
    Pending,
}

impl MedicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MedicationStatus::Taken => "Taken",
            MedicationStatus::Missed => "Missed",
            MedicationStatus::Pending => "Pending",
        }
    }
}

/// One dose in the medication history.
///
/// Created with status `Pending` when a scheduled dispense time passes
/// without a confirmed intake, or with status `Taken` by a confirmed user
/// action. The only legal transition after creation is `Pending` → `Taken`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MedicationEvent {
    pub id: String,
    pub compartment_number: u32,
    pub medicine_name: String,
    pub scheduled_time: DateTime<Utc>,
    pub actual_time: Option<DateTime<Utc>>,
    pub status: MedicationStatus,
    pub pills_taken: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MedicationEvent {
    /// New unconfirmed dose for a schedule slot whose time has arrived.
    pub fn pending(
        compartment_number: u32,
        medicine_name: String,
        scheduled_time: DateTime<Utc>,
        pills: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            compartment_number,
            medicine_name,
            scheduled_time,
            actual_time: None,
            status: MedicationStatus::Pending,
            pills_taken: pills,
            created_at,
            updated_at: created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn pending_event_has_no_actual_time() {
        let scheduled = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        let event = MedicationEvent::pending(2, "Medicine 2".into(), scheduled, 3, scheduled);

        assert_eq!(event.status, MedicationStatus::Pending);
        assert_eq!(event.actual_time, None);
        assert_eq!(event.pills_taken, 3);
        assert_eq!(event.compartment_number, 2);
    }

    #[test]
    fn status_labels_are_stable() {
        assert_eq!(MedicationStatus::Taken.as_str(), "Taken");
        assert_eq!(MedicationStatus::Missed.as_str(), "Missed");
        assert_eq!(MedicationStatus::Pending.as_str(), "Pending");
    }
}
