use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{MedicationEvent, MedicineCompartment};

/// Mutable monitor state. Lives behind the monitor's mutex; every mutation
/// happens inside a reconciliation pass or a user action, readers only ever
/// get clones.
#[derive(Debug, Default)]
pub struct MonitorState {
    pub alerts: Vec<MedicationEvent>,
    pub compartments: Vec<MedicineCompartment>,
    pub last_poll_time: Option<DateTime<Utc>>,
}

/// Point-in-time copy handed to consumers (status endpoints, embedding UIs).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSnapshot {
    pub alerts: Vec<MedicationEvent>,
    pub compartments: Vec<MedicineCompartment>,
    pub last_poll_time: Option<DateTime<Utc>>,
}

impl MonitorState {
    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            alerts: self.alerts.clone(),
            compartments: self.compartments.clone(),
            last_poll_time: self.last_poll_time,
        }
    }
}
