//! Downstream delivery of medication reminders.

use log::info;

use crate::models::MedicationEvent;

/// Fire-and-forget reminder delivery. The monitor calls this exactly once
/// per newly created pending event; delivery failures are the sink's
/// problem and must not propagate back into the reconciliation pass.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: &MedicationEvent);
}

/// Default sink: writes the reminder to the log. Deployments bridge this to
/// push notifications, SMS, or a caregiver dashboard.
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, event: &MedicationEvent) {
        info!(
            "Medication reminder: time to take {} from compartment {} (scheduled {})",
            event.medicine_name, event.compartment_number, event.scheduled_time
        );
    }
}
