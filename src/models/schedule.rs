//! Pill schedule as reported by the appliance.

use serde::{Deserialize, Serialize};

/// One dispense entry in the device schedule. The field names match the
/// device's JSON; `active` may be absent on older firmware and defaults on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleSlot {
    pub hour: u8,
    pub minute: u8,
    pub pills: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl ScheduleSlot {
    pub fn new(hour: u8, minute: u8, pills: u32) -> Self {
        Self {
            hour,
            minute,
            pills,
            active: true,
        }
    }
}

/// A physical compartment on the dispenser, derived from the schedule: the
/// device orders slots by compartment, so slot index N maps to compartment
/// number N+1.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MedicineCompartment {
    pub number: u32,
    pub medicine_name: String,
    pub pill_count: u32,
    pub slot: ScheduleSlot,
}

impl MedicineCompartment {
    pub fn is_configured(&self) -> bool {
        !self.medicine_name.is_empty() && self.pill_count > 0
    }
}
