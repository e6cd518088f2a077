pub mod device;
pub mod event;
pub mod schedule;

pub use device::DeviceInfo;
pub use event::{MedicationEvent, MedicationStatus};
pub use schedule::{MedicineCompartment, ScheduleSlot};
