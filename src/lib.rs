//! Headless companion agent for the AutomaticDispenser pill appliance.
//!
//! Polls the appliance's schedule over HTTP+JSON, reconciles it against the
//! locally stored medication history, and raises a pending-dose alert (with
//! one notification) for every scheduled time that passes unconfirmed.

pub mod db;
pub mod device;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod settings;

pub use db::Database;
pub use device::{ApiError, DispenserClient, ScheduleSource};
pub use models::{
    DeviceInfo, MedicationEvent, MedicationStatus, MedicineCompartment, ScheduleSlot,
};
pub use monitor::{MonitorController, MonitorSnapshot, ScheduleMonitor};
pub use notify::{LogNotifier, NotificationSink};
pub use settings::AgentSettings;
