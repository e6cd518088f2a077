pub mod controller;
pub mod loop_worker;
pub mod reconciler;
pub mod state;

pub use controller::MonitorController;
pub use reconciler::ScheduleMonitor;
pub use state::MonitorSnapshot;
