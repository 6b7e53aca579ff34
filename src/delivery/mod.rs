// =============================================================================
// Delivery — on-demand and daily report triggers
// =============================================================================

pub mod schedule;
pub mod scheduler;

pub use schedule::DailySchedule;
pub use scheduler::DeliveryScheduler;
