//! CLI command implementations

mod predict;
mod schedule;
mod train;

pub use predict::PredictCommand;
pub use schedule::ScheduleCommand;
pub use train::TrainCommand;
