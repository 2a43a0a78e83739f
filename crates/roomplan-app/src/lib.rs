//! RoomPlan Application
//!
//! Command-line shell over a data directory of rooms and a furniture catalog.

mod app;
mod cli;

pub use app::{App, AppError, AppResult, UsageReport};
pub use cli::{Cli, Commands, print_shortcuts, run, run_from_env};
