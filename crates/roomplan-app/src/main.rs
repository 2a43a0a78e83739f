//! Main application entry point.

fn main() {
    env_logger::init();
    log::debug!("Starting RoomPlan");

    if let Err(error) = roomplan_app::run_from_env() {
        eprintln!("{error}");
        std::process::exit(error.exit_code());
    }
}
