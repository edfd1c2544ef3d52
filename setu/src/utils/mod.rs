//! Shared utilities.

mod signal;
mod throttle;

pub use signal::setup_ctrl_c_handler;
pub use throttle::Throttle;
