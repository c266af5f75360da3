mod command;
mod reading;
mod result;
mod telemetry_log;

pub use command::*;
pub use reading::*;
pub use result::*;
pub use telemetry_log::*;
