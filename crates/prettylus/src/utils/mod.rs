mod fs;
mod log_level;
mod logging;
mod stdin_reader;
mod user_warnings;

pub use fs::*;
pub use log_level::*;
pub use logging::*;
pub use stdin_reader::*;
pub use user_warnings::*;
