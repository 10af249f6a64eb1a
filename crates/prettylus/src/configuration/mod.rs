mod deserialize_config;
mod resolve_bridge_config;
mod style_config;
mod types;

pub use deserialize_config::*;
pub use resolve_bridge_config::*;
pub use style_config::*;
pub use types::*;
