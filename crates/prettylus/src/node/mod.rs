mod bridge;
mod host;
mod messages;
mod node_executable;

pub use bridge::*;
pub use host::*;
pub use messages::*;
pub use node_executable::*;
