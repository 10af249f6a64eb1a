mod dependency_resolver;
mod host;
mod resolver;

pub use dependency_resolver::*;
pub use host::*;
pub use resolver::*;
