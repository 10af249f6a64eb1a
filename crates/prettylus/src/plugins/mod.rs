mod materializer;
mod types;

pub use materializer::*;
pub use types::*;
