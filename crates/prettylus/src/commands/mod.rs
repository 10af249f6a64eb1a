mod editor;
mod formatting;
mod general;

pub use editor::*;
pub use formatting::*;
pub use general::*;
