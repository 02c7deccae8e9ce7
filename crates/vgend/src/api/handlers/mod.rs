//! API request handlers

mod health;
mod input;
mod runs;
mod stream;

pub use health::*;
pub use input::*;
pub use runs::*;
pub use stream::*;
