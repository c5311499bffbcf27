//! Request handlers.

pub mod events;
pub mod health;
pub mod jobs;

pub use events::*;
pub use health::*;
pub use jobs::*;
