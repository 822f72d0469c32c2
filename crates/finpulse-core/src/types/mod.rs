//! Core types for finpulse.

mod activity;
mod analysis;
mod intervention;
mod message;
mod presence;
mod profile;

pub use activity::*;
pub use analysis::*;
pub use intervention::*;
pub use message::*;
pub use presence::*;
pub use profile::*;
