//! Collaborator traits consumed by the pipeline.

mod expiring_store;
mod finance_store;
mod live;
mod reasoning;

pub use expiring_store::*;
pub use finance_store::*;
pub use live::*;
pub use reasoning::*;
