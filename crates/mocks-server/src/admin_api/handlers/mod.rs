//! Admin API handlers.

pub mod mock;
pub mod system;
