//! API route modules.

pub mod control;
pub mod sessions;
