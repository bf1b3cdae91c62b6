//! Per-user recording sessions and the control-channel messages that drive them.

pub mod error;
pub mod messages;
pub mod registry;

pub use error::SessionError;
pub use messages::{Command, Event, RegistryMessage, SessionSummary, StartUserResult};
pub use registry::{RegistryHandle, RegistrySettings, SessionRegistry};
