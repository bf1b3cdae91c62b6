//! Clip capture, state machine and persistence.

pub mod controller;
pub mod writer;

pub use controller::{ClipController, ClipPhase, PostRollElapsed, RollDurations};
pub use writer::{ClipRecording, ClipWriter, FinalizedClip};
