pub mod api;
pub mod app;
pub mod audio;
pub mod cli;
pub mod clip;
pub mod config;
pub mod global;
pub mod ingest;
pub mod session;
