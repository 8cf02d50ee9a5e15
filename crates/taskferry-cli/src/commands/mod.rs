pub mod common;
pub mod completions;
pub mod config;
pub mod purge;
pub mod status;
pub mod sync;
