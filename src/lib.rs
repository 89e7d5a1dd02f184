pub use crate::errors::{FsError, HarnessError, Result};

pub mod cli;
pub mod composition;
pub mod config;
pub mod diff;
pub mod discovery;
pub mod document;
pub mod errors;
pub mod fs;
pub mod functions;
pub mod harness;
pub mod loader;
pub mod render;
pub mod runner;
pub mod verify;
