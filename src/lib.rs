pub mod analyzer;
pub mod boundary;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod git;
pub mod graph;
pub mod hosting;
pub mod inventory;
pub mod orchestrator;
pub mod planner;
pub mod ui;

pub use error::{ReleaseError, Result};
