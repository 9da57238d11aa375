//! Plane task sync library.
//!
//! This module exports the pipeline components for the binary and for
//! integration tests.

pub mod cli;
pub mod config;
pub mod directory;
pub mod error;
pub mod filter;
pub mod format;
pub mod fsutil;
pub mod logging;
pub mod plane;
pub mod render;
pub mod report;
pub mod sync;
pub mod types;
