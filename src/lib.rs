//! `macro-tracker` library crate.
//!
//! The binary (`mtrack`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - adapters, store and alert sink can be swapped behind their traits

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod events;
pub mod io;
pub mod math;
pub mod report;
pub mod tui;
