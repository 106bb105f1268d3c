//! Dashlink daemon library
//!
//! This module re-exports the daemon's modules for the binary and for
//! testing.

pub mod config;
pub mod input;
pub mod log_layer;
pub mod service;
