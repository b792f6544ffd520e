//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the device sync engine:
//! - Logging and tracing infrastructure
//! - Configuration management
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that other modules depend on.
//! It establishes the logging conventions and the fail-fast configuration
//! used throughout the system.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{BatchFailurePolicy, DeviceSyncConfig, DeviceSyncConfigBuilder};
pub use error::{Error, Result};
