//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the device sync engine and the
//! platform-specific code that actually reaches a device. Each trait represents
//! a capability that the engine requires but that must be implemented
//! differently per platform (desktop, mobile, web).
//!
//! ## Traits
//!
//! ### Device Access
//! - [`DeviceDirectory`](storage::DeviceDirectory) - Permission-checked file I/O under a device root
//! - [`DirectoryHandleStore`](storage::DirectoryHandleStore) - Turns a persisted handle reference into a live directory
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The engine checks [`DirectoryHandleStore::is_supported`](storage::DirectoryHandleStore::is_supported)
//! before any device I/O and stops with a descriptive error when the host
//! cannot open device folders at all.
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should:
//!
//! - Map "entry is missing" to `BridgeError::NotFound`
//! - Map access refusals to `BridgeError::PermissionDenied`
//! - Include the device-relative path in the error
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so handles can be shared
//! across async tasks.

pub mod error;
pub mod storage;
pub mod time;

pub use error::{BridgeError, Result};

// Re-export commonly used types
pub use storage::{
    AccessMode, DeviceDirectory, DirectoryHandleStore, FileMetadata, PermissionState,
};
pub use time::{Clock, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
