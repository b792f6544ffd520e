//! # Repository Pattern Implementation
//!
//! Repository traits and SQLite implementations for the device sync tables.
//!
//! ## Architecture
//!
//! - Traits define the interface for each repository
//! - SQLite implementations use sqlx for async database access
//! - All operations return `Result<T>` for error handling
//!
//! ## Available Repositories
//!
//! - `DeviceProfileRepository` - Registered devices and their export settings
//! - `DeviceSyncManifestRepository` - Last successful sync per playlist and device
//! - `DeviceTrackMappingRepository` - Library track to device track ids

pub mod device_profile;
pub mod sync_manifest;
pub mod track_mapping;

pub use device_profile::{DeviceProfileRepository, SqliteDeviceProfileRepository};
pub use sync_manifest::{DeviceSyncManifestRepository, SqliteDeviceSyncManifestRepository};
pub use track_mapping::{DeviceTrackMappingRepository, SqliteDeviceTrackMappingRepository};
