//! # Library Management Module
//!
//! Owns the device sync tables and the library-side models that feed a sync.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite database schema and migrations
//! - Repository patterns for device profiles, sync manifests and track mappings
//! - The library inputs a sync consumes: tracks, file index entries, playlists

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use db::{create_pool, create_test_pool, health_check, run_migrations, DatabaseConfig};
pub use error::{LibraryError, Result};
pub use models::{
    DeviceProfile, DeviceSyncManifest, DeviceTrackMapping, DeviceType, FileIndexEntry,
    LibraryTrack, PathStrategy, Playlist, PlaylistFormat, TrackLookup, TrackTags,
};
pub use repositories::{
    DeviceProfileRepository, DeviceSyncManifestRepository, DeviceTrackMappingRepository,
    SqliteDeviceProfileRepository, SqliteDeviceSyncManifestRepository,
    SqliteDeviceTrackMappingRepository,
};
