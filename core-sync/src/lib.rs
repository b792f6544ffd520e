//! # Device Sync Module
//!
//! Puts library playlists onto removable music players and checks them later.
//!
//! ## Overview
//!
//! Given the tracks of a playlist and a scan of the files on a device, this
//! module works out where each track lives on the device, rewrites that path
//! the way the playlist file must reference it, writes the playlist and
//! records a manifest so later syncs can be skipped or validated.
//!
//! ## Components
//!
//! - **Path Normalizer** (`path`): canonical device paths, mount prefix stripping
//! - **Match Keys & Scorer** (`matching`): legacy keys, fuzzy filenames, metadata scoring
//! - **Scan Index** (`scan`): per-session lookup tables built from the device scan
//! - **Device Path Resolver** (`resolver`): ordered matching tiers, first hit wins
//! - **Path Strategy Transformer** (`strategy`): absolute, relative-to-playlist, relative-to-root
//! - **Device Families** (`family`): filesystem playlists vs. database-backed players
//! - **Sync Coordinator** (`coordinator`): acquire, resolve, render, persist, record
//! - **Validator** (`validator`): reads a playlist back and counts missing entries
//! - **Device Registry** (`registry`): device profile lifecycle

pub mod collaborators;
pub mod coordinator;
pub mod error;
pub mod family;
pub mod manifest;
pub mod matching;
pub mod path;
pub mod registry;
pub mod resolver;
pub mod scan;
pub mod strategy;
pub mod validator;

pub use collaborators::{
    DatabaseDeviceSync, DatabasePlaylistWrite, DatabaseSyncRequest, DatabaseSyncResult,
    DatabaseSyncTarget, ExportedPlaylist, PlaylistExporter, PlaylistLocationConfig,
};
pub use coordinator::{
    DeviceSyncCoordinator, DeviceSyncReport, DeviceSyncRequest, TargetReport, TargetStatus,
};
pub use error::{Result, SyncError};
pub use family::{
    DatabaseBackedFamily, DeviceFamily, DeviceFamilyRegistry, FilesystemPlaylistFamily,
    PlaylistPlan, SyncOptions, SyncSession, SyncTarget, TargetOutcome, TargetResult,
};
pub use manifest::{playlist_file_path, slugify, ConfigHashInput, WrittenPlaylist};
pub use matching::{
    build_device_match_candidates, build_device_match_key, normalize_filename_for_match,
    pick_best_device_path, score_device_path, PathScore,
};
pub use path::{
    normalize_device_path, normalize_relative_segments, strip_volume_prefixes,
    volume_prefix_candidates,
};
pub use registry::DeviceRegistry;
pub use resolver::{
    resolve_device_path_match, DeviceMatch, DevicePathResolver, MatchTier, MatchTierKind,
    ResolveOptions,
};
pub use scan::{DevicePathMap, DeviceScanEntry, DeviceScanIndex};
pub use strategy::{
    apply_absolute_prefix_to_lookups, apply_device_path_map, infer_absolute_prefix,
    PathStrategyError, PathStrategyTransformer,
};
pub use validator::{PlaylistValidator, ValidationReport};
