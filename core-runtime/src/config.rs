//! # Device Sync Configuration
//!
//! Provides configuration management for the device sync engine.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! `DeviceSyncConfig` holding the host bridges and the tunables of a sync
//! session. It enforces fail-fast validation so a misconfigured host is
//! reported before any device I/O happens.
//!
//! ## Required Dependencies
//!
//! - `DirectoryHandleStore` - Turns a stored handle reference into a device folder
//!
//! ## Optional Dependencies (with defaults)
//!
//! - `Clock` - Timestamps for manifests and profiles (default: `SystemClock`)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{BatchFailurePolicy, DeviceSyncConfig};
//! use std::sync::Arc;
//!
//! let config = DeviceSyncConfig::builder()
//!     .handle_store(Arc::new(my_handle_store))
//!     .batch_failure_policy(BatchFailurePolicy::ContinueOnFailure)
//!     .extra_volume_prefix("/run/media/alice")
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! Building without a handle store fails with `Error::CapabilityMissing` and an
//! actionable message naming the capability.

use crate::error::{Error, Result};
use bridge_traits::{Clock, DirectoryHandleStore, SystemClock};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Default folder for playlist files when a profile does not name one
pub const DEFAULT_PLAYLIST_FOLDER: &str = "PLAYLISTS";

/// Default number of missing entries kept as samples in a validation report
pub const DEFAULT_MAX_MISSING_SAMPLES: usize = 5;

/// What a batch sync does after one playlist fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchFailurePolicy {
    /// Abort the batch; playlists already written stay written
    #[default]
    StopOnFirstFailure,
    /// Record the failure and carry on with the remaining playlists
    ContinueOnFailure,
}

impl BatchFailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchFailurePolicy::StopOnFirstFailure => "stop-on-first-failure",
            BatchFailurePolicy::ContinueOnFailure => "continue-on-failure",
        }
    }
}

impl FromStr for BatchFailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stop-on-first-failure" => Ok(BatchFailurePolicy::StopOnFirstFailure),
            "continue-on-failure" => Ok(BatchFailurePolicy::ContinueOnFailure),
            other => Err(Error::Config(format!(
                "Unknown batch failure policy '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for BatchFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a device sync session.
///
/// Use [`DeviceSyncConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct DeviceSyncConfig {
    /// Resolves persisted handle references to device folders (required)
    pub handle_store: Arc<dyn DirectoryHandleStore>,

    /// Time source for manifests and `last_sync_at`
    pub clock: Arc<dyn Clock>,

    pub batch_failure_policy: BatchFailurePolicy,

    /// Mount prefixes stripped from absolute playlist entries, on top of the
    /// ones derived from the device name
    pub extra_volume_prefixes: Vec<String>,

    /// Default for dropping tracks that never matched a device file
    pub only_include_matched_paths: bool,

    /// Drop library-root relative paths that climb out with `..`
    pub exclude_escaping_paths: bool,

    pub max_missing_samples: usize,

    pub default_playlist_folder: String,
}

impl fmt::Debug for DeviceSyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSyncConfig")
            .field("handle_store", &"DirectoryHandleStore { ... }")
            .field("clock", &"Clock { ... }")
            .field("batch_failure_policy", &self.batch_failure_policy)
            .field("extra_volume_prefixes", &self.extra_volume_prefixes)
            .field("only_include_matched_paths", &self.only_include_matched_paths)
            .field("exclude_escaping_paths", &self.exclude_escaping_paths)
            .field("max_missing_samples", &self.max_missing_samples)
            .field("default_playlist_folder", &self.default_playlist_folder)
            .finish()
    }
}

impl DeviceSyncConfig {
    pub fn builder() -> DeviceSyncConfigBuilder {
        DeviceSyncConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Extra volume prefixes are absolute
    /// - At least one missing sample is kept
    /// - The default playlist folder stays inside the device
    pub fn validate(&self) -> Result<()> {
        if let Some(prefix) = self
            .extra_volume_prefixes
            .iter()
            .find(|p| !p.starts_with('/'))
        {
            return Err(Error::Config(format!(
                "Volume prefix '{}' must be absolute",
                prefix
            )));
        }

        if self.max_missing_samples == 0 {
            return Err(Error::Config(
                "max_missing_samples must be at least 1".to_string(),
            ));
        }

        if self
            .default_playlist_folder
            .split(['/', '\\'])
            .any(|segment| segment == "..")
        {
            return Err(Error::Config(
                "Default playlist folder cannot contain '..'".to_string(),
            ));
        }

        Ok(())
    }
}

fn handle_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "DirectoryHandleStore".to_string(),
        message: "DirectoryHandleStore implementation is required to open device folders. \
                 Desktop: use bridge_desktop::SqliteHandleStore. \
                 Other hosts: inject a store backed by the platform's folder picker handles."
            .to_string(),
    }
}

/// Builder for [`DeviceSyncConfig`].
#[derive(Default)]
pub struct DeviceSyncConfigBuilder {
    handle_store: Option<Arc<dyn DirectoryHandleStore>>,
    clock: Option<Arc<dyn Clock>>,
    batch_failure_policy: Option<BatchFailurePolicy>,
    extra_volume_prefixes: Vec<String>,
    only_include_matched_paths: Option<bool>,
    exclude_escaping_paths: Option<bool>,
    max_missing_samples: Option<usize>,
    default_playlist_folder: Option<String>,
}

impl DeviceSyncConfigBuilder {
    /// Sets the handle store implementation (required).
    pub fn handle_store(mut self, store: Arc<dyn DirectoryHandleStore>) -> Self {
        self.handle_store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn batch_failure_policy(mut self, policy: BatchFailurePolicy) -> Self {
        self.batch_failure_policy = Some(policy);
        self
    }

    /// Adds a mount prefix such as `/run/media/alice`.
    pub fn extra_volume_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.extra_volume_prefixes.push(prefix.into());
        self
    }

    pub fn only_include_matched_paths(mut self, enabled: bool) -> Self {
        self.only_include_matched_paths = Some(enabled);
        self
    }

    pub fn exclude_escaping_paths(mut self, enabled: bool) -> Self {
        self.exclude_escaping_paths = Some(enabled);
        self
    }

    pub fn max_missing_samples(mut self, samples: usize) -> Self {
        self.max_missing_samples = Some(samples);
        self
    }

    pub fn default_playlist_folder(mut self, folder: impl Into<String>) -> Self {
        self.default_playlist_folder = Some(folder.into());
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No handle store was provided
    /// - Any value fails [`DeviceSyncConfig::validate`]
    pub fn build(self) -> Result<DeviceSyncConfig> {
        let handle_store = self.handle_store.ok_or_else(handle_store_missing_error)?;

        let config = DeviceSyncConfig {
            handle_store,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            batch_failure_policy: self.batch_failure_policy.unwrap_or_default(),
            extra_volume_prefixes: self.extra_volume_prefixes,
            only_include_matched_paths: self.only_include_matched_paths.unwrap_or(false),
            exclude_escaping_paths: self.exclude_escaping_paths.unwrap_or(true),
            max_missing_samples: self
                .max_missing_samples
                .unwrap_or(DEFAULT_MAX_MISSING_SAMPLES),
            default_playlist_folder: self
                .default_playlist_folder
                .unwrap_or_else(|| DEFAULT_PLAYLIST_FOLDER.to_string()),
        };

        config.validate()?;

        Ok(config)
    }
}
