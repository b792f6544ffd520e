//! # Device Sync Coordinator
//!
//! Writes library playlists onto a device and records what was written.
//!
//! ## Overview
//!
//! The `DeviceSyncCoordinator` ties the pieces of a sync together:
//! - Loads the device profile and picks the [`DeviceFamily`] for its type
//! - Acquires the device folder through the configured `DirectoryHandleStore`
//! - Builds the [`DeviceScanIndex`] once for the whole call
//! - Runs the family over every target, in order
//! - Upserts a `DeviceSyncManifest` per written playlist and stamps the profile
//!
//! ## Workflow
//!
//! 1. **Acquire**: resolve the stored handle, request read-write access. A
//!    missing handle or a refused permission stops the call before any target
//!    runs and is never retried.
//! 2. **Resolve**: match every track lookup against the scan.
//! 3. **Render**: hand the transformed lookups to the playlist exporter.
//! 4. **Persist**: create the playlist folder, write the file, hash the inputs.
//! 5. **Record**: upsert the manifest and update `last_sync_at`.
//!
//! Database-backed devices take over steps 2 to 5 through their family.
//!
//! Targets are not transactional. A failed target never rolls back targets
//! written before it. With [`BatchFailurePolicy::StopOnFirstFailure`] the
//! remaining targets are skipped and the first failure is returned; with
//! [`BatchFailurePolicy::ContinueOnFailure`] every target runs and the report
//! lists each outcome.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{DeviceSyncCoordinator, DeviceSyncRequest, SyncTarget};
//!
//! # async fn example(coordinator: DeviceSyncCoordinator, target: SyncTarget) -> core_sync::Result<()> {
//! let request = DeviceSyncRequest::new("device-1", vec![target.clone()], scan_entries());
//! if coordinator.needs_sync("device-1", &target, &request.scan, &request.options).await? {
//!     let report = coordinator.sync_device(request).await?;
//!     println!("{} playlists written", report.written_count());
//! }
//!
//! let validation = coordinator.validate_playlist("device-1", &target.playlist.id).await?;
//! println!("{} of {} entries missing", validation.missing, validation.total);
//! # Ok(())
//! # }
//! ```

use crate::family::{
    DeviceFamily, DeviceFamilyRegistry, SyncOptions, SyncSession, SyncTarget, TargetOutcome,
};
use crate::path::volume_prefix_candidates;
use crate::resolver::DevicePathResolver;
use crate::scan::{DeviceScanEntry, DeviceScanIndex};
use crate::validator::{PlaylistValidator, ValidationReport};
use crate::{Result, SyncError};
use bridge_traits::{AccessMode, BridgeError, DeviceDirectory, PermissionState};
use core_library::{DeviceProfile, DeviceProfileRepository, DeviceSyncManifestRepository};
use core_runtime::config::{BatchFailurePolicy, DeviceSyncConfig};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// One sync call: a device, the playlists to put on it and what its scan found
#[derive(Debug, Clone)]
pub struct DeviceSyncRequest {
    pub device_id: String,
    pub targets: Vec<SyncTarget>,
    /// Files found on the device for this session
    pub scan: Vec<DeviceScanEntry>,
    pub options: SyncOptions,
}

impl DeviceSyncRequest {
    pub fn new(
        device_id: impl Into<String>,
        targets: Vec<SyncTarget>,
        scan: Vec<DeviceScanEntry>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            targets,
            scan,
            options: SyncOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }
}

/// Outcome of one target as reported to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TargetStatus {
    Written { path: String, track_count: usize },
    Failed { error: String },
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetReport {
    pub playlist_id: String,
    #[serde(flatten)]
    pub status: TargetStatus,
}

/// Per-target results of a sync call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSyncReport {
    pub device_id: String,
    pub targets: Vec<TargetReport>,
    /// Set when at least one playlist was written
    pub synced_at: Option<i64>,
}

impl DeviceSyncReport {
    pub fn written_count(&self) -> usize {
        self.count(|s| matches!(s, TargetStatus::Written { .. }))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|s| matches!(s, TargetStatus::Failed { .. }))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|s| matches!(s, TargetStatus::Skipped))
    }

    pub fn has_failures(&self) -> bool {
        self.failed_count() > 0
    }

    fn count(&self, pred: impl Fn(&TargetStatus) -> bool) -> usize {
        self.targets.iter().filter(|t| pred(&t.status)).count()
    }
}

pub struct DeviceSyncCoordinator {
    config: DeviceSyncConfig,
    families: DeviceFamilyRegistry,
    profiles: Arc<dyn DeviceProfileRepository>,
    manifests: Arc<dyn DeviceSyncManifestRepository>,
    resolver: DevicePathResolver,
}

impl DeviceSyncCoordinator {
    pub fn new(
        config: DeviceSyncConfig,
        families: DeviceFamilyRegistry,
        profiles: Arc<dyn DeviceProfileRepository>,
        manifests: Arc<dyn DeviceSyncManifestRepository>,
    ) -> Self {
        Self {
            config,
            families,
            profiles,
            manifests,
            resolver: DevicePathResolver::default(),
        }
    }

    /// Replace the default resolver tier chain
    pub fn with_resolver(mut self, resolver: DevicePathResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &DeviceSyncConfig {
        &self.config
    }

    /// Sync every target of the request onto the device.
    ///
    /// # Errors
    ///
    /// - `UnsupportedEnvironment` when the host cannot open device folders
    /// - `DeviceNotFound` / `UnsupportedDeviceType` for an unknown or
    ///   unhandled device
    /// - `HandleNotFound` / `PermissionDenied` when the device folder cannot
    ///   be acquired; no target runs
    /// - `TargetFailed` for the first failed target under
    ///   `StopOnFirstFailure`; earlier targets stay written and recorded
    #[instrument(skip(self, request), fields(device_id = %request.device_id, targets = request.targets.len()))]
    pub async fn sync_device(&self, request: DeviceSyncRequest) -> Result<DeviceSyncReport> {
        self.ensure_supported()?;
        let profile = self.load_profile(&request.device_id).await?;
        let family = self.family_for(&profile)?;
        let directory = self.acquire(&profile, AccessMode::ReadWrite).await?;

        let index = DeviceScanIndex::build(&request.scan);
        let session = SyncSession {
            profile: &profile,
            directory,
            index: &index,
            resolver: &self.resolver,
            config: &self.config,
            options: &request.options,
        };

        let results = family.sync(&session, &request.targets).await?;

        let synced_at = self.config.clock.unix_timestamp();
        let mut targets = Vec::with_capacity(results.len());
        let mut first_failure = None;

        for result in results {
            let status = match result.outcome {
                TargetOutcome::Written(written) => {
                    self.manifests
                        .upsert(&written.to_manifest(&profile.id, synced_at))
                        .await?;
                    TargetStatus::Written {
                        path: written.playlist_path,
                        track_count: written.track_count,
                    }
                }
                TargetOutcome::Failed(err) => {
                    let status = TargetStatus::Failed {
                        error: err.to_string(),
                    };
                    if first_failure.is_none() {
                        first_failure = Some((result.playlist_id.clone(), err));
                    }
                    status
                }
                TargetOutcome::Skipped => TargetStatus::Skipped,
            };
            targets.push(TargetReport {
                playlist_id: result.playlist_id,
                status,
            });
        }

        let mut report = DeviceSyncReport {
            device_id: profile.id.clone(),
            targets,
            synced_at: None,
        };

        if report.written_count() > 0 {
            self.profiles.touch_last_sync(&profile.id, synced_at).await?;
            report.synced_at = Some(synced_at);
        }

        info!(
            family = family.name(),
            written = report.written_count(),
            failed = report.failed_count(),
            skipped = report.skipped_count(),
            "Device sync finished"
        );

        match (self.config.batch_failure_policy, first_failure) {
            (BatchFailurePolicy::StopOnFirstFailure, Some((playlist_id, err))) => {
                error!(playlist_id = %playlist_id, error = %err, "Device sync stopped");
                Err(SyncError::for_target(playlist_id, err))
            }
            _ => Ok(report),
        }
    }

    /// Whether syncing `target` would write something different from what the
    /// stored manifest records. Nothing is written to the device.
    #[instrument(skip(self, target, scan, options), fields(playlist_id = %target.playlist.id))]
    pub async fn needs_sync(
        &self,
        device_id: &str,
        target: &SyncTarget,
        scan: &[DeviceScanEntry],
        options: &SyncOptions,
    ) -> Result<bool> {
        self.ensure_supported()?;
        let profile = self.load_profile(device_id).await?;
        let family = self.family_for(&profile)?;

        let Some(manifest) = self.manifests.find(&profile.id, &target.playlist.id).await? else {
            return Ok(true);
        };

        let directory = self.acquire(&profile, AccessMode::Read).await?;
        let index = DeviceScanIndex::build(scan);
        let session = SyncSession {
            profile: &profile,
            directory,
            index: &index,
            resolver: &self.resolver,
            config: &self.config,
            options,
        };

        let planned = family.planned_hash(&session, target).await?;
        Ok(planned != manifest.config_hash)
    }

    /// Check that every entry of a synced playlist still exists on the device
    #[instrument(skip(self))]
    pub async fn validate_playlist(
        &self,
        device_id: &str,
        playlist_id: &str,
    ) -> Result<ValidationReport> {
        self.ensure_supported()?;
        let profile = self.load_profile(device_id).await?;

        let manifest = self
            .manifests
            .find(&profile.id, playlist_id)
            .await?
            .ok_or_else(|| SyncError::ManifestNotFound {
                device_id: profile.id.clone(),
                playlist_id: playlist_id.to_string(),
            })?;

        let directory = self.acquire(&profile, AccessMode::Read).await?;
        let prefixes = volume_prefix_candidates(
            profile.absolute_prefix.as_deref(),
            directory.name(),
            &self.config.extra_volume_prefixes,
        );

        let report = PlaylistValidator::new(prefixes, self.config.max_missing_samples)
            .validate(
                directory.as_ref(),
                &manifest.playlist_path,
                manifest.playlist_format,
                profile.path_strategy,
            )
            .await;

        info!(
            playlist_path = %manifest.playlist_path,
            total = report.total,
            missing = report.missing,
            "Validated playlist on device"
        );
        Ok(report)
    }

    fn ensure_supported(&self) -> Result<()> {
        if self.config.handle_store.is_supported() {
            Ok(())
        } else {
            Err(SyncError::UnsupportedEnvironment)
        }
    }

    async fn load_profile(&self, device_id: &str) -> Result<DeviceProfile> {
        self.profiles
            .find_by_id(device_id)
            .await?
            .ok_or_else(|| SyncError::DeviceNotFound {
                device_id: device_id.to_string(),
            })
    }

    fn family_for(&self, profile: &DeviceProfile) -> Result<Arc<dyn DeviceFamily>> {
        self.families
            .family_for(profile.device_type)
            .ok_or(SyncError::UnsupportedDeviceType {
                device_type: profile.device_type,
            })
    }

    async fn acquire(
        &self,
        profile: &DeviceProfile,
        mode: AccessMode,
    ) -> Result<Arc<dyn DeviceDirectory>> {
        let directory = self
            .config
            .handle_store
            .resolve(&profile.handle_ref)
            .await
            .map_err(acquire_error)?
            .ok_or(SyncError::HandleNotFound)?;

        match directory.request_permission(mode).await.map_err(acquire_error)? {
            PermissionState::Granted => Ok(directory),
            state => {
                warn!(
                    device_id = %profile.id,
                    mode = mode.as_str(),
                    state = ?state,
                    "Device folder access not granted"
                );
                Err(SyncError::PermissionDenied)
            }
        }
    }
}

fn acquire_error(err: BridgeError) -> SyncError {
    if err.is_permission_denied() {
        SyncError::PermissionDenied
    } else if err.is_not_found() {
        SyncError::HandleNotFound
    } else {
        SyncError::Bridge(err)
    }
}
