//! # Device Families
//!
//! One implementation per kind of device, chosen by device type:
//!
//! - [`FilesystemPlaylistFamily`] writes playlist files next to the music on a
//!   mass-storage device (USB sticks, Walkman-style players, plain folders).
//! - [`DatabaseBackedFamily`] hands the whole batch to a [`DatabaseDeviceSync`]
//!   collaborator for devices that keep their own track database (iPods).
//!
//! A new family is added by registering it in a [`DeviceFamilyRegistry`].

use crate::collaborators::{
    DatabaseDeviceSync, DatabaseSyncRequest, DatabaseSyncTarget, PlaylistExporter,
    PlaylistLocationConfig,
};
use crate::manifest::{playlist_file_path, ConfigHashInput, WrittenPlaylist};
use crate::resolver::DevicePathResolver;
use crate::scan::DeviceScanIndex;
use crate::strategy::{apply_device_path_map, PathStrategyTransformer};
use crate::{Result, SyncError};
use async_trait::async_trait;
use bridge_traits::DeviceDirectory;
use bytes::Bytes;
use core_library::{
    DeviceProfile, DeviceTrackMappingRepository, DeviceType, Playlist, TrackLookup,
};
use core_runtime::config::{BatchFailurePolicy, DeviceSyncConfig};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// A playlist and the tracks to put in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    pub playlist: Playlist,
    pub lookups: Vec<TrackLookup>,
}

impl SyncTarget {
    pub fn new(playlist: Playlist, lookups: Vec<TrackLookup>) -> Self {
        Self { playlist, lookups }
    }
}

/// Per-request switches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Overrides the configured default when set
    pub only_include_matched_paths: Option<bool>,
    /// Forwarded to database-backed devices
    pub only_reference_existing_tracks: bool,
    /// Forwarded to database-backed devices
    pub overwrite_existing_playlist: bool,
}

/// Everything shared by the targets of one sync call
pub struct SyncSession<'a> {
    pub profile: &'a DeviceProfile,
    pub directory: Arc<dyn DeviceDirectory>,
    pub index: &'a DeviceScanIndex,
    pub resolver: &'a DevicePathResolver,
    pub config: &'a DeviceSyncConfig,
    pub options: &'a SyncOptions,
}

impl SyncSession<'_> {
    /// The profile's playlist folder, or the configured default
    pub fn playlist_folder(&self) -> &str {
        if self.profile.playlist_folder.trim().is_empty() {
            &self.config.default_playlist_folder
        } else {
            &self.profile.playlist_folder
        }
    }

    fn only_include_matched_paths(&self) -> bool {
        self.options
            .only_include_matched_paths
            .unwrap_or(self.config.only_include_matched_paths)
    }

    fn stops_on_failure(&self) -> bool {
        self.config.batch_failure_policy == BatchFailurePolicy::StopOnFirstFailure
    }

    /// Resolve and transform a target without touching the device
    pub fn plan(&self, target: &SyncTarget) -> PlaylistPlan {
        let applied = apply_device_path_map(
            &target.lookups,
            self.index,
            self.resolver,
            self.only_include_matched_paths(),
        );

        let transformer = PathStrategyTransformer::for_profile(
            self.profile,
            self.playlist_folder(),
            self.directory.name(),
            self.index,
        );
        let transformed =
            transformer.transform_lookups(applied.lookups, self.config.exclude_escaping_paths);

        let track_ids = transformed
            .lookups
            .iter()
            .map(|l| l.track_id().to_string())
            .collect();

        PlaylistPlan {
            location: PlaylistLocationConfig {
                playlist_format: self.profile.playlist_format,
                playlist_folder: transformer.playlist_folder().to_string(),
                path_strategy: transformer.strategy(),
                absolute_prefix: transformer.absolute_prefix().map(str::to_string),
            },
            lookups: transformed.lookups,
            track_ids,
            unmatched: applied.unmatched.len(),
            escaped: transformed.escaped.len(),
        }
    }
}

/// A resolved, transformed playlist ready to render
#[derive(Debug, Clone)]
pub struct PlaylistPlan {
    pub lookups: Vec<TrackLookup>,
    pub location: PlaylistLocationConfig,
    pub track_ids: Vec<String>,
    pub unmatched: usize,
    pub escaped: usize,
}

impl PlaylistPlan {
    pub fn config_hash(&self, playlist_id: &str) -> Result<String> {
        ConfigHashInput {
            playlist_id,
            track_ids: &self.track_ids,
            format: self.location.playlist_format,
            folder: &self.location.playlist_folder,
            strategy: self.location.path_strategy,
            prefix: self.location.absolute_prefix.as_deref(),
        }
        .hash()
    }
}

/// What happened to one target
#[derive(Debug)]
pub enum TargetOutcome {
    Written(WrittenPlaylist),
    Failed(SyncError),
    /// Not attempted because an earlier target failed, or the device
    /// declined it
    Skipped,
}

#[derive(Debug)]
pub struct TargetResult {
    pub playlist_id: String,
    pub outcome: TargetOutcome,
}

/// Sync behavior of one kind of device
#[async_trait]
pub trait DeviceFamily: Send + Sync {
    fn name(&self) -> &'static str;

    /// Sync a batch. Per-target failures are reported in the results; an
    /// `Err` means the batch as a whole could not run.
    async fn sync(
        &self,
        session: &SyncSession<'_>,
        targets: &[SyncTarget],
    ) -> Result<Vec<TargetResult>>;

    /// Configuration hash a sync of `target` would record
    async fn planned_hash(&self, session: &SyncSession<'_>, target: &SyncTarget) -> Result<String> {
        session.plan(target).config_hash(&target.playlist.id)
    }
}

/// Writes playlist files onto a mass-storage device
pub struct FilesystemPlaylistFamily {
    exporter: Arc<dyn PlaylistExporter>,
}

impl FilesystemPlaylistFamily {
    pub fn new(exporter: Arc<dyn PlaylistExporter>) -> Self {
        Self { exporter }
    }

    async fn sync_target(
        &self,
        session: &SyncSession<'_>,
        target: &SyncTarget,
    ) -> Result<WrittenPlaylist> {
        let plan = session.plan(target);
        if plan.unmatched > 0 || plan.escaped > 0 {
            debug!(
                playlist_id = %target.playlist.id,
                unmatched = plan.unmatched,
                escaped = plan.escaped,
                "Some tracks were not matched on the device"
            );
        }

        let exported = self
            .exporter
            .export(&target.playlist, &plan.lookups, &plan.location)?;

        let folder = &plan.location.playlist_folder;
        if !folder.is_empty() {
            session.directory.create_dir_all(folder).await?;
        }

        let playlist_path = playlist_file_path(folder, &target.playlist.title, &exported.extension);
        session
            .directory
            .write_file(&playlist_path, Bytes::from(exported.content))
            .await?;

        Ok(WrittenPlaylist {
            playlist_id: target.playlist.id.clone(),
            playlist_path,
            playlist_format: plan.location.playlist_format,
            track_count: plan.lookups.len(),
            config_hash: plan.config_hash(&target.playlist.id)?,
        })
    }
}

#[async_trait]
impl DeviceFamily for FilesystemPlaylistFamily {
    fn name(&self) -> &'static str {
        "filesystem-playlist"
    }

    async fn sync(
        &self,
        session: &SyncSession<'_>,
        targets: &[SyncTarget],
    ) -> Result<Vec<TargetResult>> {
        let mut results = Vec::with_capacity(targets.len());
        let mut stopped = false;

        // Sequential so targets sharing a folder never race on creating it
        for target in targets {
            let playlist_id = target.playlist.id.clone();

            if stopped {
                results.push(TargetResult {
                    playlist_id,
                    outcome: TargetOutcome::Skipped,
                });
                continue;
            }

            let outcome = match self.sync_target(session, target).await {
                Ok(written) => {
                    info!(
                        device_id = %session.profile.id,
                        playlist_id = %playlist_id,
                        path = %written.playlist_path,
                        tracks = written.track_count,
                        "Wrote playlist to device"
                    );
                    TargetOutcome::Written(written)
                }
                Err(err) => {
                    error!(
                        device_id = %session.profile.id,
                        playlist_id = %playlist_id,
                        error = %err,
                        "Playlist sync failed"
                    );
                    stopped = session.stops_on_failure();
                    TargetOutcome::Failed(err)
                }
            };

            results.push(TargetResult {
                playlist_id,
                outcome,
            });
        }

        Ok(results)
    }
}

/// Delegates whole batches to a device that keeps its own database
pub struct DatabaseBackedFamily {
    device_sync: Arc<dyn DatabaseDeviceSync>,
    mappings: Arc<dyn DeviceTrackMappingRepository>,
}

impl DatabaseBackedFamily {
    pub fn new(
        device_sync: Arc<dyn DatabaseDeviceSync>,
        mappings: Arc<dyn DeviceTrackMappingRepository>,
    ) -> Self {
        Self {
            device_sync,
            mappings,
        }
    }
}

#[async_trait]
impl DeviceFamily for DatabaseBackedFamily {
    fn name(&self) -> &'static str {
        "database-backed"
    }

    async fn sync(
        &self,
        session: &SyncSession<'_>,
        targets: &[SyncTarget],
    ) -> Result<Vec<TargetResult>> {
        let existing_mappings = self.mappings.find_by_device(&session.profile.id).await?;

        let request = DatabaseSyncRequest {
            profile: session.profile.clone(),
            directory: Arc::clone(&session.directory),
            targets: targets
                .iter()
                .map(|t| DatabaseSyncTarget {
                    playlist: t.playlist.clone(),
                    lookups: t.lookups.clone(),
                })
                .collect(),
            existing_mappings,
            only_reference_existing_tracks: session.options.only_reference_existing_tracks,
            overwrite_existing_playlist: session.options.overwrite_existing_playlist,
        };

        let result = self.device_sync.sync(request).await?;

        if !result.track_mappings.is_empty() {
            self.mappings.upsert_many(&result.track_mappings).await?;
        }

        let mut written: HashMap<&str, _> = result
            .written
            .iter()
            .map(|w| (w.playlist_id.as_str(), w))
            .collect();

        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            let playlist_id = target.playlist.id.clone();
            let outcome = match written.remove(playlist_id.as_str()) {
                Some(write) => {
                    let config_hash = ConfigHashInput {
                        playlist_id: &playlist_id,
                        track_ids: &write.track_ids,
                        format: session.profile.playlist_format,
                        folder: session.playlist_folder(),
                        strategy: session.profile.path_strategy,
                        prefix: session.profile.absolute_prefix.as_deref(),
                    }
                    .hash()?;
                    TargetOutcome::Written(WrittenPlaylist {
                        playlist_id: playlist_id.clone(),
                        playlist_path: write.playlist_path.clone(),
                        playlist_format: session.profile.playlist_format,
                        track_count: write.track_ids.len(),
                        config_hash,
                    })
                }
                None => TargetOutcome::Skipped,
            };
            results.push(TargetResult {
                playlist_id,
                outcome,
            });
        }

        Ok(results)
    }

    async fn planned_hash(&self, session: &SyncSession<'_>, target: &SyncTarget) -> Result<String> {
        let track_ids: Vec<String> = target
            .lookups
            .iter()
            .map(|l| l.track_id().to_string())
            .collect();
        ConfigHashInput {
            playlist_id: &target.playlist.id,
            track_ids: &track_ids,
            format: session.profile.playlist_format,
            folder: session.playlist_folder(),
            strategy: session.profile.path_strategy,
            prefix: session.profile.absolute_prefix.as_deref(),
        }
        .hash()
    }
}

/// Chooses the family for a device type
#[derive(Default, Clone)]
pub struct DeviceFamilyRegistry {
    families: HashMap<DeviceType, Arc<dyn DeviceFamily>>,
}

impl DeviceFamilyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filesystem playlists for every mass-storage device type
    pub fn with_filesystem_exporter(exporter: Arc<dyn PlaylistExporter>) -> Self {
        let family: Arc<dyn DeviceFamily> = Arc::new(FilesystemPlaylistFamily::new(exporter));
        Self::new()
            .register(DeviceType::Usb, Arc::clone(&family))
            .register(DeviceType::Walkman, Arc::clone(&family))
            .register(DeviceType::Virtual, family)
    }

    /// Database-backed sync for iPod-class devices
    pub fn with_database_device(
        self,
        device_sync: Arc<dyn DatabaseDeviceSync>,
        mappings: Arc<dyn DeviceTrackMappingRepository>,
    ) -> Self {
        self.register(
            DeviceType::Ipod,
            Arc::new(DatabaseBackedFamily::new(device_sync, mappings)),
        )
    }

    pub fn register(mut self, device_type: DeviceType, family: Arc<dyn DeviceFamily>) -> Self {
        self.families.insert(device_type, family);
        self
    }

    pub fn family_for(&self, device_type: DeviceType) -> Option<Arc<dyn DeviceFamily>> {
        self.families.get(&device_type).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::ExportedPlaylist;

    struct NullExporter;

    impl PlaylistExporter for NullExporter {
        fn export(
            &self,
            _playlist: &Playlist,
            _lookups: &[TrackLookup],
            _location: &PlaylistLocationConfig,
        ) -> Result<ExportedPlaylist> {
            Ok(ExportedPlaylist {
                content: String::new(),
                extension: "m3u".to_string(),
            })
        }
    }

    #[test]
    fn test_registry_selects_family_by_type() {
        let registry = DeviceFamilyRegistry::with_filesystem_exporter(Arc::new(NullExporter));

        for device_type in [DeviceType::Usb, DeviceType::Walkman, DeviceType::Virtual] {
            let family = registry.family_for(device_type).unwrap();
            assert_eq!(family.name(), "filesystem-playlist");
        }
        assert!(registry.family_for(DeviceType::Ipod).is_none());
    }
}
