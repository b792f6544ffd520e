//! End-to-end device sync tests
//!
//! A temporary folder stands in for the device, the desktop handle store
//! points at it, and an in-memory database holds profiles and manifests.

use async_trait::async_trait;
use bridge_desktop::SqliteHandleStore;
use bridge_traits::{
    AccessMode, BridgeError, DeviceDirectory, DirectoryHandleStore, FileMetadata, FixedClock,
    PermissionState,
};
use bytes::Bytes;
use core_library::{
    create_test_pool, DeviceProfile, DeviceProfileRepository, DeviceSyncManifest,
    DeviceSyncManifestRepository, DeviceTrackMapping, DeviceTrackMappingRepository, DeviceType,
    FileIndexEntry, LibraryTrack, PathStrategy, Playlist, PlaylistFormat, SqliteDeviceProfileRepository,
    SqliteDeviceSyncManifestRepository, SqliteDeviceTrackMappingRepository, TrackLookup,
    TrackTags,
};
use core_runtime::config::{BatchFailurePolicy, DeviceSyncConfig};
use core_sync::{
    DatabasePlaylistWrite, DatabaseSyncRequest, DatabaseSyncResult, DeviceFamilyRegistry,
    DevicePathResolver, DeviceRegistry, DeviceScanEntry, DeviceScanIndex, DeviceSyncCoordinator,
    DeviceSyncRequest, ExportedPlaylist, MatchTierKind, PlaylistExporter, PlaylistLocationConfig,
    SyncError, SyncOptions, SyncTarget, TargetStatus,
};
use mockall::mock;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const NOW: i64 = 1_700_000_000;

/// Writes one line per lookup path; fails for playlists titled "Broken"
struct LineExporter;

impl PlaylistExporter for LineExporter {
    fn export(
        &self,
        playlist: &Playlist,
        lookups: &[TrackLookup],
        location: &PlaylistLocationConfig,
    ) -> core_sync::Result<ExportedPlaylist> {
        if playlist.title == "Broken" {
            return Err(SyncError::Export("renderer crashed".to_string()));
        }

        let mut content = String::from("#EXTM3U\n");
        for lookup in lookups {
            if let Some(path) = lookup.relative_path() {
                content.push_str(path);
                content.push('\n');
            }
        }
        Ok(ExportedPlaylist {
            content,
            extension: location.playlist_format.extension().to_string(),
        })
    }
}

mock! {
    pub DatabaseDevice {}

    #[async_trait]
    impl core_sync::DatabaseDeviceSync for DatabaseDevice {
        async fn sync(&self, request: DatabaseSyncRequest) -> core_sync::Result<DatabaseSyncResult>;
    }
}

struct Harness {
    _tmp: TempDir,
    root: PathBuf,
    coordinator: DeviceSyncCoordinator,
    registry: DeviceRegistry,
    manifests: Arc<SqliteDeviceSyncManifestRepository>,
    mappings: Arc<SqliteDeviceTrackMappingRepository>,
    profiles: Arc<SqliteDeviceProfileRepository>,
    device: DeviceProfile,
}

struct HarnessBuilder {
    policy: BatchFailurePolicy,
    device_type: DeviceType,
    handle_store: Option<Arc<dyn DirectoryHandleStore>>,
    database_device: Option<MockDatabaseDevice>,
    register_handle: bool,
    playlist_folder: String,
    path_strategy: PathStrategy,
    absolute_prefix: Option<String>,
}

impl HarnessBuilder {
    fn new() -> Self {
        Self {
            policy: BatchFailurePolicy::StopOnFirstFailure,
            device_type: DeviceType::Walkman,
            handle_store: None,
            database_device: None,
            register_handle: true,
            playlist_folder: "PLAYLISTS".to_string(),
            path_strategy: PathStrategy::RelativeToPlaylist,
            absolute_prefix: None,
        }
    }

    fn playlist_folder(mut self, folder: &str) -> Self {
        self.playlist_folder = folder.to_string();
        self
    }

    fn absolute(mut self, prefix: Option<&str>) -> Self {
        self.path_strategy = PathStrategy::Absolute;
        self.absolute_prefix = prefix.map(str::to_string);
        self
    }

    fn policy(mut self, policy: BatchFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    fn handle_store(mut self, store: Arc<dyn DirectoryHandleStore>) -> Self {
        self.handle_store = Some(store);
        self
    }

    fn ipod(mut self, device: MockDatabaseDevice) -> Self {
        self.device_type = DeviceType::Ipod;
        self.database_device = Some(device);
        self
    }

    fn without_registered_handle(mut self) -> Self {
        self.register_handle = false;
        self
    }

    async fn build(self) -> Harness {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("WALKMAN");
        std::fs::create_dir_all(&root).unwrap();

        let handle_store: Arc<dyn DirectoryHandleStore> = match self.handle_store {
            Some(store) => store,
            None => {
                let store = SqliteHandleStore::in_memory().await.unwrap();
                if self.register_handle {
                    store.register("walkman-1", root.clone(), None).await.unwrap();
                }
                Arc::new(store)
            }
        };

        let pool = create_test_pool().await.unwrap();
        let profiles = Arc::new(SqliteDeviceProfileRepository::new(pool.clone()));
        let manifests = Arc::new(SqliteDeviceSyncManifestRepository::new(pool.clone()));
        let mappings = Arc::new(SqliteDeviceTrackMappingRepository::new(pool));
        let clock = Arc::new(FixedClock::from_timestamp(NOW));

        let config = DeviceSyncConfig::builder()
            .handle_store(handle_store.clone())
            .clock(clock.clone())
            .batch_failure_policy(self.policy)
            .build()
            .unwrap();

        let mut families = DeviceFamilyRegistry::with_filesystem_exporter(Arc::new(LineExporter));
        if let Some(device) = self.database_device {
            families = families.with_database_device(Arc::new(device), mappings.clone());
        }

        let registry = DeviceRegistry::new(profiles.clone(), handle_store, clock);
        let mut profile = DeviceProfile::new("Walkman", self.device_type, "walkman-1")
            .with_playlist_folder(self.playlist_folder)
            .with_path_strategy(self.path_strategy);
        if let Some(prefix) = self.absolute_prefix {
            profile = profile.with_absolute_prefix(prefix);
        }
        let device = registry.add_device(profile).await.unwrap();

        let coordinator =
            DeviceSyncCoordinator::new(config, families, profiles.clone(), manifests.clone());

        Harness {
            _tmp: tmp,
            root,
            coordinator,
            registry,
            manifests,
            mappings,
            profiles,
            device,
        }
    }
}

impl Harness {
    fn touch(&self, relative: &str) {
        let path = self.root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"audio").unwrap();
    }

    fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.root.join(relative)).unwrap()
    }

    fn exists(&self, relative: &str) -> bool {
        self.root.join(relative).exists()
    }

    async fn last_sync_at(&self) -> Option<i64> {
        self.profiles
            .find_by_id(&self.device.id)
            .await
            .unwrap()
            .and_then(|p| p.last_sync_at)
    }
}

fn lookup(id: &str, library_path: &str, full_hash: Option<&str>) -> TrackLookup {
    let name = library_path.rsplit('/').next().unwrap().to_string();
    TrackLookup {
        track: LibraryTrack {
            track_file_id: id.to_string(),
            library_root_id: "root-1".to_string(),
            tags: TrackTags {
                title: Some(id.to_string()),
                artist: Some("Nobody".to_string()),
                album: None,
            },
        },
        file_index: Some(FileIndexEntry {
            relative_path: library_path.to_string(),
            name,
            size: 1000,
            mtime: 0,
            content_hash: None,
            full_content_hash: full_hash.map(str::to_string),
        }),
    }
}

fn target(id: &str, title: &str, lookups: Vec<TrackLookup>) -> SyncTarget {
    SyncTarget::new(Playlist::new(id, title), lookups)
}

fn track_target(id: &str, title: &str) -> SyncTarget {
    target(
        id,
        title,
        vec![lookup("track", "Library/Artist/Album/Track.mp3", Some("h-track"))],
    )
}

fn scan() -> Vec<DeviceScanEntry> {
    vec![
        DeviceScanEntry::new("MUSIC/Artist/Album/Track.mp3").with_content_hash("h-track"),
        DeviceScanEntry::new("MUSIC/Other/other.mp3").with_content_hash("h-other"),
    ]
}

#[tokio::test]
async fn test_sync_writes_playlist_and_records_manifest() {
    let h = HarnessBuilder::new().build().await;
    h.touch("MUSIC/Artist/Album/Track.mp3");

    let report = h
        .coordinator
        .sync_device(DeviceSyncRequest::new(
            &h.device.id,
            vec![track_target("p1", "Road Trip")],
            scan(),
        ))
        .await
        .unwrap();

    assert_eq!(report.written_count(), 1);
    assert_eq!(report.synced_at, Some(NOW));
    assert_eq!(
        report.targets[0].status,
        TargetStatus::Written {
            path: "PLAYLISTS/road-trip.m3u".to_string(),
            track_count: 1,
        }
    );

    assert_eq!(
        h.read("PLAYLISTS/road-trip.m3u"),
        "#EXTM3U\n../MUSIC/Artist/Album/Track.mp3\n"
    );

    let manifest = h.manifests.find(&h.device.id, "p1").await.unwrap().unwrap();
    assert_eq!(manifest.id, format!("{}-p1", h.device.id));
    assert_eq!(manifest.playlist_path, "PLAYLISTS/road-trip.m3u");
    assert_eq!(manifest.track_count, 1);
    assert_eq!(manifest.synced_at, NOW);

    let profile = h.registry.get_device(&h.device.id).await.unwrap();
    assert_eq!(profile.last_sync_at, Some(NOW));
}

#[tokio::test]
async fn test_unmatched_tracks_follow_only_matched_option() {
    let h = HarnessBuilder::new().build().await;
    let lookups = vec![
        lookup("track", "Library/Artist/Album/Track.mp3", Some("h-track")),
        lookup("ghost", "Library/Nobody/Ghost.mp3", None),
    ];

    h.coordinator
        .sync_device(DeviceSyncRequest::new(
            &h.device.id,
            vec![target("p1", "Mixed", lookups.clone())],
            scan(),
        ))
        .await
        .unwrap();
    assert_eq!(
        h.read("PLAYLISTS/mixed.m3u"),
        "#EXTM3U\n../MUSIC/Artist/Album/Track.mp3\n../Library/Nobody/Ghost.mp3\n"
    );

    let options = SyncOptions {
        only_include_matched_paths: Some(true),
        ..Default::default()
    };
    h.coordinator
        .sync_device(
            DeviceSyncRequest::new(&h.device.id, vec![target("p1", "Mixed", lookups)], scan())
                .with_options(options),
        )
        .await
        .unwrap();
    assert_eq!(
        h.read("PLAYLISTS/mixed.m3u"),
        "#EXTM3U\n../MUSIC/Artist/Album/Track.mp3\n"
    );
}

#[tokio::test]
async fn test_stop_on_first_failure_keeps_earlier_writes() {
    let h = HarnessBuilder::new().build().await;

    let err = h
        .coordinator
        .sync_device(DeviceSyncRequest::new(
            &h.device.id,
            vec![
                track_target("p1", "First"),
                track_target("p2", "Broken"),
                track_target("p3", "Third"),
            ],
            scan(),
        ))
        .await
        .unwrap_err();

    match err {
        SyncError::TargetFailed {
            playlist_id,
            source,
        } => {
            assert_eq!(playlist_id, "p2");
            assert!(matches!(*source, SyncError::Export(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert!(h.exists("PLAYLISTS/first.m3u"));
    assert!(!h.exists("PLAYLISTS/third.m3u"));
    assert!(h.manifests.find(&h.device.id, "p1").await.unwrap().is_some());
    assert!(h.manifests.find(&h.device.id, "p3").await.unwrap().is_none());
}

#[tokio::test]
async fn test_continue_on_failure_reports_every_target() {
    let h = HarnessBuilder::new()
        .policy(BatchFailurePolicy::ContinueOnFailure)
        .build()
        .await;

    let report = h
        .coordinator
        .sync_device(DeviceSyncRequest::new(
            &h.device.id,
            vec![
                track_target("p1", "First"),
                track_target("p2", "Broken"),
                track_target("p3", "Third"),
            ],
            scan(),
        ))
        .await
        .unwrap();

    assert_eq!(report.written_count(), 2);
    assert_eq!(report.failed_count(), 1);
    assert!(matches!(
        report.targets[1].status,
        TargetStatus::Failed { .. }
    ));
    assert!(h.exists("PLAYLISTS/third.m3u"));
    assert_eq!(h.manifests.find_by_device(&h.device.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_missing_handle_stops_before_any_target() {
    let h = HarnessBuilder::new().without_registered_handle().build().await;

    let err = h
        .coordinator
        .sync_device(DeviceSyncRequest::new(
            &h.device.id,
            vec![track_target("p1", "First")],
            scan(),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::HandleNotFound));
    assert_eq!(err.to_string(), "Device folder handle not found");
    assert!(h.manifests.find_by_device(&h.device.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unmounted_device_is_handle_not_found() {
    let store = SqliteHandleStore::in_memory().await.unwrap();
    store
        .register("walkman-1", PathBuf::from("/definitely/not/mounted/WALKMAN"), None)
        .await
        .unwrap();
    let h = HarnessBuilder::new().handle_store(Arc::new(store)).build().await;

    let err = h
        .coordinator
        .sync_device(DeviceSyncRequest::new(&h.device.id, vec![], scan()))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::HandleNotFound));
}

/// Directory whose host refuses write access
struct ReadOnlyDevice;

#[async_trait]
impl DeviceDirectory for ReadOnlyDevice {
    fn name(&self) -> &str {
        "LOCKED"
    }

    async fn query_permission(&self, mode: AccessMode) -> bridge_traits::Result<PermissionState> {
        Ok(match mode {
            AccessMode::Read => PermissionState::Granted,
            AccessMode::ReadWrite => PermissionState::Denied,
        })
    }

    async fn request_permission(&self, mode: AccessMode) -> bridge_traits::Result<PermissionState> {
        self.query_permission(mode).await
    }

    async fn metadata(&self, relative_path: &str) -> bridge_traits::Result<FileMetadata> {
        Err(BridgeError::NotFound {
            path: relative_path.to_string(),
        })
    }

    async fn create_dir_all(&self, _relative_path: &str) -> bridge_traits::Result<()> {
        Err(BridgeError::PermissionDenied("read-only".to_string()))
    }

    async fn read_file(&self, relative_path: &str) -> bridge_traits::Result<Bytes> {
        Err(BridgeError::NotFound {
            path: relative_path.to_string(),
        })
    }

    async fn write_file(&self, _relative_path: &str, _data: Bytes) -> bridge_traits::Result<()> {
        Err(BridgeError::PermissionDenied("read-only".to_string()))
    }
}

struct FixedHandleStore {
    supported: bool,
}

#[async_trait]
impl DirectoryHandleStore for FixedHandleStore {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn resolve(
        &self,
        _handle_ref: &str,
    ) -> bridge_traits::Result<Option<Arc<dyn DeviceDirectory>>> {
        Ok(Some(Arc::new(ReadOnlyDevice)))
    }

    async fn forget(&self, _handle_ref: &str) -> bridge_traits::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_permission_denied_is_surfaced() {
    let h = HarnessBuilder::new()
        .handle_store(Arc::new(FixedHandleStore { supported: true }))
        .policy(BatchFailurePolicy::ContinueOnFailure)
        .build()
        .await;

    let err = h
        .coordinator
        .sync_device(DeviceSyncRequest::new(
            &h.device.id,
            vec![track_target("p1", "First")],
            scan(),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::PermissionDenied));
    assert_eq!(err.to_string(), "Permission denied for device folder");
    assert_eq!(h.last_sync_at().await, None);
}

#[tokio::test]
async fn test_unsupported_environment_fails_fast() {
    let h = HarnessBuilder::new()
        .handle_store(Arc::new(FixedHandleStore { supported: false }))
        .build()
        .await;

    let err = h
        .coordinator
        .sync_device(DeviceSyncRequest::new(
            &h.device.id,
            vec![track_target("p1", "First")],
            scan(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::UnsupportedEnvironment));
}

#[tokio::test]
async fn test_unknown_device() {
    let h = HarnessBuilder::new().build().await;
    let err = h
        .coordinator
        .sync_device(DeviceSyncRequest::new("nope", vec![], scan()))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::DeviceNotFound { .. }));
}

#[tokio::test]
async fn test_needs_sync_tracks_manifest_hash() {
    let h = HarnessBuilder::new().build().await;
    let options = SyncOptions::default();
    let original = track_target("p1", "Road Trip");

    assert!(h
        .coordinator
        .needs_sync(&h.device.id, &original, &scan(), &options)
        .await
        .unwrap());

    h.coordinator
        .sync_device(DeviceSyncRequest::new(
            &h.device.id,
            vec![original.clone()],
            scan(),
        ))
        .await
        .unwrap();

    assert!(!h
        .coordinator
        .needs_sync(&h.device.id, &original, &scan(), &options)
        .await
        .unwrap());

    let mut grown = original.clone();
    grown
        .lookups
        .push(lookup("other", "Library/Other/other.mp3", Some("h-other")));
    assert!(h
        .coordinator
        .needs_sync(&h.device.id, &grown, &scan(), &options)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_validate_after_sync_and_after_removal() {
    let h = HarnessBuilder::new().build().await;
    h.touch("MUSIC/Artist/Album/Track.mp3");

    h.coordinator
        .sync_device(DeviceSyncRequest::new(
            &h.device.id,
            vec![track_target("p1", "Road Trip")],
            scan(),
        ))
        .await
        .unwrap();

    let report = h.coordinator.validate_playlist(&h.device.id, "p1").await.unwrap();
    assert_eq!(report.total, 1);
    assert_eq!(report.missing, 0);

    std::fs::remove_file(h.root.join("MUSIC/Artist/Album/Track.mp3")).unwrap();
    let report = h.coordinator.validate_playlist(&h.device.id, "p1").await.unwrap();
    assert_eq!(report.missing, 1);
    assert_eq!(report.missing_samples, vec!["../MUSIC/Artist/Album/Track.mp3"]);
}

/// Sync one playlist with every scanned track, then validate it
async fn sync_then_validate(h: &Harness) -> (String, core_sync::ValidationReport) {
    h.touch("MUSIC/Artist/Album/Track.mp3");
    h.touch("MUSIC/Other/other.mp3");
    let lookups = vec![
        lookup("track", "Library/Artist/Album/Track.mp3", Some("h-track")),
        lookup("other", "Library/Other/other.mp3", Some("h-other")),
    ];

    let report = h
        .coordinator
        .sync_device(DeviceSyncRequest::new(
            &h.device.id,
            vec![target("p1", "Road Trip", lookups)],
            scan(),
        ))
        .await
        .unwrap();
    let path = match &report.targets[0].status {
        TargetStatus::Written { path, .. } => path.clone(),
        other => panic!("playlist not written: {other:?}"),
    };

    let validation = h.coordinator.validate_playlist(&h.device.id, "p1").await.unwrap();
    (h.read(&path), validation)
}

#[tokio::test]
async fn test_nested_playlist_folder_round_trips() {
    let h = HarnessBuilder::new()
        .playlist_folder("PLAYLISTS/MUSIC")
        .build()
        .await;

    let (content, report) = sync_then_validate(&h).await;

    assert_eq!(
        content,
        "#EXTM3U\n../../MUSIC/Artist/Album/Track.mp3\n../../MUSIC/Other/other.mp3\n"
    );
    assert_eq!(report.total, 2);
    assert_eq!(report.missing, 0);
    assert!(report.is_valid());
}

#[tokio::test]
async fn test_absolute_with_inferred_prefix_round_trips() {
    let h = HarnessBuilder::new().absolute(None).build().await;

    let (content, report) = sync_then_validate(&h).await;

    assert_eq!(
        content,
        "#EXTM3U\n/WALKMAN/MUSIC/Artist/Album/Track.mp3\n/WALKMAN/MUSIC/Other/other.mp3\n"
    );
    assert_eq!(report.total, 2);
    assert_eq!(report.missing, 0);
}

#[tokio::test]
async fn test_absolute_with_explicit_prefix_round_trips() {
    for prefix in ["/WALKMAN/MUSIC", "/media/alice/WALKMAN"] {
        let h = HarnessBuilder::new().absolute(Some(prefix)).build().await;

        let (content, report) = sync_then_validate(&h).await;

        assert!(content.contains(&format!("{}/", prefix)), "{}", content);
        assert_eq!(report.total, 2, "prefix {}", prefix);
        assert_eq!(report.missing, 0, "prefix {}: {:?}", prefix, report.missing_samples);
    }
}

#[tokio::test]
async fn test_validate_reports_unreadable_playlist() {
    let h = HarnessBuilder::new().build().await;
    h.coordinator
        .sync_device(DeviceSyncRequest::new(
            &h.device.id,
            vec![track_target("p1", "Road Trip")],
            scan(),
        ))
        .await
        .unwrap();
    std::fs::remove_file(h.root.join("PLAYLISTS/road-trip.m3u")).unwrap();

    let report = h.coordinator.validate_playlist(&h.device.id, "p1").await.unwrap();
    assert!(report.read_error.is_some());
    assert!(!report.is_valid());
}

#[tokio::test]
async fn test_validate_counts_entry_absent_from_device() {
    let h = HarnessBuilder::new().build().await;
    h.touch("other.mp3");
    std::fs::write(h.root.join("manual.m3u"), "#EXTM3U\ntrack.mp3\n").unwrap();
    h.manifests
        .upsert(&DeviceSyncManifest {
            id: DeviceSyncManifest::manifest_id(&h.device.id, "manual"),
            device_id: h.device.id.clone(),
            playlist_id: "manual".to_string(),
            playlist_path: "manual.m3u".to_string(),
            playlist_format: PlaylistFormat::M3u,
            track_count: 1,
            config_hash: "x".to_string(),
            synced_at: NOW,
        })
        .await
        .unwrap();

    let report = h
        .coordinator
        .validate_playlist(&h.device.id, "manual")
        .await
        .unwrap();
    assert_eq!(report.missing, 1);
    assert_eq!(report.missing_samples, vec!["track.mp3"]);
}

#[tokio::test]
async fn test_validate_unsynced_playlist() {
    let h = HarnessBuilder::new().build().await;
    let err = h
        .coordinator
        .validate_playlist(&h.device.id, "never")
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::ManifestNotFound { .. }));
}

#[tokio::test]
async fn test_database_backed_device_delegates_batch() {
    let mut device = MockDatabaseDevice::new();
    device
        .expect_sync()
        .withf(|request| {
            request.only_reference_existing_tracks
                && !request.overwrite_existing_playlist
                && request.targets.len() == 2
                && request.existing_mappings.is_empty()
        })
        .times(1)
        .returning(|request| {
            Ok(DatabaseSyncResult {
                written: vec![DatabasePlaylistWrite {
                    playlist_id: "p1".to_string(),
                    playlist_path: "iPod_Control/iTunes/p1".to_string(),
                    track_ids: vec!["track".to_string()],
                }],
                track_mappings: vec![DeviceTrackMapping::new(
                    request.profile.id.clone(),
                    "track",
                    "ipod-77",
                )],
            })
        });

    let h = HarnessBuilder::new().ipod(device).build().await;

    let options = SyncOptions {
        only_reference_existing_tracks: true,
        ..Default::default()
    };
    let report = h
        .coordinator
        .sync_device(
            DeviceSyncRequest::new(
                &h.device.id,
                vec![track_target("p1", "First"), track_target("p2", "Second")],
                scan(),
            )
            .with_options(options),
        )
        .await
        .unwrap();

    assert_eq!(report.written_count(), 1);
    assert_eq!(report.targets[1].status, TargetStatus::Skipped);

    let manifest = h.manifests.find(&h.device.id, "p1").await.unwrap().unwrap();
    assert_eq!(manifest.playlist_path, "iPod_Control/iTunes/p1");

    let mapping = h
        .mappings
        .find(&h.device.id, "track")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(mapping.device_track_id, "ipod-77");
}

#[tokio::test]
async fn test_database_backed_failure_fails_batch() {
    let mut device = MockDatabaseDevice::new();
    device
        .expect_sync()
        .returning(|_| Err(SyncError::DatabaseDevice("database locked".to_string())));

    let h = HarnessBuilder::new().ipod(device).build().await;
    let err = h
        .coordinator
        .sync_device(DeviceSyncRequest::new(
            &h.device.id,
            vec![track_target("p1", "First")],
            scan(),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::DatabaseDevice(_)));
    assert!(h.manifests.find(&h.device.id, "p1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_ipod_without_database_support() {
    let h = HarnessBuilder::new().build().await;
    let ipod = h
        .registry
        .add_device(DeviceProfile::new("iPod", DeviceType::Ipod, "walkman-1"))
        .await
        .unwrap();

    let err = h
        .coordinator
        .sync_device(DeviceSyncRequest::new(&ipod.id, vec![], scan()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::UnsupportedDeviceType {
            device_type: DeviceType::Ipod
        }
    ));
}

#[tokio::test]
async fn test_remove_device_drops_manifests() {
    let h = HarnessBuilder::new().build().await;
    h.coordinator
        .sync_device(DeviceSyncRequest::new(
            &h.device.id,
            vec![track_target("p1", "First")],
            scan(),
        ))
        .await
        .unwrap();

    h.registry.remove_device(&h.device.id).await.unwrap();

    assert!(h.manifests.find_by_device(&h.device.id).await.unwrap().is_empty());
    assert!(h.mappings.find_by_device(&h.device.id).await.unwrap().is_empty());
}

#[test]
fn test_full_hash_round_trip() {
    let entries: Vec<DeviceScanEntry> = (0..25)
        .map(|i| {
            DeviceScanEntry::new(format!("MUSIC/Disc {}/{:02} Song.mp3", i % 3, i))
                .with_content_hash(format!("hash-{}", i))
        })
        .collect();
    let index = DeviceScanIndex::build(&entries);
    let resolver = DevicePathResolver::default();

    for (i, entry) in entries.iter().enumerate() {
        let hash = format!("hash-{}", i);
        let lookup = lookup(&format!("t{}", i), "Library/Song.mp3", Some(&hash));
        let found = resolver.resolve(&lookup, &index).unwrap();
        assert_eq!(found.path, entry.relative_path);
        assert_eq!(found.tier, MatchTierKind::FullContentHash);
    }
}

#[test]
fn test_full_hash_takes_precedence_over_fuzzy_filename() {
    let index = DeviceScanIndex::build(&[
        DeviceScanEntry::new("MUSIC/Artist/Track.mp3"),
        DeviceScanEntry::new("MUSIC/Misc/renamed.mp3").with_content_hash("k1"),
    ]);
    let lookup = lookup("t", "Library/Artist/01 - Track.mp3", Some("k1"));

    let found = DevicePathResolver::default()
        .resolve(&lookup, &index)
        .unwrap();
    assert_eq!(found.path, "MUSIC/Misc/renamed.mp3");
}
