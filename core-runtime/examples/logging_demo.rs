//! Logging system demonstration
//!
//! Emits the kind of events a device sync produces, in each output format.
//!
//! Run with:
//! ```bash
//! # Pretty format (default in debug)
//! cargo run --example logging_demo
//!
//! # JSON format
//! cargo run --example logging_demo -- json
//!
//! # Compact format with a custom filter
//! cargo run --example logging_demo -- compact "logging_demo=trace"
//! ```

use bridge_traits::LogLevel;
use core_runtime::logging::{init_logging, strip_path, LogFormat, LoggingConfig};
use std::env;
use tracing::{debug, error, info, instrument, trace, warn};

#[tokio::main]
async fn main() -> core_runtime::Result<()> {
    let args: Vec<String> = env::args().collect();

    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        Some("pretty") => LogFormat::Pretty,
        _ => LogFormat::default(),
    };

    let mut config = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Trace)
        .with_spans(true)
        .with_target(true);

    if let Some(filter) = args.get(2) {
        config = config.with_filter(filter.clone());
    } else {
        config = config.with_filter("logging_demo=trace");
    }

    init_logging(config)?;

    info!(format = ?format, "Logging initialized");

    sync_device("walkman-1", &["road-trip", "broken", "chill"]).await;

    Ok(())
}

#[instrument(fields(targets = playlists.len()))]
async fn sync_device(device_id: &str, playlists: &[&str]) {
    let mount = "/Volumes/WALKMAN/MUSIC/Artist/Album/01 Track.mp3";
    trace!(file = %strip_path(mount), "Scanned device file");

    let mut written = 0;
    for playlist_id in playlists {
        if write_playlist(playlist_id).await {
            written += 1;
        }
    }

    info!(written, failed = playlists.len() - written, "Device sync finished");
}

#[instrument]
async fn write_playlist(playlist_id: &str) -> bool {
    debug!(track_id = "t-42", "No device file matched track");

    if playlist_id == "broken" {
        error!(error = "renderer crashed", "Playlist sync failed");
        return false;
    }

    warn!(path = "../../outside.mp3", "Path escapes library root, excluded");
    tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
    info!(path = %format!("PLAYLISTS/{}.m3u", playlist_id), "Wrote playlist to device");
    true
}
