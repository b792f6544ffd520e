//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! This crate provides production-ready implementations of the device bridge
//! traits using desktop-appropriate libraries:
//! - `DeviceDirectory` over a mounted folder using `tokio::fs`
//! - `DirectoryHandleStore` persisting mount paths in SQLite
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{SqliteHandleStore, TokioDeviceDirectory};
//! use bridge_traits::DirectoryHandleStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let handles = SqliteHandleStore::new("handles.db".into()).await.unwrap();
//!     handles.register("walkman", "/media/user/WALKMAN".into(), None).await.unwrap();
//!     let root = handles.resolve("walkman").await.unwrap();
//!
//!     // Use in core configuration
//! }
//! ```

mod filesystem;
mod handles;

pub use filesystem::TokioDeviceDirectory;
pub use handles::SqliteHandleStore;
