//! Smart Bridge Core
//!
//! Platform-agnostic catalog model and collaborator traits for adaptive
//! ("Smart Bridge") playback of music releases.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Catalog Model**: `Song`, `Connection`, `Catalog` and the raw manifest
//!   shapes they are normalized from
//! - **Collaborator Traits**: `CatalogLoader`, `SourceResolver`, `CollectionStore`
//! - **Error Handling**: unified `CoreError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use bridge_core::types::{Catalog, RawCatalog, RawSong, RawFiles, RawMediaRef};
//!
//! let raw = RawCatalog {
//!     songs: vec![RawSong {
//!         slot: Some(1),
//!         title: Some("Opening".to_string()),
//!         files: RawFiles {
//!             a: Some(RawMediaRef::key("storage/opening-a.mp3")),
//!             ..RawFiles::default()
//!         },
//!     }],
//!     ..RawCatalog::default()
//! };
//!
//! let catalog = Catalog::from_raw("release-1", raw).unwrap();
//! assert_eq!(catalog.songs().len(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod collection;
pub mod error;
pub mod traits;
pub mod types;

pub use collection::{CollectionEntry, JsonFileCollectionStore, MemoryCollectionStore};
pub use error::{CoreError, Result};
pub use traits::{CatalogLoader, CollectionStore, SourceResolver};
pub use types::{Catalog, Choice, Connection, EdgeKey, MediaRef, ReleaseId, Song, Variants};
