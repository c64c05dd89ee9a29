mod catalog;
mod ids;
mod raw;

pub use catalog::{Catalog, Choice, Connection, EdgeKey, MediaRef, Song, Variants};
pub use ids::ReleaseId;
pub use raw::{RawCatalog, RawConnection, RawFiles, RawMediaRef, RawSong};
