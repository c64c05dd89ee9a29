//! Smart Bridge Backend Client
//!
//! HTTP implementations of the Smart Bridge collaborator traits against the
//! release backend.
//!
//! # Features
//!
//! - **Catalog loading**: resolve a release id to its published manifest and
//!   normalize it into a `Catalog` ([`HttpCatalogLoader`])
//! - **Source signing**: turn storage keys into playable URLs
//!   ([`HttpSourceResolver`])
//!
//! # Example
//!
//! ```ignore
//! use bridge_client::{BackendClient, ClientConfig, HttpCatalogLoader, HttpSourceResolver};
//! use bridge_core::{CatalogLoader, ReleaseId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = BackendClient::new(ClientConfig::new("https://api.example.com"))?;
//!     let loader = HttpCatalogLoader::new(client.clone());
//!     let resolver = HttpSourceResolver::new(client);
//!
//!     let catalog = loader
//!         .load_catalog(&ReleaseId::new("f6692a3b94aad73430ed55a6"))
//!         .await?;
//!     println!("{} songs", catalog.songs().len());
//!     Ok(())
//! }
//! ```

mod catalog;
mod client;
mod error;
pub mod manifest;
mod resolver;
mod types;

pub use catalog::HttpCatalogLoader;
pub use client::BackendClient;
pub use error::{ClientError, Result};
pub use resolver::HttpSourceResolver;
pub use types::{ClientConfig, PlaybackUrlResponse};
