//! Configuration service access
//!
//! This module provides everything needed to read and write resources held by
//! the keptn configuration service.
//!
//! # Module Structure
//!
//! - [`transport`] - Base URL, scheme, auth and the HTTP client shared by all calls
//! - [`path`] - Scope type and REST path construction
//! - [`codec`] - Base64 transport encoding of resource content
//! - [`client`] - CRUD and paginated listing over the REST API
//! - [`chart`] - Storage of packaged Helm charts as opaque blobs
//! - [`error`] - Error taxonomy shared by the above
//!
//! # Example
//!
//! ```ignore
//! use keptn_utils::store::{ResourceClient, Scope, TransportConfig};
//!
//! async fn example() -> Result<(), keptn_utils::store::Error> {
//!     let client = ResourceClient::new(TransportConfig::anonymous("localhost:8080")?);
//!     for resource in client.list_stage_resources("sockshop", "dev").await? {
//!         println!("{}", resource.uri);
//!     }
//!     Ok(())
//! }
//! ```

pub mod chart;
pub mod client;
pub mod codec;
pub mod error;
pub mod path;
pub mod transport;

pub use chart::{get_chart, store_chart};
pub use client::{Resource, ResourceClient};
pub use error::{DecodeError, Error, Operation, Result};
pub use path::{resource_path, Scope};
pub use transport::{Scheme, TransportBuilder, TransportConfig};
