//! keptn-utils
//!
//! Client-side plumbing for a keptn installation:
//!
//! - [`store`] - access to the configuration service, a versioned
//!   project/stage/service resource store
//! - [`events`] - typed dispatch of keptn CloudEvents to a single handler,
//!   plus an HTTP receiver that feeds it
//! - [`config`] - persistent settings shared by the `keptn-utils` binary
//!
//! # Example
//!
//! ```ignore
//! use keptn_utils::store::{Resource, ResourceClient, Scope, TransportConfig};
//!
//! async fn example() -> Result<(), keptn_utils::store::Error> {
//!     let client = ResourceClient::new(TransportConfig::anonymous("configuration-service:8080")?);
//!     let scope = Scope::stage("sockshop", "dev");
//!     let version = client
//!         .update_resource(&scope, &Resource::new("values.yaml", "replicas: 2"))
//!         .await?;
//!     let resource = client.get_resource(&scope, "values.yaml").await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod events;
pub mod store;
