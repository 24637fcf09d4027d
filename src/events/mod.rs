//! Keptn event handling
//!
//! # Module Structure
//!
//! - [`types`] - Event type names and payload structures
//! - [`envelope`] - The CloudEvent wrapper events arrive in
//! - [`dispatcher`] - Typed routing of envelopes to a handler
//! - [`receiver`] - HTTP listener feeding the dispatcher
//! - [`error`] - Dispatch failures
//!
//! # Example
//!
//! ```ignore
//! use keptn_utils::events::{receiver, Dispatcher, EventHandler, KeptnEvent, ReceiverConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! struct Printer;
//!
//! #[async_trait::async_trait]
//! impl EventHandler for Printer {
//!     async fn handle(&self, event: KeptnEvent, keptn_context: &str, event_id: &str) -> anyhow::Result<()> {
//!         println!("{} {} {:?}", keptn_context, event_id, event);
//!         Ok(())
//!     }
//! }
//!
//! async fn example() -> std::io::Result<()> {
//!     receiver::serve(&ReceiverConfig::default(), Dispatcher::new(Printer), CancellationToken::new()).await
//! }
//! ```

pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod receiver;
pub mod types;

pub use dispatcher::{Dispatcher, EventHandler, FanOut};
pub use envelope::Envelope;
pub use error::DispatchError;
pub use receiver::ReceiverConfig;
pub use types::KeptnEvent;
