//! Join operators over device-resident tables.
//!
//! [`cross_join`] is the core operator: explicit stream and memory
//! resource, asynchronous with respect to the host. [`api`] adds the
//! default-resolving convenience layer and [`JoinExecutor`] an async
//! front end driven by an [`EngineConfig`].

pub mod api;
pub mod config;
pub mod cross_join;
pub mod error;
pub mod executor;
pub mod join;

pub use api::JoinOptions;
pub use config::{BuiltResource, EngineConfig, ResourceKind};
pub use cross_join::{cross_join, CrossJoin};
pub use error::JoinError;
pub use executor::JoinExecutor;
pub use join::{JoinKind, JoinOperator};
