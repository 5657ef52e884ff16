//! Conveyor Plan Panel Common Library
//!
//! Plan and resource types, the resource update normalizer, dependency map
//! filtering and the backend API client shared by the panel service and CLI.

pub mod actions;
pub mod api;
pub mod client;
pub mod config;
pub mod deps;
pub mod error;
pub mod normalize;
pub mod plan_ref;
pub mod topology;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

// Re-export commonly used types
pub use actions::{allowed_actions, FormAction, RowAction};
pub use api::ConveyorApi;
pub use client::HttpConveyorApi;
pub use config::{BackendConfig, PanelConfig, WebConfig};
pub use deps::{filter_deps, DependencyEntry, DependencyMap, DisplayFlags};
pub use error::{Error, Result};
pub use normalize::{
    normalize_update_resources, normalize_update_value, NormalizeError, NormalizedResource, Record,
};
pub use topology::D3Graph;
pub use types::*;

/// Panel version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
