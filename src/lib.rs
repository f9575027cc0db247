//! Hemmer Ghost Provider
//!
//! A Hemmer provider managing applications on a Ghost / Cloud Deploy
//! server. It exposes one resource, `ghost_app`, and one data source,
//! `ghost_apps`.
//!
//! # Overview
//!
//! - **Config**: credentials and endpoint, turned into an API client
//! - **Client**: the five `/apps` REST calls, behind the [`AppsApi`] trait
//! - **Resource**: schema, validation, planning with diff suppression and
//!   the CRUD handlers mapping configuration to and from the API model
//! - **Provider**: [`GhostProvider`], the [`ProviderService`] implementation
//!   the host drives
//!
//! # Quick Start
//!
//! ```no_run
//! use hemmer_provider_ghost::{GhostProvider, ProviderService};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), hemmer_provider_ghost::ProviderError> {
//! hemmer_provider_ghost::init_logging();
//!
//! let provider = GhostProvider::new();
//! provider
//!     .configure(json!({
//!         "user": "admin",
//!         "password": "secret",
//!         "endpoint": "https://ghost.example.com"
//!     }))
//!     .await?;
//!
//! let apps = provider.read_data_source("ghost_apps", json!({"env": "prod"})).await?;
//! println!("{}", apps);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod encoding;
pub mod error;
pub mod logging;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod service;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use client::{AppsApi, ClientError, GhostClient};
pub use config::Config;
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::GhostProvider;
pub use schema::{Attribute, AttributeType, Block, Diagnostic, NestedBlock, ProviderSchema, Schema};
pub use service::ProviderService;
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::validate;

// Re-export commonly used dependencies
pub use async_trait::async_trait;
pub use serde_json;
pub use tracing;
