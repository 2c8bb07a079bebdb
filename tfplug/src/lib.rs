//! tfplug - Terraform Plugin Framework for Rust
//!
//! A framework for building Terraform providers in Rust: the value model,
//! schema builders, planning, the provider/resource/data source traits and
//! the plugin protocol v6 gRPC server.

// Core modules
pub mod context;
pub mod error;
pub mod schema;
pub mod types;

// Provider API modules
pub mod data_source;
pub mod provider;
pub mod resource;

// Helper modules
pub mod import;
pub mod plan;
pub mod plan_modifier;
pub mod validator;

pub mod server;

// Plugin protocol
pub mod grpc;
pub mod proto;
pub mod serve;

// Re-exports for convenience
pub use context::Context;
pub use data_source::{DataSource, DataSourceWithConfigure};
pub use error::{Result, TfplugError};
pub use import::import_state_passthrough_id;
pub use provider::{DataSourceFactory, Provider, ResourceFactory};
pub use resource::{Resource, ResourceWithConfigure, ResourceWithImportState};
pub use schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
pub use grpc::GrpcProviderService;
pub use serve::{serve, ServeConfig};
pub use server::ProviderServer;
pub use types::{has_errors, AttributePath, Diagnostic, Dynamic, DynamicValue};
