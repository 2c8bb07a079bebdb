//! Protocol buffer types for Terraform Plugin Protocol v6
//!
//! Generated at build time by tonic_build from `proto/tfplugin6.proto`.
//! Several messages share names with framework types (`DynamicValue`,
//! `Diagnostic`, `AttributePath`, `Schema`), so refer to these through the
//! `proto::` prefix.

include!(concat!(env!("OUT_DIR"), "/tfplugin6.rs"));

pub use provider_server::{Provider as ProviderService, ProviderServer as ProviderServiceServer};
