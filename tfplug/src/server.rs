//! In-process provider server
//!
//! ProviderServer drives a Provider through the same sequence of calls
//! Terraform makes over the plugin protocol: configure once, then
//! validate/plan/apply/read/import per resource and read per data source.
//! Each call builds a fresh resource or data source from the provider's
//! factories and configures it with the stored provider data.

use crate::context::Context;
use crate::data_source::{
    ConfigureDataSourceRequest, DataSourceSchemaRequest, DataSourceWithConfigure,
    ReadDataSourceRequest, ReadDataSourceResponse, ValidateDataSourceConfigRequest,
};
use crate::error::TfplugError;
use crate::plan::{self, PlannedChange};
use crate::provider::{
    ConfigureProviderRequest, Provider, ProviderMetadataRequest, ProviderMetadataResponse,
    ProviderSchemaRequest, StopProviderRequest, ValidateProviderConfigRequest,
};
use crate::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, ResourceSchemaRequest, ResourceWithConfigure, UpdateResourceRequest,
    ValidateResourceConfigRequest,
};
use crate::schema::Schema;
use crate::types::{has_errors, Diagnostic, DynamicValue};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type ProviderData = Option<Arc<dyn Any + Send + Sync>>;

/// Every schema the provider exposes
pub struct ProviderSchemas {
    pub provider: Schema,
    pub resources: HashMap<String, Schema>,
    pub data_sources: HashMap<String, Schema>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Outcome of ApplyResourceChange
pub struct ApplyResourceChangeResponse {
    /// Null after a successful destroy or a failed create
    pub new_state: DynamicValue,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ProviderServer<P: Provider> {
    provider: RwLock<P>,
    provider_data: RwLock<ProviderData>,
}

impl<P: Provider> ProviderServer<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider: RwLock::new(provider),
            provider_data: RwLock::new(None),
        }
    }

    pub async fn metadata(&self, ctx: Context) -> ProviderMetadataResponse {
        let provider = self.provider.read().await;
        provider.metadata(ctx, ProviderMetadataRequest).await
    }

    /// Schema of a single resource type, None when the type is unknown
    pub async fn resource_schema(&self, ctx: Context, type_name: &str) -> Option<Schema> {
        let resource = {
            let provider = self.provider.read().await;
            let factory = provider.resources().remove(type_name)?;
            factory()
        };
        Some(resource.schema(ctx, ResourceSchemaRequest).await.schema)
    }

    /// Schema of a single data source type, None when the type is unknown
    pub async fn data_source_schema(&self, ctx: Context, type_name: &str) -> Option<Schema> {
        let data_source = {
            let provider = self.provider.read().await;
            let factory = provider.data_sources().remove(type_name)?;
            factory()
        };
        Some(
            data_source
                .schema(ctx, DataSourceSchemaRequest)
                .await
                .schema,
        )
    }

    pub async fn get_provider_schema(&self, ctx: Context) -> ProviderSchemas {
        let provider = self.provider.read().await;
        let response = provider
            .schema(ctx.clone(), ProviderSchemaRequest)
            .await;
        let mut diagnostics = response.diagnostics;

        let mut resources = HashMap::new();
        for (type_name, factory) in provider.resources() {
            let resource = factory();
            let response = resource.schema(ctx.clone(), ResourceSchemaRequest).await;
            diagnostics.extend(response.diagnostics);
            resources.insert(type_name, response.schema);
        }

        let mut data_sources = HashMap::new();
        for (type_name, factory) in provider.data_sources() {
            let data_source = factory();
            let response = data_source
                .schema(ctx.clone(), DataSourceSchemaRequest)
                .await;
            diagnostics.extend(response.diagnostics);
            data_sources.insert(type_name, response.schema);
        }

        ProviderSchemas {
            provider: response.schema,
            resources,
            data_sources,
            diagnostics,
        }
    }

    pub async fn validate_provider_config(
        &self,
        ctx: Context,
        config: DynamicValue,
    ) -> Vec<Diagnostic> {
        let provider = self.provider.read().await;
        provider
            .validate(ctx, ValidateProviderConfigRequest { config })
            .await
            .diagnostics
    }

    /// Configure the provider and keep its provider data for later calls
    pub async fn configure_provider(
        &self,
        ctx: Context,
        terraform_version: &str,
        config: DynamicValue,
    ) -> Vec<Diagnostic> {
        let mut provider = self.provider.write().await;
        tracing::debug!("Configuring provider {}", provider.type_name());

        let response = provider
            .configure(
                ctx,
                ConfigureProviderRequest {
                    terraform_version: terraform_version.to_string(),
                    config,
                },
            )
            .await;

        if !has_errors(&response.diagnostics) {
            *self.provider_data.write().await = response.provider_data;
        }

        response.diagnostics
    }

    pub async fn stop_provider(&self, ctx: Context) -> Option<String> {
        let provider = self.provider.read().await;
        provider.stop(ctx, StopProviderRequest).await.error
    }

    pub async fn validate_resource_config(
        &self,
        ctx: Context,
        type_name: &str,
        config: DynamicValue,
    ) -> Vec<Diagnostic> {
        let resource = match self.resource(ctx.clone(), type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => return diagnostics,
        };

        resource
            .validate(
                ctx,
                ValidateResourceConfigRequest {
                    type_name: type_name.to_string(),
                    config,
                },
            )
            .await
            .diagnostics
    }

    pub async fn plan_resource_change(
        &self,
        ctx: Context,
        type_name: &str,
        prior_state: &DynamicValue,
        config: &DynamicValue,
    ) -> PlannedChange {
        let resource = match self.resource(ctx.clone(), type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return PlannedChange {
                    planned_state: prior_state.clone(),
                    requires_replace: vec![],
                    diagnostics,
                }
            }
        };

        let response = resource.schema(ctx, ResourceSchemaRequest).await;
        let mut planned = plan::plan_resource_change(&response.schema, prior_state, config);
        planned.diagnostics.splice(0..0, response.diagnostics);
        planned
    }

    /// Dispatch to create, update or delete based on which states are null
    pub async fn apply_resource_change(
        &self,
        ctx: Context,
        type_name: &str,
        prior_state: DynamicValue,
        planned_state: DynamicValue,
        config: DynamicValue,
    ) -> ApplyResourceChangeResponse {
        let resource = match self.resource(ctx.clone(), type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return ApplyResourceChangeResponse {
                    new_state: prior_state,
                    diagnostics,
                }
            }
        };
        let type_name = type_name.to_string();

        match (prior_state.is_null(), planned_state.is_null()) {
            (true, true) => ApplyResourceChangeResponse {
                new_state: DynamicValue::null(),
                diagnostics: vec![],
            },
            (true, false) => {
                tracing::debug!("Creating {}", type_name);
                let response = resource
                    .create(
                        ctx,
                        CreateResourceRequest {
                            type_name,
                            planned_state,
                            config,
                        },
                    )
                    .await;
                ApplyResourceChangeResponse {
                    new_state: response.new_state,
                    diagnostics: response.diagnostics,
                }
            }
            (false, true) => {
                tracing::debug!("Deleting {}", type_name);
                let response = resource
                    .delete(
                        ctx,
                        DeleteResourceRequest {
                            type_name,
                            prior_state: prior_state.clone(),
                        },
                    )
                    .await;
                let new_state = if has_errors(&response.diagnostics) {
                    prior_state
                } else {
                    DynamicValue::null()
                };
                ApplyResourceChangeResponse {
                    new_state,
                    diagnostics: response.diagnostics,
                }
            }
            (false, false) => {
                tracing::debug!("Updating {}", type_name);
                let response = resource
                    .update(
                        ctx,
                        UpdateResourceRequest {
                            type_name,
                            prior_state,
                            planned_state,
                            config,
                        },
                    )
                    .await;
                ApplyResourceChangeResponse {
                    new_state: response.new_state,
                    diagnostics: response.diagnostics,
                }
            }
        }
    }

    pub async fn read_resource(
        &self,
        ctx: Context,
        type_name: &str,
        current_state: DynamicValue,
    ) -> ReadResourceResponse {
        let resource = match self.resource(ctx.clone(), type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return ReadResourceResponse {
                    new_state: Some(current_state),
                    diagnostics,
                }
            }
        };

        resource
            .read(
                ctx,
                ReadResourceRequest {
                    type_name: type_name.to_string(),
                    current_state,
                },
            )
            .await
    }

    pub async fn import_resource_state(
        &self,
        ctx: Context,
        type_name: &str,
        id: &str,
    ) -> ImportResourceStateResponse {
        let resource = match self.resource(ctx.clone(), type_name).await {
            Ok(resource) => resource,
            Err(diagnostics) => {
                return ImportResourceStateResponse {
                    imported_resources: vec![],
                    diagnostics,
                }
            }
        };

        let Some(importer) = resource.as_import_state() else {
            return ImportResourceStateResponse {
                imported_resources: vec![],
                diagnostics: vec![Diagnostic::error(
                    "Resource Import Not Implemented",
                    format!(
                        "This resource does not support import. Please contact the provider developer for additional information. Resource type: {}",
                        type_name
                    ),
                )],
            };
        };

        importer
            .import_state(
                ctx,
                ImportResourceStateRequest {
                    type_name: type_name.to_string(),
                    id: id.to_string(),
                },
            )
            .await
    }

    pub async fn validate_data_resource_config(
        &self,
        ctx: Context,
        type_name: &str,
        config: DynamicValue,
    ) -> Vec<Diagnostic> {
        let data_source = match self.data_source(ctx.clone(), type_name).await {
            Ok(data_source) => data_source,
            Err(diagnostics) => return diagnostics,
        };

        data_source
            .validate(
                ctx,
                ValidateDataSourceConfigRequest {
                    type_name: type_name.to_string(),
                    config,
                },
            )
            .await
            .diagnostics
    }

    pub async fn read_data_source(
        &self,
        ctx: Context,
        type_name: &str,
        config: DynamicValue,
    ) -> ReadDataSourceResponse {
        let data_source = match self.data_source(ctx.clone(), type_name).await {
            Ok(data_source) => data_source,
            Err(diagnostics) => {
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics,
                }
            }
        };

        data_source
            .read(
                ctx,
                ReadDataSourceRequest {
                    type_name: type_name.to_string(),
                    config,
                },
            )
            .await
    }

    async fn resource(
        &self,
        ctx: Context,
        type_name: &str,
    ) -> Result<Box<dyn ResourceWithConfigure>, Vec<Diagnostic>> {
        let mut resource = {
            let provider = self.provider.read().await;
            let factories = provider.resources();
            let factory = factories.get(type_name).ok_or_else(|| {
                vec![Diagnostic::error(
                    "Resource Type Not Found",
                    TfplugError::ResourceNotFound(type_name.to_string()).to_string(),
                )]
            })?;
            factory()
        };

        let provider_data = self.provider_data.read().await.clone();
        let response = resource
            .configure(ctx, ConfigureResourceRequest { provider_data })
            .await;
        if has_errors(&response.diagnostics) {
            return Err(response.diagnostics);
        }

        Ok(resource)
    }

    async fn data_source(
        &self,
        ctx: Context,
        type_name: &str,
    ) -> Result<Box<dyn DataSourceWithConfigure>, Vec<Diagnostic>> {
        let mut data_source = {
            let provider = self.provider.read().await;
            let factories = provider.data_sources();
            let factory = factories.get(type_name).ok_or_else(|| {
                vec![Diagnostic::error(
                    "Data Source Type Not Found",
                    TfplugError::DataSourceNotFound(type_name.to_string()).to_string(),
                )]
            })?;
            factory()
        };

        let provider_data = self.provider_data.read().await.clone();
        let response = data_source
            .configure(ctx, ConfigureDataSourceRequest { provider_data })
            .await;
        if has_errors(&response.diagnostics) {
            return Err(response.diagnostics);
        }

        Ok(data_source)
    }
}
