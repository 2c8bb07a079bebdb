//! gRPC service for the Terraform Plugin Protocol v6
//!
//! GrpcProviderService decodes each protocol request, hands it to the
//! in-process ProviderServer and encodes the result. Values travel as
//! msgpack, and every state sent back carries all top-level attributes of
//! its schema.

use crate::context::Context;
use crate::proto;
use crate::proto::ProviderService;
use crate::provider::Provider;
use crate::schema::{AttributeType, Schema, StringKind};
use crate::server::ProviderServer;
use crate::types::{
    AttributePath, AttributePathStep, Diagnostic, DiagnosticSeverity, Dynamic, DynamicValue,
    ServerCapabilities,
};
use std::collections::HashMap;
use std::sync::Arc;
use tonic::{Request, Response, Status};

pub struct GrpcProviderService<P: Provider> {
    server: Arc<ProviderServer<P>>,
    /// Shared by every request, cancelled by StopProvider
    stop: Context,
}

impl<P: Provider> GrpcProviderService<P> {
    pub fn new(provider: P) -> Self {
        Self::from_server(Arc::new(ProviderServer::new(provider)))
    }

    pub fn from_server(server: Arc<ProviderServer<P>>) -> Self {
        Self {
            server,
            stop: Context::new(),
        }
    }

    fn context(&self) -> Context {
        self.stop.clone()
    }

    async fn resource_state(
        &self,
        type_name: &str,
        state: DynamicValue,
    ) -> Result<proto::DynamicValue, Status> {
        let schema = self.server.resource_schema(self.context(), type_name).await;
        encode_value(&conform_to_schema(state, schema.as_ref()))
    }
}

#[tonic::async_trait]
impl<P: Provider + 'static> ProviderService for GrpcProviderService<P> {
    async fn get_metadata(
        &self,
        _request: Request<proto::get_metadata::Request>,
    ) -> Result<Response<proto::get_metadata::Response>, Status> {
        let metadata = self.server.metadata(self.context()).await;
        let schemas = self.server.get_provider_schema(self.context()).await;

        let mut resources: Vec<String> = schemas.resources.into_keys().collect();
        resources.sort();
        let mut data_sources: Vec<String> = schemas.data_sources.into_keys().collect();
        data_sources.sort();

        Ok(Response::new(proto::get_metadata::Response {
            server_capabilities: Some(encode_capabilities(&metadata.server_capabilities)),
            diagnostics: encode_diagnostics(schemas.diagnostics),
            data_sources: data_sources
                .into_iter()
                .map(|type_name| proto::get_metadata::DataSourceMetadata { type_name })
                .collect(),
            resources: resources
                .into_iter()
                .map(|type_name| proto::get_metadata::ResourceMetadata { type_name })
                .collect(),
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<proto::get_provider_schema::Request>,
    ) -> Result<Response<proto::get_provider_schema::Response>, Status> {
        let metadata = self.server.metadata(self.context()).await;
        let schemas = self.server.get_provider_schema(self.context()).await;

        let mut resource_schemas = HashMap::new();
        for (type_name, schema) in &schemas.resources {
            resource_schemas.insert(type_name.clone(), encode_schema(schema)?);
        }
        let mut data_source_schemas = HashMap::new();
        for (type_name, schema) in &schemas.data_sources {
            data_source_schemas.insert(type_name.clone(), encode_schema(schema)?);
        }

        Ok(Response::new(proto::get_provider_schema::Response {
            provider: Some(encode_schema(&schemas.provider)?),
            resource_schemas,
            data_source_schemas,
            diagnostics: encode_diagnostics(schemas.diagnostics),
            provider_meta: None,
            server_capabilities: Some(encode_capabilities(&metadata.server_capabilities)),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<proto::validate_provider_config::Request>,
    ) -> Result<Response<proto::validate_provider_config::Response>, Status> {
        let req = request.into_inner();
        let config = decode_value(req.config.as_ref())?;

        let diagnostics = self
            .server
            .validate_provider_config(self.context(), config)
            .await;

        Ok(Response::new(proto::validate_provider_config::Response {
            diagnostics: encode_diagnostics(diagnostics),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<proto::validate_resource_config::Request>,
    ) -> Result<Response<proto::validate_resource_config::Response>, Status> {
        let req = request.into_inner();
        let config = decode_value(req.config.as_ref())?;

        let diagnostics = self
            .server
            .validate_resource_config(self.context(), &req.type_name, config)
            .await;

        Ok(Response::new(proto::validate_resource_config::Response {
            diagnostics: encode_diagnostics(diagnostics),
        }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<proto::validate_data_resource_config::Request>,
    ) -> Result<Response<proto::validate_data_resource_config::Response>, Status> {
        let req = request.into_inner();
        let config = decode_value(req.config.as_ref())?;

        let diagnostics = self
            .server
            .validate_data_resource_config(self.context(), &req.type_name, config)
            .await;

        Ok(Response::new(proto::validate_data_resource_config::Response {
            diagnostics: encode_diagnostics(diagnostics),
        }))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<proto::upgrade_resource_state::Request>,
    ) -> Result<Response<proto::upgrade_resource_state::Response>, Status> {
        let req = request.into_inner();

        // Schemas are still at version 0, so upgrading only re-encodes the
        // stored JSON state
        let json = req.raw_state.map(|raw| raw.json).unwrap_or_default();
        if json.is_empty() {
            return Ok(Response::new(proto::upgrade_resource_state::Response {
                upgraded_state: None,
                diagnostics: encode_diagnostics(vec![Diagnostic::error(
                    "Unable to Upgrade Resource State",
                    format!(
                        "The stored state for {} is not JSON encoded. Flatmap state from Terraform 0.11 and earlier is not supported.",
                        req.type_name
                    ),
                )]),
            }));
        }

        let state = DynamicValue::decode_json(&json)
            .map_err(|e| Status::invalid_argument(e.to_string()))?;

        Ok(Response::new(proto::upgrade_resource_state::Response {
            upgraded_state: Some(self.resource_state(&req.type_name, state).await?),
            diagnostics: vec![],
        }))
    }

    async fn configure_provider(
        &self,
        request: Request<proto::configure_provider::Request>,
    ) -> Result<Response<proto::configure_provider::Response>, Status> {
        let req = request.into_inner();
        let config = decode_value(req.config.as_ref())?;

        tracing::info!("Configuring provider for Terraform {}", req.terraform_version);
        let diagnostics = self
            .server
            .configure_provider(self.context(), &req.terraform_version, config)
            .await;

        Ok(Response::new(proto::configure_provider::Response {
            diagnostics: encode_diagnostics(diagnostics),
        }))
    }

    async fn read_resource(
        &self,
        request: Request<proto::read_resource::Request>,
    ) -> Result<Response<proto::read_resource::Response>, Status> {
        let req = request.into_inner();
        let current_state = decode_value(req.current_state.as_ref())?;

        let response = self
            .server
            .read_resource(self.context(), &req.type_name, current_state)
            .await;

        // No new state means the remote object is gone
        let new_state = response.new_state.unwrap_or_else(DynamicValue::null);

        Ok(Response::new(proto::read_resource::Response {
            new_state: Some(self.resource_state(&req.type_name, new_state).await?),
            diagnostics: encode_diagnostics(response.diagnostics),
            private: req.private,
        }))
    }

    async fn plan_resource_change(
        &self,
        request: Request<proto::plan_resource_change::Request>,
    ) -> Result<Response<proto::plan_resource_change::Response>, Status> {
        let req = request.into_inner();
        let prior_state = decode_value(req.prior_state.as_ref())?;
        let config = decode_value(req.config.as_ref())?;

        let planned = self
            .server
            .plan_resource_change(self.context(), &req.type_name, &prior_state, &config)
            .await;

        Ok(Response::new(proto::plan_resource_change::Response {
            planned_state: Some(
                self.resource_state(&req.type_name, planned.planned_state)
                    .await?,
            ),
            requires_replace: planned.requires_replace.iter().map(encode_path).collect(),
            planned_private: req.prior_private,
            diagnostics: encode_diagnostics(planned.diagnostics),
            legacy_type_system: false,
        }))
    }

    async fn apply_resource_change(
        &self,
        request: Request<proto::apply_resource_change::Request>,
    ) -> Result<Response<proto::apply_resource_change::Response>, Status> {
        let req = request.into_inner();
        let prior_state = decode_value(req.prior_state.as_ref())?;
        let planned_state = decode_value(req.planned_state.as_ref())?;
        let config = decode_value(req.config.as_ref())?;

        let applied = self
            .server
            .apply_resource_change(
                self.context(),
                &req.type_name,
                prior_state,
                planned_state,
                config,
            )
            .await;

        Ok(Response::new(proto::apply_resource_change::Response {
            new_state: Some(self.resource_state(&req.type_name, applied.new_state).await?),
            private: req.planned_private,
            diagnostics: encode_diagnostics(applied.diagnostics),
            legacy_type_system: false,
        }))
    }

    async fn import_resource_state(
        &self,
        request: Request<proto::import_resource_state::Request>,
    ) -> Result<Response<proto::import_resource_state::Response>, Status> {
        let req = request.into_inner();

        let response = self
            .server
            .import_resource_state(self.context(), &req.type_name, &req.id)
            .await;

        let mut imported_resources = Vec::with_capacity(response.imported_resources.len());
        for imported in response.imported_resources {
            let state = self
                .resource_state(&imported.type_name, imported.state)
                .await?;
            imported_resources.push(proto::import_resource_state::ImportedResource {
                type_name: imported.type_name,
                state: Some(state),
                private: vec![],
            });
        }

        Ok(Response::new(proto::import_resource_state::Response {
            imported_resources,
            diagnostics: encode_diagnostics(response.diagnostics),
        }))
    }

    async fn read_data_source(
        &self,
        request: Request<proto::read_data_source::Request>,
    ) -> Result<Response<proto::read_data_source::Response>, Status> {
        let req = request.into_inner();
        let config = decode_value(req.config.as_ref())?;

        let response = self
            .server
            .read_data_source(self.context(), &req.type_name, config)
            .await;
        let schema = self
            .server
            .data_source_schema(self.context(), &req.type_name)
            .await;

        Ok(Response::new(proto::read_data_source::Response {
            state: Some(encode_value(&conform_to_schema(
                response.state,
                schema.as_ref(),
            ))?),
            diagnostics: encode_diagnostics(response.diagnostics),
        }))
    }

    async fn stop_provider(
        &self,
        _request: Request<proto::stop_provider::Request>,
    ) -> Result<Response<proto::stop_provider::Response>, Status> {
        tracing::info!("Stop requested, cancelling in-flight operations");
        self.stop.cancel();
        let error = self.server.stop_provider(self.context()).await;

        Ok(Response::new(proto::stop_provider::Response {
            error: error.unwrap_or_default(),
        }))
    }
}

/// Fill in null for every top-level attribute the state leaves out
fn conform_to_schema(state: DynamicValue, schema: Option<&Schema>) -> DynamicValue {
    match (state.value, schema) {
        (Dynamic::Map(mut values), Some(schema)) => {
            for attr in &schema.block.attributes {
                values.entry(attr.name.clone()).or_insert(Dynamic::Null);
            }
            DynamicValue::new(Dynamic::Map(values))
        }
        (value, _) => DynamicValue::new(value),
    }
}

#[allow(clippy::result_large_err)]
fn decode_value(value: Option<&proto::DynamicValue>) -> Result<DynamicValue, Status> {
    let Some(value) = value else {
        return Ok(DynamicValue::null());
    };

    let decoded = if !value.msgpack.is_empty() {
        DynamicValue::decode_msgpack(&value.msgpack)
    } else if !value.json.is_empty() {
        DynamicValue::decode_json(&value.json)
    } else {
        Ok(DynamicValue::null())
    };
    decoded.map_err(|e| Status::invalid_argument(e.to_string()))
}

#[allow(clippy::result_large_err)]
fn encode_value(value: &DynamicValue) -> Result<proto::DynamicValue, Status> {
    let msgpack = value
        .encode_msgpack()
        .map_err(|e| Status::internal(e.to_string()))?;
    Ok(proto::DynamicValue {
        msgpack,
        json: vec![],
    })
}

#[allow(clippy::result_large_err)]
fn encode_schema(schema: &Schema) -> Result<proto::Schema, Status> {
    let mut attributes = Vec::with_capacity(schema.block.attributes.len());
    for attr in &schema.block.attributes {
        attributes.push(proto::schema::Attribute {
            name: attr.name.clone(),
            r#type: serde_json::to_vec(&type_json(&attr.r#type))
                .map_err(|e| Status::internal(format!("failed to encode type: {}", e)))?,
            description: attr.description.clone(),
            required: attr.required,
            optional: attr.optional,
            computed: attr.computed,
            sensitive: attr.sensitive,
            description_kind: proto::StringKind::Plain as i32,
            deprecated: attr.deprecated,
        });
    }

    Ok(proto::Schema {
        version: schema.version,
        block: Some(proto::schema::Block {
            version: schema.block.version,
            attributes,
            description: schema.block.description.clone(),
            description_kind: encode_string_kind(schema.block.description_kind),
            deprecated: schema.block.deprecated,
        }),
    })
}

/// Terraform's JSON type notation, e.g. `"string"` or `["map","string"]`
fn type_json(attr_type: &AttributeType) -> serde_json::Value {
    use serde_json::json;

    match attr_type {
        AttributeType::String => json!("string"),
        AttributeType::Number => json!("number"),
        AttributeType::Bool => json!("bool"),
        AttributeType::List(elem) => json!(["list", type_json(elem)]),
        AttributeType::Set(elem) => json!(["set", type_json(elem)]),
        AttributeType::Map(elem) => json!(["map", type_json(elem)]),
        AttributeType::Object(attrs) => {
            let attrs: serde_json::Map<String, serde_json::Value> = attrs
                .iter()
                .map(|(name, attr_type)| (name.clone(), type_json(attr_type)))
                .collect();
            json!(["object", attrs])
        }
    }
}

fn encode_string_kind(kind: StringKind) -> i32 {
    match kind {
        StringKind::Plain => proto::StringKind::Plain as i32,
        StringKind::Markdown => proto::StringKind::Markdown as i32,
    }
}

fn encode_capabilities(capabilities: &ServerCapabilities) -> proto::ServerCapabilities {
    proto::ServerCapabilities {
        plan_destroy: capabilities.plan_destroy,
        get_provider_schema_optional: capabilities.get_provider_schema_optional,
        move_resource_state: capabilities.move_resource_state,
    }
}

fn encode_diagnostics(diagnostics: Vec<Diagnostic>) -> Vec<proto::Diagnostic> {
    diagnostics
        .into_iter()
        .map(|diagnostic| proto::Diagnostic {
            severity: match diagnostic.severity {
                DiagnosticSeverity::Error => proto::diagnostic::Severity::Error as i32,
                DiagnosticSeverity::Warning => proto::diagnostic::Severity::Warning as i32,
            },
            summary: diagnostic.summary,
            detail: diagnostic.detail,
            attribute: diagnostic.attribute.as_ref().map(encode_path),
        })
        .collect()
}

fn encode_path(path: &AttributePath) -> proto::AttributePath {
    use proto::attribute_path::step::Selector;

    proto::AttributePath {
        steps: path
            .steps
            .iter()
            .map(|step| proto::attribute_path::Step {
                selector: Some(match step {
                    AttributePathStep::AttributeName(name) => Selector::AttributeName(name.clone()),
                    AttributePathStep::ElementKeyString(key) => {
                        Selector::ElementKeyString(key.clone())
                    }
                    AttributePathStep::ElementKeyInt(idx) => Selector::ElementKeyInt(*idx),
                }),
            })
            .collect(),
    }
}
