//! Paste resource implementation
//!
//! Pastes are immutable once created: every input forces replacement, update
//! always fails and delete only drops the paste from state, since the service
//! has no delete-by-token call in this client.

use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::plan_modifier::{RequiresReplaceIfChanged, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure,
    ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringOneOf;
use url::Url;

use crate::api::{CompressionAlgorithm, CreatePasteOptions, ShowPasteOptions};
use crate::provider_data::{PastebinProviderData, EXPIRATIONS, FORMATTERS};

/// Terraform view of a `pastebin_paste` instance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PasteResourceModel {
    pub id: Option<String>,
    pub content: Option<String>,
    pub attachment_name: Option<String>,
    pub formatter: Option<String>,
    pub expire: Option<String>,
    pub password: Option<String>,
    pub open_discussion: Option<bool>,
    pub burn_after_reading: Option<bool>,
    pub gzip: Option<bool>,
    pub url: Option<String>,
    pub delete_token: Option<String>,
}

impl PasteResourceModel {
    /// Unknown values read as None, like null ones
    pub fn from_value(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let string = |name: &str| {
            value
                .get_optional_string(&AttributePath::new(name))
                .map_err(|e| invalid_attribute(name, e))
        };
        let boolean = |name: &str| {
            value
                .get_optional_bool(&AttributePath::new(name))
                .map_err(|e| invalid_attribute(name, e))
        };

        Ok(Self {
            id: string("id")?,
            content: string("content")?,
            attachment_name: string("attachment_name")?,
            formatter: string("formatter")?,
            expire: string("expire")?,
            password: string("password")?,
            open_discussion: boolean("open_discussion")?,
            burn_after_reading: boolean("burn_after_reading")?,
            gzip: boolean("gzip")?,
            url: string("url")?,
            delete_token: string("delete_token")?,
        })
    }

    pub fn to_value(&self) -> DynamicValue {
        let mut map = std::collections::HashMap::new();
        let mut put = |name: &str, value: Dynamic| {
            map.insert(name.to_string(), value);
        };

        put("id", self.id.clone().into());
        put("content", self.content.clone().into());
        put("attachment_name", self.attachment_name.clone().into());
        put("formatter", self.formatter.clone().into());
        put("expire", self.expire.clone().into());
        put("password", self.password.clone().into());
        put("open_discussion", self.open_discussion.into());
        put("burn_after_reading", self.burn_after_reading.into());
        put("gzip", self.gzip.into());
        put("url", self.url.clone().into());
        put("delete_token", self.delete_token.clone().into());

        DynamicValue::new(Dynamic::Map(map))
    }

    /// Fill every unset paste option from the provider defaults
    pub fn resolve_defaults(&mut self, defaults: &PastebinProviderData) {
        if self.formatter.as_deref().map_or(true, str::is_empty) {
            self.formatter = Some(defaults.formatter.clone());
        }
        if self.expire.as_deref().map_or(true, str::is_empty) {
            self.expire = Some(defaults.expire.clone());
        }
        self.gzip.get_or_insert(defaults.gzip);
        self.open_discussion.get_or_insert(defaults.open_discussion);
        self.burn_after_reading
            .get_or_insert(defaults.burn_after_reading);
    }

    /// Assumes [`resolve_defaults`](Self::resolve_defaults) already ran
    fn create_options(&self) -> CreatePasteOptions {
        let defaults = CreatePasteOptions::default();
        CreatePasteOptions {
            attachment_name: self.attachment_name.clone().filter(|n| !n.is_empty()),
            formatter: self.formatter.clone().unwrap_or(defaults.formatter),
            expire: self.expire.clone().unwrap_or(defaults.expire),
            password: self.password.clone().filter(|p| !p.is_empty()),
            open_discussion: self.open_discussion.unwrap_or_default(),
            burn_after_reading: self.burn_after_reading.unwrap_or_default(),
            compression: if self.gzip.unwrap_or(true) {
                CompressionAlgorithm::Gzip
            } else {
                CompressionAlgorithm::None
            },
        }
    }
}

fn invalid_attribute(name: &str, error: impl std::fmt::Display) -> Diagnostic {
    Diagnostic::error(
        "Invalid Attribute Value",
        format!("Unable to read attribute {}: {}", name, error),
    )
    .with_attribute(AttributePath::new(name))
}

fn not_configured() -> Diagnostic {
    Diagnostic::error(
        "Provider not configured",
        "Provider data was not properly configured",
    )
}

#[derive(Default)]
pub struct PasteResource {
    provider_data: Option<PastebinProviderData>,
}

impl PasteResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Pastebin paste resource")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Paste identifier")
                    .computed()
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("content", AttributeType::String)
                    .description("The content of the paste")
                    .required()
                    .plan_modifier(Box::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("attachment_name", AttributeType::String)
                    .description("Name for the attachment (makes the paste an attachment)")
                    .optional()
                    .plan_modifier(Box::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("formatter", AttributeType::String)
                    .description("Text formatter (plaintext, markdown, syntaxhighlighting)")
                    .optional()
                    .computed()
                    .validator(Box::new(StringOneOf::new(FORMATTERS)))
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .plan_modifier(Box::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("expire", AttributeType::String)
                    .description(
                        "Expiration time (5min, 10min, 1hour, 1day, 1week, 1month, 1year, never)",
                    )
                    .optional()
                    .computed()
                    .validator(Box::new(StringOneOf::new(EXPIRATIONS)))
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .plan_modifier(Box::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("password", AttributeType::String)
                    .description("Password to protect the paste")
                    .optional()
                    .sensitive()
                    .plan_modifier(Box::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("open_discussion", AttributeType::Bool)
                    .description("Enable discussion/comments on the paste")
                    .optional()
                    .computed()
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .plan_modifier(Box::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("burn_after_reading", AttributeType::Bool)
                    .description("Delete the paste after first read")
                    .optional()
                    .computed()
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .plan_modifier(Box::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("gzip", AttributeType::Bool)
                    .description("Enable gzip compression")
                    .optional()
                    .computed()
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .plan_modifier(Box::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("url", AttributeType::String)
                    .description("URL of the created paste")
                    .computed()
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("delete_token", AttributeType::String)
                    .description("Delete token for the paste")
                    .computed()
                    .sensitive()
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .build()
    }
}

#[async_trait]
impl Resource for PasteResource {
    fn type_name(&self) -> &str {
        "pastebin_paste"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        ValidateResourceConfigResponse {
            diagnostics: tfplug::plan::validate_config(&Self::schema_static(), &request.config),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let provider_data = match &self.provider_data {
            Some(data) => data,
            None => {
                return CreateResourceResponse {
                    new_state: DynamicValue::null(),
                    diagnostics: vec![not_configured()],
                };
            }
        };

        let mut model = match PasteResourceModel::from_value(&request.planned_state) {
            Ok(model) => model,
            Err(diagnostic) => {
                return CreateResourceResponse {
                    new_state: DynamicValue::null(),
                    diagnostics: vec![diagnostic],
                };
            }
        };
        model.resolve_defaults(provider_data);

        let content = model.content.clone().unwrap_or_default();
        let options = model.create_options();
        tracing::debug!(
            "Creating paste (formatter={}, expire={}, attachment={})",
            options.formatter,
            options.expire,
            options.attachment_name.is_some()
        );

        match provider_data
            .client
            .create_paste(&ctx, content.as_bytes(), &options)
            .await
        {
            Ok(result) => {
                tracing::info!("Created paste {}", result.paste_id);
                model.id = Some(result.paste_id);
                model.url = Some(result.paste_url.to_string());
                model.delete_token = Some(result.delete_token);

                CreateResourceResponse {
                    new_state: model.to_value(),
                    diagnostics: vec![],
                }
            }
            Err(e) => CreateResourceResponse {
                new_state: DynamicValue::null(),
                diagnostics: vec![Diagnostic::error(
                    "Client Error",
                    format!("Unable to create paste, got error: {}", e),
                )],
            },
        }
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let provider_data = match &self.provider_data {
            Some(data) => data,
            None => {
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics: vec![not_configured()],
                };
            }
        };

        let model = match PasteResourceModel::from_value(&request.current_state) {
            Ok(model) => model,
            Err(diagnostic) => {
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics: vec![diagnostic],
                };
            }
        };

        let raw_url = model.url.clone().unwrap_or_default();
        if raw_url.is_empty() {
            tracing::warn!(
                "Paste {} has no URL in state, removing it",
                model.id.as_deref().unwrap_or_default()
            );
            return ReadResourceResponse {
                new_state: None,
                diagnostics: vec![],
            };
        }

        let paste_url = match Url::parse(&raw_url) {
            Ok(url) => url,
            Err(e) => {
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics: vec![Diagnostic::error(
                        "Client Error",
                        format!("Unable to parse paste URL: {}", e),
                    )],
                };
            }
        };

        let options = ShowPasteOptions {
            password: model.password.clone().filter(|p| !p.is_empty()),
            confirm_burn: false,
        };

        match provider_data
            .client
            .show_paste(&ctx, &paste_url, &options)
            .await
        {
            Ok(_) => ReadResourceResponse {
                new_state: Some(model.to_value()),
                diagnostics: vec![],
            },
            Err(e) => {
                tracing::warn!(
                    "Paste {} could not be read, removing it from state: {}",
                    model.id.as_deref().unwrap_or_default(),
                    e
                );
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![],
                }
            }
        }
    }

    async fn update(
        &self,
        _ctx: Context,
        request: UpdateResourceRequest,
    ) -> UpdateResourceResponse {
        UpdateResourceResponse {
            new_state: request.prior_state,
            diagnostics: vec![Diagnostic::error(
                "Update Not Supported",
                "Paste resources are immutable and cannot be updated. Any changes require replacement.",
            )],
        }
    }

    async fn delete(
        &self,
        _ctx: Context,
        request: DeleteResourceRequest,
    ) -> DeleteResourceResponse {
        match PasteResourceModel::from_value(&request.prior_state) {
            Ok(model) => {
                tracing::debug!(
                    "Removing paste {} from state",
                    model.id.as_deref().unwrap_or_default()
                );
                DeleteResourceResponse {
                    diagnostics: vec![],
                }
            }
            Err(diagnostic) => DeleteResourceResponse {
                diagnostics: vec![diagnostic],
            },
        }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for PasteResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let mut diagnostics = vec![];

        // Schema and validation calls arrive before the provider is configured
        if let Some(data) = request.provider_data {
            match data.downcast_ref::<PastebinProviderData>() {
                Some(provider_data) => self.provider_data = Some(provider_data.clone()),
                None => diagnostics.push(Diagnostic::error(
                    "Unexpected Resource Configure Type",
                    "Expected PastebinProviderData, got an unrecognized type. Please report this issue to the provider developers.",
                )),
            }
        }

        ConfigureResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithImportState for PasteResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse::default();
        import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}

#[cfg(test)]
#[path = "./paste_test.rs"]
mod paste_test;
