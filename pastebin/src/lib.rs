//! Terraform provider for PrivateBin compatible pastebin services

pub mod api;
pub mod data_sources;
pub mod provider_data;
pub mod resources;

pub use provider_data::PastebinProviderData;

use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::data_source::DataSourceWithConfigure;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderMetadataRequest, ProviderMetadataResponse, ProviderSchemaRequest,
    ProviderSchemaResponse, ResourceFactory, StopProviderRequest, StopProviderResponse,
    ValidateProviderConfigRequest, ValidateProviderConfigResponse,
};
use tfplug::resource::ResourceWithConfigure;
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue, ServerCapabilities};
use tfplug::validator::StringOneOf;
use url::Url;

use crate::provider_data::{EXPIRATIONS, FORMATTERS};

pub const ENV_HOST: &str = "PASTEBIN_HOST";
pub const ENV_USERNAME: &str = "PASTEBIN_USERNAME";
pub const ENV_PASSWORD: &str = "PASTEBIN_PASSWORD";

pub struct PastebinProvider {
    version: String,
}

impl Default for PastebinProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl PastebinProvider {
    pub fn new() -> Self {
        Self::with_version(env!("CARGO_PKG_VERSION"))
    }

    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    fn default_user_agent(&self) -> String {
        format!("terraform-provider-pastebin/{}", self.version)
    }

    fn provider_schema() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Interact with a PrivateBin compatible pastebin")
            .attribute(
                AttributeBuilder::new("host", AttributeType::String)
                    .description("Pastebin instance host URL")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("username", AttributeType::String)
                    .description("Username for basic authentication")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("password", AttributeType::String)
                    .description("Password for basic authentication")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("skip_tls_verify", AttributeType::Bool)
                    .description("Skip TLS certificate verification")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("user_agent", AttributeType::String)
                    .description("Custom User-Agent header")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "extra_headers",
                    AttributeType::Map(Box::new(AttributeType::String)),
                )
                .description("Extra HTTP headers to include in requests")
                .optional()
                .build(),
            )
            .attribute(
                AttributeBuilder::new("expire", AttributeType::String)
                    .description("Default expiration time for pastes")
                    .optional()
                    .validator(Box::new(StringOneOf::new(EXPIRATIONS)))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("formatter", AttributeType::String)
                    .description(
                        "Default formatter for pastes (plaintext, markdown, syntaxhighlighting)",
                    )
                    .optional()
                    .validator(Box::new(StringOneOf::new(FORMATTERS)))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("gzip", AttributeType::Bool)
                    .description("Enable gzip compression by default")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("open_discussion", AttributeType::Bool)
                    .description("Enable discussion on pastes by default")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("burn_after_reading", AttributeType::Bool)
                    .description("Enable burn after reading by default")
                    .optional()
                    .build(),
            )
            .build()
    }

    fn build_provider_data(
        &self,
        config: &DynamicValue,
    ) -> Result<PastebinProviderData, Diagnostic> {
        let host = extract_string(config, "host", Some(ENV_HOST))?;
        let username = extract_string(config, "username", Some(ENV_USERNAME))?;
        let password = extract_string(config, "password", Some(ENV_PASSWORD))?;
        let user_agent = match config.get(&AttributePath::new("user_agent")) {
            None | Some(Dynamic::Null) => self.default_user_agent(),
            _ => extract_string(config, "user_agent", None)?,
        };

        if host.is_empty() {
            return Err(Diagnostic::error(
                "Unknown Pastebin Host",
                format!(
                    "The provider cannot create the Pastebin API client as there is an unknown configuration value for the Pastebin host. \
                     Either target apply the source of the value first, set the value statically in the configuration, or use the {} environment variable.",
                    ENV_HOST
                ),
            )
            .with_attribute(AttributePath::new("host")));
        }

        let base_url = Url::parse(&host).map_err(|e| {
            Diagnostic::error(
                "Invalid Pastebin Host",
                format!("The provided host URL is invalid: {}", e),
            )
            .with_attribute(AttributePath::new("host"))
        })?;

        let basic_auth = if !username.is_empty() || !password.is_empty() {
            Some((username, password))
        } else {
            None
        };

        let client_config = api::ClientConfig {
            user_agent,
            basic_auth,
            skip_tls_verify: extract_bool(config, "skip_tls_verify")?.unwrap_or(false),
            headers: extract_headers(config)?,
        };

        let client = api::Client::with_config(base_url, client_config).map_err(|e| match e {
            api::ApiError::InvalidHeader { .. } => Diagnostic::error(
                "Invalid Extra Headers",
                format!("Unable to use extra_headers: {}", e),
            )
            .with_attribute(AttributePath::new("extra_headers")),
            other => Diagnostic::error(
                "Unable to Create Pastebin Client",
                format!("An unexpected error occurred when creating the Pastebin client: {}", other),
            ),
        })?;

        let mut data = PastebinProviderData::new(client);

        let expire = extract_string(config, "expire", None)?;
        if !expire.is_empty() {
            data.expire = expire;
        }
        let formatter = extract_string(config, "formatter", None)?;
        if !formatter.is_empty() {
            data.formatter = formatter;
        }
        if let Some(gzip) = extract_bool(config, "gzip")? {
            data.gzip = gzip;
        }
        if let Some(open_discussion) = extract_bool(config, "open_discussion")? {
            data.open_discussion = open_discussion;
        }
        if let Some(burn_after_reading) = extract_bool(config, "burn_after_reading")? {
            data.burn_after_reading = burn_after_reading;
        }

        Ok(data)
    }
}

/// Null or missing falls back to `env`; an unknown value reads as empty
fn extract_string(
    config: &DynamicValue,
    name: &str,
    env: Option<&str>,
) -> Result<String, Diagnostic> {
    match config.get(&AttributePath::new(name)) {
        None | Some(Dynamic::Null) => Ok(env
            .and_then(|key| std::env::var(key).ok())
            .unwrap_or_default()),
        Some(Dynamic::Unknown) => Ok(String::new()),
        Some(Dynamic::String(value)) => Ok(value.clone()),
        Some(other) => Err(Diagnostic::error(
            "Invalid Provider Configuration",
            format!("Attribute {} must be a string, got {}", name, other.type_name()),
        )
        .with_attribute(AttributePath::new(name))),
    }
}

fn extract_bool(config: &DynamicValue, name: &str) -> Result<Option<bool>, Diagnostic> {
    config
        .get_optional_bool(&AttributePath::new(name))
        .map_err(|e| {
            Diagnostic::error(
                "Invalid Provider Configuration",
                format!("Attribute {} must be a bool: {}", name, e),
            )
            .with_attribute(AttributePath::new(name))
        })
}

fn extract_headers(config: &DynamicValue) -> Result<HashMap<String, String>, Diagnostic> {
    let path = AttributePath::new("extra_headers");
    match config.get(&path) {
        None | Some(Dynamic::Null) | Some(Dynamic::Unknown) => Ok(HashMap::new()),
        Some(Dynamic::Map(entries)) => entries
            .iter()
            .map(|(name, value)| match value {
                Dynamic::String(value) => Ok((name.clone(), value.clone())),
                other => Err(Diagnostic::error(
                    "Invalid Extra Headers",
                    format!(
                        "Header {} must be a string, got {}",
                        name,
                        other.type_name()
                    ),
                )
                .with_attribute(path.clone().key(name))),
            })
            .collect(),
        Some(other) => Err(Diagnostic::error(
            "Invalid Extra Headers",
            format!("extra_headers must be a map of strings, got {}", other.type_name()),
        )
        .with_attribute(path.clone())),
    }
}

#[async_trait]
impl Provider for PastebinProvider {
    fn type_name(&self) -> &str {
        "pastebin"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: self.type_name().to_string(),
            version: self.version.clone(),
            server_capabilities: ServerCapabilities::default(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ProviderSchemaRequest,
    ) -> ProviderSchemaResponse {
        ProviderSchemaResponse {
            schema: Self::provider_schema(),
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        tracing::debug!(
            "Configuring pastebin provider for Terraform {}",
            request.terraform_version
        );

        match self.build_provider_data(&request.config) {
            Ok(data) => {
                tracing::info!(
                    "Configured pastebin client for {}",
                    data.client.base_url()
                );
                ConfigureProviderResponse {
                    diagnostics: vec![],
                    provider_data: Some(Arc::new(data) as Arc<dyn Any + Send + Sync>),
                }
            }
            Err(diagnostic) => {
                tracing::warn!("Provider configuration failed: {}", diagnostic.summary);
                ConfigureProviderResponse {
                    diagnostics: vec![diagnostic],
                    provider_data: None,
                }
            }
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateProviderConfigRequest,
    ) -> ValidateProviderConfigResponse {
        ValidateProviderConfigResponse {
            diagnostics: tfplug::plan::validate_config(&Self::provider_schema(), &request.config),
        }
    }

    async fn stop(&self, _ctx: Context, _request: StopProviderRequest) -> StopProviderResponse {
        StopProviderResponse { error: None }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut factories: HashMap<String, ResourceFactory> = HashMap::new();
        factories.insert(
            "pastebin_paste".to_string(),
            Box::new(|| {
                Box::new(resources::PasteResource::new()) as Box<dyn ResourceWithConfigure>
            }),
        );
        factories
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut factories: HashMap<String, DataSourceFactory> = HashMap::new();
        factories.insert(
            "pastebin_paste".to_string(),
            Box::new(|| {
                Box::new(data_sources::PasteDataSource::new()) as Box<dyn DataSourceWithConfigure>
            }),
        );
        factories
    }
}
