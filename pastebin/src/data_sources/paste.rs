//! Paste data source implementation

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceMetadataRequest,
    DataSourceMetadataResponse, DataSourceSchemaRequest, DataSourceSchemaResponse,
    DataSourceWithConfigure, ReadDataSourceRequest, ReadDataSourceResponse,
    ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringLength;
use url::Url;

use crate::api::{ShowPasteOptions, ShowPasteResult};
use crate::provider_data::PastebinProviderData;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PasteDataSourceModel {
    pub id: Option<String>,
    pub url: String,
    pub password: Option<String>,
    pub confirm_burn: Option<bool>,
    pub content: Option<String>,
    pub attachment_name: Option<String>,
    pub attachment_data: Option<String>,
    pub mime_type: Option<String>,
    pub comment_count: Option<u64>,
}

impl PasteDataSourceModel {
    fn from_config(config: &DynamicValue) -> Result<Self, Diagnostic> {
        let url = config
            .get_string(&AttributePath::new("url"))
            .map_err(|_| Diagnostic::error("Missing url", "The 'url' attribute is required"))?;
        let password = config
            .get_optional_string(&AttributePath::new("password"))
            .map_err(|e| Diagnostic::error("Invalid password", e.to_string()))?;
        let confirm_burn = config
            .get_optional_bool(&AttributePath::new("confirm_burn"))
            .map_err(|e| Diagnostic::error("Invalid confirm_burn", e.to_string()))?;

        Ok(Self {
            url,
            password,
            confirm_burn,
            ..Default::default()
        })
    }

    /// Copy what was fetched into the computed attributes
    fn apply(&mut self, result: ShowPasteResult) {
        let paste = result.paste;

        self.id = Some(result.paste_id);
        self.content = Some(String::from_utf8_lossy(&paste.data).into_owned());
        self.comment_count = Some(result.comment_count);

        if !paste.attachment_name.is_empty() {
            self.attachment_name = Some(paste.attachment_name);
            self.mime_type = Some(paste.mime_type);
        }
        if !paste.attachment.is_empty() {
            self.attachment_data = Some(STANDARD.encode(&paste.attachment));
        }
    }

    fn to_value(&self) -> DynamicValue {
        let mut map = HashMap::new();
        map.insert("id".to_string(), self.id.clone().into());
        map.insert("url".to_string(), self.url.clone().into());
        map.insert("password".to_string(), self.password.clone().into());
        map.insert("confirm_burn".to_string(), self.confirm_burn.into());
        map.insert("content".to_string(), self.content.clone().into());
        map.insert(
            "attachment_name".to_string(),
            self.attachment_name.clone().into(),
        );
        map.insert(
            "attachment_data".to_string(),
            self.attachment_data.clone().into(),
        );
        map.insert("mime_type".to_string(), self.mime_type.clone().into());
        map.insert(
            "comment_count".to_string(),
            self.comment_count
                .map_or(Dynamic::Null, |count| Dynamic::Number(count as f64)),
        );
        DynamicValue::new(Dynamic::Map(map))
    }
}

#[derive(Default)]
pub struct PasteDataSource {
    provider_data: Option<PastebinProviderData>,
}

impl PasteDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Pastebin paste data source")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Paste identifier (computed from URL)")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("url", AttributeType::String)
                    .description("Full URL of the paste including master key")
                    .required()
                    .validator(Box::new(StringLength {
                        min: Some(1),
                        max: None,
                    }))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("password", AttributeType::String)
                    .description("Password to decrypt the paste (if password protected)")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("confirm_burn", AttributeType::Bool)
                    .description("Confirm reading a burn-after-reading paste (will delete it)")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("content", AttributeType::String)
                    .description("The content of the paste")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("attachment_name", AttributeType::String)
                    .description("Name of the attachment (if paste is an attachment)")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("attachment_data", AttributeType::String)
                    .description("Base64 encoded attachment data (if paste is an attachment)")
                    .computed()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("mime_type", AttributeType::String)
                    .description("MIME type of attachment (if paste is an attachment)")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("comment_count", AttributeType::Number)
                    .description("Number of comments on the paste")
                    .computed()
                    .build(),
            )
            .build()
    }
}

fn failed(diagnostic: Diagnostic) -> ReadDataSourceResponse {
    ReadDataSourceResponse {
        state: DynamicValue::null(),
        diagnostics: vec![diagnostic],
    }
}

#[async_trait]
impl DataSource for PasteDataSource {
    fn type_name(&self) -> &str {
        "pastebin_paste"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: DataSourceMetadataRequest,
    ) -> DataSourceMetadataResponse {
        DataSourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse {
            diagnostics: tfplug::plan::validate_config(&Self::schema_static(), &request.config),
        }
    }

    async fn read(&self, ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let provider_data = match &self.provider_data {
            Some(data) => data,
            None => {
                return failed(Diagnostic::error(
                    "Provider not configured",
                    "Provider data was not properly configured",
                ))
            }
        };

        let mut model = match PasteDataSourceModel::from_config(&request.config) {
            Ok(model) => model,
            Err(diagnostic) => return failed(diagnostic),
        };

        let paste_url = match Url::parse(&model.url) {
            Ok(url) => url,
            Err(e) => {
                return failed(
                    Diagnostic::error("Client Error", format!("Unable to parse paste URL: {}", e))
                        .with_attribute(AttributePath::new("url")),
                )
            }
        };

        let options = ShowPasteOptions {
            password: model.password.clone().filter(|p| !p.is_empty()),
            confirm_burn: model.confirm_burn.unwrap_or(false),
        };

        match provider_data
            .client
            .show_paste(&ctx, &paste_url, &options)
            .await
        {
            Ok(result) => {
                tracing::debug!("Read paste {}", result.paste_id);
                model.apply(result);
                ReadDataSourceResponse {
                    state: model.to_value(),
                    diagnostics: vec![],
                }
            }
            Err(e) => failed(Diagnostic::error(
                "Client Error",
                format!("Unable to read paste: {}", e),
            )),
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for PasteDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        let mut diagnostics = vec![];

        if let Some(data) = request.provider_data {
            match data.downcast_ref::<PastebinProviderData>() {
                Some(provider_data) => self.provider_data = Some(provider_data.clone()),
                None => diagnostics.push(Diagnostic::error(
                    "Unexpected Data Source Configure Type",
                    "Expected PastebinProviderData, got an unrecognized type. Please report this issue to the provider developers.",
                )),
            }
        }

        ConfigureDataSourceResponse { diagnostics }
    }
}
