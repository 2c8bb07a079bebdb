use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use url::Url;

use super::crypto::{AuthenticatedData, CompressionAlgorithm};
use super::error::ApiError;

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Options for creating a paste
#[derive(Debug, Clone)]
pub struct CreatePasteOptions {
    pub attachment_name: Option<String>,
    pub formatter: String,
    pub expire: String,
    pub password: Option<String>,
    pub open_discussion: bool,
    pub burn_after_reading: bool,
    pub compression: CompressionAlgorithm,
}

impl Default for CreatePasteOptions {
    fn default() -> Self {
        Self {
            attachment_name: None,
            formatter: "plaintext".to_string(),
            expire: "1week".to_string(),
            password: None,
            open_discussion: false,
            burn_after_reading: false,
            compression: CompressionAlgorithm::Gzip,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreatePasteResult {
    pub paste_id: String,
    /// Shareable URL, including the decryption key fragment
    pub paste_url: Url,
    pub delete_token: String,
}

#[derive(Debug, Clone, Default)]
pub struct ShowPasteOptions {
    pub password: Option<String>,
    pub confirm_burn: bool,
}

/// Decrypted paste body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PasteData {
    pub data: Vec<u8>,
    pub attachment_name: String,
    pub mime_type: String,
    pub attachment: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ShowPasteResult {
    pub paste_id: String,
    pub paste: PasteData,
    pub comment_count: u64,
}

/// JSON document that gets compressed and encrypted
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PastePlaintext {
    pub paste: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_name: Option<String>,
}

impl PastePlaintext {
    /// Content becomes the attachment when an attachment name is given
    pub fn new(content: &[u8], attachment_name: Option<&str>) -> Self {
        match attachment_name.filter(|name| !name.is_empty()) {
            Some(name) => Self {
                paste: String::new(),
                attachment: Some(encode_data_url(mime_type_for(name), content)),
                attachment_name: Some(name.to_string()),
            },
            None => Self {
                paste: String::from_utf8_lossy(content).into_owned(),
                attachment: None,
                attachment_name: None,
            },
        }
    }

    pub fn into_paste_data(self) -> Result<PasteData, ApiError> {
        let mut data = PasteData {
            data: self.paste.into_bytes(),
            attachment_name: self.attachment_name.unwrap_or_default(),
            ..Default::default()
        };
        if let Some(attachment) = self.attachment.filter(|a| !a.is_empty()) {
            let (mime_type, bytes) = decode_data_url(&attachment)?;
            data.mime_type = mime_type;
            data.attachment = bytes;
        }
        Ok(data)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreatePasteRequest<'a> {
    pub v: u8,
    pub adata: &'a AuthenticatedData,
    pub ct: &'a str,
    pub meta: CreatePasteMeta<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreatePasteMeta<'a> {
    pub expire: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatePasteResponse {
    pub status: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub deletetoken: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ShowPasteResponse {
    pub status: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    pub adata: Option<AuthenticatedData>,
    #[serde(default)]
    pub ct: Option<String>,
    #[serde(default)]
    pub comment_count: Option<u64>,
    #[serde(default)]
    pub comments: Vec<serde_json::Value>,
}

impl ShowPasteResponse {
    pub fn comment_count(&self) -> u64 {
        self.comment_count.unwrap_or(self.comments.len() as u64)
    }
}

fn encode_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

fn decode_data_url(url: &str) -> Result<(String, Vec<u8>), ApiError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| ApiError::ParseError("attachment is not a data URL".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| ApiError::ParseError("attachment data URL has no payload".to_string()))?;

    let (mime_type, is_base64) = match header.strip_suffix(";base64") {
        Some(mime) => (mime, true),
        None => (header, false),
    };
    let mime_type = if mime_type.is_empty() {
        DEFAULT_MIME_TYPE
    } else {
        mime_type
    };

    let bytes = if is_base64 {
        STANDARD
            .decode(payload)
            .map_err(|e| ApiError::ParseError(format!("invalid attachment encoding: {}", e)))?
    } else {
        payload.as_bytes().to_vec()
    };
    Ok((mime_type.to_string(), bytes))
}

fn mime_type_for(file_name: &str) -> &'static str {
    let extension = match file_name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return DEFAULT_MIME_TYPE,
    };
    match extension.as_str() {
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "js" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "yaml" | "yml" => "application/yaml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        _ => DEFAULT_MIME_TYPE,
    }
}
