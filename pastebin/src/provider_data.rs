//! Provider data structure passed to resources and data sources

use crate::api::Client;
use std::sync::Arc;

pub const DEFAULT_EXPIRE: &str = "1week";
pub const DEFAULT_FORMATTER: &str = "plaintext";

pub const FORMATTERS: [&str; 3] = ["plaintext", "markdown", "syntaxhighlighting"];
pub const EXPIRATIONS: [&str; 8] = [
    "5min", "10min", "1hour", "1day", "1week", "1month", "1year", "never",
];

/// Client handle plus the paste option defaults from the provider block
#[derive(Clone)]
pub struct PastebinProviderData {
    pub client: Arc<Client>,
    pub expire: String,
    pub formatter: String,
    pub gzip: bool,
    pub open_discussion: bool,
    pub burn_after_reading: bool,
}

impl PastebinProviderData {
    pub fn new(client: Client) -> Self {
        Self {
            client: Arc::new(client),
            expire: DEFAULT_EXPIRE.to_string(),
            formatter: DEFAULT_FORMATTER.to_string(),
            gzip: true,
            open_discussion: false,
            burn_after_reading: false,
        }
    }
}
