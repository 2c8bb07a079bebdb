//! Test helpers for the paste API

use super::crypto::{self, CompressionAlgorithm, MasterKey, SealOptions};
use super::paste::PastePlaintext;
use url::Url;

/// A paste as a PrivateBin server would return it from a show call
pub struct PasteFixture {
    /// JSON body of the show response
    pub body: String,
    /// Shareable URL, with the decryption key in the fragment
    pub url: Url,
}

pub struct FixtureOptions<'a> {
    pub id: &'a str,
    pub content: &'a str,
    pub attachment_name: Option<&'a str>,
    pub password: &'a str,
    pub burn_after_reading: bool,
    pub comment_count: u64,
}

impl Default for FixtureOptions<'_> {
    fn default() -> Self {
        Self {
            id: "f1x7ur3",
            content: "fixture content",
            attachment_name: None,
            password: "",
            burn_after_reading: false,
            comment_count: 0,
        }
    }
}

pub fn encrypted_paste(base_url: &Url, options: FixtureOptions<'_>) -> PasteFixture {
    let key = MasterKey::generate();
    let plaintext = serde_json::to_vec(&PastePlaintext::new(
        options.content.as_bytes(),
        options.attachment_name,
    ))
    .unwrap();
    let sealed = crypto::seal(
        &plaintext,
        &key,
        options.password.as_bytes(),
        &SealOptions {
            formatter: "plaintext".to_string(),
            open_discussion: options.comment_count > 0,
            burn_after_reading: options.burn_after_reading,
            compression: CompressionAlgorithm::Gzip,
        },
    )
    .unwrap();

    let body = serde_json::json!({
        "status": 0,
        "id": options.id,
        "adata": sealed.adata,
        "ct": sealed.ciphertext,
        "comment_count": options.comment_count,
        "comments": [],
    })
    .to_string();

    let mut url = base_url.clone();
    url.set_query(Some(options.id));
    url.set_fragment(Some(&key.to_base58()));

    PasteFixture { body, url }
}

/// Base URL of a mockito server, with the trailing slash the API expects
pub fn server_url(server: &mockito::Server) -> Url {
    Url::parse(&format!("{}/", server.url())).unwrap()
}
