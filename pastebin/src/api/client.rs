use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::ClientBuilder;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tfplug::Context;
use url::Url;

use super::crypto::{self, MasterKey, SealOptions};
use super::error::ApiError;
use super::paste::{
    CreatePasteMeta, CreatePasteOptions, CreatePasteRequest, CreatePasteResponse,
    CreatePasteResult, PastePlaintext, ShowPasteOptions, ShowPasteResponse, ShowPasteResult,
};

const REQUESTED_WITH: (&str, &str) = ("X-Requested-With", "JSONHttpRequest");

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub basic_auth: Option<(String, String)>,
    pub skip_tls_verify: bool,
    pub headers: HashMap<String, String>,
}

/// PrivateBin API client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: Url,
    basic_auth: Option<(String, String)>,
    /// Only sent to the origin of base_url
    headers: HeaderMap,
}

impl Client {
    pub fn new(base_url: Url) -> Result<Self, ApiError> {
        Self::with_config(base_url, ClientConfig::default())
    }

    pub fn with_config(base_url: Url, config: ClientConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| ApiError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|e| ApiError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            headers.insert(header_name, header_value);
        }

        let mut builder = ClientBuilder::new().danger_accept_invalid_certs(config.skip_tls_verify);
        if !config.user_agent.is_empty() {
            builder = builder.user_agent(config.user_agent);
        }
        let http_client = builder.build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                basic_auth: config.basic_auth,
                headers,
            }),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Encrypt `content` and upload it. The returned URL carries the key.
    pub async fn create_paste(
        &self,
        ctx: &Context,
        content: &[u8],
        options: &CreatePasteOptions,
    ) -> Result<CreatePasteResult, ApiError> {
        let plaintext = PastePlaintext::new(content, options.attachment_name.as_deref());
        let plaintext = serde_json::to_vec(&plaintext)
            .map_err(|e| ApiError::ParseError(format!("failed to encode paste: {}", e)))?;

        let master_key = MasterKey::generate();
        let password = options.password.clone().unwrap_or_default();
        let seal_options = SealOptions {
            formatter: options.formatter.clone(),
            open_discussion: options.open_discussion,
            burn_after_reading: options.burn_after_reading,
            compression: options.compression,
        };
        let sealing_key = master_key.clone();
        let sealed = blocking(move || {
            crypto::seal(&plaintext, &sealing_key, password.as_bytes(), &seal_options)
        })
        .await?;

        let body = CreatePasteRequest {
            v: 2,
            adata: &sealed.adata,
            ct: &sealed.ciphertext,
            meta: CreatePasteMeta {
                expire: &options.expire,
            },
        };

        tracing::debug!("POST paste to: {}", self.inner.base_url);
        let request = self
            .authorize(
                &self.inner.base_url,
                self.inner.http_client.post(self.inner.base_url.clone()),
            )
            .header(REQUESTED_WITH.0, REQUESTED_WITH.1)
            .json(&body);
        let response: CreatePasteResponse = self.send(ctx, request).await?;

        if response.status != 0 {
            return Err(ApiError::ServerError(
                response
                    .message
                    .unwrap_or_else(|| format!("status {}", response.status)),
            ));
        }
        let paste_id = response
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::ParseError("response has no paste id".to_string()))?;

        let mut paste_url = self.inner.base_url.clone();
        paste_url.set_query(Some(&paste_id));
        paste_url.set_fragment(Some(&master_key.to_base58()));

        tracing::info!("Created paste {}", paste_id);

        Ok(CreatePasteResult {
            paste_id,
            paste_url,
            delete_token: response.deletetoken.unwrap_or_default(),
        })
    }

    /// Fetch and decrypt the paste behind `paste_url`
    pub async fn show_paste(
        &self,
        ctx: &Context,
        paste_url: &Url,
        options: &ShowPasteOptions,
    ) -> Result<ShowPasteResult, ApiError> {
        let paste_id = paste_id_from_url(paste_url)?;
        let master_key = master_key_from_url(paste_url)?;

        let mut request_url = paste_url.clone();
        request_url.set_fragment(None);
        request_url.set_query(None);
        request_url
            .query_pairs_mut()
            .append_pair("pasteid", &paste_id);

        tracing::debug!("GET paste {} from: {}", paste_id, request_url);
        let request = self
            .authorize(&request_url, self.inner.http_client.get(request_url.clone()))
            .header(REQUESTED_WITH.0, REQUESTED_WITH.1);
        let response: ShowPasteResponse = self.send(ctx, request).await?;

        if response.status != 0 {
            return Err(ApiError::ServerError(
                response
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("status {}", response.status)),
            ));
        }
        let comment_count = response.comment_count();
        let adata = response
            .adata
            .ok_or_else(|| ApiError::ParseError("response has no adata".to_string()))?;
        let ciphertext = response
            .ct
            .ok_or_else(|| ApiError::ParseError("response has no ciphertext".to_string()))?;

        if adata.burn_after_reading && !options.confirm_burn {
            return Err(ApiError::BurnNotConfirmed);
        }

        let password = options.password.clone().unwrap_or_default();
        let plaintext = blocking(move || {
            crypto::open(&adata, &ciphertext, &master_key, password.as_bytes())
        })
        .await?;
        let plaintext: PastePlaintext = serde_json::from_slice(&plaintext)
            .map_err(|e| ApiError::ParseError(format!("failed to decode paste: {}", e)))?;

        Ok(ShowPasteResult {
            paste_id: response.id.unwrap_or(paste_id),
            paste: plaintext.into_paste_data()?,
            comment_count,
        })
    }

    /// Attach basic auth and the extra headers, but only for requests to the
    /// configured host. Paste URLs may point anywhere.
    fn authorize(
        &self,
        target: &Url,
        request: reqwest::RequestBuilder,
    ) -> reqwest::RequestBuilder {
        if target.origin() != self.inner.base_url.origin() {
            tracing::debug!(
                "Not sending credentials to {}",
                target.origin().ascii_serialization()
            );
            return request;
        }

        let request = request.headers(self.inner.headers.clone());
        match &self.inner.basic_auth {
            Some((username, password)) => request.basic_auth(username, Some(password)),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        cancellable(ctx, async {
            let response = request.send().await?;
            let status = response.status();
            tracing::debug!("Response status: {}", status);

            if !status.is_success() {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                tracing::error!("API error response: {}", message);
                return Err(ApiError::HttpError {
                    status: status.as_u16(),
                    message,
                });
            }

            let text = response.text().await?;
            serde_json::from_str(&text).map_err(|e| ApiError::ParseError(e.to_string()))
        })
        .await
    }
}

/// Run CPU-bound crypto on the blocking pool
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::CryptoError(format!("crypto task failed: {}", e)))?
}

async fn cancellable<T>(
    ctx: &Context,
    fut: impl Future<Output = Result<T, ApiError>>,
) -> Result<T, ApiError> {
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(ApiError::Cancelled),
        result = fut => result,
    }
}

/// Accepts both `?<id>` and `?pasteid=<id>` forms
pub fn paste_id_from_url(url: &Url) -> Result<String, ApiError> {
    let query = url.query().unwrap_or_default();
    let id = url
        .query_pairs()
        .find(|(key, _)| key == "pasteid")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_else(|| query.split('&').next().unwrap_or_default().to_string());

    if id.is_empty() || id.contains('=') {
        return Err(ApiError::InvalidUrl(format!("no paste id in {}", url)));
    }
    Ok(id)
}

fn master_key_from_url(url: &Url) -> Result<MasterKey, ApiError> {
    let fragment = url.fragment().unwrap_or_default();
    // Some clients prefix the key with '-' to mark "load confirmation" links
    let encoded = fragment.strip_prefix('-').unwrap_or(fragment);
    if encoded.is_empty() {
        return Err(ApiError::MissingKey);
    }
    MasterKey::from_base58(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{encrypted_paste, server_url as base_url, FixtureOptions};
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn create_paste_posts_encrypted_payload() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("x-requested-with", "JSONHttpRequest")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(serde_json::json!({"v": 2, "meta": {"expire": "1day"}})),
                Matcher::Regex(r#""ct":"[A-Za-z0-9+/=]+""#.to_string()),
                Matcher::Regex(r#""markdown",1,0\]"#.to_string()),
            ]))
            .with_body(r#"{"status":0,"id":"abc123","url":"/?abc123","deletetoken":"tok"}"#)
            .create_async()
            .await;

        let client = Client::new(base_url(&server)).unwrap();
        let options = CreatePasteOptions {
            formatter: "markdown".to_string(),
            expire: "1day".to_string(),
            open_discussion: true,
            ..Default::default()
        };

        let result = client
            .create_paste(&Context::new(), b"hello", &options)
            .await
            .unwrap();

        assert_eq!(result.paste_id, "abc123");
        assert_eq!(result.delete_token, "tok");
        assert_eq!(result.paste_url.query(), Some("abc123"));
        assert!(result.paste_url.fragment().is_some_and(|f| !f.is_empty()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn create_paste_surfaces_server_message() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_body(r#"{"status":1,"message":"Invalid data."}"#)
            .create_async()
            .await;

        let client = Client::new(base_url(&server)).unwrap();
        let result = client
            .create_paste(&Context::new(), b"hello", &CreatePasteOptions::default())
            .await;

        match result {
            Err(ApiError::ServerError(message)) => assert_eq!(message, "Invalid data."),
            other => panic!("Expected ServerError, got {:?}", other.map(|r| r.paste_id)),
        }
    }

    #[tokio::test]
    async fn create_paste_reports_http_errors() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(503)
            .with_body("down for maintenance")
            .create_async()
            .await;

        let client = Client::new(base_url(&server)).unwrap();
        let result = client
            .create_paste(&Context::new(), b"hello", &CreatePasteOptions::default())
            .await;

        assert!(matches!(
            result,
            Err(ApiError::HttpError { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn show_paste_decrypts_content() {
        let mut server = Server::new_async().await;
        let fixture = encrypted_paste(
            &base_url(&server),
            FixtureOptions {
                id: "abc123",
                content: "hello world",
                comment_count: 2,
                ..Default::default()
            },
        );
        let mock = server
            .mock("GET", "/")
            .match_query(Matcher::UrlEncoded("pasteid".into(), "abc123".into()))
            .match_header("x-requested-with", "JSONHttpRequest")
            .with_body(fixture.body)
            .create_async()
            .await;

        let client = Client::new(base_url(&server)).unwrap();
        let result = client
            .show_paste(&Context::new(), &fixture.url, &ShowPasteOptions::default())
            .await
            .unwrap();

        assert_eq!(result.paste_id, "abc123");
        assert_eq!(result.paste.data, b"hello world");
        assert_eq!(result.comment_count, 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn show_paste_uses_password() {
        let mut server = Server::new_async().await;
        let fixture = encrypted_paste(
            &base_url(&server),
            FixtureOptions {
                content: "guarded",
                password: "s3cret",
                ..Default::default()
            },
        );
        let _mock = server
            .mock("GET", "/")
            .match_query(Matcher::Any)
            .with_body(fixture.body)
            .expect(2)
            .create_async()
            .await;

        let client = Client::new(base_url(&server)).unwrap();
        let without = client
            .show_paste(&Context::new(), &fixture.url, &ShowPasteOptions::default())
            .await;
        assert!(matches!(without, Err(ApiError::CryptoError(_))));

        let with = client
            .show_paste(
                &Context::new(),
                &fixture.url,
                &ShowPasteOptions {
                    password: Some("s3cret".to_string()),
                    confirm_burn: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(with.paste.data, b"guarded");
    }

    #[tokio::test]
    async fn show_paste_requires_burn_confirmation() {
        let mut server = Server::new_async().await;
        let fixture = encrypted_paste(
            &base_url(&server),
            FixtureOptions {
                content: "once",
                burn_after_reading: true,
                ..Default::default()
            },
        );
        let _mock = server
            .mock("GET", "/")
            .match_query(Matcher::Any)
            .with_body(fixture.body)
            .create_async()
            .await;

        let client = Client::new(base_url(&server)).unwrap();
        let result = client
            .show_paste(&Context::new(), &fixture.url, &ShowPasteOptions::default())
            .await;
        assert!(matches!(result, Err(ApiError::BurnNotConfirmed)));

        let confirmed = client
            .show_paste(
                &Context::new(),
                &fixture.url,
                &ShowPasteOptions {
                    password: None,
                    confirm_burn: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(confirmed.paste.data, b"once");
    }

    #[tokio::test]
    async fn show_paste_rejects_url_without_key() {
        let client = Client::new(Url::parse("https://paste.example.com/").unwrap()).unwrap();
        let url = Url::parse("https://paste.example.com/?abc123").unwrap();

        let result = client
            .show_paste(&Context::new(), &url, &ShowPasteOptions::default())
            .await;
        assert!(matches!(result, Err(ApiError::MissingKey)));
    }

    #[tokio::test]
    async fn client_sends_auth_user_agent_and_extra_headers() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            // admin:secret
            .match_header("authorization", "Basic YWRtaW46c2VjcmV0")
            .match_header("user-agent", "pastebin-test/1.0")
            .match_header("x-team", "platform")
            .with_body(r#"{"status":0,"id":"h1","deletetoken":"t"}"#)
            .create_async()
            .await;

        let config = ClientConfig {
            user_agent: "pastebin-test/1.0".to_string(),
            basic_auth: Some(("admin".to_string(), "secret".to_string())),
            skip_tls_verify: false,
            headers: HashMap::from([("X-Team".to_string(), "platform".to_string())]),
        };
        let client = Client::with_config(base_url(&server), config).unwrap();

        client
            .create_paste(&Context::new(), b"x", &CreatePasteOptions::default())
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn credentials_stay_on_configured_host() {
        let home = Server::new_async().await;
        let mut elsewhere = Server::new_async().await;
        let fixture = encrypted_paste(
            &base_url(&elsewhere),
            FixtureOptions {
                id: "f0re1gn",
                content: "shared elsewhere",
                ..Default::default()
            },
        );
        let mock = elsewhere
            .mock("GET", "/")
            .match_query(Matcher::UrlEncoded("pasteid".into(), "f0re1gn".into()))
            .match_header("authorization", Matcher::Missing)
            .match_header("x-api-token", Matcher::Missing)
            .match_header("user-agent", "pastebin-test/1.0")
            .with_body(fixture.body)
            .create_async()
            .await;

        let config = ClientConfig {
            user_agent: "pastebin-test/1.0".to_string(),
            basic_auth: Some(("admin".to_string(), "secret".to_string())),
            skip_tls_verify: false,
            headers: HashMap::from([("X-Api-Token".to_string(), "s3cret".to_string())]),
        };
        let client = Client::with_config(base_url(&home), config).unwrap();

        let result = client
            .show_paste(&Context::new(), &fixture.url, &ShowPasteOptions::default())
            .await
            .unwrap();
        assert_eq!(result.paste.data, b"shared elsewhere");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn show_paste_on_configured_host_sends_credentials() {
        let mut server = Server::new_async().await;
        let fixture = encrypted_paste(&base_url(&server), FixtureOptions::default());
        let mock = server
            .mock("GET", "/")
            .match_query(Matcher::Any)
            .match_header("authorization", "Basic YWRtaW46c2VjcmV0")
            .match_header("x-api-token", "s3cret")
            .with_body(fixture.body)
            .create_async()
            .await;

        let config = ClientConfig {
            basic_auth: Some(("admin".to_string(), "secret".to_string())),
            headers: HashMap::from([("X-Api-Token".to_string(), "s3cret".to_string())]),
            ..Default::default()
        };
        let client = Client::with_config(base_url(&server), config).unwrap();

        client
            .show_paste(&Context::new(), &fixture.url, &ShowPasteOptions::default())
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[test]
    fn invalid_extra_header_is_rejected() {
        let config = ClientConfig {
            headers: HashMap::from([("bad header".to_string(), "v".to_string())]),
            ..Default::default()
        };
        let result = Client::with_config(Url::parse("https://paste.example.com/").unwrap(), config);
        assert!(matches!(result, Err(ApiError::InvalidHeader { .. })));
    }

    #[tokio::test]
    async fn cancelled_context_aborts_request() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_chunked_body(|w| {
                std::thread::sleep(std::time::Duration::from_secs(2));
                w.write_all(b"{}")
            })
            .create_async()
            .await;

        let client = Client::new(base_url(&server)).unwrap();
        let ctx = Context::new();
        ctx.cancel();

        let result = client
            .create_paste(&ctx, b"hello", &CreatePasteOptions::default())
            .await;
        assert!(matches!(result, Err(ApiError::Cancelled)));
    }

    #[test]
    fn paste_id_accepts_both_query_forms() {
        let short = Url::parse("https://p.example.com/?abc#key").unwrap();
        assert_eq!(paste_id_from_url(&short).unwrap(), "abc");

        let long = Url::parse("https://p.example.com/?pasteid=def#key").unwrap();
        assert_eq!(paste_id_from_url(&long).unwrap(), "def");

        let none = Url::parse("https://p.example.com/#key").unwrap();
        assert!(paste_id_from_url(&none).is_err());
    }
}
