//! Fake PrivateBin shared by the integration tests
//!
//! The fake stores whatever the provider uploads and serves it back on the
//! show call, so reads go through real decryption with the key the provider
//! generated.

#![allow(dead_code)]
#![allow(clippy::disallowed_methods)]

use mockito::{Matcher, ServerGuard};
use std::sync::{Arc, Mutex};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};

pub const PASTE_ID: &str = "it5e7f00";

pub fn object(values: &[(&str, Dynamic)]) -> DynamicValue {
    let mut value = DynamicValue::object();
    for (name, v) in values {
        value.set(&AttributePath::new(name), v.clone()).unwrap();
    }
    value
}

/// Registers create and show mocks that behave like a PrivateBin instance
pub async fn fake_privatebin(server: &mut ServerGuard) -> Arc<Mutex<Option<serde_json::Value>>> {
    let stored: Arc<Mutex<Option<serde_json::Value>>> = Arc::new(Mutex::new(None));

    let on_create = Arc::clone(&stored);
    server
        .mock("POST", "/")
        .match_header("x-requested-with", "JSONHttpRequest")
        .with_body_from_request(move |request| {
            let body: serde_json::Value = serde_json::from_slice(request.body().unwrap()).unwrap();
            *on_create.lock().unwrap() = Some(body);
            serde_json::json!({
                "status": 0,
                "id": PASTE_ID,
                "url": format!("/?{}", PASTE_ID),
                "deletetoken": "d3l3t3",
            })
            .to_string()
            .into_bytes()
        })
        .create_async()
        .await;

    let on_show = Arc::clone(&stored);
    server
        .mock("GET", "/")
        .match_query(Matcher::UrlEncoded("pasteid".into(), PASTE_ID.into()))
        .with_body_from_request(move |_| {
            let body = match on_show.lock().unwrap().as_ref() {
                Some(paste) => serde_json::json!({
                    "status": 0,
                    "id": PASTE_ID,
                    "adata": paste["adata"],
                    "ct": paste["ct"],
                    "comments": [],
                    "comment_count": 0,
                }),
                None => serde_json::json!({
                    "status": 1,
                    "message": "Paste does not exist, has expired or has been deleted.",
                }),
            };
            body.to_string().into_bytes()
        })
        .create_async()
        .await;

    stored
}

