//! Full paste lifecycle through ProviderServer against a fake PrivateBin

#![allow(clippy::disallowed_methods)] // Allow unwrap() in tests for clarity

mod common;

use common::{fake_privatebin, object, PASTE_ID};
use mockito::Server;
use pastebin::PastebinProvider;
use tfplug::context::Context;
use tfplug::types::{AttributePath, Dynamic, DynamicValue};
use tfplug::ProviderServer;

#[tokio::test]
async fn paste_lifecycle_through_provider_server() {
    let mut server = Server::new_async().await;
    let stored = fake_privatebin(&mut server).await;
    let ctx = Context::new();

    let provider = ProviderServer::new(PastebinProvider::with_version("0.0.0-test"));

    let provider_config = object(&[
        ("host", Dynamic::from(format!("{}/", server.url()))),
        ("gzip", Dynamic::Bool(false)),
        ("formatter", Dynamic::from("markdown")),
    ]);
    assert!(provider
        .validate_provider_config(ctx.clone(), provider_config.clone())
        .await
        .is_empty());
    assert!(provider
        .configure_provider(ctx.clone(), "1.9.0", provider_config)
        .await
        .is_empty());

    // create
    let config = object(&[("content", Dynamic::from("hello from the lifecycle test"))]);
    assert!(provider
        .validate_resource_config(ctx.clone(), "pastebin_paste", config.clone())
        .await
        .is_empty());

    let plan = provider
        .plan_resource_change(ctx.clone(), "pastebin_paste", &DynamicValue::null(), &config)
        .await;
    assert!(plan.diagnostics.is_empty());
    assert!(!plan.requires_replace());

    let applied = provider
        .apply_resource_change(
            ctx.clone(),
            "pastebin_paste",
            DynamicValue::null(),
            plan.planned_state,
            config.clone(),
        )
        .await;
    assert!(applied.diagnostics.is_empty());
    let state = applied.new_state;

    assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), PASTE_ID);
    assert_eq!(
        state.get_string(&AttributePath::new("delete_token")).unwrap(),
        "d3l3t3"
    );
    assert_eq!(
        state.get_string(&AttributePath::new("formatter")).unwrap(),
        "markdown"
    );
    assert!(!state.get_bool(&AttributePath::new("gzip")).unwrap());

    let uploaded = stored.lock().unwrap().clone().unwrap();
    assert_eq!(uploaded["v"], 2);
    assert_eq!(uploaded["meta"]["expire"], "1week");
    assert_eq!(uploaded["adata"][0][7], "none");
    assert_eq!(uploaded["adata"][1], "markdown");

    // refresh reproduces the state
    let refreshed = provider
        .read_resource(ctx.clone(), "pastebin_paste", state.clone())
        .await;
    assert!(refreshed.diagnostics.is_empty());
    assert_eq!(refreshed.new_state.as_ref(), Some(&state));

    // the data source decrypts what the resource uploaded
    let url = state.get_string(&AttributePath::new("url")).unwrap();
    let read = provider
        .read_data_source(
            ctx.clone(),
            "pastebin_paste",
            object(&[("url", Dynamic::from(url))]),
        )
        .await;
    assert!(read.diagnostics.is_empty());
    assert_eq!(
        read.state.get_string(&AttributePath::new("content")).unwrap(),
        "hello from the lifecycle test"
    );
    assert_eq!(
        read.state.get_string(&AttributePath::new("id")).unwrap(),
        PASTE_ID
    );

    // unchanged config plans no change, edited content plans a replacement
    let noop = provider
        .plan_resource_change(ctx.clone(), "pastebin_paste", &state, &config)
        .await;
    assert!(!noop.requires_replace());
    assert_eq!(noop.planned_state, state);

    let edited = object(&[("content", Dynamic::from("edited"))]);
    let replace = provider
        .plan_resource_change(ctx.clone(), "pastebin_paste", &state, &edited)
        .await;
    assert_eq!(replace.requires_replace, vec![AttributePath::new("content")]);

    let update = provider
        .apply_resource_change(
            ctx.clone(),
            "pastebin_paste",
            state.clone(),
            replace.planned_state,
            edited,
        )
        .await;
    assert_eq!(update.diagnostics[0].summary, "Update Not Supported");

    // import
    let imported = provider
        .import_resource_state(ctx.clone(), "pastebin_paste", PASTE_ID)
        .await;
    assert!(imported.diagnostics.is_empty());
    assert_eq!(
        imported.imported_resources[0]
            .state
            .get_string(&AttributePath::new("id"))
            .unwrap(),
        PASTE_ID
    );

    // destroy
    let destroyed = provider
        .apply_resource_change(
            ctx.clone(),
            "pastebin_paste",
            state,
            DynamicValue::null(),
            DynamicValue::null(),
        )
        .await;
    assert!(destroyed.diagnostics.is_empty());
    assert!(destroyed.new_state.is_null());
}

#[tokio::test]
async fn operations_before_configure_report_missing_provider() {
    let provider = ProviderServer::new(PastebinProvider::new());
    let ctx = Context::new();
    let config = object(&[("content", Dynamic::from("hi"))]);

    let plan = provider
        .plan_resource_change(ctx.clone(), "pastebin_paste", &DynamicValue::null(), &config)
        .await;
    let applied = provider
        .apply_resource_change(
            ctx.clone(),
            "pastebin_paste",
            DynamicValue::null(),
            plan.planned_state,
            config,
        )
        .await;

    assert!(applied.new_state.is_null());
    assert_eq!(applied.diagnostics[0].summary, "Provider not configured");
}

#[tokio::test]
async fn configure_failure_is_reported_through_server() {
    let provider = ProviderServer::new(PastebinProvider::new());

    let diagnostics = provider
        .configure_provider(
            Context::new(),
            "1.9.0",
            object(&[("host", Dynamic::from("::"))]),
        )
        .await;

    assert_eq!(diagnostics[0].summary, "Invalid Pastebin Host");
}

#[tokio::test]
async fn schemas_are_exposed_for_resource_and_data_source() {
    let provider = ProviderServer::new(PastebinProvider::new());
    let schemas = provider.get_provider_schema(Context::new()).await;

    assert!(schemas.diagnostics.is_empty());
    assert!(schemas.provider.attribute("extra_headers").is_some());
    assert!(schemas.resources["pastebin_paste"]
        .attribute("delete_token")
        .unwrap()
        .sensitive);
    assert!(schemas.data_sources["pastebin_paste"]
        .attribute("url")
        .unwrap()
        .required);
}
