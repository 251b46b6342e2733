use std::sync::Arc;

use foxhound_preview::{
    EntityType, PreviewConfig, PreviewError, RefreshOutcome, RequestDeduplicator, RestClient,
    Store,
};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, changeset: Option<Uuid>) -> RestClient {
    let config = PreviewConfig {
        site_url: server.uri(),
        changeset_uuid: changeset,
        ..Default::default()
    };
    RestClient::new(&config).unwrap()
}

fn page_json(id: u64, slug: &str, title: &str) -> serde_json::Value {
    json!({
        "id": id,
        "slug": slug,
        "type": "page",
        "title": { "rendered": title },
        "content": { "rendered": "<p>Server content</p>\n", "protected": false },
        "excerpt": { "rendered": "" },
        "featured_media": 12,
        "link": format!("http://example.test/{}/", slug)
    })
}

#[tokio::test]
async fn test_fetch_entity_by_slug() {
    let server = MockServer::start().await;
    let changeset = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/pages"))
        .and(query_param("slug", "about"))
        .and(query_param("_embed", "true"))
        .and(query_param("customize_changeset_uuid", changeset.to_string().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([page_json(
            42,
            "about",
            "About &#8211; us"
        )])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Some(changeset));
    let record = client.fetch_entity(EntityType::Page, "about").await.unwrap();

    assert_eq!(record.id, 42);
    assert_eq!(record.entity_type, EntityType::Page);
    assert_eq!(record.title.rendered, "About &#8211; us");
    assert_eq!(record.featured_media, 12);
    assert!(record.extra.contains_key("link"));
}

#[tokio::test]
async fn test_empty_result_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let err = client_for(&server, None)
        .fetch_entity(EntityType::Post, "gone")
        .await
        .unwrap_err();

    match err {
        PreviewError::NotFound { entity_type, slug } => {
            assert_eq!(entity_type, EntityType::Post);
            assert_eq!(slug, "gone");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_maps_to_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client_for(&server, None)
        .fetch_entity(EntityType::Post, "hello")
        .await
        .unwrap_err();

    assert!(matches!(err, PreviewError::Status { status: 500, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_site_title() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-json/foxhound/v1/title/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "raw": "Fox & Hound",
            "rendered": "Fox &#038; Hound"
        })))
        .mount(&server)
        .await;

    let title = client_for(&server, None).fetch_site_title().await.unwrap();
    assert_eq!(title.raw, "Fox & Hound");
    assert_eq!(title.rendered, "Fox &#038; Hound");
}

#[tokio::test]
async fn test_malformed_title_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-json/foxhound/v1/title/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server, None).fetch_site_title().await.unwrap_err();
    assert!(matches!(err, PreviewError::MalformedResponse { .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_refresh_through_rest_sources() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/pages"))
        .and(query_param("slug", "about"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([page_json(
            42,
            "about",
            "About (server)"
        )])))
        .mount(&server)
        .await;

    let store = Arc::new(Store::new());
    let dedup = RequestDeduplicator::new(
        Arc::clone(&store),
        client_for(&server, None).source_table(),
    );

    let outcome = dedup
        .request_entity_refresh(EntityType::Page, 42, "about")
        .await;

    assert_eq!(outcome, RefreshOutcome::Applied);
    assert_eq!(
        store.entity(EntityType::Page, 42).unwrap().title.rendered,
        "About (server)"
    );

    // A second request for a missing page leaves the first record alone
    let outcome = dedup
        .request_entity_refresh(EntityType::Page, 43, "missing")
        .await;
    assert_eq!(outcome, RefreshOutcome::Failed);
    assert!(store.entity(EntityType::Page, 43).is_none());
    assert_eq!(store.revision(), 1);
}
