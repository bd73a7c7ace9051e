mod common;

use common::{BASE_URL, Pipeline};
use serde_json::{Value, json};
use url_pipeline::domain::events::{MAPPING_CREATED_QUEUE, MAPPING_DELETED_QUEUE};
use url_pipeline::domain::repositories::MappingRepository;

#[tokio::test]
async fn test_create_anonymous_mapping() {
    let pipeline = Pipeline::new();

    let response = pipeline
        .writer
        .post("/urls")
        .json(&json!({ "longUrl": "http://example.com/a/b/c" }))
        .await;

    assert_eq!(response.status_code(), 201);
    let body: Value = response.json();
    let short_id = body["shortId"].as_str().unwrap();
    assert_eq!(short_id.len(), 11);
    assert!(short_id.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_eq!(body["longUrl"], "http://example.com/a/b/c");
    assert_eq!(body["fullShortUrl"], format!("{BASE_URL}/{short_id}"));
    assert!(body["id"].is_i64());

    let stored = pipeline.repo.find_by_short_id(short_id).await.unwrap().unwrap();
    assert_eq!(stored.owner_id, None);
    pipeline.wait_for_publishes(1).await;
    assert_eq!(pipeline.broker.depth(MAPPING_CREATED_QUEUE).await, 1);
}

#[tokio::test]
async fn test_create_owned_mapping() {
    let pipeline = Pipeline::new();

    let short_id = pipeline.create("https://example.com", Some("7")).await;

    let stored = pipeline.repo.find_by_short_id(&short_id).await.unwrap().unwrap();
    assert_eq!(stored.owner_id, Some(7));
}

#[tokio::test]
async fn test_create_bare_domain_gets_scheme() {
    let pipeline = Pipeline::new();

    let response = pipeline
        .writer
        .post("/urls")
        .json(&json!({ "longUrl": "example.com/docs" }))
        .await;

    assert_eq!(response.status_code(), 201);
    assert_eq!(response.json::<Value>()["longUrl"], "http://example.com/docs");
}

#[tokio::test]
async fn test_create_invalid_url_is_validation_error() {
    let pipeline = Pipeline::new();

    for long_url in ["", "ftp://example.com/file", "javascript:alert(1)"] {
        let response = pipeline
            .writer
            .post("/urls")
            .json(&json!({ "longUrl": long_url }))
            .await;

        assert_eq!(response.status_code(), 400, "longUrl {long_url:?}");
        assert_eq!(
            response.json::<Value>()["error"]["code"],
            "validation_error"
        );
    }

    assert_eq!(pipeline.repo.query_count(), 0);
    assert_eq!(pipeline.broker.depth(MAPPING_CREATED_QUEUE).await, 0);
}

#[tokio::test]
async fn test_create_with_bad_identity_is_unauthorized() {
    let pipeline = Pipeline::new();

    let response = pipeline
        .writer
        .post("/urls")
        .add_header("x-user-id", "not-a-number")
        .json(&json!({ "longUrl": "https://example.com" }))
        .await;

    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_create_succeeds_when_broker_is_down() {
    let pipeline = Pipeline::new();
    pipeline.broker.set_publish_failure(true);

    let short_id = pipeline.create("https://example.com", None).await;

    assert!(pipeline.repo.find_by_short_id(&short_id).await.unwrap().is_some());
    assert_eq!(pipeline.broker.depth(MAPPING_CREATED_QUEUE).await, 0);
}

#[tokio::test]
async fn test_list_mine_requires_identity() {
    let pipeline = Pipeline::new();

    let response = pipeline.writer.get("/urls/mine").await;

    assert_eq!(response.status_code(), 401);
    assert_eq!(response.header("www-authenticate"), "Bearer");
    assert_eq!(response.json::<Value>()["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn test_list_mine_returns_only_own_mappings() {
    let pipeline = Pipeline::new();
    let first = pipeline.create("https://example.com/1", Some("1")).await;
    let second = pipeline.create("https://example.com/2", Some("1")).await;
    pipeline.create("https://example.com/other", Some("2")).await;
    pipeline.create("https://example.com/anon", None).await;

    let response = pipeline
        .writer
        .get("/urls/mine")
        .add_header("x-user-id", "1")
        .await;

    assert_eq!(response.status_code(), 200);
    let items: Vec<Value> = response.json();
    let ids: Vec<&str> = items.iter().map(|i| i["shortId"].as_str().unwrap()).collect();
    assert_eq!(ids, vec![second.as_str(), first.as_str()]);
    assert_eq!(items[0]["fullShortUrl"], format!("{BASE_URL}/{second}"));
}

#[tokio::test]
async fn test_delete_by_owner() {
    let pipeline = Pipeline::new();
    let short_id = pipeline.create("https://example.com", Some("1")).await;

    let response = pipeline
        .writer
        .delete(&format!("/urls/{short_id}"))
        .add_header("x-user-id", "1")
        .await;

    assert_eq!(response.status_code(), 204);
    assert!(pipeline.repo.find_by_short_id(&short_id).await.unwrap().is_none());
    assert_eq!(pipeline.broker.depth(MAPPING_DELETED_QUEUE).await, 1);
}

#[tokio::test]
async fn test_delete_by_non_owner_is_forbidden() {
    let pipeline = Pipeline::new();
    let short_id = pipeline.create("https://example.com", Some("1")).await;

    let response = pipeline
        .writer
        .delete(&format!("/urls/{short_id}"))
        .add_header("x-user-id", "2")
        .await;

    assert_eq!(response.status_code(), 403);
    assert_eq!(response.json::<Value>()["error"]["code"], "forbidden");
    assert!(pipeline.repo.find_by_short_id(&short_id).await.unwrap().is_some());
    assert_eq!(pipeline.broker.depth(MAPPING_DELETED_QUEUE).await, 0);
}

#[tokio::test]
async fn test_delete_unknown_is_not_found() {
    let pipeline = Pipeline::new();

    let response = pipeline
        .writer
        .delete("/urls/doesNotExist")
        .add_header("x-user-id", "1")
        .await;

    assert_eq!(response.status_code(), 404);
    assert_eq!(response.json::<Value>()["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_delete_requires_identity() {
    let pipeline = Pipeline::new();
    let short_id = pipeline.create("https://example.com", Some("1")).await;

    let response = pipeline.writer.delete(&format!("/urls/{short_id}")).await;

    assert_eq!(response.status_code(), 401);
    assert!(pipeline.repo.find_by_short_id(&short_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_twice_is_not_found() {
    let pipeline = Pipeline::new();
    let short_id = pipeline.create("https://example.com", Some("1")).await;
    let path = format!("/urls/{short_id}");

    let first = pipeline.writer.delete(&path).add_header("x-user-id", "1").await;
    let second = pipeline.writer.delete(&path).add_header("x-user-id", "1").await;

    assert_eq!(first.status_code(), 204);
    assert_eq!(second.status_code(), 404);
    assert_eq!(pipeline.broker.depth(MAPPING_DELETED_QUEUE).await, 1);
}

#[tokio::test]
async fn test_stats_reports_click_count() {
    let pipeline = Pipeline::new();
    let short_id = pipeline.create("https://example.com/stats", None).await;

    let response = pipeline.writer.get(&format!("/stats/{short_id}")).await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["shortId"], short_id.as_str());
    assert_eq!(body["longUrl"], "https://example.com/stats");
    assert_eq!(body["clickCount"], 0);
}

#[tokio::test]
async fn test_stats_unknown_is_not_found() {
    let pipeline = Pipeline::new();

    let response = pipeline.writer.get("/stats/missing").await;

    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_writer_health() {
    let pipeline = Pipeline::new();

    let response = pipeline.writer.get("/health").await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["database"]["status"], "ok");
    assert_eq!(body["checks"]["broker"]["status"], "ok");
    assert!(body["checks"].get("cache").is_none());
}

#[tokio::test]
async fn test_writer_health_degraded_when_broker_down() {
    let pipeline = Pipeline::new();
    pipeline.broker.set_publish_failure(true);

    let response = pipeline.writer.get("/health").await;

    assert_eq!(response.status_code(), 503);
    let body: Value = response.json();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["broker"]["status"], "error");
}

#[tokio::test]
async fn test_database_down_is_internal_error() {
    let pipeline = Pipeline::new();
    pipeline.repo.set_unavailable(true);

    let response = pipeline
        .writer
        .post("/urls")
        .json(&json!({ "longUrl": "https://example.com" }))
        .await;

    assert_eq!(response.status_code(), 500);
    assert_eq!(response.json::<Value>()["error"]["code"], "internal_error");
}
