use axum::http::StatusCode;
use menuquery::{ApiError, Caller, QueryBuilder, query::StoreQuery};
use serde_json::json;
use std::sync::Arc;

mod common;
use common::{FailingStorage, send, setup_app};

#[tokio::test]
async fn test_storage_failure_is_never_an_empty_page() {
    let storage = FailingStorage::new();
    let result = QueryBuilder::new(&storage, "stores").execute_rows().await;
    match result {
        Err(err @ ApiError::Database { .. }) => {
            assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(err.user_message(), "A database error occurred");
        }
        other => panic!("expected a database error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_entity_builder_propagates_storage_failure() {
    let storage = FailingStorage::new();
    let result = StoreQuery::new(&storage).with_relations().execute_rows().await;
    assert!(matches!(result, Err(ApiError::Database { .. })));
}

#[tokio::test]
async fn test_validation_fails_before_storage_is_touched() {
    let storage = FailingStorage::new();
    let result = QueryBuilder::new(&storage, "stores")
        .filter([("bad name", json!(1))])
        .execute_rows()
        .await;
    assert!(matches!(result, Err(ApiError::ValidationFailed { .. })));
}

#[tokio::test]
async fn test_http_storage_failure_is_500_without_details() {
    let app = setup_app(Arc::new(FailingStorage::new()), Some(Caller::new("u1", ["owner"])));

    let (response, body) = send(&app, "GET", "/api/v1/stores", None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "A database error occurred" }));

    let (response, _) = send(
        &app,
        "POST",
        "/api/v1/stores",
        Some(json!({ "title": "New", "slug": "new", "userId": "6f1d7c1e-4c53-4a43-9a9b-2f4f5a8f0b11" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
