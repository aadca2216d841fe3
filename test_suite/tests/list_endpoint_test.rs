use axum::{extract::Query, http::Uri};
use menuquery::{
    ApiError, Caller, ListEndpoint, ListRequest, RoleAccess, Where, query::StoreQuery, storage::Row,
};
use serde_json::{Value, json};
use std::sync::Arc;

mod common;
use common::seeded_store;

fn owned_stores() -> ListEndpoint {
    ListEndpoint::new("store")
        .with_access(Arc::new(RoleAccess), ["owner", "admin"])
        .search_fields(["title", "slug"])
        .derive_filters(|caller, _| Ok(vec![("userId".into(), Where::eq("userId", caller.id.clone()))]))
}

fn request(value: Value) -> menuquery::ListParams {
    serde_json::from_value::<ListRequest>(value).unwrap().into_params().unwrap()
}

#[tokio::test]
async fn test_derived_filters_scope_to_caller() {
    let storage = seeded_store().await;
    let page = owned_stores()
        .run(StoreQuery::new(&storage).into(), &Caller::new("u1", ["owner"]), request(json!({})))
        .await
        .unwrap();

    let mut ids: Vec<&str> = page.data.iter().filter_map(|r| r["id"].as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["s1", "s3"]);
}

#[tokio::test]
async fn test_derived_filter_overrides_request_filter() {
    let storage = seeded_store().await;
    let page = owned_stores()
        .run(
            StoreQuery::new(&storage).into(),
            &Caller::new("u1", ["owner"]),
            request(json!({ "userId": "u2" })),
        )
        .await
        .unwrap();
    assert!(page.data.iter().all(|r| r["userId"] == json!("u1")));
}

#[tokio::test]
async fn test_request_filter_cannot_reach_deleted_stores() {
    let storage = seeded_store().await;
    let page = owned_stores()
        .run(
            StoreQuery::new(&storage).into(),
            &Caller::new("u1", ["owner"]),
            request(json!({ "deletedAt": "2024-03-01T00:00:00Z" })),
        )
        .await
        .unwrap();
    assert_eq!(page.total_count, 0);

    let page = ListEndpoint::new("store")
        .derive_filters(|_, _| Ok(vec![("deletedAt".into(), Where::eq("deletedAt", "2024-03-01T00:00:00Z"))]))
        .run(StoreQuery::new(&storage).into(), &Caller::new("u1", ["owner"]), request(json!({})))
        .await
        .unwrap();
    assert!(page.data.is_empty());
}

#[tokio::test]
async fn test_query_string_filters_are_typed() {
    let storage = seeded_store().await;
    let uri: Uri = "/?active=true&limit=5".parse().unwrap();
    let Query(request) = Query::<ListRequest>::try_from_uri(&uri).unwrap();

    let page = owned_stores()
        .run(
            StoreQuery::new(&storage).into(),
            &Caller::new("u1", ["owner"]),
            StoreQuery::params(request).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.data[0]["id"], json!("s1"));
}

#[tokio::test]
async fn test_typed_params_reject_unknown_fields() {
    let request = serde_json::from_value::<ListRequest>(json!({ "colour": "red" })).unwrap();
    let errors = StoreQuery::params(request).unwrap_err();
    assert_eq!(errors.errors()[0].field, "colour");
}

#[tokio::test]
async fn test_advanced_search_takes_priority_over_legacy() {
    let storage = seeded_store().await;
    let page = owned_stores()
        .run(
            StoreQuery::new(&storage).into(),
            &Caller::new("u1", ["owner"]),
            request(json!({
                "search": "cafe",
                "advancedSearch": [{ "field": "active", "value": false, "operation": "eq" }]
            })),
        )
        .await
        .unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.data[0]["id"], json!("s3"));
}

#[tokio::test]
async fn test_access_check_runs_first() {
    let storage = seeded_store().await;
    let result = owned_stores()
        .run(StoreQuery::new(&storage).into(), &Caller::new("u2", ["staff"]), request(json!({})))
        .await;
    match result {
        Err(ApiError::Forbidden { message }) => assert_eq!(message, "Missing required role for list store"),
        other => panic!("expected forbidden, got {other:?}"),
    }
}

#[tokio::test]
async fn test_transform_post_processes_rows() {
    let storage = seeded_store().await;
    let endpoint = owned_stores().transform(|mut row: Row| {
        let title = row.get("title").and_then(Value::as_str).unwrap_or_default().to_uppercase();
        row.insert("displayTitle".into(), Value::String(title));
        row.remove("userId");
        Ok(row)
    });

    let page = endpoint
        .run(
            StoreQuery::new(&storage).into(),
            &Caller::new("u1", ["owner"]),
            request(json!({ "sortBy": "title", "order": "asc", "limit": "1" })),
        )
        .await
        .unwrap();
    assert_eq!(page.data[0]["displayTitle"], json!("CAFE HOUSE"));
    assert!(!page.data[0].contains_key("userId"));
    assert_eq!(page.total_count, 2);
    assert!(page.has_more);
}
