use axum::{Extension, Router, http::StatusCode};
use menuquery::{Caller, QueryConfig, RoleAccess, Storage, Where, catalog, generate};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;

mod common;
use common::{row, seeded_store, send, setup_app};

const OWNER_ID: &str = "6f1d7c1e-4c53-4a43-9a9b-2f4f5a8f0b11";

async fn owner_app() -> axum::Router {
    setup_app(Arc::new(seeded_store().await), Some(Caller::new("u1", ["owner"])))
}

#[tokio::test]
async fn test_missing_caller_is_unauthorized() {
    let app = setup_app(Arc::new(seeded_store().await), None);
    let (response, body) = send(&app, "GET", "/api/v1/stores", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], json!("Authentication required"));
}

#[tokio::test]
async fn test_list_envelope_and_content_range() {
    let app = owner_app().await;
    let (response, body) = send(&app, "GET", "/api/v1/stores?limit=2&sortBy=title&order=asc", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-range"], "stores 0-1/3");
    assert_eq!(body["totalCount"], json!(3));
    assert_eq!(body["hasMore"], json!(true));
    assert_eq!(body["totalPages"], json!(2));
    assert_eq!(body["data"][0]["title"], json!("Bistro"));
    // `user` is a default include of the store model
    assert_eq!(body["data"][0]["user"]["username"], json!("bo"));
}

#[tokio::test]
async fn test_filterable_fields_from_query_string() {
    let app = owner_app().await;

    let (_, body) = send(&app, "GET", "/api/v1/stores?active=false", None).await;
    assert_eq!(body["totalCount"], json!(1));
    assert_eq!(body["data"][0]["id"], json!("s3"));

    let (response, body) = send(&app, "GET", "/api/v1/stores?colour=red", None).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], json!("colour"));

    let (response, _) = send(&app, "GET", "/api/v1/stores?limit=500", None).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_advanced_search_body_with_relation() {
    let app = owner_app().await;
    let (response, body) = send(
        &app,
        "POST",
        "/api/v1/stores/search",
        Some(json!({
            "advancedSearch": [
                { "field": "name", "value": "DOWN", "operation": "contains", "relation": "branches" }
            ]
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body["totalCount"], json!(1));
    assert_eq!(body["data"][0]["id"], json!("s1"));
}

#[tokio::test]
async fn test_malformed_between_is_rejected() {
    let app = owner_app().await;
    let (response, _) = send(
        &app,
        "POST",
        "/api/v1/menuItems/search",
        Some(json!({ "advancedSearch": [{ "field": "price", "value": [1], "operation": "between" }] })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_soft_deleted_store_is_not_found() {
    let app = owner_app().await;
    let (response, body) = send(&app, "GET", "/api/v1/stores/s4", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("store with ID 's4' not found"));
}

#[tokio::test]
async fn test_create_update_delete_cycle() {
    let app = owner_app().await;

    let (response, created) = send(
        &app,
        "POST",
        "/api/v1/stores",
        Some(json!({ "title": "Noodle Bar", "slug": "noodle-bar", "userId": OWNER_ID })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(created["active"], json!(true));
    let id = created["id"].as_str().unwrap().to_string();

    let (response, updated) = send(
        &app,
        "PUT",
        &format!("/api/v1/stores/{id}"),
        Some(json!({ "title": "Noodle Bar & Grill" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(updated["title"], json!("Noodle Bar & Grill"));
    assert_eq!(updated["slug"], json!("noodle-bar"));

    let (response, _) = send(&app, "DELETE", &format!("/api/v1/stores/{id}"), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (response, _) = send(&app, "GET", &format!("/api/v1/stores/{id}"), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_validation_details() {
    let app = owner_app().await;
    let (response, body) = send(
        &app,
        "POST",
        "/api/v1/stores",
        Some(json!({ "title": "X", "slug": "Not A Slug", "userId": "u1" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["field"].as_str())
        .collect();
    assert_eq!(fields, vec!["title", "slug", "userId"]);
}

#[tokio::test]
async fn test_update_of_missing_row_is_not_found() {
    let app = owner_app().await;
    let (response, _) = send(&app, "PUT", "/api/v1/stores/nope", Some(json!({ "title": "Ghost" }))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_operations_are_role_gated() {
    let storage = Arc::new(seeded_store().await);
    let staff = setup_app(storage.clone(), Some(Caller::new("u2", ["staff"])));

    let (response, _) = send(
        &staff,
        "POST",
        "/api/v1/stores",
        Some(json!({ "title": "Staff Store", "slug": "staff-store", "userId": OWNER_ID })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let (response, _) = send(&staff, "DELETE", "/api/v1/stores/s1", None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // reads with no role list stay open to any authenticated caller
    let (response, _) = send(&staff, "GET", "/api/v1/stores/s1", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let owner = setup_app(storage, Some(Caller::new("u1", ["owner"])));
    let (response, _) = send(&owner, "GET", "/api/v1/users", None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_deleted_owner_is_not_included() {
    let storage = Arc::new(seeded_store().await);
    storage
        .update_many("users", &Where::eq("id", "u2"), row(json!({ "deletedAt": "2024-03-05T00:00:00Z" })))
        .await
        .unwrap();
    let app = setup_app(storage, Some(Caller::new("u1", ["owner"])));

    let (response, body) = send(&app, "GET", "/api/v1/stores/s2", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body["user"], Value::Null);

    let (_, body) = send(&app, "GET", "/api/v1/stores?sortBy=title&order=asc", None).await;
    assert_eq!(body["data"][0]["id"], json!("s2"));
    assert_eq!(body["data"][0]["user"], Value::Null);
    assert_eq!(body["data"][1]["user"]["username"], json!("ana"));
}

#[tokio::test]
async fn test_nested_quantifier_fields_are_checked() {
    let app = owner_app().await;
    let (response, body) = send(
        &app,
        "POST",
        "/api/v1/stores/search",
        Some(json!({
            "advancedSearch": [{
                "field": "branches",
                "operation": "some",
                "value": [{ "field": "colour", "value": "red", "operation": "eq" }]
            }]
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["message"], json!("unknown field: branches.colour"));

    let (response, body) = send(
        &app,
        "POST",
        "/api/v1/stores/search",
        Some(json!({
            "advancedSearch": [{
                "field": "branches",
                "operation": "some",
                "value": [{ "field": "name", "value": "Harb", "operation": "startsWith" }]
            }]
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body["data"][0]["id"], json!("s2"));
}

#[tokio::test]
async fn test_list_role_is_checked_before_the_request() {
    let app = setup_app(Arc::new(seeded_store().await), Some(Caller::new("u2", ["staff"])));
    let (response, _) = send(&app, "GET", "/api/v1/users?colour=red", None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_config_sets_default_page_size() {
    let storage: Arc<dyn Storage> = Arc::new(seeded_store().await);
    let stores = generate(catalog::store()).unwrap().with_config(QueryConfig {
        default_limit: 2,
        ..QueryConfig::default()
    });
    let app = Router::new()
        .nest("/api/v1/stores", stores.router(storage, Arc::new(RoleAccess)))
        .layer(Extension(Caller::new("u1", ["owner"])));

    let (response, body) = send(&app, "GET", "/api/v1/stores", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["totalCount"], json!(3));
    assert_eq!(body["hasMore"], json!(true));
}
