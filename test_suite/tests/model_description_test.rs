use axum::http::StatusCode;
use menuquery::{ApiError, Caller, MemoryStore, ModelDescription, RoleAccess, generate, model::relations_for};
use serde_json::json;
use std::sync::Arc;

mod common;
use common::send;

const PROMOTION: &str = r#"{
    "name": "promotion",
    "description": "Time-limited discount on a store's menu",
    "softDelete": true,
    "fields": [
        { "name": "code", "type": "string", "required": true, "searchable": true, "filterable": true,
          "bounds": { "minLength": 3, "maxLength": 16, "pattern": "^[A-Z0-9]+$" } },
        { "name": "percent", "type": "int", "required": true, "filterable": true, "sortable": true,
          "bounds": { "min": 1, "max": 90 } },
        { "name": "channel", "type": { "enum": ["dine-in", "delivery"] }, "filterable": true, "default": "dine-in" },
        { "name": "storeId", "type": "uuid", "required": true, "filterable": true },
        { "name": "store", "type": "relation",
          "relation": { "model": "stores", "localKey": "storeId", "kind": "one" } }
    ],
    "permissions": { "create": ["owner"], "update": ["owner"], "delete": ["owner"] }
}"#;

const STORE_ID: &str = "0d9b2a4e-7f65-4c1a-9d3e-5b8c2f1a6e70";

#[tokio::test]
async fn test_json_description_drives_crud() {
    common::init_tracing();
    let model = generate(ModelDescription::from_json(PROMOTION).unwrap()).unwrap();
    let storage = Arc::new(MemoryStore::new(relations_for(&[model.description().clone()])));
    let app = model
        .router(storage, Arc::new(RoleAccess))
        .layer(axum::Extension(Caller::new("u1", ["owner"])));

    for (code, percent, channel) in [("SPRING10", 10, "dine-in"), ("FAST25", 25, "delivery"), ("HALF50", 50, "delivery")] {
        let (response, _) = send(
            &app,
            "POST",
            "/",
            Some(json!({ "code": code, "percent": percent, "channel": channel, "storeId": STORE_ID })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let (_, body) = send(&app, "GET", "/?percent=%7B%22gte%22%3A20%7D&orderBy=%7B%22percent%22%3A%22asc%22%7D", None).await;
    let codes: Vec<&str> = body["data"].as_array().unwrap().iter().filter_map(|p| p["code"].as_str()).collect();
    assert_eq!(codes, vec!["FAST25", "HALF50"]);

    let (_, body) = send(
        &app,
        "POST",
        "/search",
        Some(json!({ "channel": ["dine-in"], "search": "spring" })),
    )
    .await;
    assert_eq!(body["totalCount"], json!(1));

    let (response, body) = send(
        &app,
        "POST",
        "/",
        Some(json!({ "code": "nope", "percent": 95, "storeId": STORE_ID })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"].as_array().unwrap().len(), 2);
}

#[test]
fn test_bad_default_fails_generation() {
    let mut model: ModelDescription = ModelDescription::from_json(PROMOTION).unwrap();
    model.fields[2].default = Some(json!("takeaway"));
    match generate(model) {
        Err(ApiError::ValidationFailed { errors }) => {
            assert_eq!(errors[0].field, "channel");
            assert!(errors[0].message.starts_with("invalid default"));
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
}
