use menuquery::{
    FilterSpec, ListEndpoint, ListRequest, QueryBuilder, QueryConfig, Storage, Where,
    query::StoreQuery,
    storage::{IncludeMap, IncludeSpec},
};
use serde_json::json;

mod common;
use common::{row, setup_sea_store, stores};

async fn seeded() -> menuquery::SeaStore {
    let storage = setup_sea_store().await.expect("Failed to setup test database");
    for store in stores(25, 5) {
        storage.insert("stores", store).await.unwrap();
    }
    for (id, name, store_id) in [("b1", "Downtown", "s00"), ("b2", "Airport", "s00"), ("b3", "Harbour", "s01")] {
        storage
            .insert(
                "branches",
                row(json!({ "id": id, "name": name, "active": id != "b2", "storeId": store_id, "createdAt": id })),
            )
            .await
            .unwrap();
    }
    storage
}

#[tokio::test]
async fn test_scenario_a_against_sqlite() {
    let storage = seeded().await;
    let request: ListRequest = serde_json::from_value(json!({
        "limit": 10,
        "offset": 20,
        "advancedSearch": [{ "field": "active", "value": true, "operation": "eq" }]
    }))
    .unwrap();
    let page = ListEndpoint::new("store")
        .run(
            StoreQuery::new(&storage).into(),
            &menuquery::Caller::new("u1", ["owner"]),
            request.into_params().unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(page.total_count, 25);
    assert_eq!(page.data.len(), 5);
    assert!(!page.has_more);
    assert_eq!(page.current_page, 3);
    assert_eq!(page.total_pages, 3);
}

#[tokio::test]
async fn test_insensitive_search_escapes_wildcards() {
    let storage = seeded().await;
    storage
        .insert("stores", row(json!({ "id": "pct", "title": "100% CAFE", "slug": "pct", "createdAt": "x" })))
        .await
        .unwrap();

    let cafes = QueryBuilder::new(&storage, "stores")
        .search_text("cafe", ["title"])
        .execute_rows()
        .await
        .unwrap();
    assert_eq!(cafes.total_count, 1);

    let percent = QueryBuilder::new(&storage, "stores")
        .search_text("0%", ["title"])
        .execute_rows()
        .await
        .unwrap();
    assert_eq!(percent.total_count, 1, "% must match literally");
    assert_eq!(percent.data[0]["id"], json!("pct"));
}

#[tokio::test]
async fn test_relation_conditions_become_exists() {
    let storage = seeded().await;
    let some: Vec<FilterSpec> = serde_json::from_value(json!([
        { "field": "name", "value": "down", "operation": "contains", "relation": "branches" }
    ]))
    .unwrap();
    let page = QueryBuilder::new(&storage, "stores").search(some).execute_rows().await.unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.data[0]["id"], json!("s00"));

    let none: Vec<FilterSpec> = serde_json::from_value(json!([{
        "field": "branches",
        "operation": "none",
        "value": [{ "field": "active", "value": false, "operation": "eq" }]
    }]))
    .unwrap();
    let page = QueryBuilder::new(&storage, "stores").search(none).execute_rows().await.unwrap();
    assert_eq!(page.total_count, 29, "only s00 has an inactive branch");
}

#[tokio::test]
async fn test_includes_and_select() {
    let storage = seeded().await;
    let page = QueryBuilder::new(&storage, "stores")
        .filter([("id", "s00")])
        .include(IncludeMap::from([(
            "branches".to_string(),
            IncludeSpec::all().select(["id", "name"]).order_by(menuquery::OrderBy::by("name", menuquery::SortOrder::Asc)),
        )]))
        .execute_rows()
        .await
        .unwrap();
    assert_eq!(
        page.data[0]["branches"],
        json!([{ "id": "b2", "name": "Airport" }, { "id": "b1", "name": "Downtown" }])
    );

    let slim = QueryBuilder::new(&storage, "stores")
        .select(["id", "title"])
        .paginate(Some(1), None)
        .execute_rows()
        .await
        .unwrap();
    let keys: Vec<&String> = slim.data[0].keys().collect();
    assert_eq!(keys, vec!["id", "title"]);
}

#[tokio::test]
async fn test_soft_delete_update_and_delete() {
    let storage = seeded().await;

    let touched = storage
        .update_many("stores", &Where::eq("id", "s01"), row(json!({ "deletedAt": "2024-06-01T00:00:00Z" })))
        .await
        .unwrap();
    assert_eq!(touched, 1);
    assert_eq!(StoreQuery::new(&storage).execute_rows().await.unwrap().total_count, 29);

    let removed = storage.delete_many("branches", &Where::eq("storeId", "s00")).await.unwrap();
    assert_eq!(removed, 2);
    assert_eq!(storage.count("branches", &Where::default()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_config_sets_fulltext_language() {
    let storage = setup_sea_store().await.expect("Failed to setup test database");
    assert_eq!(storage.fulltext_language(), "english");

    let storage = storage.with_config(&QueryConfig::from_lookup(|key| {
        (key == "MENUQUERY_FULLTEXT_LANGUAGE").then(|| "german".to_string())
    }));
    assert_eq!(storage.fulltext_language(), "german");
}
