use async_trait::async_trait;
use axum::{Extension, Router, body::Body, http::Request, response::Response};
use menuquery::{
    AccessControl, Caller, MemoryStore, RoleAccess, SeaStore, Storage, Where, catalog, config,
    generate_all,
    storage::{FindMany, Relations, Row},
};
use sea_orm::{ConnectionTrait, Database, DbErr};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[allow(dead_code)]
pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

/// `active` active stores followed by `inactive` inactive ones, created in order.
#[allow(dead_code)]
pub fn stores(active: usize, inactive: usize) -> Vec<Row> {
    (0..active + inactive)
        .map(|n| {
            row(json!({
                "id": format!("s{n:02}"),
                "title": format!("Store {n:02}"),
                "slug": format!("store-{n:02}"),
                "active": n < active,
                "userId": "u1",
                "createdAt": format!("2024-01-{:02}T00:00:00Z", n + 1),
                "deletedAt": null
            }))
        })
        .collect()
}

#[allow(dead_code)]
pub async fn memory_store() -> MemoryStore {
    init_tracing();
    MemoryStore::new(catalog::relations())
}

/// Users, stores with branches and a categorized menu.
#[allow(dead_code)]
pub async fn seeded_store() -> MemoryStore {
    let store = memory_store().await;
    store
        .seed(
            "users",
            [
                row(json!({ "id": "u1", "username": "ana", "email": "ana@example.com", "role": "owner", "active": true, "createdAt": "2024-01-01T00:00:00Z", "deletedAt": null })),
                row(json!({ "id": "u2", "username": "bo", "email": "bo@example.com", "role": "staff", "active": true, "createdAt": "2024-01-02T00:00:00Z", "deletedAt": null })),
            ],
        )
        .await;
    store
        .seed(
            "stores",
            [
                row(json!({ "id": "s1", "title": "Cafe Corner", "slug": "cafe-corner", "active": true, "userId": "u1", "createdAt": "2024-02-01T00:00:00Z", "deletedAt": null })),
                row(json!({ "id": "s2", "title": "Bistro", "slug": "bistro", "active": true, "userId": "u2", "createdAt": "2024-02-02T00:00:00Z", "deletedAt": null })),
                row(json!({ "id": "s3", "title": "CAFE House", "slug": "cafe-house", "active": false, "userId": "u1", "createdAt": "2024-02-03T00:00:00Z", "deletedAt": null })),
                row(json!({ "id": "s4", "title": "Cafe Closed", "slug": "cafe-closed", "active": true, "userId": "u1", "createdAt": "2024-02-04T00:00:00Z", "deletedAt": "2024-03-01T00:00:00Z" })),
            ],
        )
        .await;
    store
        .seed(
            "branches",
            [
                row(json!({ "id": "b1", "name": "Downtown", "active": true, "storeId": "s1", "createdAt": "2024-02-05T00:00:00Z", "deletedAt": null })),
                row(json!({ "id": "b2", "name": "Airport", "active": false, "storeId": "s1", "createdAt": "2024-02-06T00:00:00Z", "deletedAt": null })),
                row(json!({ "id": "b3", "name": "Harbour", "active": true, "storeId": "s2", "createdAt": "2024-02-07T00:00:00Z", "deletedAt": null })),
            ],
        )
        .await;
    store
        .seed(
            "categories",
            [
                row(json!({ "id": "c1", "title": "Coffee", "position": 1, "active": true, "storeId": "s1", "createdAt": "2024-02-08T00:00:00Z", "deletedAt": null })),
                row(json!({ "id": "c2", "title": "Pastry", "position": 0, "active": true, "storeId": "s1", "createdAt": "2024-02-09T00:00:00Z", "deletedAt": null })),
            ],
        )
        .await;
    store
        .seed(
            "menuItems",
            [
                row(json!({ "id": "m1", "title": "Espresso", "price": 2.5, "available": true, "tags": ["hot"], "categoryId": "c1", "storeId": "s1", "createdAt": "2024-02-10T00:00:00Z", "deletedAt": null })),
                row(json!({ "id": "m2", "title": "Iced Latte", "price": 4.0, "available": false, "tags": ["cold", "milk"], "categoryId": "c1", "storeId": "s1", "createdAt": "2024-02-11T00:00:00Z", "deletedAt": null })),
                row(json!({ "id": "m3", "title": "Croissant", "price": 3.2, "available": true, "tags": ["vegetarian"], "categoryId": "c2", "storeId": "s1", "createdAt": "2024-02-12T00:00:00Z", "deletedAt": null })),
            ],
        )
        .await;
    store
}

/// A store whose every call fails, as an unreachable database would.
#[allow(dead_code)]
pub struct FailingStorage {
    relations: Relations,
}

#[allow(dead_code)]
impl FailingStorage {
    pub fn new() -> Self {
        Self {
            relations: catalog::relations(),
        }
    }

    fn error() -> DbErr {
        DbErr::Custom("connection refused".to_string())
    }
}

#[async_trait]
impl Storage for FailingStorage {
    fn relations(&self) -> &Relations {
        &self.relations
    }

    async fn find_many(&self, _collection: &str, _args: &FindMany) -> Result<Vec<Row>, DbErr> {
        Err(Self::error())
    }

    async fn count(&self, _collection: &str, _filter: &Where) -> Result<u64, DbErr> {
        Err(Self::error())
    }

    async fn insert(&self, _collection: &str, _row: Row) -> Result<Row, DbErr> {
        Err(Self::error())
    }

    async fn update_many(&self, _collection: &str, _filter: &Where, _patch: Row) -> Result<u64, DbErr> {
        Err(Self::error())
    }

    async fn delete_many(&self, _collection: &str, _filter: &Where) -> Result<u64, DbErr> {
        Err(Self::error())
    }
}

/// Every catalog model mounted under `/api/v1/<plural>`; `caller` stands in for the
/// auth middleware.
#[allow(dead_code)]
pub fn setup_app(storage: Arc<dyn Storage>, caller: Option<Caller>) -> Router {
    let access: Arc<dyn AccessControl> = Arc::new(RoleAccess);
    let mut api = Router::new();
    for model in generate_all(catalog::all()).expect("catalog models are valid") {
        let path = format!("/{}", model.description().name_plural());
        api = api.nest(&path, model.router(Arc::clone(&storage), Arc::clone(&access)));
    }
    let app = Router::new().nest("/api/v1", api);
    match caller {
        Some(caller) => app.layer(Extension(caller)),
        None => app,
    }
}

#[allow(dead_code)]
pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (Response, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (Response::from_parts(parts, Body::empty()), json)
}

#[allow(dead_code)]
pub async fn setup_sea_store() -> Result<SeaStore, DbErr> {
    init_tracing();
    let db = Database::connect(config::database_url()).await?;
    for table in ["menuItems", "branches", "stores", "users"] {
        db.execute_unprepared(&format!("DROP TABLE IF EXISTS \"{table}\"")).await?;
    }
    db.execute_unprepared(
        r#"CREATE TABLE "users" (
            "id" TEXT PRIMARY KEY,
            "username" TEXT NOT NULL,
            "email" TEXT NOT NULL,
            "createdAt" TEXT,
            "deletedAt" TEXT
        )"#,
    )
    .await?;
    db.execute_unprepared(
        r#"CREATE TABLE "stores" (
            "id" TEXT PRIMARY KEY,
            "title" TEXT NOT NULL,
            "slug" TEXT NOT NULL UNIQUE,
            "active" BOOLEAN NOT NULL DEFAULT 1,
            "userId" TEXT,
            "createdAt" TEXT,
            "deletedAt" TEXT
        )"#,
    )
    .await?;
    db.execute_unprepared(
        r#"CREATE TABLE "branches" (
            "id" TEXT PRIMARY KEY,
            "name" TEXT NOT NULL,
            "active" BOOLEAN NOT NULL DEFAULT 1,
            "storeId" TEXT,
            "createdAt" TEXT,
            "deletedAt" TEXT
        )"#,
    )
    .await?;
    db.execute_unprepared(
        r#"CREATE TABLE "menuItems" (
            "id" TEXT PRIMARY KEY,
            "title" TEXT NOT NULL,
            "price" REAL NOT NULL,
            "storeId" TEXT,
            "createdAt" TEXT,
            "deletedAt" TEXT
        )"#,
    )
    .await?;
    Ok(SeaStore::new(db, catalog::relations()))
}
