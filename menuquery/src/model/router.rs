//! Axum routes for one generated model.
//!
//! | method | path | handler |
//! |---|---|---|
//! | `GET` | `/` | list, query-string request, `Content-Range` header |
//! | `POST` | `/search` | list, JSON body request |
//! | `POST` | `/` | create, `201` |
//! | `GET` | `/{id}` | get |
//! | `PUT` | `/{id}` | update |
//! | `DELETE` | `/{id}` | delete, `204` |

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use serde_json::Value;

use super::service::ModelService;
use crate::access::Caller;
use crate::errors::ApiError;
use crate::filtering::{Paginated, calculate_content_range};
use crate::list_endpoint::ListRequest;
use crate::storage::Row;

pub fn router(service: ModelService) -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/search", post(search))
        .route("/{id}", get(get_one).put(update).delete(delete_one))
        .with_state(service)
}

async fn run_list(
    service: &ModelService,
    caller: &Caller,
    request: ListRequest,
) -> Result<(HeaderMap, Json<Paginated<Row>>), ApiError> {
    let offset = request.offset.unwrap_or(0);
    let page = service.list(caller, request).await?;
    let headers = calculate_content_range(
        offset,
        page.data.len() as u64,
        page.total_count,
        &service.model().name_plural(),
    );
    Ok((headers, Json(page)))
}

async fn list(
    State(service): State<ModelService>,
    caller: Caller,
    Query(request): Query<ListRequest>,
) -> Result<(HeaderMap, Json<Paginated<Row>>), ApiError> {
    run_list(&service, &caller, request).await
}

async fn search(
    State(service): State<ModelService>,
    caller: Caller,
    Json(request): Json<ListRequest>,
) -> Result<(HeaderMap, Json<Paginated<Row>>), ApiError> {
    run_list(&service, &caller, request).await
}

async fn get_one(
    State(service): State<ModelService>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<Row>, ApiError> {
    service.get(&caller, &id).await.map(Json)
}

async fn create(
    State(service): State<ModelService>,
    caller: Caller,
    Json(input): Json<Value>,
) -> Result<(StatusCode, Json<Row>), ApiError> {
    let created = service.create(&caller, &input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update(
    State(service): State<ModelService>,
    caller: Caller,
    Path(id): Path<String>,
    Json(input): Json<Value>,
) -> Result<Json<Row>, ApiError> {
    service.update(&caller, &id, &input).await.map(Json)
}

async fn delete_one(
    State(service): State<ModelService>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    service.delete(&caller, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
