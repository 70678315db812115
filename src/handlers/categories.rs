// src/handlers/categories.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    catalog::Catalog,
    error::AppError,
    models::category::{CreateCategoryRequest, UpdateCategoryRequest},
};

pub async fn list_categories(State(catalog): State<Arc<Catalog>>) -> impl IntoResponse {
    Json(catalog.list_categories().await)
}

/// Creates a category. `id` defaults to the slug.
pub async fn create_category(
    State(catalog): State<Arc<Catalog>>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let category = catalog.create_category(payload).await?;
    tracing::info!("Category created: {}", category.id);
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(catalog): State<Arc<Catalog>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(catalog.update_category(&id, payload).await?))
}

/// Deletes a category together with its questions.
pub async fn delete_category(
    State(catalog): State<Arc<Catalog>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    catalog.delete_category(&id).await?;
    tracing::info!("Category deleted: {}", id);
    Ok(Json(json!({ "ok": true })))
}
