// src/handlers/questions.rs

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
    models::question::{CreateQuestionRequest, UpdateQuestionRequest},
};

/// Admin view of a category's questions, answer keys included.
pub async fn list_questions(
    State(catalog): State<Arc<Catalog>>,
    Path(category_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(catalog.questions(&category_id).await?))
}

pub async fn create_question(
    State(catalog): State<Arc<Catalog>>,
    Path(category_id): Path<String>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let question = catalog.create_question(&category_id, payload).await?;
    tracing::info!("Question {} added to {}", question.id, category_id);
    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn update_question(
    State(catalog): State<Arc<Catalog>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(catalog.update_question(&id, payload).await?))
}

pub async fn delete_question(
    State(catalog): State<Arc<Catalog>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    catalog.delete_question(&id).await?;
    Ok(Json(json!({ "ok": true })))
}
