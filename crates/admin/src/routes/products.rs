//! Product management route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use bazaar_core::{Product, ProductDraft, ProductId};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::services::DeleteConfirmation;
use crate::state::AppState;

/// Query string of a confirmed delete.
#[derive(Debug, Deserialize)]
pub struct ConfirmQuery {
    pub token: Option<Uuid>,
}

#[instrument(skip_all)]
pub async fn index(
    RequireAdmin(_): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.editor().list().await?))
}

#[instrument(skip_all, fields(admin = %admin.uid))]
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(draft): Json<ProductDraft>,
) -> Result<(StatusCode, Json<Vec<Product>>)> {
    let products = state.editor().create(draft).await?;
    Ok((StatusCode::CREATED, Json(products)))
}

#[instrument(skip_all, fields(admin = %admin.uid, product_id = %id))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(draft): Json<ProductDraft>,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.editor().update(&id, draft).await?))
}

#[instrument(skip_all, fields(admin = %admin.uid, product_id = %id))]
pub async fn request_delete(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<DeleteConfirmation>> {
    Ok(Json(state.editor().request_delete(&id).await?))
}

#[instrument(skip_all, fields(admin = %admin.uid, product_id = %id))]
pub async fn confirm_delete(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Query(query): Query<ConfirmQuery>,
) -> Result<Json<Vec<Product>>> {
    let token = query
        .token
        .ok_or_else(|| AppError::BadRequest("a delete confirmation token is required".to_string()))?;
    Ok(Json(state.editor().confirm_delete(&id, token).await?))
}

#[instrument(skip_all, fields(admin = %admin.uid))]
pub async fn cancel_delete(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(token): Path<Uuid>,
) -> StatusCode {
    state.editor().cancel_delete(token).await;
    StatusCode::NO_CONTENT
}
