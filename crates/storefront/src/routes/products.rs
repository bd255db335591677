//! Catalog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use bazaar_core::{Product, ProductId};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::Result;
use crate::services::{ALL_CATEGORIES, CATEGORIES, FEATURED_LIMIT, ProductFilter};
use crate::state::AppState;

/// Featured products query parameters.
#[derive(Debug, Deserialize)]
pub struct FeaturedQuery {
    pub limit: Option<usize>,
}

/// Category filter options, "All" first.
#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<&'static str>,
}

/// List products, optionally filtered by category and name prefix.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.catalog().search(&filter).await?))
}

/// Products for the home page.
#[instrument(skip(state))]
pub async fn featured(
    State(state): State<AppState>,
    Query(query): Query<FeaturedQuery>,
) -> Result<Json<Vec<Product>>> {
    let limit = query.limit.unwrap_or(FEATURED_LIMIT);
    Ok(Json(state.catalog().list_featured(limit).await?))
}

/// One product; 404 tells the page to redirect.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Product>> {
    Ok(Json(state.catalog().get_by_id(&ProductId::new(id)).await?))
}

pub async fn categories() -> Json<CategoriesResponse> {
    let categories = std::iter::once(ALL_CATEGORIES)
        .chain(CATEGORIES)
        .collect();
    Json(CategoriesResponse { categories })
}
