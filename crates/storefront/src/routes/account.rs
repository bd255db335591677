//! Account route handlers.

use axum::{Json, extract::State};
use bazaar_core::Order;
use tracing::instrument;

use crate::error::Result;
use crate::middleware::SignedIn;
use crate::state::AppState;

/// The shopper's orders, newest first.
#[instrument(skip_all, fields(user_id = %signed_in.identity.uid))]
pub async fn orders(
    State(state): State<AppState>,
    signed_in: SignedIn,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.orders().list(&signed_in.identity.uid).await?))
}
