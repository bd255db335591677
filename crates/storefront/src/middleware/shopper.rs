//! Extractors resolving a request to its shopper client.

use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};
use bazaar_core::Identity;
use tower_sessions::Session;
use uuid::Uuid;

use crate::client::ShopperClient;
use crate::error::AppError;
use crate::state::AppState;

/// Session key holding the shopper's client id.
pub const SESSION_CLIENT_KEY: &str = "shopper_client_id";

/// The requesting browser's client, connected on first use.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(shopper: Shopper) -> impl IntoResponse {
///     Json(shopper.client.cart().items())
/// }
/// ```
pub struct Shopper {
    pub client_id: Uuid,
    pub client: Arc<ShopperClient>,
}

impl FromRequestParts<AppState> for Shopper {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;

        let client_id = if let Some(id) = session.get::<Uuid>(SESSION_CLIENT_KEY).await? {
            id
        } else {
            let id = Uuid::new_v4();
            session.insert(SESSION_CLIENT_KEY, id).await?;
            id
        };

        let client = state.clients().get_or_connect(client_id).await;
        Ok(Self { client_id, client })
    }
}

/// A shopper who is signed in; rejects with 401 otherwise.
pub struct SignedIn {
    pub identity: Identity,
    pub client: Arc<ShopperClient>,
}

impl FromRequestParts<AppState> for SignedIn {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Shopper { client, .. } = Shopper::from_request_parts(parts, state).await?;
        let identity = client.session().require()?;
        Ok(Self { identity, client })
    }
}
