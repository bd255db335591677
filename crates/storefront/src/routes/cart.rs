//! Cart route handlers.
//!
//! Every response carries the whole cart view. Mutations re-read the cart
//! before answering so the caller sees its own write even if the live
//! subscription has not delivered it yet.

use std::convert::Infallible;

use axum::{
    Json,
    extract::{Path, State},
    response::{
        Sse,
        sse::{Event, KeepAlive},
    },
};
use bazaar_core::{CartLineItem, Money, ProductId};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::WatchStream;
use tracing::{instrument, warn};

use crate::client::ShopperClient;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::{Shopper, SignedIn};
use crate::services::{CartError, CartStore};
use crate::state::AppState;

/// Cart display data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartLineItem>,
    pub subtotal: Money,
    pub item_count: u64,
    pub open: bool,
}

impl TryFrom<&CartStore> for CartView {
    type Error = CartError;

    fn try_from(cart: &CartStore) -> std::result::Result<Self, Self::Error> {
        let items = cart.items();
        Ok(Self {
            subtotal: bazaar_core::subtotal(&items)?,
            item_count: items.iter().map(|i| u64::from(i.quantity)).sum(),
            items,
            open: cart.is_open(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemForm {
    pub product_id: String,
}

#[derive(Debug, Deserialize)]
pub struct QuantityForm {
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct VisibilityForm {
    pub open: bool,
}

/// Re-read the cart and render it; a failed re-read serves the mirror.
async fn fresh_view(client: &ShopperClient) -> Result<CartView> {
    if let Err(e) = client.cart().refresh().await {
        warn!(error = %e, "Cart refresh failed, serving mirrored cart");
    }
    Ok(CartView::try_from(client.cart())?)
}

/// Current cart. Empty while signed out.
#[instrument(skip_all)]
pub async fn show(shopper: Shopper) -> Result<Json<CartView>> {
    Ok(Json(fresh_view(&shopper.client).await?))
}

/// Server-sent cart views, one per change.
pub async fn stream(
    shopper: Shopper,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let client = shopper.client;
    let changes = WatchStream::new(client.cart().watch());

    let events = changes.map(move |_| {
        let event = match CartView::try_from(client.cart()) {
            Ok(view) => {
                let data = serde_json::to_string(&view).unwrap_or_else(|_| "{}".to_string());
                Event::default().event("cart").data(data)
            }
            Err(e) => {
                warn!(error = %e, "Cannot render cart view");
                Event::default().event("error").data(e.to_string())
            }
        };
        Ok(event)
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Add one unit of a catalog product.
#[instrument(skip_all, fields(product_id = %form.product_id))]
pub async fn add(
    State(state): State<AppState>,
    signed_in: SignedIn,
    Json(form): Json<AddItemForm>,
) -> Result<Json<CartView>> {
    let product = state
        .catalog()
        .get_by_id(&ProductId::new(form.product_id))
        .await?;
    let quantity = signed_in.client.cart().add_to_cart(&product).await?;

    let quantity = quantity.to_string();
    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product_id", product.id.as_str()), ("quantity", &quantity)]),
    );
    Ok(Json(fresh_view(&signed_in.client).await?))
}

/// Set a line's quantity; zero or below removes it.
#[instrument(skip_all, fields(product_id = %id, quantity = form.quantity))]
pub async fn update(
    signed_in: SignedIn,
    Path(id): Path<String>,
    Json(form): Json<QuantityForm>,
) -> Result<Json<CartView>> {
    signed_in
        .client
        .cart()
        .update_quantity(&ProductId::new(id), form.quantity)
        .await?;
    Ok(Json(fresh_view(&signed_in.client).await?))
}

/// Remove a line; removing an absent line succeeds.
#[instrument(skip_all, fields(product_id = %id))]
pub async fn remove(signed_in: SignedIn, Path(id): Path<String>) -> Result<Json<CartView>> {
    let product_id = ProductId::new(id);
    signed_in.client.cart().remove_from_cart(&product_id).await?;
    add_breadcrumb(
        "cart",
        "Removed from cart",
        Some(&[("product_id", product_id.as_str())]),
    );
    Ok(Json(fresh_view(&signed_in.client).await?))
}

/// Open or close the cart panel.
pub async fn set_visibility(
    shopper: Shopper,
    Json(form): Json<VisibilityForm>,
) -> Result<Json<CartView>> {
    shopper.client.cart().set_open(form.open);
    Ok(Json(CartView::try_from(shopper.client.cart())?))
}
