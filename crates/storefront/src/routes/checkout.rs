//! Checkout route handlers.
//!
//! The step machine lives in the shopper's client; each handler applies one
//! transition and answers with the resulting view.

use axum::{Json, extract::State, http::StatusCode};
use bazaar_core::{CartLineItem, Money, Order, ShippingInfo};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::client::ShopperClient;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::SignedIn;
use crate::services::{CheckoutError, CheckoutFlow, CheckoutStep, PaymentDetails};
use crate::state::AppState;

/// Checkout page data.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    #[serde(flatten)]
    pub step: CheckoutStep,
    pub shipping: Option<ShippingInfo>,
    pub items: Vec<CartLineItem>,
    pub subtotal: Money,
    /// The cart is empty and nothing is processing; the page should leave.
    pub redirect_home: bool,
}

impl TryFrom<&ShopperClient> for CheckoutView {
    type Error = CheckoutError;

    fn try_from(client: &ShopperClient) -> std::result::Result<Self, Self::Error> {
        let items = client.cart().items();
        let (step, shipping, redirect_home) = client.with_checkout(|flow| {
            (
                flow.step().clone(),
                flow.shipping().cloned(),
                flow.should_redirect_home(items.is_empty()),
            )
        });
        Ok(Self {
            step,
            shipping,
            subtotal: bazaar_core::subtotal(&items)?,
            items,
            redirect_home,
        })
    }
}

/// Card details; checked for presence only and never stored.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentForm {
    #[serde(default = "empty_secret")]
    pub card_number: SecretString,
    #[serde(default)]
    pub expiry: String,
    #[serde(default = "empty_secret")]
    pub cvc: SecretString,
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

#[derive(Debug, Serialize)]
pub struct OrderPlaced {
    pub order: Order,
}

#[instrument(skip_all, fields(user_id = %signed_in.identity.uid))]
pub async fn show(signed_in: SignedIn) -> Result<Json<CheckoutView>> {
    if let Err(e) = signed_in.client.cart().refresh().await {
        tracing::warn!(error = %e, "Cart refresh failed, serving mirrored cart");
    }
    let cart_is_empty = signed_in.client.cart().items().is_empty();
    signed_in
        .client
        .with_checkout(|flow| flow.restart_if_done(cart_is_empty));
    Ok(Json(CheckoutView::try_from(signed_in.client.as_ref())?))
}

#[instrument(skip_all, fields(user_id = %signed_in.identity.uid))]
pub async fn shipping(
    signed_in: SignedIn,
    Json(form): Json<ShippingInfo>,
) -> Result<Json<CheckoutView>> {
    signed_in
        .client
        .with_checkout(|flow| flow.submit_shipping(form))
        .map_err(CheckoutError::from)?;
    Ok(Json(CheckoutView::try_from(signed_in.client.as_ref())?))
}

#[instrument(skip_all, fields(user_id = %signed_in.identity.uid))]
pub async fn back(signed_in: SignedIn) -> Result<Json<CheckoutView>> {
    signed_in
        .client
        .with_checkout(CheckoutFlow::back)
        .map_err(CheckoutError::from)?;
    Ok(Json(CheckoutView::try_from(signed_in.client.as_ref())?))
}

/// Commit the order. On failure the cart is untouched and payment may be
/// resubmitted.
#[instrument(skip_all, fields(user_id = %signed_in.identity.uid))]
pub async fn place_order(
    State(state): State<AppState>,
    signed_in: SignedIn,
    Json(form): Json<PaymentForm>,
) -> Result<(StatusCode, Json<OrderPlaced>)> {
    let payment = PaymentDetails {
        card_number: form.card_number,
        expiry: form.expiry,
        cvc: form.cvc,
    };
    let order = signed_in
        .client
        .place_order(state.checkout(), &payment)
        .await?;

    // The page navigates away on success; the next checkout starts fresh.
    signed_in.client.reset_checkout();
    add_breadcrumb(
        "checkout",
        "Order placed",
        Some(&[("order_id", order.id.as_str())]),
    );
    Ok((StatusCode::CREATED, Json(OrderPlaced { order })))
}
