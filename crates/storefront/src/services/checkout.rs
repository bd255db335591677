//! Checkout: the order commit and the checkout page's state machine.
//!
//! Placing an order writes `users/{uid}/orders/{orderId}` and deletes every
//! committed cart line. With [`CommitStrategy::SingleBatch`] both happen in
//! one atomic batch, so the order's items and the deleted lines are always
//! the same set. [`CommitStrategy::OrderThenClear`] writes the order first
//! and clears the cart in a second batch, deleting the order again if the
//! clear fails.

use std::str::FromStr;
use std::sync::Arc;

use bazaar_backend::{
    DocumentError, DocumentStore, PathError, StoreError, Write, WriteBatch, auto_id, encode, paths,
};
use bazaar_core::{
    CartLineItem, Identity, MoneyError, Order, OrderId, OrderStatus, ShippingInfo,
    ShippingInfoError, subtotal,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

/// How the order write and the cart clear are committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommitStrategy {
    /// Order create and cart deletes in one atomic batch.
    #[default]
    SingleBatch,
    /// Order first, then the cart deletes; the order is deleted again if
    /// clearing the cart fails.
    OrderThenClear,
}

impl FromStr for CommitStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single-batch" => Ok(Self::SingleBatch),
            "order-then-clear" => Ok(Self::OrderThenClear),
            _ => Err(format!(
                "expected 'single-batch' or 'order-then-clear', got '{s}'"
            )),
        }
    }
}

/// Errors from the checkout flow and commit.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("sign in to check out")]
    Unauthenticated,

    /// Callers must not reach checkout with an empty cart.
    #[error("cart is empty")]
    EmptyCart,

    #[error(transparent)]
    Flow(#[from] FlowError),

    /// The order total cannot be represented; nothing was written.
    #[error("order total is out of range: {0}")]
    Total(#[from] MoneyError),

    /// The commit task stopped before reporting an outcome.
    #[error("checkout was interrupted")]
    Interrupted,

    /// Nothing was persisted; the cart is unchanged.
    #[error("failed to place order: {0}")]
    RemoteWrite(#[source] StoreError),

    /// The order is persisted but the cart lines are too.
    #[error("order {order_id} was saved but the cart could not be cleared")]
    PartialCommit {
        order_id: OrderId,
        #[source]
        source: StoreError,
    },

    #[error("invalid id: {0}")]
    InvalidId(#[from] PathError),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Writes orders.
#[derive(Clone)]
pub struct CheckoutCommit {
    store: Arc<dyn DocumentStore>,
    strategy: CommitStrategy,
}

impl CheckoutCommit {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, strategy: CommitStrategy) -> Self {
        Self { store, strategy }
    }

    #[must_use]
    pub const fn strategy(&self) -> CommitStrategy {
        self.strategy
    }

    /// Persist an order for `items` and remove exactly those lines from the
    /// shopper's cart.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::EmptyCart`] if `items` is empty
    /// - [`CheckoutError::Flow`] if `shipping` has a blank field
    /// - [`CheckoutError::Total`] if the subtotal is out of range
    /// - [`CheckoutError::RemoteWrite`] if nothing could be persisted
    /// - [`CheckoutError::PartialCommit`] if the order remains but the cart
    ///   lines could not be removed
    #[instrument(skip_all, fields(user_id = %identity.uid, lines = items.len()))]
    pub async fn commit(
        &self,
        identity: &Identity,
        items: &[CartLineItem],
        shipping: ShippingInfo,
    ) -> Result<Order, CheckoutError> {
        if items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let shipping_info = shipping.validate().map_err(FlowError::from)?;

        let order = Order {
            id: OrderId::new(auto_id()),
            user_id: identity.uid.clone(),
            email: identity.email.clone(),
            shipping_info,
            items: items.to_vec(),
            subtotal: subtotal(items)?,
            status: OrderStatus::Pending,
            created_at: None,
        };
        let order_path = paths::order(&identity.uid, &order.id)?;
        let order_write =
            Write::set(order_path.clone(), encode(&order)?).with_server_timestamp("createdAt");
        let clear: WriteBatch = items
            .iter()
            .map(|item| paths::cart_item(&identity.uid, &item.id).map(Write::delete))
            .collect::<Result<_, _>>()?;

        match self.strategy {
            CommitStrategy::SingleBatch => {
                let batch: WriteBatch = std::iter::once(order_write)
                    .chain(clear.into_writes())
                    .collect();
                self.store
                    .commit(batch)
                    .await
                    .map_err(CheckoutError::RemoteWrite)?;
            }
            CommitStrategy::OrderThenClear => {
                self.store
                    .commit(order_write.into())
                    .await
                    .map_err(CheckoutError::RemoteWrite)?;

                if let Err(source) = self.store.commit(clear).await {
                    warn!(order_id = %order.id, error = %source, "Cart clear failed, deleting order");
                    if let Err(rollback) = self.store.delete(&order_path).await {
                        error!(order_id = %order.id, error = %rollback, "Order rollback failed");
                        return Err(CheckoutError::PartialCommit {
                            order_id: order.id,
                            source,
                        });
                    }
                    return Err(CheckoutError::RemoteWrite(source));
                }
            }
        }

        info!(order_id = %order.id, subtotal = %order.subtotal, "Order placed");

        // Read back for the server-assigned timestamp; the local copy is
        // still correct without it.
        match self.store.get(&order_path).await {
            Ok(Some(doc)) => Ok(doc.decode().unwrap_or(order)),
            Ok(None) | Err(_) => Ok(order),
        }
    }
}

// =============================================================================
// Checkout flow
// =============================================================================

/// Simulated card details: checked for presence, never stored.
pub struct PaymentDetails {
    pub card_number: SecretString,
    pub expiry: String,
    pub cvc: SecretString,
}

impl PaymentDetails {
    fn validate(&self) -> Result<(), FlowError> {
        if self.card_number.expose_secret().trim().is_empty() {
            return Err(FlowError::InvalidPayment("card number"));
        }
        if self.expiry.trim().is_empty() {
            return Err(FlowError::InvalidPayment("expiry date"));
        }
        if self.cvc.expose_secret().trim().is_empty() {
            return Err(FlowError::InvalidPayment("CVC"));
        }
        Ok(())
    }
}

/// Errors from checkout step transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("cannot {action} during {step}")]
    InvalidTransition {
        action: &'static str,
        step: &'static str,
    },

    #[error(transparent)]
    InvalidShipping(#[from] ShippingInfoError),

    #[error("payment {0} is required")]
    InvalidPayment(&'static str),
}

/// Where the shopper is in checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum CheckoutStep {
    #[default]
    ShippingEntry,
    PaymentEntry,
    Processing,
    Succeeded {
        order_id: OrderId,
    },
    /// The last attempt failed; payment may be resubmitted.
    Failed {
        message: String,
    },
}

impl CheckoutStep {
    const fn name(&self) -> &'static str {
        match self {
            Self::ShippingEntry => "shipping entry",
            Self::PaymentEntry => "payment entry",
            Self::Processing => "processing",
            Self::Succeeded { .. } => "success",
            Self::Failed { .. } => "failure",
        }
    }
}

/// Checkout page state: `ShippingEntry -> PaymentEntry -> Processing ->
/// Succeeded | Failed`, with `Failed` accepting a new payment attempt.
#[derive(Debug, Clone, Default)]
pub struct CheckoutFlow {
    step: CheckoutStep,
    shipping: Option<ShippingInfo>,
}

impl CheckoutFlow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn step(&self) -> &CheckoutStep {
        &self.step
    }

    #[must_use]
    pub const fn shipping(&self) -> Option<&ShippingInfo> {
        self.shipping.as_ref()
    }

    #[must_use]
    pub const fn is_processing(&self) -> bool {
        matches!(self.step, CheckoutStep::Processing)
    }

    /// The page should send the shopper away: the cart is empty and no
    /// commit is in flight.
    #[must_use]
    pub const fn should_redirect_home(&self, cart_is_empty: bool) -> bool {
        cart_is_empty && !self.is_processing()
    }

    fn invalid(&self, action: &'static str) -> FlowError {
        FlowError::InvalidTransition {
            action,
            step: self.step.name(),
        }
    }

    /// Accept shipping details and move to payment.
    ///
    /// # Errors
    ///
    /// Fails while processing or after success, or if a field is blank.
    pub fn submit_shipping(&mut self, shipping: ShippingInfo) -> Result<(), FlowError> {
        match self.step {
            CheckoutStep::ShippingEntry
            | CheckoutStep::PaymentEntry
            | CheckoutStep::Failed { .. } => {
                self.shipping = Some(shipping.validate()?);
                self.step = CheckoutStep::PaymentEntry;
                Ok(())
            }
            CheckoutStep::Processing | CheckoutStep::Succeeded { .. } => {
                Err(self.invalid("edit shipping"))
            }
        }
    }

    /// Return to the shipping form, keeping what was entered.
    ///
    /// # Errors
    ///
    /// Fails unless on the payment step or after a failure.
    pub fn back(&mut self) -> Result<(), FlowError> {
        match self.step {
            CheckoutStep::PaymentEntry | CheckoutStep::Failed { .. } => {
                self.step = CheckoutStep::ShippingEntry;
                Ok(())
            }
            _ => Err(self.invalid("go back")),
        }
    }

    /// Validate payment and enter `Processing`; returns the shipping details
    /// to commit.
    ///
    /// # Errors
    ///
    /// Fails unless on the payment step or after a failure, or if a payment
    /// field is blank.
    pub fn begin_payment(&mut self, payment: &PaymentDetails) -> Result<ShippingInfo, FlowError> {
        let shipping = match (&self.step, &self.shipping) {
            (CheckoutStep::PaymentEntry | CheckoutStep::Failed { .. }, Some(shipping)) => {
                shipping.clone()
            }
            _ => return Err(self.invalid("place an order")),
        };
        payment.validate()?;
        self.step = CheckoutStep::Processing;
        Ok(shipping)
    }

    /// Record the outcome of the commit started by [`Self::begin_payment`].
    pub fn finish(&mut self, outcome: &Result<Order, CheckoutError>) {
        if !self.is_processing() {
            return;
        }
        self.step = match outcome {
            Ok(order) => CheckoutStep::Succeeded {
                order_id: order.id.clone(),
            },
            Err(e) => CheckoutStep::Failed {
                message: user_message(e),
            },
        };
    }

    /// Start a new checkout once an earlier one has succeeded and the
    /// shopper has filled a new cart. Covers orders whose request was
    /// abandoned before the page could reset.
    pub fn restart_if_done(&mut self, cart_is_empty: bool) {
        if !cart_is_empty && matches!(self.step, CheckoutStep::Succeeded { .. }) {
            self.reset();
        }
    }

    /// Start over, e.g. after a successful order.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Message shown to the shopper for a failed checkout.
#[must_use]
pub fn user_message(error: &CheckoutError) -> String {
    match error {
        CheckoutError::Unauthenticated => "Please sign in to check out.".to_string(),
        CheckoutError::EmptyCart => "Your cart is empty.".to_string(),
        CheckoutError::Flow(e) => e.to_string(),
        CheckoutError::Total(_) => {
            "Your order total is too large. Please reduce quantities.".to_string()
        }
        CheckoutError::Interrupted
        | CheckoutError::RemoteWrite(_)
        | CheckoutError::PartialCommit { .. }
        | CheckoutError::InvalidId(_)
        | CheckoutError::Document(_) => "Failed to place order. Please try again.".to_string(),
    }
}
