//! The authenticated principal as mirrored from the auth provider.

use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::UserId;

/// A signed-in shopper.
///
/// Owned by the external auth provider; the storefront only ever replaces
/// its copy wholesale when the provider pushes a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider-assigned unique id.
    pub uid: UserId,
    /// Account email address.
    pub email: Email,
}

impl Identity {
    /// Create a new identity.
    #[must_use]
    pub const fn new(uid: UserId, email: Email) -> Self {
        Self { uid, email }
    }
}
