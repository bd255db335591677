//! Identity Toolkit REST client.

use std::sync::Arc;

use async_trait::async_trait;
use bazaar_core::{Email, Identity, UserId};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::watch;
use tracing::{debug, instrument};

use crate::auth::{AuthConnector, AuthProvider, AuthProviderError, ProviderCredential};
use crate::config::FirebaseConfig;

/// Hands out per-client sessions against the Identity Toolkit API.
#[derive(Clone)]
pub struct FirebaseAuthConnector {
    inner: Arc<ConnectorInner>,
}

struct ConnectorInner {
    client: reqwest::Client,
    /// `https://identitytoolkit.googleapis.com/v1`, or the emulator's address
    endpoint: String,
    api_key: SecretString,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    email: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl FirebaseAuthConnector {
    #[must_use]
    pub fn new(config: &FirebaseConfig) -> Self {
        let endpoint = config.auth_emulator_host.as_ref().map_or_else(
            || "https://identitytoolkit.googleapis.com/v1".to_string(),
            |host| format!("http://{host}/identitytoolkit.googleapis.com/v1"),
        );

        Self {
            inner: Arc::new(ConnectorInner {
                client: reqwest::Client::new(),
                endpoint,
                api_key: config.api_key.clone(),
            }),
        }
    }
}

impl AuthConnector for FirebaseAuthConnector {
    fn connect(&self) -> Arc<dyn AuthProvider> {
        let (identity, _) = watch::channel(None);
        Arc::new(FirebaseAuthSession {
            inner: Arc::clone(&self.inner),
            identity,
        })
    }
}

/// One client's Identity Toolkit session.
pub struct FirebaseAuthSession {
    inner: Arc<ConnectorInner>,
    identity: watch::Sender<Option<Identity>>,
}

/// Map an Identity Toolkit error code to the provider error taxonomy.
///
/// Messages look like `WEAK_PASSWORD : Password should be at least 6
/// characters`; only the leading code matters.
fn map_error_code(message: &str) -> AuthProviderError {
    let code = message
        .split([' ', ':'])
        .next()
        .unwrap_or(message)
        .trim();
    match code {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "USER_DISABLED"
        | "INVALID_IDP_RESPONSE" => AuthProviderError::InvalidCredentials,
        "EMAIL_EXISTS" | "FEDERATED_USER_ID_ALREADY_LINKED" => AuthProviderError::AccountExists,
        "WEAK_PASSWORD" => AuthProviderError::WeakPassword,
        "INVALID_EMAIL" | "MISSING_EMAIL" => AuthProviderError::InvalidEmail,
        "TOO_MANY_ATTEMPTS_TRY_LATER" => AuthProviderError::RateLimited,
        _ => AuthProviderError::Rejected(message.to_owned()),
    }
}

impl FirebaseAuthSession {
    async fn call(&self, method: &str, body: Value) -> Result<Value, AuthProviderError> {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("key", self.inner.api_key.expose_secret())
            .finish();
        let url = format!("{}/accounts:{method}?{query}", self.inner.endpoint);

        let response = self.inner.client.post(&url).json(&body).send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&response_text).map_or_else(
                |_| format!("HTTP {status}"),
                |envelope| envelope.error.message,
            );
            debug!(method, status = %status, message = %message, "Identity Toolkit error");
            return Err(map_error_code(&message));
        }

        Ok(serde_json::from_str(&response_text)?)
    }

    async fn sign_in_with(&self, method: &str, body: Value) -> Result<Identity, AuthProviderError> {
        let response: SignInResponse = serde_json::from_value(self.call(method, body).await?)?;
        let email = response
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|_| AuthProviderError::InvalidEmail)?
            .ok_or_else(|| AuthProviderError::Rejected("account has no email".to_string()))?;

        let identity = Identity::new(UserId::new(response.local_id), email);
        self.identity.send_replace(Some(identity.clone()));
        Ok(identity)
    }
}

#[async_trait]
impl AuthProvider for FirebaseAuthSession {
    fn watch_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Identity, AuthProviderError> {
        let body = json!({
            "email": email.as_str(),
            "password": password.expose_secret(),
            "returnSecureToken": true,
        });
        self.sign_in_with("signInWithPassword", body).await
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Identity, AuthProviderError> {
        let body = json!({
            "email": email.as_str(),
            "password": password.expose_secret(),
            "returnSecureToken": true,
        });
        self.sign_in_with("signUp", body).await
    }

    #[instrument(skip(self, credential), fields(provider = %credential.provider_id))]
    async fn sign_in_with_provider(
        &self,
        credential: &ProviderCredential,
    ) -> Result<Identity, AuthProviderError> {
        let post_body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("id_token", credential.id_token.expose_secret())
            .append_pair("providerId", &credential.provider_id)
            .finish();
        let body = json!({
            "postBody": post_body,
            "requestUri": "http://localhost",
            "returnIdpCredential": true,
            "returnSecureToken": true,
        });
        self.sign_in_with("signInWithIdp", body).await
    }

    async fn sign_out(&self) -> Result<(), AuthProviderError> {
        // ID tokens are stateless; signing out only forgets the identity.
        self.identity.send_replace(None);
        Ok(())
    }

    #[instrument(skip(self), fields(email = %email))]
    async fn send_password_reset(&self, email: &Email) -> Result<(), AuthProviderError> {
        let body = json!({ "requestType": "PASSWORD_RESET", "email": email.as_str() });
        match self.call("sendOobCode", body).await {
            Ok(_) | Err(AuthProviderError::InvalidCredentials) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
