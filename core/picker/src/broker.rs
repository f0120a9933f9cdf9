//! Awaitable credential acquisition over a callback-driven authorization
//! capability.
//!
//! The external capability offers no promise to await: invoking a request
//! asynchronously fills a registered slot at an indeterminate later point,
//! or never (the user may simply close the prompt). The broker owns the
//! slot and polls it on a short interval until it is populated or a bound
//! elapses. Polling is deliberate; there is no single-fire completion hook
//! to rely on.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio::time::{sleep, Instant};
use tracing::debug;

use drivepick_common::{Credential, Error, Result};

/// Prompt policy for a token request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// Silent request; fails if consent is needed.
    None,
    /// Explicit consent prompt.
    Consent,
}

/// Outcome the capability writes into the slot.
#[derive(Debug, Clone)]
pub enum TokenGrant {
    /// Access granted.
    Granted { access_token: String },
    /// The user declined, or consent was required on a silent request.
    Denied { reason: String },
}

/// Slot the capability fills asynchronously. Cleared before each request.
pub type TokenSlot = Arc<Mutex<Option<TokenGrant>>>;

/// External, callback-driven authorization capability.
#[async_trait]
pub trait TokenClient: Send + Sync {
    /// One-time initialization: load the authorization script and register
    /// the client identifier and scope string with it.
    ///
    /// # Errors
    /// - `ResourceLoad` when the capability cannot be brought up
    async fn initialize(&self, client_id: &str, scopes: &str) -> Result<()>;

    /// Fire-and-forget token request. The capability fills `slot` later,
    /// or never.
    fn request_access(&self, prompt: PromptMode, slot: TokenSlot);
}

/// Broker identity, timing and scope configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// OAuth client identifier registered with the capability.
    pub client_id: String,
    /// Space-separated scope string requested from the capability.
    pub scopes: String,
    /// Slot poll interval.
    pub poll_interval: Duration,
    /// Bound on the whole wait; past it the request fails.
    pub timeout: Duration,
}

impl BrokerConfig {
    /// Config with default timing for the given client and scope string.
    pub fn new(client_id: impl Into<String>, scopes: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            scopes: scopes.into(),
            poll_interval: Duration::from_millis(150),
            timeout: Duration::from_secs(90),
        }
    }
}

/// Converts the callback-driven capability into awaitable, timeout-bounded
/// credential requests.
pub struct CredentialBroker {
    client: Arc<dyn TokenClient>,
    config: BrokerConfig,
    initialized: OnceCell<()>,
    slot: TokenSlot,
}

impl CredentialBroker {
    /// Create a new broker over an injected capability.
    pub fn new(client: Arc<dyn TokenClient>, config: BrokerConfig) -> Self {
        Self {
            client,
            config,
            initialized: OnceCell::new(),
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Initialize the capability exactly once per broker lifetime.
    async fn init_if_needed(&self) -> Result<()> {
        self.initialized
            .get_or_try_init(|| {
                self.client
                    .initialize(&self.config.client_id, &self.config.scopes)
            })
            .await?;
        Ok(())
    }

    /// Request a fresh credential with the given prompt mode.
    ///
    /// # Postconditions
    /// - Any previously held grant is discarded before the request
    ///
    /// # Errors
    /// - `AuthTimeout` when no callback fires within the bound
    /// - `AuthDenied` when the capability reports a denial
    /// - `ResourceLoad` when initialization fails
    pub async fn request_credential(&self, prompt: PromptMode) -> Result<Credential> {
        self.init_if_needed().await?;

        // Clear the slot so a stale grant from a prior activation can never
        // satisfy this request.
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;

        debug!(?prompt, "Requesting access token");
        self.client.request_access(prompt, self.slot.clone());

        let deadline = Instant::now() + self.config.timeout;
        loop {
            let grant = self
                .slot
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone();

            match grant {
                Some(TokenGrant::Granted { access_token }) => {
                    return Ok(Credential::new(access_token, &self.config.scopes));
                }
                Some(TokenGrant::Denied { reason }) => {
                    return Err(Error::AuthDenied(reason));
                }
                None => {
                    if Instant::now() >= deadline {
                        return Err(Error::AuthTimeout(self.config.timeout.as_secs()));
                    }
                    sleep(self.config.poll_interval).await;
                }
            }
        }
    }

    /// Acquire a credential: silent attempt first, one consent retry on
    /// denial.
    pub async fn acquire(&self) -> Result<Credential> {
        match self.request_credential(PromptMode::None).await {
            Ok(credential) => Ok(credential),
            Err(Error::AuthDenied(reason)) => {
                debug!("Silent request denied ({}), retrying with consent", reason);
                self.request_credential(PromptMode::Consent).await
            }
            Err(e) => Err(e),
        }
    }
}
