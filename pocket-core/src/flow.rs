//! Authorization orchestration.
//!
//! [`AuthFlow::acquire`] returns a usable [`Authorization`]: the cached
//! record when there is a readable one, otherwise the result of a full
//! acquisition:
//!
//! 1. bind the [`CallbackListener`] so the redirect target is known
//! 2. obtain a request token for that redirect target
//! 3. build the authorization URL and present it to the operator
//! 4. wait for the browser to reach the callback
//! 5. exchange the request token for an access token
//! 6. persist the record
//!
//! A failure in steps 1-5 is fatal and nothing is written. A failure in
//! step 6 is reported alongside the credential, which is still usable for
//! the current run.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use pocket_core::{AuthFlow, CredentialStore, PocketAuthClient, PocketConfig};
//!
//! let config = PocketConfig::load(None)?;
//! let store = CredentialStore::new(&config);
//! let consumer_key = store.load_consumer_key_interactive()?;
//! let api = PocketAuthClient::new(&config.api_base_url)?;
//!
//! let flow = AuthFlow::new(&config, store, api);
//! let outcome = flow.acquire(&consumer_key).await?;
//! println!("Logged in as {}", outcome.authorization.username);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::callback::{CallbackError, CallbackListener};
use crate::config::PocketConfig;
use crate::model::{Authorization, ConsumerKey};
use crate::remote::{AuthorizationApi, RemoteError};
use crate::store::{CredentialStore, StoreError};

/// Fatal failure to obtain a credential.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A call to the service failed.
    #[error("authorization failed: {0}")]
    Remote(#[from] RemoteError),

    /// The browser step could not be completed.
    #[error("authorization callback failed: {0}")]
    Callback(#[from] CallbackError),
}

/// Where the returned credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Read from the authorization record.
    Cache,

    /// Obtained by running the authorization flow in this process.
    Authorized,
}

/// Result of [`AuthFlow::acquire`].
#[derive(Debug)]
pub struct AcquireOutcome {
    /// The usable credential.
    pub authorization: Authorization,

    /// How it was obtained.
    pub source: CredentialSource,

    /// Set when a freshly obtained credential could not be saved.
    ///
    /// The credential works for this run but the next run will have to
    /// authorize again.
    pub persist_warning: Option<StoreError>,
}

/// Presents the authorization URL to the operator.
pub trait AuthorizationPrompt: Send + Sync {
    /// Show `url` to the operator. Called once the callback is listening.
    fn present(&self, url: &Url);
}

/// Prints the authorization URL on standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutPrompt;

impl AuthorizationPrompt for StdoutPrompt {
    fn present(&self, url: &Url) {
        println!("Open the following URL in your browser to authorize this client:");
        println!("{}", url);
    }
}

/// Drives the "use cached, else authorize" logic.
pub struct AuthFlow<A: AuthorizationApi> {
    store: CredentialStore,
    api: A,
    prompt: Box<dyn AuthorizationPrompt>,
    callback_host: String,
    callback_timeout: Option<Duration>,
}

impl<A: AuthorizationApi> AuthFlow<A> {
    /// Create a flow that prints the authorization URL on stdout.
    pub fn new(config: &PocketConfig, store: CredentialStore, api: A) -> Self {
        Self {
            store,
            api,
            prompt: Box::new(StdoutPrompt),
            callback_host: config.callback_host.clone(),
            callback_timeout: config.callback_timeout(),
        }
    }

    /// Replace how the authorization URL is presented.
    pub fn with_prompt(mut self, prompt: impl AuthorizationPrompt + 'static) -> Self {
        self.prompt = Box::new(prompt);
        self
    }

    /// The credential store backing this flow.
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Return the cached credential, or authorize and cache a new one.
    pub async fn acquire(&self, consumer_key: &ConsumerKey) -> Result<AcquireOutcome, AuthError> {
        match self.store.load_authorization() {
            Ok(authorization) => {
                tracing::debug!("Using cached authorization for {}", authorization.username);
                return Ok(AcquireOutcome {
                    authorization,
                    source: CredentialSource::Cache,
                    persist_warning: None,
                });
            }
            Err(e) => {
                tracing::info!("No usable cached authorization ({}), authorizing", e);
            }
        }

        let authorization = self.authorize(consumer_key).await?;

        let persist_warning = match self.store.save_authorization(&authorization) {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(
                    "Authorized as {} but could not save the authorization: {}. \
                     You will be asked to authorize again next time.",
                    authorization.username,
                    e
                );
                Some(e)
            }
        };

        Ok(AcquireOutcome {
            authorization,
            source: CredentialSource::Authorized,
            persist_warning,
        })
    }

    /// Run the request/authorize/exchange sequence without touching the cache.
    pub async fn authorize(&self, consumer_key: &ConsumerKey) -> Result<Authorization, AuthError> {
        let listener = CallbackListener::bind(&self.callback_host).await?;
        let redirect_uri = listener.redirect_uri();

        let request_token = self
            .api
            .obtain_request_token(consumer_key, &redirect_uri)
            .await?;

        let url = self.api.authorization_url(&request_token, &redirect_uri)?;
        self.prompt.present(&url);

        listener.wait(self.callback_timeout).await?;

        let authorization = self
            .api
            .obtain_access_token(consumer_key, &request_token)
            .await?;
        tracing::info!("Authorized as {}", authorization.username);

        Ok(authorization)
    }
}
